use crate::matrix::{Category, NoteValue};
use crate::producer::{ProducerContext, SyncProducer};
use anyhow::Result;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use trading::TimeFrame;

pub const NAME: &str = "trade_momentum";

const FULL_SCALE_DEVIATION: f64 = 0.01;

/// TA note comparing the last traded price to the volume-weighted average of
/// the recent trades. Runs on the blocking pool.
#[derive(Debug)]
pub struct TradeMomentum {
    time_frame: TimeFrame,
}

impl TradeMomentum {
    pub fn new(time_frame: TimeFrame) -> Self {
        Self { time_frame }
    }
}

impl SyncProducer for TradeMomentum {
    fn name(&self) -> &str {
        NAME
    }

    fn category(&self) -> Category {
        Category::Ta
    }

    fn time_frame(&self) -> Option<TimeFrame> {
        Some(self.time_frame)
    }

    fn evaluate(&mut self, ctx: &ProducerContext) -> Result<NoteValue> {
        let Some(last) = ctx.recent_trades.iter().max_by_key(|t| t.timestamp) else {
            return Ok(NoteValue::Pending);
        };
        let volume: Decimal = ctx.recent_trades.iter().map(|t| t.quantity).sum();
        if volume.is_zero() {
            return Ok(NoteValue::Pending);
        }
        let notional: Decimal = ctx
            .recent_trades
            .iter()
            .map(|t| t.price * t.quantity)
            .sum();
        let vwap = notional / volume;
        if vwap.is_zero() {
            return Ok(NoteValue::Pending);
        }

        let deviation = ((last.price - vwap) / vwap).to_f64().unwrap_or(0.0);
        Ok(NoteValue::Value(
            (deviation / FULL_SCALE_DEVIATION).clamp(-1.0, 1.0),
        ))
    }
}
