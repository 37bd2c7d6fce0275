use crate::matrix::{Category, NoteValue};
use crate::producer::{ProducerContext, SignalProducer};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

pub const NAME: &str = "instant_fluctuations";

/// Relative move that saturates the note.
const FULL_SCALE_MOVE: f64 = 0.02;

/// REAL_TIME note from the relative change between the two latest tickers.
///
/// A 2% move maps to a full-scale note. Pending until two tickers were seen.
#[derive(Debug, Default)]
pub struct InstantFluctuations {
    previous: Option<Decimal>,
}

impl InstantFluctuations {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SignalProducer for InstantFluctuations {
    fn name(&self) -> &str {
        NAME
    }

    fn category(&self) -> Category {
        Category::RealTime
    }

    async fn refresh(&mut self, ctx: &ProducerContext) -> Result<NoteValue> {
        let Some(ticker) = &ctx.ticker else {
            return Ok(NoteValue::Pending);
        };
        let last = ticker.last;
        let previous = self.previous.replace(last);

        match previous {
            Some(prev) if !prev.is_zero() => {
                let change = ((last - prev) / prev).to_f64().unwrap_or(0.0);
                Ok(NoteValue::Value((change / FULL_SCALE_MOVE).clamp(-1.0, 1.0)))
            }
            _ => Ok(NoteValue::Pending),
        }
    }
}
