//! Price and quantity factors of the order planner.
//!
//! `e` is the absolute consolidated score, `r` the configured risk. Every
//! factor is clamped into its own range with `check_factor`.

use rust_decimal::Decimal;
use trading::Side;

/// Upper bound of `|e| + r`.
pub const MAX_SUM_RESULT: Decimal = Decimal::from_parts(2, 0, 0, false, 0);

const SELL_PRICE_BASE: Decimal = Decimal::from_parts(1005, 0, 0, false, 3);
const SELL_PRICE_MAX: Decimal = Decimal::from_parts(102, 0, 0, false, 2);
const BUY_PRICE_BASE: Decimal = Decimal::from_parts(995, 0, 0, false, 3);
const BUY_PRICE_MIN: Decimal = Decimal::from_parts(98, 0, 0, false, 2);
const PRICE_STEP: Decimal = Decimal::from_parts(75, 0, 0, false, 4);

const STOP_BASE: Decimal = Decimal::from_parts(99, 0, 0, false, 2);
const STOP_MIN: Decimal = Decimal::from_parts(95, 0, 0, false, 2);
const STOP_STEP: Decimal = Decimal::from_parts(4, 0, 0, false, 2);

const LIMIT_QTY_MIN: Decimal = Decimal::from_parts(1, 0, 0, false, 1);
const LIMIT_QTY_MAX: Decimal = Decimal::from_parts(9, 0, 0, false, 1);
const LIMIT_QTY_STEP: Decimal = Decimal::from_parts(4, 0, 0, false, 1);

const MARKET_QTY_MIN: Decimal = Decimal::from_parts(5, 0, 0, false, 1);
const MARKET_QTY_STEP: Decimal = Decimal::from_parts(25, 0, 0, false, 2);
const MARKET_BUY_DAMPING: Decimal = Decimal::from_parts(2, 0, 0, false, 1);

pub fn check_factor(min: Decimal, max: Decimal, value: Decimal) -> Decimal {
    value.max(min).min(max)
}

fn sum(eval_abs: Decimal, risk: Decimal) -> Decimal {
    (eval_abs + risk).min(MAX_SUM_RESULT)
}

/// Distance from the last price of a limit order: above it when selling,
/// below it when buying. Weak notes and low risk push the price further.
pub fn limit_price_factor(side: Side, eval_abs: Decimal, risk: Decimal) -> Decimal {
    let softness = (Decimal::ONE - eval_abs) + (Decimal::ONE - risk);
    match side {
        Side::Sell => check_factor(
            SELL_PRICE_BASE,
            SELL_PRICE_MAX,
            SELL_PRICE_BASE + softness * PRICE_STEP,
        ),
        Side::Buy => check_factor(
            BUY_PRICE_MIN,
            BUY_PRICE_BASE,
            BUY_PRICE_BASE - softness * PRICE_STEP,
        ),
    }
}

pub fn stop_loss_factor(risk: Decimal) -> Decimal {
    check_factor(STOP_MIN, STOP_BASE, STOP_BASE - risk * STOP_STEP)
}

/// Share of the available balance committed by a limit order.
pub fn limit_quantity_factor(eval_abs: Decimal, risk: Decimal) -> Decimal {
    check_factor(
        LIMIT_QTY_MIN,
        LIMIT_QTY_MAX,
        LIMIT_QTY_MIN + sum(eval_abs, risk) * LIMIT_QTY_STEP,
    )
}

/// Share of the available balance committed by a market order.
pub fn market_quantity_factor(side: Side, eval_abs: Decimal, risk: Decimal) -> Decimal {
    let mut factor = MARKET_QTY_MIN + sum(eval_abs, risk) * MARKET_QTY_STEP;
    if side == Side::Buy {
        factor *= MARKET_BUY_DAMPING;
    }
    check_factor(MARKET_QTY_MIN, Decimal::ONE, factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_limit_price_factor_bounds() {
        assert_eq!(limit_price_factor(Side::Sell, dec!(0.65), dec!(1)), dec!(1.007625));
        assert_eq!(limit_price_factor(Side::Buy, dec!(0.65), dec!(1)), dec!(0.992375));
        assert_eq!(limit_price_factor(Side::Sell, dec!(0), dec!(0)), dec!(1.02));
        assert_eq!(limit_price_factor(Side::Buy, dec!(0), dec!(0)), dec!(0.98));
        assert_eq!(limit_price_factor(Side::Sell, dec!(1), dec!(1)), dec!(1.005));
    }

    #[test]
    fn test_quantity_factors() {
        assert_eq!(limit_quantity_factor(dec!(0.65), dec!(1)), dec!(0.76));
        assert_eq!(limit_quantity_factor(dec!(1), dec!(1)), dec!(0.9));
        assert_eq!(market_quantity_factor(Side::Sell, dec!(1), dec!(1)), dec!(1));
        assert_eq!(market_quantity_factor(Side::Buy, dec!(1), dec!(1)), dec!(0.5));
        assert_eq!(stop_loss_factor(dec!(1)), dec!(0.95));
        assert_eq!(stop_loss_factor(dec!(0)), dec!(0.99));
    }
}
