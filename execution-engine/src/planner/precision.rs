//! Adapts planned quantities and prices to what a market accepts.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use trading::{MarketStatus, TradingError, TradingResult};

/// Truncates `value` toward zero to `digits` decimals.
pub fn trunc(value: Decimal, digits: u32) -> Decimal {
    value.round_dp_with_strategy(digits, RoundingStrategy::ToZero)
}

pub fn adapt_price(market: &MarketStatus, price: Decimal) -> Decimal {
    trunc(price, market.precision.price)
}

pub fn adapt_quantity(market: &MarketStatus, quantity: Decimal) -> Decimal {
    trunc(quantity, market.precision.amount)
}

/// Checks an adapted order against the market limits.
pub fn check_limits(market: &MarketStatus, quantity: Decimal, price: Decimal) -> TradingResult<()> {
    let limits = &market.limits;
    if quantity <= Decimal::ZERO || limits.amount.is_below_min(quantity) {
        return Err(TradingError::PrecisionViolation(format!(
            "{}: quantity {} below minimum {:?}",
            market.symbol, quantity, limits.amount.min
        )));
    }
    let cost = quantity * price;
    if limits.cost.is_below_min(cost) {
        return Err(TradingError::PrecisionViolation(format!(
            "{}: cost {} below minimum {:?}",
            market.symbol, cost, limits.cost.min
        )));
    }
    if !limits.price.contains(price) {
        return Err(TradingError::PrecisionViolation(format!(
            "{}: price {} outside [{:?}, {:?}]",
            market.symbol, price, limits.price.min, limits.price.max
        )));
    }
    Ok(())
}

/// Largest quantity a single order may carry at `price`, if limited.
pub fn limiting_quantity(market: &MarketStatus, price: Decimal) -> Option<Decimal> {
    let by_amount = market.limits.amount.max;
    let by_cost = market
        .limits
        .cost
        .max
        .filter(|_| price > Decimal::ZERO)
        .map(|max_cost| adapt_quantity(market, max_cost / price));
    match (by_amount, by_cost) {
        (Some(amount), Some(cost)) => Some(amount.min(cost)),
        (amount, cost) => amount.or(cost),
    }
}

/// Most orders a single planned quantity may be split into.
pub const MAX_SPLIT_PARTS: usize = 100;

/// Splits `quantity` into orders no larger than the market allows.
///
/// The first order carries the remainder, the others the limiting quantity;
/// the parts sum exactly to `quantity`. More than `MAX_SPLIT_PARTS` parts is
/// a `PrecisionViolation`.
pub fn split_quantity(
    market: &MarketStatus,
    quantity: Decimal,
    price: Decimal,
) -> TradingResult<Vec<Decimal>> {
    let Some(limiting) = limiting_quantity(market, price).filter(|l| *l > Decimal::ZERO) else {
        return Ok(vec![quantity]);
    };
    if quantity <= limiting {
        return Ok(vec![quantity]);
    }

    let count = (quantity / limiting).ceil();
    let parts = count
        .to_usize()
        .filter(|parts| *parts <= MAX_SPLIT_PARTS)
        .ok_or_else(|| {
            TradingError::PrecisionViolation(format!(
                "{}: {} would need {} orders of at most {}",
                market.symbol, quantity, count, limiting
            ))
        })?;
    let first = quantity - Decimal::from(parts - 1) * limiting;

    let mut split = Vec::with_capacity(parts);
    split.push(first);
    split.extend(std::iter::repeat(limiting).take(parts - 1));
    Ok(split)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use trading::Symbol;

    fn market() -> MarketStatus {
        MarketStatus::new(Symbol::new("BTC", "USDT")).with_precision(8, 8)
    }

    #[test]
    fn test_trunc_never_rounds_up() {
        assert_eq!(trunc(dec!(0.218925229), 8), dec!(0.21892522));
        assert_eq!(trunc(dec!(6890.069548759), 8), dec!(6890.06954875));
        assert_eq!(trunc(dec!(-1.999), 2), dec!(-1.99));
    }

    #[test]
    fn test_check_limits() {
        let market = market()
            .with_amount_limits(Some(dec!(0.001)), None)
            .with_cost_limits(Some(dec!(10)), None)
            .with_price_limits(Some(dec!(1)), Some(dec!(100000)));
        assert!(check_limits(&market, dec!(0.01), dec!(5000)).is_ok());
        assert!(check_limits(&market, dec!(0.0001), dec!(5000)).is_err());
        assert!(check_limits(&market, dec!(0.001), dec!(5000)).is_err());
        assert!(check_limits(&market, dec!(1), dec!(200000)).is_err());
    }

    #[test]
    fn test_split_by_max_cost() {
        let market = market().with_cost_limits(None, Some(dec!(1000000000000)));
        let price = dec!(6998.55408);
        assert_eq!(limiting_quantity(&market, price), Some(dec!(142886657.52512124)));

        let parts = split_quantity(&market, dec!(1480000000.74), price).unwrap();
        assert_eq!(parts.len(), 11);
        assert_eq!(parts[0], dec!(51133425.4887876));
        assert!(parts[1..].iter().all(|p| *p == dec!(142886657.52512124)));
        assert_eq!(parts.iter().copied().sum::<Decimal>(), dec!(1480000000.74));
    }

    #[test]
    fn test_split_prefers_the_binding_limit() {
        let market = market()
            .with_amount_limits(None, Some(dec!(3)))
            .with_cost_limits(None, Some(dec!(500)));
        // 500 / 100 = 5, max amount 3 binds.
        let parts = split_quantity(&market, dec!(7), dec!(100)).unwrap();
        assert_eq!(parts, vec![dec!(1), dec!(3), dec!(3)]);
    }

    #[test]
    fn test_no_split_without_max_limits() {
        assert_eq!(split_quantity(&market(), dec!(42), dec!(100)).unwrap(), vec![dec!(42)]);
    }

    #[test]
    fn test_split_refuses_too_many_parts() {
        let market = market().with_amount_limits(None, Some(dec!(0.00000001)));
        assert!(matches!(
            split_quantity(&market, dec!(1000), dec!(100)),
            Err(TradingError::PrecisionViolation(_))
        ));

        let market = self::market().with_amount_limits(None, Some(dec!(1)));
        assert_eq!(split_quantity(&market, dec!(100), dec!(100)).unwrap().len(), 100);
        assert!(split_quantity(&market, dec!(100.5), dec!(100)).is_err());
    }
}
