use crate::error::{ProviderError, ProviderResult};

/// Parse an upstream numeric string, dropping `,` thousands separators.
pub fn parse_number(field: &str, raw: &str) -> ProviderResult<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ProviderError::InvalidNumber {
            field: field.to_string(),
            value: raw.to_string(),
        }),
    }
}

pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

pub fn average_bid_offer(bid: &str, offer: &str) -> ProviderResult<f64> {
    let bid = parse_number("bid", bid)?;
    let offer = parse_number("offer", offer)?;
    Ok((bid + offer) / 2.0)
}

/// Metal APIs quote metal units per one unit of base currency.
/// Returns the base-currency price of one troy ounce.
pub fn invert_rate(symbol: &str, rate: Option<f64>) -> ProviderResult<f64> {
    match rate {
        Some(r) if r.is_finite() && r > 0.0 => Ok(1.0 / r),
        other => Err(ProviderError::InvalidNumber {
            field: symbol.to_string(),
            value: other.map(|r| r.to_string()).unwrap_or_default(),
        }),
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// First element carrying a value, in the order the provider returned them.
pub fn first_with_value<T, V>(items: &[T], value: impl Fn(&T) -> Option<V>) -> Option<(&T, V)> {
    items.iter().find_map(|item| value(item).map(|v| (item, v)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thai_formatted_numbers_parse() {
        assert_eq!(parse_number("buy", "29,800.00").unwrap(), 29800.0);
        assert_eq!(parse_number("buy", " 1,234,567.5 ").unwrap(), 1234567.5);
        assert_eq!(parse_number("rate", "2.50").unwrap(), 2.5);
    }

    #[test]
    fn garbage_numbers_are_rejected() {
        let err = parse_number("mor", "n/a").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidNumber { ref field, .. } if field == "mor"));
        assert!(parse_number("mor", "").is_err());
        assert!(parse_number("mor", "NaN").is_err());
        assert!(parse_number("mor", "inf").is_err());
    }

    #[test]
    fn bid_offer_average_rounds_to_quote_precision() {
        let avg = average_bid_offer("33.85", "33.95").unwrap();
        assert_eq!(round_to(avg, 4), 33.90);
    }

    #[test]
    fn gold_rate_inverts_to_price_per_ounce() {
        let usd = invert_rate("XAU", Some(0.00053853)).unwrap();
        assert_eq!(round_to(usd, 2), 1856.91);
        let thb = round_to(usd * 33.25, 2);
        assert!((thb - 61742.15).abs() < 0.011, "got {}", thb);
    }

    #[test]
    fn missing_or_zero_metal_rate_fails() {
        assert!(invert_rate("XPT", None).is_err());
        assert!(invert_rate("XPT", Some(0.0)).is_err());
    }

    #[test]
    fn mean_uses_actual_count() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[1.0, 2.0, 3.0]), Some(2.0));
    }

    #[test]
    fn first_with_value_skips_nulls_in_order() {
        let points = vec![(2024, None), (2023, Some(5.0)), (2022, Some(4.0))];
        let (point, value) = first_with_value(&points, |p| p.1).unwrap();
        assert_eq!(point.0, 2023);
        assert_eq!(value, 5.0);

        let empty: Vec<(i32, Option<f64>)> = vec![(2024, None)];
        assert!(first_with_value(&empty, |p| p.1).is_none());
    }
}
