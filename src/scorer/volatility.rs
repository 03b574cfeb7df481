use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::config::MIN_VOLATILITY_SAMPLES;

/// Population stdev / mean of `prices`. None with fewer than two samples,
/// a non-positive mean, or a non-finite result.
pub fn coefficient_of_variation(prices: &[Decimal]) -> Option<f64> {
    if prices.len() < MIN_VOLATILITY_SAMPLES {
        return None;
    }
    let values: Vec<f64> = prices.iter().filter_map(|p| p.to_f64()).collect();
    if values.len() < MIN_VOLATILITY_SAMPLES {
        return None;
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return None;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let cv = variance.sqrt() / mean;
    cv.is_finite().then_some(cv)
}
