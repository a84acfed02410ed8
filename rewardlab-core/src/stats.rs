//! Cross-series statistics at one grid point.
//!
//! The dispersion band is `sum |v - mean| / sqrt(n)`: an L1 deviation scaled by
//! `1/sqrt(n)`, not a standard deviation. Plots built on these curves expect
//! exactly this band width.

/// Arithmetic mean.
///
/// Public for callers summarizing their own columns. An empty slice has no
/// mean and yields NaN; [`aggregate`](crate::aggregate()) never passes one.
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Half-width of the band around `mean`. NaN for an empty slice.
pub fn l1_spread(values: &[f64], mean: f64) -> f64 {
    let abs_dev: f64 = values.iter().map(|v| (v - mean).abs()).sum();
    abs_dev / (values.len() as f64).sqrt()
}
