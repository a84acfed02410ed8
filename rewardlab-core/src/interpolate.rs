//! Linear interpolation between two bracketing samples.

use crate::series::Sample;

/// Value at `t` on the line through `prev` and `next`.
///
/// Valid only for `prev.timestep < t <= next.timestep`; callers hold that
/// precondition, it is checked in debug builds only.
pub fn interpolate(t: u64, prev: Sample, next: Sample) -> f64 {
    debug_assert!(
        prev.timestep < t && t <= next.timestep,
        "interpolate({t}) outside ({}, {}]",
        prev.timestep,
        next.timestep
    );
    let slope = (prev.value - next.value) / (prev.timestep as f64 - next.timestep as f64);
    prev.value + slope * (t as f64 - prev.timestep as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(timestep: u64, value: f64) -> Sample {
        Sample { timestep, value }
    }

    #[test]
    fn midpoint() {
        assert!((interpolate(5, s(0, 0.0), s(10, 10.0)) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn upper_endpoint_returns_next_value() {
        assert!((interpolate(20, s(5, 5.0), s(20, 10.0)) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn descending_segment() {
        let v = interpolate(10, s(5, 5.0), s(20, -10.0));
        assert!((v - 0.0).abs() < 1e-12, "got {v}");
    }

    #[test]
    fn flat_segment() {
        assert_eq!(interpolate(7, s(3, 2.5), s(9, 2.5)), 2.5);
    }

    #[test]
    fn large_timesteps_keep_precision() {
        let v = interpolate(1_500_000, s(1_000_000, 100.0), s(2_000_000, 200.0));
        assert!((v - 150.0).abs() < 1e-9);
    }
}
