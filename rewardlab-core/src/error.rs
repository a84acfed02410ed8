//! Errors raised while building series or aligning them.

use thiserror::Error;

/// Every way a single aggregation call can fail.
///
/// All variants are terminal for the call: no partial curve is ever returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AlignError {
    #[error("missing or empty input: {reason}")]
    MissingOrEmptyInput { reason: String },

    #[error("series {series} ends at timestep {last_timestep}, before horizon {horizon}")]
    InsufficientHorizon {
        series: usize,
        last_timestep: u64,
        horizon: u64,
    },

    #[error("alignment invariant violated in series {series}: {detail}")]
    InvariantViolation { series: usize, detail: String },

    #[error("series {series} starts at timestep {first_timestep}, after grid point {at} (no sample to interpolate from)")]
    LateStart {
        series: usize,
        first_timestep: u64,
        at: u64,
    },

    #[error("horizon {horizon} precedes the first grid point {start}")]
    HorizonBeforeStart { horizon: u64, start: u64 },

    #[error("timesteps and values differ in length ({timesteps} vs {values})")]
    LengthMismatch { timesteps: usize, values: usize },
}

impl AlignError {
    /// Index of the offending series, when the failure is tied to one.
    pub fn series(&self) -> Option<usize> {
        match self {
            Self::InsufficientHorizon { series, .. }
            | Self::InvariantViolation { series, .. }
            | Self::LateStart { series, .. } => Some(*series),
            Self::MissingOrEmptyInput { .. }
            | Self::HorizonBeforeStart { .. }
            | Self::LengthMismatch { .. } => None,
        }
    }

    pub(crate) fn empty(reason: impl Into<String>) -> Self {
        Self::MissingOrEmptyInput {
            reason: reason.into(),
        }
    }
}
