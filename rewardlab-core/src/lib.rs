//! RewardLab Core — alignment and aggregation of reward curves.
//!
//! Folds several unevenly sampled runs of the same algorithm into one curve:
//! - Series and samples (one run's cumulative timestep vs. reward curve)
//! - Linear interpolation between bracketing samples
//! - Cursor-driven walk over a shared alignment grid, ending at the horizon
//! - Per-point mean and L1 dispersion band
//!
//! Everything here is synchronous and call-scoped: no state survives an
//! aggregation call.

pub mod aggregate;
pub mod error;
pub mod interpolate;
pub mod series;
pub mod stats;

pub use aggregate::{
    aggregate, aggregate_with, AggregateCurve, AggregatePoint, AlignOptions, LeadingEdge,
};
pub use error::AlignError;
pub use interpolate::interpolate;
pub use series::{Sample, Series};
