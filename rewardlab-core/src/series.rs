//! Series — one run's (timestep, value) curve.

use serde::{Deserialize, Serialize};

use crate::error::AlignError;
use crate::interpolate::interpolate;

/// One observation: cumulative training timesteps and the reward seen there.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestep: u64,
    pub value: f64,
}

impl Sample {
    pub fn new(timestep: u64, value: f64) -> Self {
        Self { timestep, value }
    }
}

impl From<(u64, f64)> for Sample {
    fn from((timestep, value): (u64, f64)) -> Self {
        Self { timestep, value }
    }
}

/// An ordered run curve.
///
/// Timesteps are expected to be strictly increasing. That is the caller's
/// guarantee, not checked on construction; the aligner reports a violation
/// as [`AlignError::InvariantViolation`] when it runs into one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    samples: Vec<Sample>,
}

impl Series {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    /// Build from parallel timestep/value columns.
    pub fn from_xy(timesteps: &[u64], values: &[f64]) -> Result<Self, AlignError> {
        if timesteps.len() != values.len() {
            return Err(AlignError::LengthMismatch {
                timesteps: timesteps.len(),
                values: values.len(),
            });
        }
        Ok(Self {
            samples: timesteps
                .iter()
                .zip(values)
                .map(|(&timestep, &value)| Sample { timestep, value })
                .collect(),
        })
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first(&self) -> Option<Sample> {
        self.samples.first().copied()
    }

    pub fn last(&self) -> Option<Sample> {
        self.samples.last().copied()
    }

    pub fn timesteps(&self) -> Vec<u64> {
        self.samples.iter().map(|s| s.timestep).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.value).collect()
    }

    /// True if every timestep is strictly greater than the one before it.
    pub fn is_strictly_increasing(&self) -> bool {
        self.samples
            .windows(2)
            .all(|w| w[0].timestep < w[1].timestep)
    }

    /// Drop every sample past `horizon`.
    pub fn truncate_to(&mut self, horizon: u64) {
        let keep = self.samples.partition_point(|s| s.timestep <= horizon);
        self.samples.truncate(keep);
    }

    /// Value at `t`: the stored value on an exact hit, otherwise interpolated
    /// between the bracketing samples. `None` outside the covered range.
    ///
    /// Requires a strictly increasing series.
    pub fn value_at(&self, t: u64) -> Option<f64> {
        let idx = self.samples.partition_point(|s| s.timestep < t);
        let at = self.samples.get(idx)?;
        if at.timestep == t {
            return Some(at.value);
        }
        if idx == 0 {
            return None;
        }
        Some(interpolate(t, self.samples[idx - 1], *at))
    }
}

impl FromIterator<Sample> for Series {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        Self {
            samples: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<(u64, f64)>> for Series {
    fn from(pairs: Vec<(u64, f64)>) -> Self {
        pairs.into_iter().map(Sample::from).collect()
    }
}
