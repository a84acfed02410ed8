//! Series alignment and mean/spread aggregation.
//!
//! Walks one cursor per series along a shared grid. The grid starts at the
//! smallest first timestep across all series and steps to the smallest
//! not-yet-consumed timestep among them, clamped to the horizon, until it
//! lands exactly on the horizon. At every grid point each series contributes
//! either its stored value (exact hit) or a value interpolated between the
//! samples bracketing the point.

use serde::{Deserialize, Serialize};

use crate::error::AlignError;
use crate::interpolate::interpolate;
use crate::series::{Sample, Series};
use crate::stats;

/// Cross-series statistics at one grid point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatePoint {
    pub timestep: u64,
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
}

impl AggregatePoint {
    /// Band half-width (`upper - mean`).
    pub fn spread(&self) -> f64 {
        self.upper - self.mean
    }
}

/// The synchronized curve produced by one aggregation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateCurve {
    /// Number of series folded into every point.
    pub runs: usize,
    pub points: Vec<AggregatePoint>,
}

impl AggregateCurve {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&AggregatePoint> {
        self.points.last()
    }

    /// Mean at the horizon.
    pub fn final_mean(&self) -> Option<f64> {
        self.last().map(|p| p.mean)
    }

    pub fn timesteps(&self) -> Vec<u64> {
        self.points.iter().map(|p| p.timestep).collect()
    }

    pub fn means(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.mean).collect()
    }

    pub fn lowers(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.lower).collect()
    }

    pub fn uppers(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.upper).collect()
    }
}

/// What to do with a series whose first sample lies after a grid point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadingEdge {
    /// Fail with [`AlignError::LateStart`].
    #[default]
    Reject,
    /// Use the first sample's value until the grid reaches it.
    HoldFirst,
}

/// Knobs for [`aggregate_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignOptions {
    #[serde(default)]
    pub leading_edge: LeadingEdge,
}

impl AlignOptions {
    pub fn with_leading_edge(mut self, leading_edge: LeadingEdge) -> Self {
        self.leading_edge = leading_edge;
        self
    }
}

/// Aggregate `series` up to `horizon` with default options.
pub fn aggregate(series: &[Series], horizon: u64) -> Result<AggregateCurve, AlignError> {
    aggregate_with(series, horizon, &AlignOptions::default())
}

/// Aggregate `series` up to `horizon`.
///
/// Either returns the full curve, ending exactly at `horizon`, or fails;
/// there is no truncated result.
pub fn aggregate_with(
    series: &[Series],
    horizon: u64,
    opts: &AlignOptions,
) -> Result<AggregateCurve, AlignError> {
    let start = validate(series, horizon)?;

    let mut cursors = series
        .iter()
        .enumerate()
        .map(|(id, s)| Cursor::new(id, s.samples()))
        .collect::<Vec<_>>();
    for cursor in &mut cursors {
        cursor.seek(start)?;
    }

    let mut points = Vec::new();
    let mut values = Vec::with_capacity(cursors.len());
    let mut current = start;

    loop {
        values.clear();
        for cursor in &cursors {
            values.push(cursor.value_at(current, opts.leading_edge)?);
        }
        // Sorted so the float sums do not depend on run order.
        values.sort_by(f64::total_cmp);
        let mean = stats::mean(&values);
        let spread = stats::l1_spread(&values, mean);
        points.push(AggregatePoint {
            timestep: current,
            mean,
            lower: mean - spread,
            upper: mean + spread,
        });

        if current == horizon {
            break;
        }

        let mut next = horizon;
        let mut next_owner = 0;
        for cursor in &mut cursors {
            cursor.consume(current, horizon)?;
            let t = cursor.sample().timestep;
            if t < next {
                next = t;
                next_owner = cursor.id;
            }
        }
        if next <= current {
            return Err(AlignError::InvariantViolation {
                series: next_owner,
                detail: format!(
                    "next grid point {next} does not advance past {current} (timesteps not strictly increasing)"
                ),
            });
        }
        current = next;
    }

    tracing::trace!(
        runs = series.len(),
        horizon,
        grid_points = points.len(),
        "aggregated series"
    );

    Ok(AggregateCurve {
        runs: series.len(),
        points,
    })
}

/// Checks every precondition that can be seen before walking; returns the
/// first grid point.
fn validate(series: &[Series], horizon: u64) -> Result<u64, AlignError> {
    if series.is_empty() {
        return Err(AlignError::empty("no series to aggregate"));
    }

    let mut start = u64::MAX;
    for (id, s) in series.iter().enumerate() {
        let (Some(first), Some(last)) = (s.first(), s.last()) else {
            return Err(AlignError::empty(format!("series {id} has no samples")));
        };
        if last.timestep < horizon {
            return Err(AlignError::InsufficientHorizon {
                series: id,
                last_timestep: last.timestep,
                horizon,
            });
        }
        start = start.min(first.timestep);
    }

    if horizon < start {
        return Err(AlignError::HorizonBeforeStart { horizon, start });
    }
    Ok(start)
}

/// Call-scoped read position in one series.
///
/// Invariant between steps: `sample().timestep >= current`. The cursor moves
/// only once the sample it points at has been used as an exact hit.
struct Cursor<'a> {
    id: usize,
    samples: &'a [Sample],
    index: usize,
}

impl<'a> Cursor<'a> {
    fn new(id: usize, samples: &'a [Sample]) -> Self {
        Self {
            id,
            samples,
            index: 0,
        }
    }

    fn sample(&self) -> Sample {
        self.samples[self.index]
    }

    /// Skip samples strictly before `t`.
    fn seek(&mut self, t: u64) -> Result<(), AlignError> {
        while self.sample().timestep < t {
            self.step(t)?;
        }
        Ok(())
    }

    fn value_at(&self, t: u64, leading_edge: LeadingEdge) -> Result<f64, AlignError> {
        let next = self.sample();
        if t == next.timestep {
            return Ok(next.value);
        }
        if t > next.timestep {
            return Err(AlignError::InvariantViolation {
                series: self.id,
                detail: format!(
                    "grid point {t} is past the cursor sample at timestep {}",
                    next.timestep
                ),
            });
        }
        if self.index == 0 {
            return match leading_edge {
                LeadingEdge::Reject => Err(AlignError::LateStart {
                    series: self.id,
                    first_timestep: next.timestep,
                    at: t,
                }),
                LeadingEdge::HoldFirst => Ok(next.value),
            };
        }
        Ok(interpolate(t, self.samples[self.index - 1], next))
    }

    /// Move past the current sample if it was consumed at grid point `t`.
    fn consume(&mut self, t: u64, horizon: u64) -> Result<(), AlignError> {
        let at = self.sample().timestep;
        if at == t {
            self.step(horizon)
        } else if at < t {
            Err(AlignError::InvariantViolation {
                series: self.id,
                detail: format!("cursor sample at timestep {at} left behind grid point {t}"),
            })
        } else {
            Ok(())
        }
    }

    fn step(&mut self, horizon: u64) -> Result<(), AlignError> {
        if self.index + 1 >= self.samples.len() {
            return Err(AlignError::InsufficientHorizon {
                series: self.id,
                last_timestep: self.sample().timestep,
                horizon,
            });
        }
        self.index += 1;
        Ok(())
    }
}
