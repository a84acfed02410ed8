//! Batch aggregation — one curve per algorithm label.
//!
//! Every label is independent: its runs are loaded, aggregated up to the
//! shared horizon, and summarized. Labels fan out over rayon when parallel
//! execution is on; serial and parallel runs produce identical results, and
//! the first failing label in label order fails the whole batch.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rewardlab_core::{
    aggregate_with, AggregateCurve, AlignError, AlignOptions, LeadingEdge, Series,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PlotConfig;
use crate::monitor::{load_run, LoadError};

/// Current schema version for persisted batch results.
pub const SCHEMA_VERSION: u32 = 1;

/// Errors from a batch run, tagged with the label that failed.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("nothing to aggregate: no labels given")]
    NoLabels,

    #[error("{label}: failed to load run {}: {source}", path.display())]
    Load {
        label: String,
        path: PathBuf,
        #[source]
        source: LoadError,
    },

    #[error("{label}: {source}{}", run_hint(.run))]
    Align {
        label: String,
        /// The run the failure points at, when there is one.
        run: Option<PathBuf>,
        #[source]
        source: AlignError,
    },
}

fn run_hint(run: &Option<PathBuf>) -> String {
    run.as_ref()
        .map(|p| format!(" (run {})", p.display()))
        .unwrap_or_default()
}

/// What was loaded for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_id: Option<String>,
    pub episodes: usize,
    pub first_timestep: u64,
    pub last_timestep: u64,
}

/// The aggregated curve for one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelCurve {
    pub label: String,
    pub runs: Vec<RunSummary>,
    pub curve: AggregateCurve,
}

/// All curves of one batch, keyed by label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_id: Option<String>,
    pub horizon: u64,
    pub leading_edge: LeadingEdge,
    /// BLAKE3 over every loaded series, in label order.
    pub dataset_hash: String,
    pub curves: BTreeMap<String, LabelCurve>,
}

impl BatchResult {
    pub fn labels(&self) -> Vec<&str> {
        self.curves.keys().map(|s| s.as_str()).collect()
    }

    pub fn get(&self, label: &str) -> Option<&AggregateCurve> {
        self.curves.get(label).map(|c| &c.curve)
    }
}

/// Aggregates every label of a [`PlotConfig`].
///
/// Alignment options come from the config being run, so one config always
/// aggregates the same way regardless of who drives it.
#[derive(Debug, Clone)]
pub struct BatchAggregator {
    parallel: bool,
}

impl BatchAggregator {
    pub fn new() -> Self {
        Self { parallel: true }
    }

    /// Enables or disables parallel execution across labels.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Load every run in `config` and aggregate each label.
    pub fn run(&self, config: &PlotConfig) -> Result<BatchResult, BatchError> {
        if config.algos.is_empty() {
            return Err(BatchError::NoLabels);
        }
        tracing::info!(
            labels = config.algos.len(),
            runs = config.run_count(),
            horizon = config.horizon,
            leading_edge = ?config.leading_edge,
            parallel = self.parallel,
            "starting batch"
        );
        let options = config.align_options();

        let labels: Vec<(&String, &Vec<PathBuf>)> = config.algos.iter().collect();
        let loaded: Vec<Result<LoadedLabel, BatchError>> = if self.parallel {
            labels
                .par_iter()
                .map(|(label, runs)| {
                    self.load_and_aggregate(label, runs, config.horizon, &options)
                })
                .collect()
        } else {
            labels
                .iter()
                .map(|(label, runs)| {
                    self.load_and_aggregate(label, runs, config.horizon, &options)
                })
                .collect()
        };
        let loaded = loaded.into_iter().collect::<Result<Vec<_>, _>>()?;

        let dataset_hash = compute_dataset_hash(
            loaded
                .iter()
                .map(|l| (l.curve.label.as_str(), l.series.as_slice())),
        );

        let env_id = config.env_id.clone().or_else(|| {
            loaded
                .iter()
                .flat_map(|l| l.curve.runs.iter())
                .find_map(|r| r.env_id.clone())
        });

        let curves = loaded
            .into_iter()
            .map(|l| (l.curve.label.clone(), l.curve))
            .collect();

        Ok(BatchResult {
            schema_version: SCHEMA_VERSION,
            env_id,
            horizon: config.horizon,
            leading_edge: options.leading_edge,
            dataset_hash,
            curves,
        })
    }

    /// Aggregate already-loaded series per label. No filesystem access.
    pub fn aggregate_groups(
        &self,
        groups: &BTreeMap<String, Vec<Series>>,
        horizon: u64,
        options: &AlignOptions,
    ) -> Result<BTreeMap<String, AggregateCurve>, BatchError> {
        if groups.is_empty() {
            return Err(BatchError::NoLabels);
        }
        let one = |(label, series): (&String, &Vec<Series>)| {
            aggregate_with(series, horizon, options)
                .map(|curve| (label.clone(), curve))
                .map_err(|source| BatchError::Align {
                    label: label.clone(),
                    run: None,
                    source,
                })
        };
        let results: Vec<Result<(String, AggregateCurve), BatchError>> = if self.parallel {
            groups.par_iter().map(one).collect()
        } else {
            groups.iter().map(one).collect()
        };
        results.into_iter().collect()
    }

    fn load_and_aggregate(
        &self,
        label: &str,
        runs: &[PathBuf],
        horizon: u64,
        options: &AlignOptions,
    ) -> Result<LoadedLabel, BatchError> {
        let mut series = Vec::with_capacity(runs.len());
        let mut summaries = Vec::with_capacity(runs.len());
        for path in runs {
            let log = load_run(path).map_err(|source| BatchError::Load {
                label: label.to_string(),
                path: path.clone(),
                source,
            })?;
            let s = log.series(None);
            summaries.push(summarize(path, log.env_id(), &s));
            series.push(s);
        }

        let curve = aggregate_with(&series, horizon, options).map_err(|source| {
            BatchError::Align {
                label: label.to_string(),
                run: source.series().and_then(|i| runs.get(i)).cloned(),
                source,
            }
        })?;

        tracing::info!(
            label,
            runs = series.len(),
            grid_points = curve.len(),
            final_mean = curve.final_mean().unwrap_or(f64::NAN),
            "aggregated label"
        );

        Ok(LoadedLabel {
            series,
            curve: LabelCurve {
                label: label.to_string(),
                runs: summaries,
                curve,
            },
        })
    }
}

impl Default for BatchAggregator {
    fn default() -> Self {
        Self::new()
    }
}

struct LoadedLabel {
    series: Vec<Series>,
    curve: LabelCurve,
}

fn summarize(path: &Path, env_id: Option<&str>, series: &Series) -> RunSummary {
    RunSummary {
        path: path.to_path_buf(),
        env_id: env_id.map(String::from),
        episodes: series.len(),
        first_timestep: series.first().map_or(0, |s| s.timestep),
        last_timestep: series.last().map_or(0, |s| s.timestep),
    }
}

/// Deterministic BLAKE3 hash over labelled series.
///
/// Covers every (timestep, value) pair in the order given, so two batches
/// over the same inputs hash identically.
pub fn compute_dataset_hash<'a, I>(groups: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a [Series])>,
{
    let mut hasher = blake3::Hasher::new();
    for (label, series) in groups {
        hasher.update(label.as_bytes());
        hasher.update(&(series.len() as u64).to_le_bytes());
        for s in series {
            hasher.update(&(s.len() as u64).to_le_bytes());
            for sample in s.samples() {
                hasher.update(&sample.timestep.to_le_bytes());
                hasher.update(&sample.value.to_le_bytes());
            }
        }
    }
    hasher.finalize().to_hex().to_string()
}
