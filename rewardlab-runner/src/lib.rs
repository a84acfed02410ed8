//! RewardLab Runner — monitor loading, batch aggregation, export.
//!
//! This crate builds on `rewardlab-core` to provide:
//! - Monitor log loading (per-episode records into cumulative-timestep curves)
//! - TOML plot configuration grouping runs by algorithm label
//! - Batch aggregation across labels, serial or parallel
//! - CSV/JSON export and artifact bundles for plotting tools
//! - Synthetic monitor runs for demos and tests

pub mod batch;
pub mod config;
pub mod export;
pub mod monitor;
pub mod synthetic;

pub use batch::{
    compute_dataset_hash, BatchAggregator, BatchError, BatchResult, LabelCurve, RunSummary,
    SCHEMA_VERSION,
};
pub use config::{parse_timesteps, ConfigError, PlotConfig};
pub use export::{
    export_batch_csv, export_curve_csv, export_json, export_series_csv, import_json,
    load_artifacts, save_artifacts,
};
pub use monitor::{load_run, load_series, Episode, LoadError, MonitorHeader, RunLog};
pub use synthetic::SyntheticRun;
