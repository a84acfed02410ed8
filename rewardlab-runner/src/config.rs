//! Plot configuration — which runs belong to which algorithm label.
//!
//! Stored as TOML:
//!
//! ```toml
//! env_id = "CartPole-v1"
//! horizon = 1e5
//! leading_edge = "hold_first"
//!
//! [algos]
//! PPO = ["runs/ppo_0", "runs/ppo_1"]
//! A2C = ["runs/a2c_0"]
//! ```
//!
//! Relative run paths resolve against the directory holding the config file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rewardlab_core::{AlignOptions, LeadingEdge};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Errors from reading or validating a plot configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Runs grouped by algorithm label, plus the shared horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotConfig {
    /// Environment name, carried into artifacts for the plot title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_id: Option<String>,

    /// Timestep every label is aggregated up to.
    #[serde(deserialize_with = "deserialize_timesteps")]
    pub horizon: u64,

    /// Monitor-derived curves start at their first episode length, so runs
    /// rarely share a first timestep; hold-first is the default here.
    #[serde(default = "default_leading_edge")]
    pub leading_edge: LeadingEdge,

    /// Label → run directories.
    pub algos: BTreeMap<String, Vec<PathBuf>>,
}

fn default_leading_edge() -> LeadingEdge {
    LeadingEdge::HoldFirst
}

impl PlotConfig {
    pub fn new(horizon: u64) -> Self {
        Self {
            env_id: None,
            horizon,
            leading_edge: default_leading_edge(),
            algos: BTreeMap::new(),
        }
    }

    /// Add runs under `label`, appending to any already there.
    pub fn with_runs<I, P>(mut self, label: impl Into<String>, runs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.algos
            .entry(label.into())
            .or_default()
            .extend(runs.into_iter().map(Into::into));
        self
    }

    /// Load, resolve relative paths, and validate.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Parse and validate; paths are left as written.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.horizon == 0 {
            return Err(ConfigError::Invalid("horizon must be positive".into()));
        }
        if self.algos.is_empty() {
            return Err(ConfigError::Invalid("no algorithms under [algos]".into()));
        }
        for (label, runs) in &self.algos {
            if label.trim().is_empty() {
                return Err(ConfigError::Invalid("empty algorithm label".into()));
            }
            if runs.is_empty() {
                return Err(ConfigError::Invalid(format!("algorithm '{label}' has no runs")));
            }
        }
        Ok(())
    }

    /// Render back to TOML, e.g. for a generated config file.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Invalid(format!("cannot render config: {e}")))
    }

    /// Make every relative run path relative to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for runs in self.algos.values_mut() {
            for run in runs.iter_mut() {
                if run.is_relative() {
                    *run = base.join(&*run);
                }
            }
        }
    }

    pub fn align_options(&self) -> AlignOptions {
        AlignOptions::default().with_leading_edge(self.leading_edge)
    }

    pub fn labels(&self) -> Vec<&str> {
        self.algos.keys().map(|s| s.as_str()).collect()
    }

    pub fn run_count(&self) -> usize {
        self.algos.values().map(Vec::len).sum()
    }
}

/// Parse a timestep count: an integer or integral scientific notation (`1e6`).
pub fn parse_timesteps(s: &str) -> Result<u64, String> {
    let s = s.trim().replace('_', "");
    if let Ok(n) = s.parse::<u64>() {
        return Ok(n);
    }
    let f: f64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a timestep count"))?;
    float_to_timesteps(f)
}

fn float_to_timesteps(f: f64) -> Result<u64, String> {
    if !f.is_finite() || f < 0.0 || f.fract() != 0.0 || f > u64::MAX as f64 {
        return Err(format!("{f} is not a whole, non-negative timestep count"));
    }
    Ok(f as u64)
}

fn deserialize_timesteps<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Float(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(n) => Ok(n),
        Raw::Float(f) => float_to_timesteps(f).map_err(serde::de::Error::custom),
        Raw::Text(s) => parse_timesteps(&s).map_err(serde::de::Error::custom),
    }
}
