//! Synthetic monitor runs for demos and tests.
//!
//! Produces a noisy saturating learning curve and writes it in the monitor
//! format, split across `workers` files the way vectorized environments
//! log. Output is deterministic for a given name and seed.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::monitor::{write_monitor_file, Episode, MonitorHeader};

/// Wall-clock origin written into synthetic headers.
const T_START: f64 = 1_700_000_000.0;

/// Shape of one synthetic run.
#[derive(Debug, Clone)]
pub struct SyntheticRun {
    /// Seeds the generator together with `seed`.
    pub name: String,
    pub seed: u64,
    pub episodes: usize,
    /// Number of monitor files the episodes are spread over.
    pub workers: usize,
    pub env_id: String,
    /// Reward the curve saturates towards.
    pub max_reward: f64,
}

impl SyntheticRun {
    pub fn new(name: impl Into<String>, seed: u64) -> Self {
        Self {
            name: name.into(),
            seed,
            episodes: 200,
            workers: 1,
            env_id: "Synthetic-v0".into(),
            max_reward: 200.0,
        }
    }

    pub fn with_episodes(mut self, episodes: usize) -> Self {
        self.episodes = episodes;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Episodes in completion order, `time` relative to `T_START`.
    pub fn generate(&self) -> Vec<Episode> {
        let seed_bytes = blake3::hash(format!("{}:{}", self.name, self.seed).as_bytes());
        let mut rng = StdRng::from_seed(*seed_bytes.as_bytes());

        let scale = (self.episodes.max(1) as f64) / 3.0;
        let mut wall = 1.0_f64;
        (0..self.episodes)
            .map(|i| {
                let progress = 1.0 - (-(i as f64) / scale).exp();
                let noise: f64 = rng.gen_range(-0.1..0.1) * self.max_reward;
                let length = rng.gen_range(20..200u64);
                wall += length as f64 * 1e-3 + rng.gen_range(0.0..0.01);
                Episode {
                    reward: ((self.max_reward * progress + noise) * 1e4).round() / 1e4,
                    length,
                    time: (wall * 1e6).round() / 1e6,
                }
            })
            .collect()
    }

    /// Write the run into `dir` as `{k}.monitor.csv` files.
    pub fn write(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create run dir: {}", dir.display()))?;

        let workers = self.workers.max(1);
        let mut per_worker: Vec<Vec<Episode>> = vec![Vec::new(); workers];
        for (i, episode) in self.generate().into_iter().enumerate() {
            per_worker[i % workers].push(episode);
        }

        let mut paths = Vec::with_capacity(workers);
        for (k, episodes) in per_worker.into_iter().enumerate() {
            // Each worker opens its file slightly later; times stay on one clock.
            let offset = k as f64 * 0.01;
            let header = MonitorHeader::new(T_START + offset, Some(self.env_id.clone()));
            let shifted: Vec<Episode> = episodes
                .into_iter()
                .map(|e| Episode {
                    time: ((e.time - offset) * 1e6).round() / 1e6,
                    ..e
                })
                .collect();
            let path = dir.join(format!("{k}.monitor.csv"));
            write_monitor_file(&path, &header, &shifted)
                .with_context(|| format!("failed to write {}", path.display()))?;
            paths.push(path);
        }

        tracing::debug!(
            dir = %dir.display(),
            episodes = self.episodes,
            workers,
            "wrote synthetic run"
        );
        Ok(paths)
    }
}
