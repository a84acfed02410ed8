//! Monitor log loading — per-episode records into a cumulative-timestep curve.
//!
//! A run directory holds one or more `*.monitor.csv` files (one per worker
//! environment). Each file starts with a `#`-prefixed JSON header carrying the
//! wall-clock start `t_start`, followed by a CSV table:
//! - `r` — episode return
//! - `l` — episode length in timesteps
//! - `t` — seconds since that file's `t_start`
//!
//! Files are merged onto one wall clock (shifted by their `t_start` offset),
//! episodes are ordered by completion time, and the curve is
//! `(running sum of l, r)`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rewardlab_core::{Sample, Series};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File name suffix of monitor logs.
pub const MONITOR_SUFFIX: &str = "monitor.csv";

/// Errors from the monitor loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("run directory does not exist: {}", .0.display())]
    MissingDir(PathBuf),

    #[error("no *.monitor.csv files in {}", .0.display())]
    NoMonitorFiles(PathBuf),

    #[error("malformed monitor header in {}: {reason}", path.display())]
    BadHeader { path: PathBuf, reason: String },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse episodes in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("no episodes recorded in {}", .0.display())]
    NoEpisodes(PathBuf),
}

impl LoadError {
    /// True when the run is absent or holds no data at all, as opposed to
    /// holding data that could not be read.
    pub fn is_missing_or_empty(&self) -> bool {
        matches!(
            self,
            Self::MissingDir(_) | Self::NoMonitorFiles(_) | Self::NoEpisodes(_)
        )
    }
}

/// The JSON line at the top of every monitor file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorHeader {
    /// Unix time (seconds) at which the file was opened.
    pub t_start: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_id: Option<String>,
    /// Any other keys the writer recorded.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl MonitorHeader {
    pub fn new(t_start: f64, env_id: Option<String>) -> Self {
        Self {
            t_start,
            env_id,
            extra: serde_json::Map::new(),
        }
    }

    /// `t_start` as a UTC timestamp, if representable.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        if !self.t_start.is_finite() {
            return None;
        }
        let secs = self.t_start.floor();
        let nanos = ((self.t_start - secs) * 1e9).round().min(999_999_999.0) as u32;
        DateTime::from_timestamp(secs as i64, nanos)
    }
}

/// One finished episode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    #[serde(rename = "r")]
    pub reward: f64,
    #[serde(rename = "l")]
    pub length: u64,
    #[serde(rename = "t")]
    pub time: f64,
}

/// One parsed monitor file.
#[derive(Debug, Clone)]
pub struct MonitorFile {
    pub path: PathBuf,
    pub header: MonitorHeader,
    pub episodes: Vec<Episode>,
}

/// All monitor files of one run, merged onto a single wall clock.
#[derive(Debug, Clone)]
pub struct RunLog {
    pub dir: PathBuf,
    pub headers: Vec<MonitorHeader>,
    /// Episodes in completion order; `time` is relative to the earliest `t_start`.
    pub episodes: Vec<Episode>,
}

impl RunLog {
    /// Environment id from the first header that names one.
    pub fn env_id(&self) -> Option<&str> {
        self.headers.iter().find_map(|h| h.env_id.as_deref())
    }

    /// Earliest `t_start` across files.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.headers
            .iter()
            .min_by(|a, b| a.t_start.total_cmp(&b.t_start))
            .and_then(MonitorHeader::started_at)
    }

    /// Total timesteps across all episodes.
    pub fn total_timesteps(&self) -> u64 {
        self.episodes.iter().map(|e| e.length).sum()
    }

    /// Cumulative-timestep curve, optionally cut at `horizon` (samples with
    /// cumulative timestep `<= horizon` are kept).
    pub fn series(&self, horizon: Option<u64>) -> Series {
        let mut t = 0u64;
        let mut series: Series = self
            .episodes
            .iter()
            .map(|e| {
                t += e.length;
                Sample::new(t, e.reward)
            })
            .collect();
        if let Some(h) = horizon {
            series.truncate_to(h);
        }
        series
    }
}

/// List the monitor files of a run directory, sorted by name.
pub fn monitor_files(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    if !dir.is_dir() {
        return Err(LoadError::MissingDir(dir.to_path_buf()));
    }
    let entries = fs::read_dir(dir).map_err(|source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| LoadError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let is_monitor = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(MONITOR_SUFFIX));
        if is_monitor && path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(LoadError::NoMonitorFiles(dir.to_path_buf()));
    }
    Ok(files)
}

/// Parse one monitor file.
pub fn read_monitor_file(path: &Path) -> Result<MonitorFile, LoadError> {
    let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_monitor(path, &content)
}

fn parse_monitor(path: &Path, content: &str) -> Result<MonitorFile, LoadError> {
    let bad_header = |reason: String| LoadError::BadHeader {
        path: path.to_path_buf(),
        reason,
    };

    let (first, body) = content.split_once('\n').unwrap_or((content, ""));
    let json = first
        .trim_end_matches('\r')
        .strip_prefix('#')
        .ok_or_else(|| bad_header("first line does not start with '#'".into()))?;
    let header: MonitorHeader =
        serde_json::from_str(json).map_err(|e| bad_header(e.to_string()))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());
    let episodes = reader
        .deserialize()
        .collect::<Result<Vec<Episode>, _>>()
        .map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(MonitorFile {
        path: path.to_path_buf(),
        header,
        episodes,
    })
}

/// Load and merge every monitor file in `dir`.
pub fn load_run(dir: &Path) -> Result<RunLog, LoadError> {
    let files = monitor_files(dir)?
        .iter()
        .map(|p| read_monitor_file(p))
        .collect::<Result<Vec<_>, _>>()?;

    let t0 = files
        .iter()
        .map(|f| f.header.t_start)
        .fold(f64::INFINITY, f64::min);

    let mut episodes = Vec::new();
    let mut headers = Vec::with_capacity(files.len());
    for file in files {
        let offset = file.header.t_start - t0;
        episodes.extend(file.episodes.into_iter().map(|e| Episode {
            time: e.time + offset,
            ..e
        }));
        headers.push(file.header);
    }
    // Stable: ties keep file order.
    episodes.sort_by(|a, b| a.time.total_cmp(&b.time));

    if episodes.is_empty() {
        return Err(LoadError::NoEpisodes(dir.to_path_buf()));
    }

    tracing::debug!(
        dir = %dir.display(),
        files = headers.len(),
        episodes = episodes.len(),
        "loaded run"
    );

    Ok(RunLog {
        dir: dir.to_path_buf(),
        headers,
        episodes,
    })
}

/// Load a run straight into its cumulative-timestep curve.
pub fn load_series(dir: &Path, horizon: Option<u64>) -> Result<Series, LoadError> {
    Ok(load_run(dir)?.series(horizon))
}

/// Write a monitor file in the format [`read_monitor_file`] accepts.
pub fn write_monitor_file(
    path: &Path,
    header: &MonitorHeader,
    episodes: &[Episode],
) -> Result<(), LoadError> {
    let io_err = |source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    };
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let json = serde_json::to_string(header).map_err(|e| LoadError::BadHeader {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mut file = fs::File::create(path).map_err(io_err)?;
    writeln!(file, "#{json}").map_err(io_err)?;

    let mut wtr = csv::Writer::from_writer(file);
    if episodes.is_empty() {
        wtr.write_record(["r", "l", "t"]).map_err(csv_err)?;
    }
    for episode in episodes {
        wtr.serialize(episode).map_err(csv_err)?;
    }
    wtr.flush().map_err(io_err)?;
    Ok(())
}
