//! Reporting and export — JSON and CSV artifacts for plotting tools.
//!
//! - **JSON**: full batch round-trip with schema versioning
//! - **CSV**: long-format curves (`label,timestep,mean,lower,upper`) and
//!   single-run curves (`timestep,value`)
//!
//! Persisted JSON carries a `schema_version`; newer versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use rewardlab_core::{AggregateCurve, Series};

use crate::batch::{BatchResult, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BatchResult` to pretty JSON.
pub fn export_json(result: &BatchResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BatchResult to JSON")
}

/// Deserialize a `BatchResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BatchResult> {
    let result: BatchResult =
        serde_json::from_str(json).context("failed to deserialize BatchResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

const CURVE_HEADER: [&str; 5] = ["label", "timestep", "mean", "lower", "upper"];

fn write_curve_rows<W: std::io::Write>(
    wtr: &mut csv::Writer<W>,
    label: &str,
    curve: &AggregateCurve,
) -> Result<()> {
    for p in &curve.points {
        wtr.write_record([
            label,
            &p.timestep.to_string(),
            &format!("{:.6}", p.mean),
            &format!("{:.6}", p.lower),
            &format!("{:.6}", p.upper),
        ])?;
    }
    Ok(())
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export one label's curve.
pub fn export_curve_csv(label: &str, curve: &AggregateCurve) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(CURVE_HEADER)?;
    write_curve_rows(&mut wtr, label, curve)?;
    finish(wtr)
}

/// Export every label of a batch, in label order.
pub fn export_batch_csv(result: &BatchResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(CURVE_HEADER)?;
    for (label, lc) in &result.curves {
        write_curve_rows(&mut wtr, label, &lc.curve)?;
    }
    finish(wtr)
}

/// Export a single run's curve with `timestep` and `value` columns.
pub fn export_series_csv(series: &Series) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestep", "value"])?;
    for s in series.samples() {
        wtr.write_record([&s.timestep.to_string(), &format!("{:.6}", s.value)])?;
    }
    finish(wtr)
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the artifact set for a batch.
///
/// Creates a directory named `{env_id}_{timestamp}/` under `output_dir`
/// containing:
/// - `manifest.json` — the full `BatchResult`
/// - `curves.csv` — every label's curve, long format
///
/// Returns the path to the created directory.
pub fn save_artifacts(result: &BatchResult, output_dir: &Path) -> Result<PathBuf> {
    let stem = result
        .env_id
        .as_deref()
        .map(sanitize)
        .unwrap_or_else(|| "curves".to_string());
    let dirname = format!("{}_{}", stem, chrono::Local::now().format("%Y%m%d_%H%M%S"));
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let json = export_json(result)?;
    std::fs::write(run_dir.join("manifest.json"), &json)
        .with_context(|| format!("failed to write manifest in {}", run_dir.display()))?;

    let csv = export_batch_csv(result)?;
    std::fs::write(run_dir.join("curves.csv"), &csv)
        .with_context(|| format!("failed to write curves in {}", run_dir.display()))?;

    tracing::info!(dir = %run_dir.display(), labels = result.curves.len(), "saved artifacts");
    Ok(run_dir)
}

/// Load a `BatchResult` from an artifact directory's manifest.json.
pub fn load_artifacts(run_dir: &Path) -> Result<BatchResult> {
    let path = run_dir.join("manifest.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

/// Make an env id usable as a directory name.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
