//! RewardLab CLI — aggregate reward curves from training-run monitor logs.
//!
//! Commands:
//! - `aggregate` — fold runs per algorithm label into mean/band curves and save artifacts
//! - `curve` — print one run's cumulative-timestep reward curve as CSV
//! - `synth` — write synthetic monitor runs plus a matching plot config

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rewardlab_core::LeadingEdge;
use rewardlab_runner::{
    export_batch_csv, export_series_csv, load_run, parse_timesteps, save_artifacts,
    BatchAggregator, BatchResult, PlotConfig, SyntheticRun,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "rewardlab",
    about = "RewardLab CLI — mean and dispersion bands over repeated training runs"
)]
struct Cli {
    /// More log output (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate runs per algorithm label from a TOML config or --run flags.
    Aggregate {
        /// Path to a TOML plot config.
        #[arg(long)]
        config: Option<PathBuf>,

        /// A run as LABEL=DIR; repeat for more runs (alternative to --config).
        #[arg(long = "run", value_parser = parse_run)]
        runs: Vec<(String, PathBuf)>,

        /// Horizon in timesteps (e.g. 100000 or 1e5). Overrides the config.
        #[arg(long, value_parser = parse_timesteps)]
        horizon: Option<u64>,

        /// Environment id for artifact naming. Overrides the config.
        #[arg(long)]
        env_id: Option<String>,

        /// How to treat runs whose first episode ends after the grid start.
        #[arg(long, value_enum)]
        leading_edge: Option<EdgeArg>,

        /// Aggregate labels one after another instead of in parallel.
        #[arg(long, default_value_t = false)]
        serial: bool,

        /// Print curves CSV to stdout instead of writing artifacts.
        #[arg(long, default_value_t = false)]
        stdout: bool,

        /// Output directory for artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Print a single run's reward curve as CSV.
    Curve {
        /// Directory holding the run's *.monitor.csv files.
        run_dir: PathBuf,

        /// Drop episodes ending after this many timesteps.
        #[arg(long, value_parser = parse_timesteps)]
        horizon: Option<u64>,
    },
    /// Write synthetic monitor runs and a plot.toml that aggregates them.
    Synth {
        /// Directory to create runs in.
        #[arg(long)]
        output_dir: PathBuf,

        /// Algorithm labels to generate.
        #[arg(long, value_delimiter = ',', default_value = "PPO,A2C")]
        labels: Vec<String>,

        /// Runs per label.
        #[arg(long, default_value_t = 3)]
        runs: u64,

        /// Episodes per run.
        #[arg(long, default_value_t = 200)]
        episodes: usize,

        /// Monitor files per run.
        #[arg(long, default_value_t = 1)]
        workers: usize,

        /// Base seed.
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum EdgeArg {
    Reject,
    HoldFirst,
}

impl From<EdgeArg> for LeadingEdge {
    fn from(arg: EdgeArg) -> Self {
        match arg {
            EdgeArg::Reject => LeadingEdge::Reject,
            EdgeArg::HoldFirst => LeadingEdge::HoldFirst,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Aggregate {
            config,
            runs,
            horizon,
            env_id,
            leading_edge,
            serial,
            stdout,
            output_dir,
        } => {
            let plot = build_plot_config(config, runs, horizon, env_id, leading_edge)?;
            run_aggregate(&plot, serial, stdout, &output_dir)
        }
        Commands::Curve { run_dir, horizon } => run_curve(&run_dir, horizon),
        Commands::Synth {
            output_dir,
            labels,
            runs,
            episodes,
            workers,
            seed,
        } => run_synth(&output_dir, &labels, runs, episodes, workers, seed),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn parse_run(s: &str) -> Result<(String, PathBuf), String> {
    let (label, dir) = s
        .split_once('=')
        .ok_or_else(|| format!("expected LABEL=DIR, got '{s}'"))?;
    let label = label.trim();
    if label.is_empty() || dir.is_empty() {
        return Err(format!("expected LABEL=DIR, got '{s}'"));
    }
    Ok((label.to_string(), PathBuf::from(dir)))
}

fn build_plot_config(
    config_path: Option<PathBuf>,
    runs: Vec<(String, PathBuf)>,
    horizon: Option<u64>,
    env_id: Option<String>,
    leading_edge: Option<EdgeArg>,
) -> Result<PlotConfig> {
    if config_path.is_some() && !runs.is_empty() {
        bail!("--config and --run are mutually exclusive");
    }

    let mut plot = match config_path {
        Some(path) => PlotConfig::from_file(&path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => {
            if runs.is_empty() {
                bail!("one of --config or --run is required");
            }
            let Some(h) = horizon else {
                bail!("--horizon is required with --run");
            };
            runs.into_iter()
                .fold(PlotConfig::new(h), |plot, (label, dir)| {
                    plot.with_runs(label, [dir])
                })
        }
    };

    if let Some(h) = horizon {
        plot.horizon = h;
    }
    if env_id.is_some() {
        plot.env_id = env_id;
    }
    if let Some(edge) = leading_edge {
        plot.leading_edge = edge.into();
    }
    plot.validate()?;
    Ok(plot)
}

fn run_aggregate(plot: &PlotConfig, serial: bool, stdout: bool, output_dir: &Path) -> Result<()> {
    let result = BatchAggregator::new()
        .with_parallelism(!serial)
        .run(plot)?;

    if stdout {
        print!("{}", export_batch_csv(&result)?);
        return Ok(());
    }

    print_summary(&result);
    let run_dir = save_artifacts(&result, output_dir)?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn run_curve(run_dir: &Path, horizon: Option<u64>) -> Result<()> {
    let run = load_run(run_dir)?;
    let series = run.series(horizon);
    tracing::info!(
        episodes = run.episodes.len(),
        kept = series.len(),
        env_id = run.env_id().unwrap_or("-"),
        "loaded run"
    );
    print!("{}", export_series_csv(&series)?);
    Ok(())
}

fn run_synth(
    output_dir: &Path,
    labels: &[String],
    runs: u64,
    episodes: usize,
    workers: usize,
    seed: u64,
) -> Result<()> {
    if labels.is_empty() || runs == 0 || episodes == 0 {
        bail!("need at least one label, one run, and one episode");
    }

    let mut plot = PlotConfig::new(u64::MAX);
    plot.env_id = Some("Synthetic-v0".into());
    for label in labels {
        for i in 0..runs {
            let run = SyntheticRun::new(label.as_str(), seed + i)
                .with_episodes(episodes)
                .with_workers(workers);
            let dir_name = format!("{label}_{i}");
            run.write(&output_dir.join(&dir_name))?;

            let total: u64 = run.generate().iter().map(|e| e.length).sum();
            plot.horizon = plot.horizon.min(total);
            plot = plot.with_runs(label.as_str(), [dir_name]);
        }
    }

    let config_path = output_dir.join("plot.toml");
    let toml = plot.to_toml()?;
    std::fs::write(&config_path, toml)
        .with_context(|| format!("failed to write {}", config_path.display()))?;

    println!(
        "Wrote {} run(s) under {} (horizon {})",
        plot.run_count(),
        output_dir.display(),
        plot.horizon
    );
    println!("Aggregate with: rewardlab aggregate --config {}", config_path.display());
    Ok(())
}

fn print_summary(result: &BatchResult) {
    println!();
    println!("=== Aggregated Curves ===");
    println!("Env:            {}", result.env_id.as_deref().unwrap_or("-"));
    println!("Horizon:        {}", result.horizon);
    println!("Leading edge:   {:?}", result.leading_edge);
    println!("Dataset hash:   {}", &result.dataset_hash[..16.min(result.dataset_hash.len())]);
    println!();
    println!(
        "{:<16} {:>5} {:>8} {:>12} {:>12}",
        "Label", "Runs", "Points", "Final Mean", "Band ±"
    );
    println!("{}", "-".repeat(57));
    for (label, lc) in &result.curves {
        let (mean, spread) = lc
            .curve
            .last()
            .map_or((f64::NAN, f64::NAN), |p| (p.mean, p.spread()));
        println!(
            "{:<16} {:>5} {:>8} {:>12.3} {:>12.3}",
            label,
            lc.runs.len(),
            lc.curve.len(),
            mean,
            spread
        );
    }
    println!();
}
