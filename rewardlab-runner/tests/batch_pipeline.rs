//! Config file → monitor runs → batch curves → artifacts.

use std::fs;
use std::path::Path;

use rewardlab_core::{aggregate_with, AlignError, LeadingEdge};
use rewardlab_runner::monitor::write_monitor_file;
use rewardlab_runner::{
    export_batch_csv, load_artifacts, load_series, save_artifacts, BatchAggregator, BatchError,
    Episode, MonitorHeader, PlotConfig, SyntheticRun,
};

fn write_runs(root: &Path, label: &str, seeds: &[u64], episodes: usize) {
    for &seed in seeds {
        SyntheticRun::new(label, seed)
            .with_episodes(episodes)
            .with_workers(2)
            .write(&root.join(format!("{label}_{seed}")))
            .unwrap();
    }
}

fn write_config(root: &Path, horizon: u64) -> std::path::PathBuf {
    let path = root.join("plot.toml");
    fs::write(
        &path,
        format!(
            "env_id = \"Synthetic-v0\"\nhorizon = {horizon}\n\n[algos]\n\
             PPO = [\"PPO_1\", \"PPO_2\", \"PPO_3\"]\n\
             A2C = [\"A2C_1\", \"A2C_2\"]\n"
        ),
    )
    .unwrap();
    path
}

#[test]
fn end_to_end_batch() {
    let tmp = tempfile::tempdir().unwrap();
    write_runs(tmp.path(), "PPO", &[1, 2, 3], 120);
    write_runs(tmp.path(), "A2C", &[1, 2], 120);

    // 120 episodes of at least 20 steps each.
    let horizon = 2_000;
    let config = PlotConfig::from_file(&write_config(tmp.path(), horizon)).unwrap();
    let result = BatchAggregator::new()
        .run(&config)
        .unwrap();

    assert_eq!(result.labels(), vec!["A2C", "PPO"]);
    assert_eq!(result.env_id.as_deref(), Some("Synthetic-v0"));
    assert_eq!(result.leading_edge, LeadingEdge::HoldFirst);

    for (label, lc) in &result.curves {
        let grid = lc.curve.timesteps();
        assert_eq!(*grid.last().unwrap(), horizon, "{label}");
        assert!(grid.windows(2).all(|w| w[0] < w[1]), "{label}");
        assert_eq!(lc.curve.runs, lc.runs.len());
    }
    assert_eq!(result.curves["PPO"].runs.len(), 3);

    // The batch curve matches aggregating the loaded series directly.
    let ppo: Vec<_> = config.algos["PPO"]
        .iter()
        .map(|p| load_series(p, None).unwrap())
        .collect();
    let direct = aggregate_with(&ppo, horizon, &config.align_options()).unwrap();
    assert_eq!(result.get("PPO"), Some(&direct));
}

#[test]
fn serial_and_parallel_batches_agree() {
    let tmp = tempfile::tempdir().unwrap();
    write_runs(tmp.path(), "PPO", &[1, 2, 3], 80);
    write_runs(tmp.path(), "A2C", &[1, 2], 80);
    let config = PlotConfig::from_file(&write_config(tmp.path(), 1_500)).unwrap();

    let serial = BatchAggregator::new()
        .with_parallelism(false)
        .run(&config)
        .unwrap();
    let parallel = BatchAggregator::new()
        .with_parallelism(true)
        .run(&config)
        .unwrap();
    assert_eq!(serial, parallel);
}

#[test]
fn short_run_fails_whole_batch() {
    let tmp = tempfile::tempdir().unwrap();
    write_runs(tmp.path(), "PPO", &[1, 2], 100);
    write_runs(tmp.path(), "PPO", &[3], 10);
    write_runs(tmp.path(), "A2C", &[1, 2], 100);

    // Episodes are at most 199 steps long: 10 of them end by 1990.
    let config = PlotConfig::from_file(&write_config(tmp.path(), 1_995)).unwrap();
    let err = BatchAggregator::new()
        .run(&config)
        .unwrap_err();

    match err {
        BatchError::Align { label, run, source } => {
            assert_eq!(label, "PPO");
            assert!(run.unwrap().ends_with("PPO_3"));
            assert!(matches!(source, AlignError::InsufficientHorizon { series: 2, .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

/// A single-file run whose episodes have the given lengths.
fn write_fixed_run(dir: &Path, lengths: &[u64]) {
    fs::create_dir_all(dir).unwrap();
    let episodes: Vec<Episode> = lengths
        .iter()
        .enumerate()
        .map(|(i, &length)| Episode {
            reward: i as f64,
            length,
            time: i as f64 + 1.0,
        })
        .collect();
    let header = MonitorHeader::new(1_700_000_000.0, Some("Fixed-v0".into()));
    write_monitor_file(&dir.join("0.monitor.csv"), &header, &episodes).unwrap();
}

#[test]
fn config_leading_edge_drives_the_batch() {
    let tmp = tempfile::tempdir().unwrap();
    let early = tmp.path().join("early");
    let late = tmp.path().join("late");
    write_fixed_run(&early, &[34, 300, 300, 400]);
    write_fixed_run(&late, &[40, 300, 300, 400]);

    let held = PlotConfig::new(1_000).with_runs("PPO", [early, late]);
    assert_eq!(held.leading_edge, LeadingEdge::HoldFirst);
    let result = BatchAggregator::default().run(&held).unwrap();
    assert_eq!(result.leading_edge, LeadingEdge::HoldFirst);

    let curve = result.get("PPO").unwrap();
    assert_eq!(curve.timesteps()[..2], [34, 40]);
    assert_eq!(*curve.timesteps().last().unwrap(), 1_000);
    // The late run holds its first reward (0.0) at timestep 34.
    assert_eq!(curve.points[0].mean, 0.0);

    let mut strict = held.clone();
    strict.leading_edge = LeadingEdge::Reject;
    let err = BatchAggregator::default().run(&strict).unwrap_err();
    match err {
        BatchError::Align { label, run, source } => {
            assert_eq!(label, "PPO");
            assert!(run.unwrap().ends_with("late"));
            assert!(matches!(
                source,
                AlignError::LateStart {
                    series: 1,
                    first_timestep: 40,
                    at: 34
                }
            ));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_run_dir_names_label_and_path() {
    let tmp = tempfile::tempdir().unwrap();
    write_runs(tmp.path(), "PPO", &[1, 2, 3], 50);
    let config = PlotConfig::from_file(&write_config(tmp.path(), 500)).unwrap();

    let err = BatchAggregator::default().run(&config).unwrap_err();
    match err {
        BatchError::Load { label, source, .. } => {
            assert_eq!(label, "A2C");
            assert!(source.is_missing_or_empty());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn artifacts_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    write_runs(tmp.path(), "PPO", &[1, 2, 3], 60);
    write_runs(tmp.path(), "A2C", &[1, 2], 60);
    let config = PlotConfig::from_file(&write_config(tmp.path(), 1_000)).unwrap();
    let result = BatchAggregator::new()
        .run(&config)
        .unwrap();

    let out = tmp.path().join("results");
    let dir = save_artifacts(&result, &out).unwrap();
    assert!(dir.join("manifest.json").is_file());

    let csv = fs::read_to_string(dir.join("curves.csv")).unwrap();
    assert_eq!(csv, export_batch_csv(&result).unwrap());

    let loaded = load_artifacts(&dir).unwrap();
    assert_eq!(loaded, result);
}

#[test]
fn dataset_hash_tracks_inputs() {
    let tmp = tempfile::tempdir().unwrap();
    write_runs(tmp.path(), "PPO", &[1, 2, 3], 60);
    write_runs(tmp.path(), "A2C", &[1, 2], 60);
    let config = PlotConfig::from_file(&write_config(tmp.path(), 1_000)).unwrap();
    let first = BatchAggregator::new().run(&config).unwrap();
    let again = BatchAggregator::new().run(&config).unwrap();
    assert_eq!(first.dataset_hash, again.dataset_hash);

    SyntheticRun::new("A2C", 99)
        .with_episodes(60)
        .with_workers(2)
        .write(&tmp.path().join("A2C_2"))
        .unwrap();
    let changed = BatchAggregator::new().run(&config).unwrap();
    assert_ne!(first.dataset_hash, changed.dataset_hash);
}
