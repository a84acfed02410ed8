//! Monitor directory loading against real files on disk.

use std::fs;
use std::path::Path;

use rewardlab_runner::monitor::{load_run, load_series, monitor_files, write_monitor_file};
use rewardlab_runner::{Episode, LoadError, MonitorHeader};

fn ep(reward: f64, length: u64, time: f64) -> Episode {
    Episode {
        reward,
        length,
        time,
    }
}

fn write(dir: &Path, name: &str, t_start: f64, episodes: &[Episode]) {
    let header = MonitorHeader::new(t_start, Some("Hopper-v4".into()));
    write_monitor_file(&dir.join(name), &header, episodes).unwrap();
}

#[test]
fn missing_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let err = load_run(&tmp.path().join("nope")).unwrap_err();
    assert!(matches!(err, LoadError::MissingDir(_)));
    assert!(err.is_missing_or_empty());
}

#[test]
fn directory_without_monitor_files() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("progress.csv"), "a,b\n1,2\n").unwrap();
    let err = load_run(tmp.path()).unwrap_err();
    assert!(matches!(err, LoadError::NoMonitorFiles(_)));
}

#[test]
fn monitor_files_without_episodes() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "0.monitor.csv", 100.0, &[]);
    let err = load_run(tmp.path()).unwrap_err();
    assert!(matches!(err, LoadError::NoEpisodes(_)));
}

#[test]
fn only_monitor_files_are_listed() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "1.monitor.csv", 0.0, &[ep(1.0, 1, 0.1)]);
    write(tmp.path(), "0.monitor.csv", 0.0, &[ep(1.0, 1, 0.1)]);
    fs::write(tmp.path().join("notes.txt"), "x").unwrap();

    let files = monitor_files(tmp.path()).unwrap();
    let names: Vec<_> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["0.monitor.csv", "1.monitor.csv"]);
}

#[test]
fn files_merge_on_one_wall_clock() {
    let tmp = tempfile::tempdir().unwrap();
    // Worker 1 opened its file 2 seconds after worker 0.
    write(
        tmp.path(),
        "0.monitor.csv",
        1000.0,
        &[ep(1.0, 10, 1.0), ep(3.0, 30, 4.0)],
    );
    write(
        tmp.path(),
        "1.monitor.csv",
        1002.0,
        &[ep(2.0, 20, 0.5), ep(4.0, 40, 3.0)],
    );

    let run = load_run(tmp.path()).unwrap();
    let rewards: Vec<f64> = run.episodes.iter().map(|e| e.reward).collect();
    // Wall times: 1.0, 2.5, 4.0, 5.0
    assert_eq!(rewards, vec![1.0, 2.0, 3.0, 4.0]);
    assert_eq!(run.env_id(), Some("Hopper-v4"));
    assert_eq!(run.started_at().unwrap().timestamp(), 1000);

    let series = run.series(None);
    assert_eq!(series.timesteps(), vec![10, 30, 60, 100]);
}

#[test]
fn load_series_truncates_at_horizon() {
    let tmp = tempfile::tempdir().unwrap();
    write(
        tmp.path(),
        "0.monitor.csv",
        0.0,
        &[ep(1.0, 10, 0.1), ep(2.0, 10, 0.2), ep(3.0, 10, 0.3)],
    );
    let series = load_series(tmp.path(), Some(25)).unwrap();
    assert_eq!(series.timesteps(), vec![10, 20]);
}

#[test]
fn reads_files_written_by_other_tools() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(
        tmp.path().join("monitor.csv"),
        "#{\"t_start\": 1612345678.123, \"env_id\": \"LunarLander-v2\"}\n\
         r,l,t\n\
         -120.5,88,0.8\n\
         -80.25,102,1.7\n",
    )
    .unwrap();
    let run = load_run(tmp.path()).unwrap();
    assert_eq!(run.episodes.len(), 2);
    assert_eq!(run.series(None).values(), vec![-120.5, -80.25]);
}
