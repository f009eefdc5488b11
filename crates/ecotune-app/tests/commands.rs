use std::path::Path;

use ecotune_app::{OptimizeArgs, RunArgs, optimize, params_table, run};
use ecotune_core::config::SimConfig;
use ecotune_core::params::ParameterSpace;
use ecotune_core::telemetry::HallOfFame;

fn write_small_config(dir: &Path) -> std::path::PathBuf {
    let mut config = SimConfig::default();
    config.world.width = 400.0;
    config.world.height = 300.0;
    config.population.initial_prey = 60;
    config.population.initial_pred = 8;
    config.telemetry.stats_window_sec = 1.0;
    let path = dir.join("small.json");
    config.save(&path).expect("save config");
    path
}

#[test]
fn run_writes_all_single_run_outputs() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = write_small_config(dir.path());
    let output = dir.path().join("run");

    let summary = run(&RunArgs {
        config: Some(config),
        seed: Some(42),
        max_ticks: 240,
        output: output.clone(),
        hall_of_fame: None,
    })?;

    assert_eq!(summary.seed, 42);
    assert!(summary.ticks <= 240);
    if summary.extinct.is_none() {
        assert_eq!(summary.ticks, 240);
        assert_eq!(summary.windows, 4);
    }
    for file in ["telemetry.csv", "bookmarks.csv", "config.json", "hall_of_fame.json"] {
        assert!(output.join(file).exists(), "{file} missing");
    }
    let telemetry = std::fs::read_to_string(output.join("telemetry.csv"))?;
    assert_eq!(telemetry.lines().count(), summary.windows + 1);
    let saved = SimConfig::load(Some(&output.join("config.json")))?;
    assert_eq!(saved.world.width, 400.0);
    Ok(())
}

#[test]
fn run_preloads_hall_of_fame() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let hall_path = dir.path().join("hall.json");
    HallOfFame::new(5, 0).save(&hall_path)?;

    let summary = run(&RunArgs {
        config: Some(write_small_config(dir.path())),
        seed: Some(3),
        max_ticks: 60,
        output: dir.path().join("out"),
        hall_of_fame: Some(hall_path),
    })?;
    assert!(summary.ticks <= 60);
    Ok(())
}

#[test]
fn run_reports_missing_hall_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = run(&RunArgs {
        config: None,
        seed: Some(1),
        max_ticks: 10,
        output: dir.path().join("out"),
        hall_of_fame: Some(dir.path().join("absent.json")),
    })
    .expect_err("missing hall file");
    assert!(format!("{err:#}").contains("hall of fame"));
}

#[test]
fn optimize_runs_a_tiny_budget() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let output = dir.path().join("search");
    let outcome = optimize(&OptimizeArgs {
        config: Some(write_small_config(dir.path())),
        max_ticks: 400,
        seeds: 1,
        max_evals: 2,
        population: 2,
        output: output.clone(),
        sigma: 0.3,
        search_seed: 7,
    })?;

    assert_eq!(outcome.evaluations, 2);
    assert!(outcome.best_fitness.is_finite());
    assert_eq!(
        std::fs::read_to_string(output.join("optimize_log.csv"))?.lines().count(),
        3
    );
    let best = SimConfig::load(Some(&output.join("best_config.json")))?;
    assert_eq!(best.world.width, 400.0);
    assert!(output.join("hall_of_fame.json").exists());
    Ok(())
}

#[test]
fn params_table_lists_every_dimension() {
    let space = ParameterSpace::ecosystem();
    let table = params_table(&space);
    assert_eq!(table.lines().nth(0).map(|l| l.starts_with("NAME")), Some(true));
    for name in space.names() {
        assert!(table.contains(name), "{name} missing from table");
    }
    assert!(table.contains("Locked:"));
    assert!(table.contains("population.max_prey"));
}

#[test]
fn invalid_config_is_rejected_before_running() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("bad.json");
    std::fs::write(&path, r#"{ "physics": { "dt": 0.0 } }"#)?;
    let err = optimize(&OptimizeArgs {
        config: Some(path),
        max_ticks: 10,
        seeds: 1,
        max_evals: 1,
        population: 0,
        output: dir.path().join("never"),
        sigma: 0.3,
        search_seed: 1,
    })
    .expect_err("invalid config");
    assert!(format!("{err:#}").contains("dt"));
    assert!(!dir.path().join("never").exists());
    Ok(())
}
