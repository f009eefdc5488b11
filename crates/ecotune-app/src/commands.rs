use std::fmt::Write as _;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use ecotune_core::kind::Kind;
use ecotune_core::params::ParameterSpace;
use ecotune_core::telemetry::{HallOfFame, OutputSink};
use ecotune_core::SimConfig;
use ecotune_optimize::{
    EvaluatorSettings, FitnessEvaluator, OptimizationDriver, OptimizationOutcome, SeparableEs,
    default_seeds, format_duration,
};
use ecotune_sim::{EcosystemWorld, WorldFactory};
use tracing::{info, warn};

use crate::cli::{OptimizeArgs, RunArgs};

fn load_config(path: Option<&Path>) -> Result<SimConfig> {
    SimConfig::load(path).with_context(|| match path {
        Some(path) => format!("failed to load config from {}", path.display()),
        None => "default config failed validation".to_string(),
    })
}

pub fn optimize(args: &OptimizeArgs) -> Result<OptimizationOutcome> {
    let base = load_config(args.config.as_deref())?;
    let space = ParameterSpace::ecosystem();
    let evaluator = FitnessEvaluator::new(
        WorldFactory::new(),
        space,
        base,
        args.max_ticks,
        default_seeds(args.seeds),
        EvaluatorSettings::default(),
    )
    .context("failed to set up fitness evaluator")?;

    let mut driver = OptimizationDriver::new(evaluator, args.max_evals, &args.output);
    let mut minimizer = SeparableEs::new(driver.initial_point()?, args.sigma, args.search_seed);
    if args.population > 0 {
        minimizer = minimizer.with_population(args.population);
    }
    let outcome = driver
        .run(&mut minimizer)
        .context("optimization failed")?;

    println!(
        "Optimization complete after {} evaluations in {}",
        outcome.evaluations,
        format_duration(outcome.elapsed)
    );
    println!("Best fitness: {:.0}", outcome.best_fitness);
    println!("\nBest parameters:");
    for (spec, value) in driver.evaluator().space().specs().zip(&outcome.best_params) {
        println!("  {}: {value:.6}", spec.name);
    }
    if let Some(path) = &outcome.best_config_path {
        println!("\nBest config saved to: {}", path.display());
    }
    if let Some(path) = &outcome.hall_of_fame_path {
        println!("Hall of fame saved to: {}", path.display());
    }
    Ok(outcome)
}

/// Result of a single headless episode.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub seed: u64,
    pub ticks: u64,
    pub sim_seconds: f64,
    pub prey: usize,
    pub predators: usize,
    /// First kind to reach zero, if the run ended early.
    pub extinct: Option<Kind>,
    pub windows: usize,
    pub bookmarks: usize,
    pub hall_entries: usize,
}

/// Step one world until a kind dies out or `max_ticks`, streaming windows and bookmarks to disk.
pub fn run(args: &RunArgs) -> Result<RunSummary> {
    let config = load_config(args.config.as_deref())?;
    let seed = args.seed.unwrap_or_else(rand::random);
    let dt = config.physics.dt;

    let mut sink = OutputSink::create(&args.output)
        .with_context(|| format!("failed to create output directory {}", args.output.display()))?;
    sink.write_config(&config).context("failed to write config.json")?;

    let mut world = EcosystemWorld::new(seed, config).context("failed to build world")?;
    if let Some(path) = &args.hall_of_fame {
        let hall = HallOfFame::load(path, seed)
            .with_context(|| format!("failed to load hall of fame from {}", path.display()))?;
        info!(entries = hall.total_entries(), path = %path.display(), "preloaded hall of fame");
        world = world.with_hall_of_fame(hall);
    }

    info!(seed, max_ticks = args.max_ticks, output = %args.output.display(), "starting run");
    let start = Instant::now();
    let mut extinct = None;
    while world.tick() < args.max_ticks {
        let events = world.step();
        if let Some(window) = &events.window {
            if let Err(err) = sink.write_window(window) {
                warn!(%err, tick = events.tick, "failed to write telemetry row");
            }
            for bookmark in world.take_bookmarks() {
                if let Err(err) = sink.write_bookmark(&bookmark) {
                    warn!(%err, tick = events.tick, "failed to write bookmark");
                }
            }
        }
        if let Some(kind) = Kind::ALL.into_iter().find(|&kind| world.population(kind) == 0) {
            extinct = Some(kind);
            break;
        }
    }

    sink.write_hall_of_fame(world.hall_of_fame())
        .context("failed to write hall_of_fame.json")?;
    sink.flush().context("failed to flush telemetry")?;

    let summary = RunSummary {
        seed,
        ticks: world.tick(),
        sim_seconds: world.tick() as f64 * dt,
        prey: world.population(Kind::Prey),
        predators: world.population(Kind::Predator),
        extinct,
        windows: sink.windows_written(),
        bookmarks: sink.bookmarks_written(),
        hall_entries: world.hall_of_fame().total_entries(),
    };
    info!(
        ticks = summary.ticks,
        elapsed = %format_duration(start.elapsed()),
        "run finished"
    );

    match summary.extinct {
        Some(kind) => println!(
            "{} extinct after {:.0}s ({} ticks)",
            kind.name(),
            summary.sim_seconds,
            summary.ticks
        ),
        None => println!(
            "Survived {:.0}s ({} ticks)",
            summary.sim_seconds, summary.ticks
        ),
    }
    println!(
        "prey={} pred={} windows={} bookmarks={} hall_entries={}",
        summary.prey, summary.predators, summary.windows, summary.bookmarks, summary.hall_entries
    );
    Ok(summary)
}

/// Fixed-width listing of the search space and its locked fields.
#[must_use]
pub fn params_table(space: &ParameterSpace) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<22} {:<36} {:>10} {:>10} {:>10}",
        "NAME", "PATH", "MIN", "MAX", "DEFAULT"
    );
    for spec in space.specs() {
        let _ = writeln!(
            out,
            "{:<22} {:<36} {:>10.4} {:>10.4} {:>10.4}",
            spec.name, spec.config_path, spec.min, spec.max, spec.default
        );
    }
    if !space.locked().is_empty() {
        let _ = writeln!(out, "\nLocked:");
        for field in space.locked() {
            let _ = writeln!(out, "  {:<34} = {}", field.config_path, field.value);
        }
    }
    out
}

pub fn params() {
    print!("{}", params_table(&ParameterSpace::ecosystem()));
}
