use std::path::PathBuf;

use clap::Parser;

use genie_bench::config::{BenchConfig, ResolvedOutputs};
use genie_bench::logging::init_logging;
use genie_bench::runner::SimulationRunner;

/// Self-play benchmarking harness for the guessing engine.
#[derive(Debug, Parser)]
#[command(
    name = "genie-bench",
    author,
    version,
    about = "Deterministic self-play harness for the guessing engine"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "bench/bench.yaml")]
    config: PathBuf,

    /// Override the run identifier (substitutes {run_id} templates).
    #[arg(long, value_name = "RUN_ID")]
    run_id: Option<String>,

    /// Override the number of games to simulate.
    #[arg(long, value_name = "GAMES")]
    games: Option<usize>,

    /// Override the RNG seed for hidden-entity draws and answer noise.
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Override the simulated player's mistake rate.
    #[arg(long, value_name = "RATE")]
    mistake_rate: Option<f64>,

    /// Exit after validating the configuration (no games are run).
    #[arg(long)]
    validate_only: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = BenchConfig::from_path(&cli.config)?;

    if let Some(run_id) = cli.run_id {
        config.run_id = run_id;
    }

    if let Some(games) = cli.games {
        config.games.count = games;
    }

    if let Some(seed) = cli.seed {
        config.games.seed = Some(seed);
    }

    if let Some(rate) = cli.mistake_rate {
        config.answerer.mistake_rate = rate;
    }

    config.validate()?;

    let outputs: ResolvedOutputs = config.resolved_outputs();
    let run_id = config.run_id.clone();
    let games = config.games.count;

    println!("Loaded configuration '{run_id}' ({games} games against {})", config.snapshot);

    let logging_guard = init_logging(&config.logging, &outputs)?;
    let runner = SimulationRunner::new(config, outputs)?;

    if cli.validate_only {
        println!("Validation-only mode: simulation skipped.");
        return Ok(());
    }

    let summary = runner.run()?;
    let report = &summary.report;
    println!(
        "Simulation complete for '{run_id}': {}/{} identified ({:.1}%, 95% CI {:.1}%–{:.1}%), mean {:.1} turns",
        report.correct,
        report.games,
        report.success_rate * 100.0,
        report.ci_low * 100.0,
        report.ci_high * 100.0,
        report.mean_turns,
    );
    println!("Game rows: {}", summary.jsonl_path.display());
    println!("Summary table: {}", summary.summary_path.display());
    if let Some(guard) = logging_guard.as_ref() {
        println!("Telemetry log: {}", guard.telemetry_path.display());
    }

    Ok(())
}
