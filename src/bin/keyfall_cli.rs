use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keyfall_trainer::config::{AppConfig, CanvasConfig};
use keyfall_trainer::fixtures::{
    ExpectationDiff, FixtureCatalog, PerformerProfile, ScenarioRunner, SessionReport,
};
use keyfall_trainer::geometry::lanes::lane_columns;

#[derive(Parser, Debug)]
#[command(
    name = "keyfall_cli",
    about = "Deterministic virtual-time scenario harness for the Keyfall trainer"
)]
struct Cli {
    /// Override directory containing fixture assets (defaults to ./fixtures)
    #[arg(long)]
    fixtures_dir: Option<PathBuf>,
    /// JSON configuration file (defaults are used when absent or invalid)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Log session transitions to stderr
    #[arg(long, short)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a scenario and optionally compare against expectations
    Simulate {
        #[arg(long)]
        fixture: String,
        #[arg(long)]
        expect: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
        /// Include the full event log in the report
        #[arg(long)]
        events: bool,
        /// Replace the scenario's performer with a seeded one
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print a scenario's session events to stdout, one JSON object per line
    Stream {
        #[arg(long)]
        fixture: String,
    },
    /// Print the keyboard lane columns for a canvas
    Lanes {
        #[arg(long)]
        width: Option<f64>,
        #[arg(long)]
        margin: Option<f64>,
    },
    /// List available fixtures on disk
    DumpFixtures,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    if cli.verbose {
        keyfall_trainer::init_logging();
    }
    let config = cli
        .config
        .map(AppConfig::load_from_file)
        .unwrap_or_default();
    let catalog = cli
        .fixtures_dir
        .map(FixtureCatalog::new)
        .unwrap_or_default();

    match cli.command {
        Commands::Simulate {
            fixture,
            expect,
            output,
            events,
            seed,
        } => run_simulate(&catalog, config, &fixture, expect, output, events, seed),
        Commands::Stream { fixture } => run_stream(&catalog, config, &fixture),
        Commands::Lanes { width, margin } => run_lanes(config.canvas, width, margin),
        Commands::DumpFixtures => run_dump(&catalog),
    }
}

fn run_simulate(
    catalog: &FixtureCatalog,
    config: AppConfig,
    fixture: &str,
    override_expect: Option<PathBuf>,
    output_path: Option<PathBuf>,
    include_events: bool,
    seed: Option<u64>,
) -> Result<ExitCode> {
    let mut data = catalog.load(fixture, override_expect)?;
    if let Some(seed) = seed {
        let profile = data.scenario.performer.take().unwrap_or_default();
        data.scenario.performer = Some(PerformerProfile { seed, ..profile });
    }

    let report = ScenarioRunner::new(config)
        .run(&data.scenario)
        .with_context(|| format!("running scenario {fixture}"))?;

    let verdict = data
        .expectations
        .as_ref()
        .map(|expectations| expectations.verify(&report));

    let report = if include_events {
        report
    } else {
        report.without_events()
    };
    emit_report(&report, output_path)?;

    match verdict {
        Some(Err(diff)) => {
            emit_diff(&diff)?;
            Ok(ExitCode::from(2))
        }
        Some(Ok(())) | None => Ok(ExitCode::from(0)),
    }
}

fn run_stream(catalog: &FixtureCatalog, config: AppConfig, fixture: &str) -> Result<ExitCode> {
    let data = catalog.load(fixture, None)?;
    let report = ScenarioRunner::new(config)
        .run(&data.scenario)
        .with_context(|| format!("running scenario {fixture}"))?;

    for record in report.events {
        println!("{}", serde_json::to_string(&record)?);
    }

    Ok(ExitCode::from(0))
}

fn run_lanes(
    mut canvas: CanvasConfig,
    width: Option<f64>,
    margin: Option<f64>,
) -> Result<ExitCode> {
    if let Some(width) = width {
        canvas.width = width;
    }
    if let Some(margin) = margin {
        canvas.margin = margin;
    }
    let columns = lane_columns(&canvas);
    println!("{}", serde_json::to_string_pretty(&columns)?);
    Ok(ExitCode::from(0))
}

fn run_dump(catalog: &FixtureCatalog) -> Result<ExitCode> {
    let fixtures = catalog.discover()?;
    if fixtures.is_empty() {
        println!("No fixtures found under {}", catalog.root().display());
        return Ok(ExitCode::from(0));
    }

    for metadata in fixtures {
        if let Some(expect) = metadata.expect_path {
            println!("{} -> {}", metadata.name, expect.display());
        } else {
            println!("{}", metadata.name);
        }
    }
    Ok(ExitCode::from(0))
}

fn emit_report(report: &SessionReport, output_path: Option<PathBuf>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;

    if let Some(path) = output_path {
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{json}");
    }

    Ok(())
}

fn emit_diff(diff: &ExpectationDiff) -> Result<()> {
    let json = serde_json::to_string_pretty(&diff.to_json())?;
    eprintln!("{json}");
    Ok(())
}
