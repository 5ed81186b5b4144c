//! Scenario selector front end
//!
//! Loads a scenario set (named bundles A/B/C/D …), validates the selected
//! scenario, runs it against an external arrival feed, and writes event
//! records plus the structured decision exports.
//!
//! Exit status: 0 on success, 1 on I/O or engine failure, 2 when scenario
//! validation fails (every violation is printed, not just the first).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pathway_simulator_core_rs::{
    early_discharge_flags, export_events, investment_recommendations, prioritisation_list,
    ArrivalRecord, Orchestrator, RunOutcome, ScenarioSet, SimulationError,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pathway-sim")]
#[command(about = "Pathway decision engine: validate and run named scenarios")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate scenarios without running anything
    Validate {
        /// Scenario set JSON file
        #[arg(long)]
        scenarios: PathBuf,
        /// Scenario name to validate; omit to validate all
        #[arg(long)]
        scenario: Option<String>,
    },
    /// Run one named scenario against an arrival feed
    Run {
        /// Scenario set JSON file
        #[arg(long)]
        scenarios: PathBuf,
        /// Scenario name (e.g. A, B, C, D)
        #[arg(long)]
        scenario: String,
        /// Arrival feed JSON file (list of records)
        #[arg(long)]
        arrivals: PathBuf,
        /// Write event export records (JSON) here instead of stdout
        #[arg(long)]
        events: Option<PathBuf>,
        /// Write decision exports (prioritisation, discharge flags,
        /// investment recommendations) as one JSON document
        #[arg(long)]
        reports: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Validate { scenarios, scenario } => validate(&scenarios, scenario.as_deref()),
        Commands::Run {
            scenarios,
            scenario,
            arrivals,
            events,
            reports,
        } => run(&scenarios, &scenario, &arrivals, events.as_deref(), reports.as_deref()),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn load_scenarios(path: &Path) -> Result<ScenarioSet> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading scenario set {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("parsing scenario set {}", path.display()))
}

fn load_arrivals(path: &Path) -> Result<Vec<ArrivalRecord>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading arrival feed {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("parsing arrival feed {}", path.display()))
}

/// Print every violation of a failed validation and return exit code 2
fn report_validation_failure(name: &str, err: &SimulationError) -> ExitCode {
    match err {
        SimulationError::Configuration(config_err) => {
            eprintln!(
                "scenario {name}: {} violation(s)",
                config_err.violations().len()
            );
            for violation in config_err.violations() {
                eprintln!("  - {violation}");
            }
        }
        other => eprintln!("scenario {name}: {other}"),
    }
    ExitCode::from(2)
}

fn validate(scenarios_path: &Path, only: Option<&str>) -> Result<ExitCode> {
    let set = load_scenarios(scenarios_path)?;

    let names: Vec<String> = match only {
        Some(name) => vec![name.to_string()],
        None => set.names().iter().map(|s| s.to_string()).collect(),
    };

    let mut failed = false;
    for name in &names {
        let scenario = match set.select(name) {
            Ok(scenario) => scenario,
            Err(err) => {
                eprintln!("{err}");
                failed = true;
                continue;
            }
        };
        match scenario.validate() {
            Ok(()) => println!("scenario {name}: ok"),
            Err(err) => {
                failed = true;
                eprintln!("scenario {name}: {} violation(s)", err.violations().len());
                for violation in err.violations() {
                    eprintln!("  - {violation}");
                }
            }
        }
    }

    Ok(if failed { ExitCode::from(2) } else { ExitCode::SUCCESS })
}

fn run(
    scenarios_path: &Path,
    name: &str,
    arrivals_path: &Path,
    events_out: Option<&Path>,
    reports_out: Option<&Path>,
) -> Result<ExitCode> {
    let set = load_scenarios(scenarios_path)?;
    let scenario = match set.select(name) {
        Ok(scenario) => scenario.clone(),
        Err(err) => {
            eprintln!("{err}");
            return Ok(ExitCode::from(2));
        }
    };
    let feed = load_arrivals(arrivals_path)?;

    let mut orchestrator = match Orchestrator::new(scenario, feed) {
        Ok(orchestrator) => orchestrator,
        Err(err) => return Ok(report_validation_failure(name, &err)),
    };

    info!(scenario = name, run_id = orchestrator.run_id(), "starting run");
    let outcome = orchestrator.run()?;

    match &outcome {
        RunOutcome::Completed { steps } => {
            println!("scenario {name}: completed after {steps} step(s)");
        }
        RunOutcome::HorizonReached {
            steps,
            active_patients,
        } => {
            println!(
                "scenario {name}: horizon reached at step {steps} with {active_patients} patient(s) still active"
            );
        }
    }

    let records = export_events(orchestrator.event_log());
    let events_json = serde_json::to_string_pretty(&records)?;
    match events_out {
        Some(path) => {
            fs::write(path, events_json)
                .with_context(|| format!("writing events to {}", path.display()))?;
            println!("wrote {} event record(s) to {}", records.len(), path.display());
        }
        None => println!("{events_json}"),
    }

    if let Some(path) = reports_out {
        let reports = serde_json::json!({
            "prioritisation_list": prioritisation_list(&orchestrator),
            "early_discharge_flags": early_discharge_flags(&orchestrator),
            "investment_recommendations": investment_recommendations(&orchestrator),
        });
        fs::write(path, serde_json::to_string_pretty(&reports)?)
            .with_context(|| format!("writing reports to {}", path.display()))?;
        println!("wrote decision exports to {}", path.display());
    }

    Ok(ExitCode::SUCCESS)
}
