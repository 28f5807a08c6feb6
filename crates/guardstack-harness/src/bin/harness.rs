//! CLI entrypoint for the guardstack scenario harness.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use guardstack::InstrumentationLevel;
use guardstack_harness::runner::{parse_checksum, parse_levels};
use guardstack_harness::{ArtifactIndex, HarnessError, Scenario, ScenarioRunner};

/// Scenario tooling for guardstack.
#[derive(Debug, Parser)]
#[command(name = "guardstack-harness")]
#[command(about = "Drive guarded stacks through edge and corruption scenarios")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List scenarios and the levels they run under.
    List,
    /// Run scenarios and report the outcomes.
    Run {
        /// Level to run under (`diagnostic`, `production`, `minimal`, or `all`).
        #[arg(long, default_value = "all")]
        mode: String,
        /// Scenario id to run; repeatable. Runs every scenario when omitted.
        #[arg(long)]
        scenario: Vec<String>,
        /// Checksum algorithm for diagnostic stacks (`djb2` or `blake3`).
        #[arg(long, default_value = "djb2")]
        checksum: String,
        /// Structured JSONL log output path.
        #[arg(long)]
        log: Option<PathBuf>,
        /// JSON report output path (if omitted, a plain summary is printed to stdout).
        #[arg(long)]
        report: Option<PathBuf>,
        /// Campaign name used as the trace-id prefix.
        #[arg(long, default_value = "guardstack")]
        campaign: String,
    },
    /// Print the checksum of some text or a file.
    Hash {
        /// Algorithm (`djb2` or `blake3`).
        #[arg(long, default_value = "djb2")]
        algo: String,
        /// Text to hash.
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        text: Option<String>,
        /// File to hash.
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Re-hash the artifacts listed in an index written by `run`.
    Verify {
        /// Artifact index JSON path.
        #[arg(long)]
        index: PathBuf,
        /// Root used to resolve relative artifact paths.
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::List => {
            let levels = [
                InstrumentationLevel::Diagnostic,
                InstrumentationLevel::Production,
                InstrumentationLevel::Minimal,
            ];
            for scenario in Scenario::ALL {
                let modes: Vec<&str> = levels
                    .into_iter()
                    .filter(|level| scenario.applies_to(*level))
                    .map(InstrumentationLevel::as_str)
                    .collect();
                println!(
                    "{:<18} [{}] {}",
                    scenario.id(),
                    modes.join(","),
                    scenario.description()
                );
            }
        }
        Command::Run {
            mode,
            scenario,
            checksum,
            log,
            report,
            campaign,
        } => {
            let levels = parse_levels(&mode)?;
            let checksum = parse_checksum(&checksum)?;
            let scenarios = if scenario.is_empty() {
                Scenario::ALL.to_vec()
            } else {
                scenario
                    .iter()
                    .map(|id| {
                        Scenario::from_id(id).ok_or_else(|| HarnessError::UnknownScenario(id.clone()))
                    })
                    .collect::<Result<Vec<_>, _>>()?
            };

            let run = ScenarioRunner::new(campaign.clone())
                .with_levels(levels)
                .with_scenarios(scenarios)
                .with_checksum(checksum)
                .run();

            let mut index = ArtifactIndex::new(campaign);
            if let Some(path) = &log {
                run.write_log(path)?;
                index.add_file(path, "log")?;
                eprintln!("Wrote structured log to {}", path.display());
            }
            if let Some(path) = &report {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, run.to_json()?)?;
                index.add_file(path, "report")?;
                eprintln!("Wrote report to {}", path.display());
            } else {
                print!("{}", run.render_plain());
            }
            if let Some(anchor) = report.as_ref().or(log.as_ref()) {
                let index_path = anchor.with_extension("index.json");
                std::fs::write(&index_path, index.to_json()?)?;
                eprintln!("Wrote artifact index to {}", index_path.display());
            }

            for outcome in run.failures() {
                eprintln!(
                    "FAIL {} @ {}: {}",
                    outcome.scenario,
                    outcome.mode,
                    outcome.failure.as_deref().unwrap_or("unknown")
                );
            }
            if !run.summary.all_passed() {
                return Err(HarnessError::ScenariosFailed {
                    failed: run.summary.failed,
                    total: run.summary.total,
                }
                .into());
            }
        }
        Command::Hash { algo, text, file } => {
            let kind = parse_checksum(&algo)?;
            let (bytes, source) = match (text, file) {
                (Some(text), _) => (text.into_bytes(), String::from("<text>")),
                (None, Some(path)) => (std::fs::read(&path)?, path.display().to_string()),
                (None, None) => return Err("one of --text or --file is required".into()),
            };
            println!("{:016x}  {}  {source}", kind.digest(&bytes), kind.as_str());
        }
        Command::Verify { index, root } => {
            let body = std::fs::read_to_string(&index)?;
            let parsed = ArtifactIndex::from_json(&body)?;
            let problems = parsed.verify(&root);
            for problem in &problems {
                eprintln!("{problem}");
            }
            if !problems.is_empty() {
                return Err(format!(
                    "artifact verification failed: {} problem(s) in {}",
                    problems.len(),
                    index.display()
                )
                .into());
            }
            eprintln!(
                "OK: {} artifact(s) verified from {}",
                parsed.artifacts.len(),
                index.display()
            );
        }
    }

    Ok(())
}
