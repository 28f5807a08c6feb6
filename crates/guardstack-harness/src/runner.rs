//! Scenario execution engine.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;

use serde::Serialize;

use guardstack::structured_log::now_utc;
use guardstack::{ChecksumKind, InstrumentationLevel, LogEntry, LogLevel, SinkRecord};

use crate::error::HarnessError;
use crate::scenarios::{Scenario, ScenarioOutcome};

pub const ALL_LEVELS: [InstrumentationLevel; 3] = [
    InstrumentationLevel::Diagnostic,
    InstrumentationLevel::Production,
    InstrumentationLevel::Minimal,
];

/// Parse `diagnostic|production|minimal|all`. Unlike
/// [`InstrumentationLevel::from_str_loose`], unknown names are an error.
pub fn parse_levels(mode: &str) -> Result<Vec<InstrumentationLevel>, HarnessError> {
    match mode.trim().to_ascii_lowercase().as_str() {
        "all" | "both" => Ok(ALL_LEVELS.to_vec()),
        "diagnostic" => Ok(vec![InstrumentationLevel::Diagnostic]),
        "production" => Ok(vec![InstrumentationLevel::Production]),
        "minimal" => Ok(vec![InstrumentationLevel::Minimal]),
        _ => Err(HarnessError::UnsupportedMode(mode.to_string())),
    }
}

/// Parse `djb2|blake3`.
pub fn parse_checksum(algo: &str) -> Result<ChecksumKind, HarnessError> {
    match algo.trim().to_ascii_lowercase().as_str() {
        "djb2" => Ok(ChecksumKind::Djb2),
        "blake3" => Ok(ChecksumKind::Blake3),
        _ => Err(HarnessError::UnsupportedChecksum(algo.to_string())),
    }
}

/// Runs a set of scenarios across a set of levels.
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    /// Name of the run, used as the trace-id prefix.
    pub campaign: String,
    levels: Vec<InstrumentationLevel>,
    scenarios: Vec<Scenario>,
    checksum: ChecksumKind,
}

impl ScenarioRunner {
    /// Every scenario, every level, DJB2 checksums.
    #[must_use]
    pub fn new(campaign: impl Into<String>) -> Self {
        Self {
            campaign: campaign.into(),
            levels: ALL_LEVELS.to_vec(),
            scenarios: Scenario::ALL.to_vec(),
            checksum: ChecksumKind::Djb2,
        }
    }

    #[must_use]
    pub fn with_levels(mut self, levels: Vec<InstrumentationLevel>) -> Self {
        self.levels = levels;
        self
    }

    #[must_use]
    pub fn with_scenarios(mut self, scenarios: Vec<Scenario>) -> Self {
        self.scenarios = scenarios;
        self
    }

    #[must_use]
    pub fn with_checksum(mut self, checksum: ChecksumKind) -> Self {
        self.checksum = checksum;
        self
    }

    /// Run every (scenario, level) pair. Pairs the scenario does not apply to
    /// are counted as skipped.
    #[must_use]
    pub fn run(&self) -> RunReport {
        let mut summary = RunSummary::default();
        let mut outcomes = Vec::new();

        for &level in &self.levels {
            for &scenario in &self.scenarios {
                if !scenario.applies_to(level) {
                    summary.skipped += 1;
                    continue;
                }
                let outcome = scenario.run(level, self.checksum);
                summary.total += 1;
                if outcome.passed {
                    summary.passed += 1;
                } else {
                    summary.failed += 1;
                }
                outcomes.push(outcome);
            }
        }

        RunReport {
            campaign: self.campaign.clone(),
            generated_utc: now_utc(),
            checksum: self.checksum,
            summary,
            outcomes,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    #[must_use]
    pub const fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub campaign: String,
    pub generated_utc: String,
    pub checksum: ChecksumKind,
    pub summary: RunSummary,
    pub outcomes: Vec<ScenarioOutcome>,
}

impl RunReport {
    /// Failed outcomes only.
    pub fn failures(&self) -> impl Iterator<Item = &ScenarioOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.passed)
    }

    /// The run as structured log records: per outcome, every sink record the
    /// stacks produced (dumps become `stack_dump` entries) followed by one
    /// `scenario_passed` / `scenario_failed` entry.
    #[must_use]
    pub fn log_entries(&self) -> Vec<LogEntry> {
        let mut entries = Vec::new();
        for outcome in &self.outcomes {
            for record in &outcome.records {
                entries.push(match record {
                    SinkRecord::Log(entry) => entry.clone(),
                    SinkRecord::Dump(dump) => {
                        let mut entry = LogEntry::new(LogLevel::Error, "stack_dump")
                            .with_mode(dump.mode)
                            .with_operation(dump.operation)
                            .with_shape(dump.size, dump.capacity);
                        if let Some(err) = dump.error {
                            entry = entry.with_error(err);
                        }
                        if let Ok(details) = serde_json::to_value(&**dump) {
                            entry = entry.with_details(details);
                        }
                        entry
                    }
                });
            }

            let trace_id = format!("{}::{}::{}", self.campaign, outcome.scenario, outcome.mode);
            let (level, event) = if outcome.passed {
                (LogLevel::Info, "scenario_passed")
            } else {
                (LogLevel::Error, "scenario_failed")
            };
            entries.push(
                LogEntry::with_trace_id(trace_id, level, event)
                    .with_mode(outcome.mode)
                    .with_operation(outcome.scenario)
                    .with_details(serde_json::json!({
                        "steps": outcome.transcript.len(),
                        "dumps": outcome.dumps,
                        "failure": outcome.failure,
                    })),
            );
        }
        entries
    }

    /// Write [`log_entries`](Self::log_entries) as JSONL.
    pub fn write_log(&self, path: &Path) -> Result<(), HarnessError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        for entry in self.log_entries() {
            writeln!(writer, "{}", entry.to_jsonl()?)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Pretty JSON report.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable report.
    #[must_use]
    pub fn render_plain(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "guardstack scenarios: {} run, {} passed, {} failed, {} skipped (checksum {})",
            self.summary.total,
            self.summary.passed,
            self.summary.failed,
            self.summary.skipped,
            self.checksum.as_str(),
        );
        for outcome in &self.outcomes {
            let status = if outcome.passed { "PASS" } else { "FAIL" };
            let _ = writeln!(
                out,
                "  [{status}] {:<18} {:<10} dumps={}",
                outcome.scenario, outcome.mode, outcome.dumps
            );
            if let Some(failure) = &outcome.failure {
                let _ = writeln!(out, "         {failure}");
            }
        }
        out
    }
}
