//! Scenario harness for guardstack.
//!
//! This crate provides:
//! - Scenarios: scripted stack sessions covering the edge and corruption
//!   cases, each checked against its expected transcript
//! - Runner: executes scenarios across instrumentation levels, collecting
//!   every sink record as JSONL evidence
//! - Artifacts: SHA-256 index linking a run's log and report files

#![forbid(unsafe_code)]

pub mod artifacts;
pub mod error;
pub mod runner;
pub mod scenarios;

pub use artifacts::{ArtifactEntry, ArtifactIndex};
pub use error::HarnessError;
pub use runner::{RunReport, RunSummary, ScenarioRunner};
pub use scenarios::{Scenario, ScenarioOutcome};
