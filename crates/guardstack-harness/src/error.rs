use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown scenario '{0}' (see `harness list`)")]
    UnknownScenario(String),
    #[error("unsupported mode '{0}', expected diagnostic|production|minimal|all")]
    UnsupportedMode(String),
    #[error("unsupported checksum '{0}', expected djb2|blake3")]
    UnsupportedChecksum(String),
    #[error("{failed} of {total} scenario run(s) failed")]
    ScenariosFailed { failed: usize, total: usize },
}
