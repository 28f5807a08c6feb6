//! Artifact index linking a run's outputs with SHA-256 integrity.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use guardstack::structured_log::now_utc;

use crate::error::HarnessError;

/// A single artifact entry in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub path: String,
    pub kind: String,
    pub sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

/// Index of the files a harness run wrote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactIndex {
    pub index_version: u32,
    pub run_id: String,
    pub generated_utc: String,
    pub artifacts: Vec<ArtifactEntry>,
}

impl ArtifactIndex {
    #[must_use]
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            index_version: 1,
            run_id: run_id.into(),
            generated_utc: now_utc(),
            artifacts: Vec::new(),
        }
    }

    /// Hash `path` and record it under `kind`.
    pub fn add_file(&mut self, path: &Path, kind: impl Into<String>) -> Result<&mut Self, HarnessError> {
        let data = std::fs::read(path)?;
        self.artifacts.push(ArtifactEntry {
            path: path.display().to_string(),
            kind: kind.into(),
            sha256: sha256_hex(&data),
            size_bytes: Some(data.len() as u64),
        });
        Ok(self)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Re-hash every artifact. Relative paths resolve against `root`.
    /// Returns one message per missing or changed file.
    #[must_use]
    pub fn verify(&self, root: &Path) -> Vec<String> {
        let mut problems = Vec::new();
        for artifact in &self.artifacts {
            let candidate = PathBuf::from(&artifact.path);
            let resolved = if candidate.is_absolute() {
                candidate
            } else {
                root.join(candidate)
            };
            match std::fs::read(&resolved) {
                Ok(data) => {
                    let actual = sha256_hex(&data);
                    if !actual.eq_ignore_ascii_case(&artifact.sha256) {
                        problems.push(format!(
                            "sha256 mismatch for '{}': expected={}, actual={actual}",
                            artifact.path, artifact.sha256
                        ));
                    }
                }
                Err(err) => {
                    problems.push(format!("failed reading '{}': {err}", resolved.display()));
                }
            }
        }
        problems
    }
}

/// Lowercase hex SHA-256 of `data`.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn index_round_trips_and_detects_changes() {
        let dir = std::env::temp_dir().join(format!("guardstack-artifacts-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("report.json");
        std::fs::write(&file, "{}").unwrap();

        let mut index = ArtifactIndex::new("run-1");
        index.add_file(&file, "report").unwrap();
        let parsed = ArtifactIndex::from_json(&index.to_json().unwrap()).unwrap();
        assert_eq!(parsed.artifacts, index.artifacts);
        assert_eq!(parsed.artifacts[0].size_bytes, Some(2));
        assert!(parsed.verify(&dir).is_empty());

        std::fs::write(&file, "{\"changed\":true}").unwrap();
        let problems = parsed.verify(&dir);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("sha256 mismatch"));

        std::fs::remove_dir_all(&dir).unwrap();
        assert_eq!(parsed.verify(&dir).len(), 1);
    }
}
