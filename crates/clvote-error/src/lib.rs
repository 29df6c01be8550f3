//! Shared error type for the clvote workspace.
//!
//! Per-test outcomes (`run_error`, `timeout`, `gen_error`) are data, not
//! errors — they live in `clvote_types::ResultStatus` and never abort a
//! batch. `VoteError` covers the conditions that do: I/O failures, spawn
//! failures, malformed artifacts, and the one batch-fatal condition, a
//! device mismatch reported by the launcher.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used across all clvote crates.
pub type Result<T> = std::result::Result<T, VoteError>;

#[derive(Debug, Error)]
pub enum VoteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The launcher could not match the requested device. The execution
    /// environment is misconfigured, so the whole batch is invalid.
    #[error("device mismatch: {diagnostic}")]
    DeviceMismatch { diagnostic: String },

    #[error("malformed result artifact {}: {detail}", path.display())]
    Artifact { path: PathBuf, detail: String },

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Invalid(String),
}

impl VoteError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    pub fn artifact(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::Artifact {
            path: path.into(),
            detail: detail.into(),
        }
    }

    /// True for the one condition that must terminate a whole collection
    /// batch and discard its in-progress artifact.
    #[must_use]
    pub fn is_device_mismatch(&self) -> bool {
        matches!(self, Self::DeviceMismatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_mismatch_is_the_only_batch_fatal_variant() {
        let mismatch = VoteError::DeviceMismatch {
            diagnostic: "no device named `Tahiti`".to_owned(),
        };
        assert!(mismatch.is_device_mismatch());

        let io = VoteError::from(std::io::Error::other("disk gone"));
        assert!(!io.is_device_mismatch());
        assert!(!VoteError::invalid("bad flag").is_device_mismatch());
    }

    #[test]
    fn artifact_error_names_the_offending_file() {
        let err = VoteError::artifact("/tmp/intel_gpu.csv", "header without body");
        let message = err.to_string();
        assert!(message.contains("intel_gpu.csv"), "got: {message}");
        assert!(message.contains("header without body"), "got: {message}");
    }
}
