//! Run metadata sidecar.
//!
//! Every collection run records what produced its artifact: the launcher
//! invocation, the deadline, and how much of the corpus was executed
//! versus skipped by resume. The sidecar lives next to the artifact as
//! `<artifact>.meta.json`.

use std::fs;
use std::path::{Path, PathBuf};

use clvote_error::Result;
use serde::{Deserialize, Serialize};

/// Version of the sidecar schema.
pub const META_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMeta {
    pub schema_version: u32,
    /// Platform label derived from the artifact file name.
    pub platform: String,
    /// The launcher command template, for reproducing the run.
    pub launcher_command: String,
    pub timeout_secs: u64,
    pub corpus_size: usize,
    pub executed: usize,
    pub skipped: usize,
}

/// Sidecar path for a given artifact path.
#[must_use]
pub fn meta_path(artifact: &Path) -> PathBuf {
    let mut name = artifact.as_os_str().to_owned();
    name.push(".meta.json");
    PathBuf::from(name)
}

pub fn write_run_meta(artifact: &Path, meta: &RunMeta) -> Result<PathBuf> {
    let path = meta_path(artifact);
    let bytes = serde_json::to_vec_pretty(meta)?;
    fs::write(&path, bytes)?;
    Ok(path)
}

pub fn read_run_meta(artifact: &Path) -> Result<RunMeta> {
    let bytes = fs::read(meta_path(artifact))?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_round_trips_next_to_the_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("nvidia_k40.csv");
        let meta = RunMeta {
            schema_version: META_SCHEMA_VERSION,
            platform: "nvidia k40".to_owned(),
            launcher_command: "./cl_launcher -p 0 -d 0".to_owned(),
            timeout_secs: 150,
            corpus_size: 600,
            executed: 598,
            skipped: 2,
        };

        let path = write_run_meta(&artifact, &meta).unwrap();
        assert_eq!(path, dir.path().join("nvidia_k40.csv.meta.json"));
        assert_eq!(read_run_meta(&artifact).unwrap(), meta);
    }
}
