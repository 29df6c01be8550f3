//! Sequential per-platform result collection.
//!
//! One collector run owns one artifact: it walks the sorted corpus, runs
//! each kernel once under the deadline, and appends the block before
//! moving on. Platforms are collected by independent invocations with no
//! shared state, so this stays strictly single-process-at-a-time.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use clvote_error::{Result, VoteError};
use clvote_types::{ResultStatus, platform_label};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::artifact::{ArtifactWriter, completed_test_names};
use crate::corpus::enumerate_corpus;
use crate::meta::{META_SCHEMA_VERSION, RunMeta, write_run_meta};
use crate::normalize::normalize_outcome;
use crate::runner::BoundedRunner;

/// Default per-test deadline, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 150;

/// How one kernel is handed to the platform launcher.
#[derive(Debug, Clone)]
pub struct LauncherConfig {
    pub launcher_path: PathBuf,
    pub platform_index: u32,
    pub device_index: u32,
    /// Device-name filter forwarded to the launcher. A filter that matches
    /// nothing makes the launcher print the device-mismatch marker.
    pub device_name: Option<String>,
    pub disable_opts: bool,
    pub debug: bool,
    pub extra_args: Vec<String>,
}

impl LauncherConfig {
    #[must_use]
    pub fn new(launcher_path: impl Into<PathBuf>) -> Self {
        Self {
            launcher_path: launcher_path.into(),
            platform_index: 0,
            device_index: 0,
            device_name: None,
            disable_opts: false,
            debug: false,
            extra_args: Vec::new(),
        }
    }

    /// Build the launcher invocation for one kernel.
    #[must_use]
    pub fn command(&self, kernel: &Path) -> Command {
        let mut cmd = Command::new(&self.launcher_path);
        cmd.arg("-f").arg(kernel);
        cmd.arg("-p").arg(self.platform_index.to_string());
        cmd.arg("-d").arg(self.device_index.to_string());
        if let Some(name) = &self.device_name {
            cmd.arg("-n").arg(name);
        }
        if self.disable_opts {
            cmd.arg("---disable_opts");
        }
        if self.debug {
            cmd.arg("---debug");
        }
        cmd.args(&self.extra_args);
        cmd
    }

    /// Human-readable template recorded in the run metadata sidecar.
    #[must_use]
    pub fn template(&self) -> String {
        let mut parts = vec![
            self.launcher_path.display().to_string(),
            "-f <kernel>".to_owned(),
            format!("-p {}", self.platform_index),
            format!("-d {}", self.device_index),
        ];
        if let Some(name) = &self.device_name {
            parts.push(format!("-n {name}"));
        }
        if self.disable_opts {
            parts.push("---disable_opts".to_owned());
        }
        if self.debug {
            parts.push("---debug".to_owned());
        }
        parts.extend(self.extra_args.iter().cloned());
        parts.join(" ")
    }
}

/// Full configuration of one collection run.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub corpus_dir: PathBuf,
    pub output_path: PathBuf,
    /// Prior partial artifact whose completed tests are skipped. Passing
    /// the output path itself continues an interrupted run in place.
    pub resume_from: Option<PathBuf>,
    pub timeout: Duration,
    pub launcher: LauncherConfig,
}

/// What a finished (non-aborted) collection run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub corpus_size: usize,
    pub executed: usize,
    pub skipped: usize,
    pub ok: usize,
    pub run_errors: usize,
    pub timeouts: usize,
}

/// Run the whole corpus for one platform, appending one block per test.
///
/// # Errors
///
/// [`VoteError::DeviceMismatch`] aborts the batch: the in-progress
/// artifact is discarded before the error is returned. Any I/O or spawn
/// failure also aborts, but leaves the artifact in place — its recorded
/// blocks are still truthful.
pub fn collect_platform(config: &CollectorConfig) -> Result<CollectionSummary> {
    let corpus = enumerate_corpus(&config.corpus_dir)?;
    let done: BTreeSet<String> = match &config.resume_from {
        Some(prior) if prior.is_file() => completed_test_names(prior)?,
        Some(prior) => {
            return Err(VoteError::invalid(format!(
                "resume file {} does not exist",
                prior.display()
            )));
        }
        None => BTreeSet::new(),
    };

    let platform = platform_label(&config.output_path);
    let runner = BoundedRunner::new(config.timeout);
    let mut writer = ArtifactWriter::append(&config.output_path)?;
    let mut summary = CollectionSummary {
        corpus_size: corpus.len(),
        ..CollectionSummary::default()
    };

    info!(
        platform = %platform,
        corpus = %config.corpus_dir.display(),
        size = corpus.len(),
        resumable = done.len(),
        "collection started"
    );

    for (index, entry) in corpus.iter().enumerate() {
        if done.contains(&entry.case.name) {
            summary.skipped += 1;
            continue;
        }

        info!(
            test = %entry.case.name,
            index = index + 1,
            total = corpus.len(),
            "executing kernel"
        );

        let outcome = runner.run(&mut config.launcher.command(&entry.path))?;
        let status = match normalize_outcome(&outcome) {
            Ok(status) => status,
            Err(err) if err.is_device_mismatch() => {
                error!(test = %entry.case.name, %err, "aborting batch, discarding artifact");
                writer.discard()?;
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        match &status {
            ResultStatus::Ok(_) => summary.ok += 1,
            ResultStatus::RunError(_) => summary.run_errors += 1,
            ResultStatus::Timeout => summary.timeouts += 1,
            ResultStatus::GenError => {}
        }
        summary.executed += 1;
        writer.append_block(&entry.case, &status)?;
    }

    write_run_meta(
        &config.output_path,
        &RunMeta {
            schema_version: META_SCHEMA_VERSION,
            platform: platform.clone(),
            launcher_command: config.launcher.template(),
            timeout_secs: config.timeout.as_secs(),
            corpus_size: summary.corpus_size,
            executed: summary.executed,
            skipped: summary.skipped,
        },
    )?;

    info!(
        platform = %platform,
        executed = summary.executed,
        skipped = summary.skipped,
        run_errors = summary.run_errors,
        timeouts = summary.timeouts,
        "collection finished"
    );
    Ok(summary)
}
