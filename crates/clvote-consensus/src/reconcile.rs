//! Reconciliation driver: load per-platform artifacts, vote, and persist
//! the golden result set plus a machine-readable summary.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use clvote_error::{Result, VoteError};
use clvote_harness::artifact::read_blocks;
use clvote_types::{GoldenResult, ResultRecord, TestCase, platform_label};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{compute_golden, tally_votes};

/// File extension result artifacts are discovered by.
pub const ARTIFACT_EXTENSION: &str = "csv";

/// Version of the vote-summary JSON schema.
pub const SUMMARY_SCHEMA_VERSION: u32 = 1;

/// Everything reconciliation needs, loaded once from a results directory.
#[derive(Debug, Clone, Default)]
pub struct ReconcileInput {
    /// platform label → test name → that platform's record.
    pub platforms: BTreeMap<String, BTreeMap<String, ResultRecord>>,
    /// Union of test identities across all platforms, with the line count
    /// from whichever artifact header carried one.
    pub tests: BTreeMap<String, Option<u32>>,
}

impl ReconcileInput {
    /// Regroup the loaded records by test for voting.
    #[must_use]
    pub fn records_by_test(&self) -> BTreeMap<String, Vec<ResultRecord>> {
        crate::group_by_test(
            self.platforms
                .values()
                .flat_map(|records| records.values().cloned()),
        )
    }
}

/// Load every `*.csv` artifact in `dir`, excluding the named files (the
/// golden artifact itself, when it lives in the same directory).
pub fn load_results_dir(dir: &Path, exclude_names: &[&str]) -> Result<ReconcileInput> {
    if !dir.is_dir() {
        return Err(VoteError::invalid(format!(
            "results directory {} does not exist",
            dir.display()
        )));
    }

    let mut input = ReconcileInput::default();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file()
            || path.extension().is_none_or(|ext| ext != ARTIFACT_EXTENSION)
        {
            continue;
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if exclude_names.contains(&file_name.as_str()) {
            continue;
        }

        let platform = platform_label(&path);
        let records = input.platforms.entry(platform.clone()).or_default();
        for block in read_blocks(&path)? {
            let Some(status) = block.status() else {
                warn!(
                    artifact = %path.display(),
                    test = %block.case.name,
                    "header without result line, ignoring block"
                );
                continue;
            };
            input
                .tests
                .entry(block.case.name.clone())
                .and_modify(|lines| {
                    if lines.is_none() {
                        *lines = block.case.line_count;
                    }
                })
                .or_insert(block.case.line_count);
            records.insert(
                block.case.name.clone(),
                ResultRecord {
                    platform: platform.clone(),
                    test_name: block.case.name,
                    status,
                },
            );
        }
    }

    if input.platforms.is_empty() {
        return Err(VoteError::invalid(format!(
            "no result artifacts (*.{ARTIFACT_EXTENSION}) found in {}",
            dir.display()
        )));
    }

    info!(
        platforms = input.platforms.len(),
        tests = input.tests.len(),
        "result artifacts loaded"
    );
    Ok(input)
}

/// Per-test verdict in the machine-readable summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestVerdict {
    pub test: String,
    /// Distinct value sets observed among Ok records.
    pub candidates: usize,
    /// Votes collected by the strongest candidate.
    pub max_votes: usize,
    /// Platforms that contributed any record for this test.
    pub platforms_reporting: usize,
    /// Canonical golden token list, or the inconclusive sentinel.
    pub verdict: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSummary {
    pub schema_version: u32,
    pub platforms: Vec<String>,
    pub verdicts: Vec<TestVerdict>,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub golden: BTreeMap<String, GoldenResult>,
    pub summary: VoteSummary,
}

/// Vote every test and assemble the summary. Pure given the input.
#[must_use]
pub fn reconcile(input: &ReconcileInput) -> Reconciliation {
    let records_by_test = input.records_by_test();
    let golden = compute_golden(&records_by_test);

    let verdicts = records_by_test
        .iter()
        .map(|(test, records)| {
            let tally = tally_votes(records.iter());
            TestVerdict {
                test: test.clone(),
                candidates: tally.len(),
                max_votes: tally.values().copied().max().unwrap_or(0),
                platforms_reporting: records.len(),
                verdict: golden
                    .get(test)
                    .map_or_else(String::new, GoldenResult::render_line),
            }
        })
        .collect();

    Reconciliation {
        golden,
        summary: VoteSummary {
            schema_version: SUMMARY_SCHEMA_VERSION,
            platforms: input.platforms.keys().cloned().collect(),
            verdicts,
        },
    }
}

/// Persist the golden result set using the artifact grammar: one block per
/// test, each with exactly one derived line.
pub fn write_golden_artifact(
    path: &Path,
    tests: &BTreeMap<String, Option<u32>>,
    golden: &BTreeMap<String, GoldenResult>,
) -> Result<()> {
    let mut file = File::create(path)?;
    for (test, line_count) in tests {
        let verdict = golden.get(test).unwrap_or(&GoldenResult::Inconclusive);
        let case = TestCase::new(test.clone(), *line_count);
        writeln!(file, "{}", case.header_line())?;
        writeln!(file, "{}", verdict.render_line())?;
    }
    file.flush()?;
    Ok(())
}

pub fn write_summary(path: &Path, summary: &VoteSummary) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(summary)?;
    fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clvote_types::INCONCLUSIVE_SENTINEL;

    fn write_artifact(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn load_excludes_named_files_and_foreign_extensions() {
        let dir = tempfile::tempdir().unwrap();
        write_artifact(dir.path(), "a_gpu.csv", "RESULTS FOR t.cl\n0x5,\n");
        write_artifact(dir.path(), "sample_results.csv", "RESULTS FOR t.cl\n0x5,\n");
        write_artifact(dir.path(), "notes.txt", "RESULTS FOR t.cl\n0x9,\n");

        let input = load_results_dir(dir.path(), &["sample_results.csv"]).unwrap();
        assert_eq!(input.platforms.len(), 1);
        assert!(input.platforms.contains_key("a gpu"));
    }

    #[test]
    fn empty_results_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_results_dir(dir.path(), &[]).unwrap_err();
        assert!(err.to_string().contains("no result artifacts"));
    }

    #[test]
    fn reconcile_votes_across_loaded_platforms() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["p1.csv", "p2.csv", "p3.csv"] {
            write_artifact(dir.path(), name, "RESULTS FOR t.cl (12)\n0x5,\n");
        }
        write_artifact(dir.path(), "p4.csv", "RESULTS FOR t.cl (12)\n0x9,\n");

        let input = load_results_dir(dir.path(), &[]).unwrap();
        let outcome = reconcile(&input);
        assert_eq!(
            outcome.golden.get("t.cl").unwrap().render_line(),
            "0x5,"
        );

        let verdict = &outcome.summary.verdicts[0];
        assert_eq!(verdict.candidates, 2);
        assert_eq!(verdict.max_votes, 3);
        assert_eq!(verdict.platforms_reporting, 4);
    }

    #[test]
    fn golden_artifact_carries_one_line_per_test() {
        let dir = tempfile::tempdir().unwrap();
        let mut tests = BTreeMap::new();
        tests.insert("a.cl".to_owned(), Some(10));
        tests.insert("b.cl".to_owned(), None);
        let mut golden = BTreeMap::new();
        golden.insert(
            "a.cl".to_owned(),
            GoldenResult::parse_line("0x5,"),
        );
        golden.insert("b.cl".to_owned(), GoldenResult::Inconclusive);

        let path = dir.path().join("sample_results.csv");
        write_golden_artifact(&path, &tests, &golden).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            format!("RESULTS FOR a.cl (10)\n0x5,\nRESULTS FOR b.cl\n{INCONCLUSIVE_SENTINEL}\n")
        );
    }
}
