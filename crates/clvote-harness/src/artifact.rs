//! Result artifact I/O.
//!
//! An artifact is a sequence of blocks: a `RESULTS FOR` header line, then
//! every line up to the next header as the block body. The writer appends
//! and flushes one block per test so a crash mid-run leaves a truthful,
//! resumable partial file.

use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use clvote_error::{Result, VoteError};
use clvote_types::{ResultRecord, ResultStatus, TestCase, platform_label};
use tracing::warn;

/// One parsed artifact block. Body lines are trimmed and blank lines are
/// dropped; use [`crate::merge`] when byte fidelity matters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub case: TestCase,
    pub body: Vec<String>,
}

impl Block {
    /// The block's recorded status: the first body line, parsed. `None`
    /// for a bare header, which only a truncated write produces.
    #[must_use]
    pub fn status(&self) -> Option<ResultStatus> {
        self.body.first().map(|line| ResultStatus::parse_line(line))
    }
}

/// Parse artifact text into blocks. Lines before the first header carry
/// no test identity and are skipped with a warning.
#[must_use]
pub fn parse_blocks(text: &str) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    for line in text.lines() {
        if let Some(case) = TestCase::parse_header(line) {
            blocks.push(Block {
                case,
                body: Vec::new(),
            });
            continue;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match blocks.last_mut() {
            Some(block) => block.body.push(trimmed.to_owned()),
            None => warn!(line = trimmed, "artifact line before first header, skipping"),
        }
    }
    blocks
}

pub fn read_blocks(path: &Path) -> Result<Vec<Block>> {
    let text = fs::read_to_string(path)?;
    Ok(parse_blocks(&text))
}

/// Read an artifact into result records. The platform identity is derived
/// from the artifact file name. Blocks without a body (truncated final
/// write) are skipped with a warning rather than trusted.
pub fn records_from_file(path: &Path) -> Result<Vec<ResultRecord>> {
    let platform = platform_label(path);
    let mut records = Vec::new();
    for block in read_blocks(path)? {
        let Some(status) = block.status() else {
            warn!(
                artifact = %path.display(),
                test = %block.case.name,
                "header without result line, ignoring block"
            );
            continue;
        };
        records.push(ResultRecord {
            platform: platform.clone(),
            test_name: block.case.name,
            status,
        });
    }
    Ok(records)
}

/// Test names that a resumed run may skip: blocks that carry both a
/// header and a result line. A bare trailing header is treated as not
/// yet processed, so the test is re-run instead of silently trusted.
pub fn completed_test_names(path: &Path) -> Result<BTreeSet<String>> {
    Ok(read_blocks(path)?
        .into_iter()
        .filter(|block| !block.body.is_empty())
        .map(|block| block.case.name)
        .collect())
}

/// Append-mode writer for one platform's result artifact. Exactly one
/// writer exists per artifact at a time, so no locking is needed.
#[derive(Debug)]
pub struct ArtifactWriter {
    file: File,
    path: PathBuf,
}

impl ArtifactWriter {
    /// Open `path` for appending, creating it if absent. Appending (not
    /// truncating) is what makes resuming onto the same file safe.
    pub fn append(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one block and flush it to the OS before returning.
    pub fn append_block(&mut self, case: &TestCase, status: &ResultStatus) -> Result<()> {
        writeln!(self.file, "{}", case.header_line())?;
        writeln!(self.file, "{}", status.render_line())?;
        self.file.flush()?;
        Ok(())
    }

    /// Delete the artifact. Called on device-mismatch abort: the partial
    /// file is incomplete and unsafe to trust.
    pub fn discard(self) -> Result<()> {
        fs::remove_file(&self.path).map_err(|err| {
            VoteError::artifact(
                &self.path,
                format!("failed to discard aborted artifact: {err}"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clvote_types::ValueSet;

    #[test]
    fn write_then_parse_preserves_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intel_gpu.csv");
        let mut writer = ArtifactWriter::append(&path).unwrap();

        let case_a = TestCase::new("a.cl", Some(100));
        let case_b = TestCase::new("b.cl", None);
        writer
            .append_block(&case_a, &ResultStatus::Ok(ValueSet::from_tokens(["5", "9"])))
            .unwrap();
        writer.append_block(&case_b, &ResultStatus::Timeout).unwrap();

        let blocks = read_blocks(&path).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].case, case_a);
        assert_eq!(
            blocks[0].status(),
            Some(ResultStatus::Ok(ValueSet::from_tokens(["0x5", "0x9"])))
        );
        assert_eq!(blocks[1].status(), Some(ResultStatus::Timeout));

        let records = records_from_file(&path).unwrap();
        assert_eq!(records[0].platform, "intel gpu");
        assert_eq!(records[1].test_name, "b.cl");
    }

    #[test]
    fn truncated_trailing_header_is_not_treated_as_completed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("amd.csv");
        fs::write(
            &path,
            "RESULTS FOR a.cl (10)\n0x5,\nRESULTS FOR b.cl (20)\n",
        )
        .unwrap();

        let done = completed_test_names(&path).unwrap();
        assert!(done.contains("a.cl"));
        assert!(
            !done.contains("b.cl"),
            "a bare header must be re-run, not trusted"
        );

        // The truncated block is also invisible to the record reader.
        let records = records_from_file(&path).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn preamble_lines_are_ignored() {
        let blocks = parse_blocks("stray banner\nRESULTS FOR x.cl\n0x1,\n");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].case.name, "x.cl");
    }
}
