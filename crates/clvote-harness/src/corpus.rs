//! Corpus enumeration.
//!
//! The corpus is a directory of generated kernels. Entries are sorted by
//! file name — not discovery order — so collection is reproducible and a
//! resumed run walks the same sequence.

use std::fs;
use std::path::{Path, PathBuf};

use clvote_error::{Result, VoteError};
use clvote_types::TestCase;
use tracing::debug;

/// One corpus entry: the test identity plus the kernel path to execute.
#[derive(Debug, Clone)]
pub struct CorpusEntry {
    pub case: TestCase,
    pub path: PathBuf,
}

/// Enumerate every regular file in `dir` as a test case, sorted by name.
/// The line count recorded in each header comes from the kernel source.
pub fn enumerate_corpus(dir: &Path) -> Result<Vec<CorpusEntry>> {
    if !dir.is_dir() {
        return Err(VoteError::invalid(format!(
            "corpus directory {} does not exist",
            dir.display()
        )));
    }

    let mut entries = Vec::new();
    for dir_entry in fs::read_dir(dir)? {
        let path = dir_entry?.path();
        if !path.is_file() {
            continue;
        }
        let name = match path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => continue,
        };
        let line_count = source_line_count(&path);
        entries.push(CorpusEntry {
            case: TestCase::new(name, line_count),
            path,
        });
    }
    entries.sort_by(|a, b| a.case.name.cmp(&b.case.name));
    debug!(dir = %dir.display(), size = entries.len(), "corpus enumerated");
    Ok(entries)
}

fn source_line_count(path: &Path) -> Option<u32> {
    let text = fs::read_to_string(path).ok()?;
    u32::try_from(text.lines().count()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corpus_is_sorted_by_name_with_line_counts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.cl"), "line\nline\n").unwrap();
        fs::write(dir.path().join("a.cl"), "one line").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let corpus = enumerate_corpus(dir.path()).unwrap();
        let names: Vec<&str> = corpus.iter().map(|e| e.case.name.as_str()).collect();
        assert_eq!(names, ["a.cl", "b.cl"], "subdirectories must be skipped");
        assert_eq!(corpus[0].case.line_count, Some(1));
        assert_eq!(corpus[1].case.line_count, Some(2));
    }

    #[test]
    fn missing_corpus_directory_is_an_error() {
        let err = enumerate_corpus(Path::new("/nonexistent/corpus")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
