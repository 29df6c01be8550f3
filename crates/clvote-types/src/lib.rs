//! Core type definitions for clvote result reconciliation.
//!
//! Everything downstream — collection, merging, voting, reporting — speaks
//! in terms of these types and the result-artifact grammar constants
//! defined here. Statuses are tagged variants constructed once at
//! normalization time; no downstream code re-parses sentinel strings.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

// ─── Result artifact grammar ───────────────────────────────────────────

/// Literal prefix of every per-test header line in a result artifact.
pub const RESULT_HEADER_PREFIX: &str = "RESULTS FOR";

/// Body-line sentinel for a non-zero launcher exit.
pub const RUN_ERROR_PREFIX: &str = "run_error:";

/// Body-line sentinel for a deadline overrun.
pub const TIMEOUT_SENTINEL: &str = "timeout";

/// Body-line sentinel for an upstream generator failure.
pub const GEN_ERROR_SENTINEL: &str = "gen_error";

/// Golden-artifact sentinel for a test with no reliable majority.
pub const INCONCLUSIVE_SENTINEL: &str = "Inconclusive";

/// Canonical radix marker prefixed onto bare numeric tokens, so that a
/// platform printing `1A` and one printing `0x1A` vote for the same value.
pub const VALUE_RADIX_PREFIX: &str = "0x";

/// Marker the launcher prints when the requested device cannot be matched.
/// Seeing this in any run's output invalidates the whole batch.
pub const DEVICE_MISMATCH_MARKER: &str = "No device found that matches the given name";

// ─── Test identity ─────────────────────────────────────────────────────

/// One entry of the corpus: a generated kernel identified by file name,
/// with an optional source line count. Immutable once enumerated.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub line_count: Option<u32>,
}

impl TestCase {
    pub fn new(name: impl Into<String>, line_count: Option<u32>) -> Self {
        Self {
            name: name.into(),
            line_count,
        }
    }

    /// Render the artifact header line for this test.
    #[must_use]
    pub fn header_line(&self) -> String {
        match self.line_count {
            Some(lines) => format!("{RESULT_HEADER_PREFIX} {} ({lines})", self.name),
            None => format!("{RESULT_HEADER_PREFIX} {}", self.name),
        }
    }

    /// Parse an artifact header line. Returns `None` if the line does not
    /// start with [`RESULT_HEADER_PREFIX`]. A trailing `(<n>)` annotation
    /// is split off as the line count; anything unparseable stays part of
    /// the name.
    #[must_use]
    pub fn parse_header(line: &str) -> Option<Self> {
        let rest = line.trim().strip_prefix(RESULT_HEADER_PREFIX)?.trim();
        if let Some(open) = rest.rfind('(') {
            if let Some(inner) = rest[open + 1..].trim_end().strip_suffix(')') {
                if let Ok(lines) = inner.trim().parse::<u32>() {
                    return Some(Self::new(rest[..open].trim_end(), Some(lines)));
                }
            }
        }
        Some(Self::new(rest, None))
    }
}

// ─── Value tokens ──────────────────────────────────────────────────────

/// Canonicalize one raw output field: trim it, drop it if empty, and
/// prefix the radix marker when absent.
#[must_use]
pub fn canonicalize_token(raw: &str) -> Option<String> {
    let token = raw.trim();
    if token.is_empty() {
        return None;
    }
    if token.starts_with(VALUE_RADIX_PREFIX) {
        Some(token.to_owned())
    } else {
        Some(format!("{VALUE_RADIX_PREFIX}{token}"))
    }
}

/// A deduplicated, order-irrelevant set of canonical value tokens.
///
/// Backed by a `BTreeSet` so equality and ordering are independent of the
/// order a platform printed its values, and so the set can key a vote
/// tally directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ValueSet(BTreeSet<String>);

impl ValueSet {
    /// Split raw launcher output on the field separator and canonicalize
    /// every non-empty field.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        Self(raw.split(',').filter_map(canonicalize_token).collect())
    }

    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            tokens
                .into_iter()
                .filter_map(|t| canonicalize_token(t.as_ref()))
                .collect(),
        )
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical rendering: sorted tokens joined by `", "`.
    #[must_use]
    pub fn canonical(&self) -> String {
        let mut out = String::new();
        for (idx, token) in self.0.iter().enumerate() {
            if idx > 0 {
                out.push_str(", ");
            }
            out.push_str(token);
        }
        out
    }
}

impl fmt::Display for ValueSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

// ─── Per-run status ────────────────────────────────────────────────────

/// Outcome of one (platform, test) execution, decided once at
/// normalization time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultStatus {
    /// The launcher exited zero; its output normalized to this value set.
    Ok(ValueSet),
    /// The launcher exited non-zero; the message is its diagnostic line.
    RunError(String),
    /// The deadline elapsed before the launcher finished.
    Timeout,
    /// The upstream generator failed to produce this test.
    GenError,
}

impl ResultStatus {
    /// Render the artifact body line for this status. `Ok` renders as the
    /// canonical token list with the grammar's trailing separator; error
    /// messages are flattened to one line.
    #[must_use]
    pub fn render_line(&self) -> String {
        match self {
            Self::Ok(values) => format!("{},", values.canonical()),
            Self::RunError(message) => {
                format!("{RUN_ERROR_PREFIX} {}", single_line(message))
            }
            Self::Timeout => TIMEOUT_SENTINEL.to_owned(),
            Self::GenError => GEN_ERROR_SENTINEL.to_owned(),
        }
    }

    /// Parse an artifact body line back into a status. Sentinels are
    /// checked first; anything else is a value-token list.
    #[must_use]
    pub fn parse_line(line: &str) -> Self {
        let line = line.trim();
        if let Some(message) = line.strip_prefix(RUN_ERROR_PREFIX) {
            return Self::RunError(message.trim().to_owned());
        }
        // Bare `run_error` without a message also appears in old artifacts.
        if line == "run_error" {
            return Self::RunError(String::new());
        }
        if line.starts_with(TIMEOUT_SENTINEL) {
            return Self::Timeout;
        }
        if line.starts_with(GEN_ERROR_SENTINEL) {
            return Self::GenError;
        }
        Self::Ok(ValueSet::parse(line))
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }
}

/// One platform's recorded outcome for one test. Created by the collector
/// (or the artifact parser) and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub platform: String,
    pub test_name: String,
    pub status: ResultStatus,
}

// ─── Golden results ────────────────────────────────────────────────────

/// The consensus verdict for one test: a concrete value set when a clear
/// majority exists, `Inconclusive` otherwise. Written once, never revised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoldenResult {
    Conclusive(ValueSet),
    Inconclusive,
}

impl GoldenResult {
    /// Render the golden-artifact body line.
    #[must_use]
    pub fn render_line(&self) -> String {
        match self {
            Self::Conclusive(values) => format!("{},", values.canonical()),
            Self::Inconclusive => INCONCLUSIVE_SENTINEL.to_owned(),
        }
    }

    #[must_use]
    pub fn parse_line(line: &str) -> Self {
        let line = line.trim();
        if line == INCONCLUSIVE_SENTINEL {
            Self::Inconclusive
        } else {
            Self::Conclusive(ValueSet::parse(line))
        }
    }

    #[must_use]
    pub fn is_conclusive(&self) -> bool {
        matches!(self, Self::Conclusive(_))
    }
}

// ─── Platform identity ─────────────────────────────────────────────────

/// Derive a human-readable platform label from a result artifact path:
/// the file stem with underscores opened up into spaces.
#[must_use]
pub fn platform_label(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| "unknown".to_owned(), |s| s.to_string_lossy().into_owned())
        .replace('_', " ")
}

fn single_line(message: &str) -> String {
    message
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}
