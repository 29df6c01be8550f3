//! HTML comparison table: one row per test, golden verdict beside every
//! platform's record, with mismatch/error highlighting for human triage.

use std::collections::BTreeMap;
use std::fmt::Write;

use clvote_types::{GoldenResult, ResultRecord, ResultStatus};

use crate::reconcile::ReconcileInput;

/// Maximum value tokens displayed per cell before the remainder collapses
/// into an ellipsis marker. Bounds report size for value-heavy kernels.
pub const MAX_TOKENS_PER_CELL: usize = 20;

/// Marker emitted in place of truncated tokens.
pub const ELLIPSIS_MARKER: &str = "...";

/// Rendered in place of a record when a platform never ran the test.
pub const MISSING_RECORD: &str = "N/A";

/// Visual classification of one table cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellMark {
    Plain,
    Inconclusive,
    Mismatch,
    Error,
}

impl CellMark {
    const fn css_class(self) -> &'static str {
        match self {
            Self::Plain => "",
            Self::Inconclusive => "inconclusive",
            Self::Mismatch => "mismatch",
            Self::Error => "error",
        }
    }
}

/// Render the full report. Row order follows the test-name ordering of
/// `input.tests`; column order follows the platform-label ordering.
#[must_use]
pub fn render_html(
    input: &ReconcileInput,
    golden: &BTreeMap<String, GoldenResult>,
) -> String {
    let mut out = String::new();
    out.push_str(HTML_PROLOGUE);

    out.push_str("<tr><th>Program</th><th>Golden</th>");
    for platform in input.platforms.keys() {
        let _ = write!(out, "<th>{}</th>", escape(platform));
    }
    out.push_str("</tr>\n");

    for (test, line_count) in &input.tests {
        let verdict = golden.get(test).unwrap_or(&GoldenResult::Inconclusive);
        out.push_str("<tr>");

        let _ = write!(out, "<td>{}", escape(test));
        if let Some(lines) = line_count {
            let _ = write!(out, "<br/>Lines: {lines}");
        }
        out.push_str("</td>");

        let golden_mark = if verdict.is_conclusive() {
            CellMark::Plain
        } else {
            CellMark::Inconclusive
        };
        push_cell(&mut out, golden_mark, &golden_cell_lines(verdict));

        for records in input.platforms.values() {
            let record = records.get(test);
            push_cell(
                &mut out,
                platform_cell_mark(record, verdict),
                &platform_cell_lines(record),
            );
        }
        out.push_str("</tr>\n");
    }

    out.push_str(HTML_EPILOGUE);
    out
}

/// A platform cell is an error when the run failed, a mismatch when its
/// value set differs from a conclusive golden set (missing coverage and
/// timeouts always differ), and unmarked under an inconclusive golden.
fn platform_cell_mark(record: Option<&ResultRecord>, golden: &GoldenResult) -> CellMark {
    if matches!(record.map(|r| &r.status), Some(ResultStatus::RunError(_))) {
        return CellMark::Error;
    }
    let GoldenResult::Conclusive(expected) = golden else {
        return CellMark::Plain;
    };
    match record.map(|r| &r.status) {
        Some(ResultStatus::Ok(values)) if values == expected => CellMark::Plain,
        _ => CellMark::Mismatch,
    }
}

fn golden_cell_lines(verdict: &GoldenResult) -> Vec<String> {
    match verdict {
        GoldenResult::Conclusive(values) => values.tokens().map(str::to_owned).collect(),
        GoldenResult::Inconclusive => vec![clvote_types::INCONCLUSIVE_SENTINEL.to_owned()],
    }
}

fn platform_cell_lines(record: Option<&ResultRecord>) -> Vec<String> {
    match record.map(|r| &r.status) {
        Some(ResultStatus::Ok(values)) => values.tokens().map(str::to_owned).collect(),
        Some(status) => vec![status.render_line()],
        None => vec![MISSING_RECORD.to_owned()],
    }
}

fn push_cell(out: &mut String, mark: CellMark, lines: &[String]) {
    if mark == CellMark::Plain {
        out.push_str("<td>");
    } else {
        let _ = write!(out, "<td class=\"{}\">", mark.css_class());
    }
    for (count, line) in lines.iter().enumerate() {
        if count >= MAX_TOKENS_PER_CELL {
            let _ = write!(out, "{ELLIPSIS_MARKER}<br/>");
            break;
        }
        let _ = write!(out, "{}<br/>", escape(line));
    }
    out.push_str("</td>");
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

const HTML_PROLOGUE: &str = "<!doctype html>\n<html>\n<head>\n<title>Compiler testing results</title>\n<style type=\"text/css\">\ntable { table-layout: fixed; word-wrap: break-word; border-collapse: collapse; }\ntd, th { width: 200px; text-align: center; border: 1px solid #ccc; padding: 4px; }\nth { background-color: #D5ECFF; }\ntd.inconclusive { background-color: #ffef9e; }\ntd.mismatch { background-color: #ff9e9e; }\ntd.error { background-color: #9ebaff; }\n</style>\n</head>\n<body>\n<table>\n";

const HTML_EPILOGUE: &str = "</table>\n</body>\n</html>\n";

#[cfg(test)]
mod tests {
    use super::*;
    use clvote_types::ValueSet;

    fn record(platform: &str, test: &str, status: ResultStatus) -> ResultRecord {
        ResultRecord {
            platform: platform.to_owned(),
            test_name: test.to_owned(),
            status,
        }
    }

    fn input_with(platform_statuses: &[(&str, ResultStatus)]) -> ReconcileInput {
        let mut input = ReconcileInput::default();
        input.tests.insert("t.cl".to_owned(), Some(42));
        for (platform, status) in platform_statuses {
            let mut records = BTreeMap::new();
            records.insert("t.cl".to_owned(), record(platform, "t.cl", status.clone()));
            input.platforms.insert((*platform).to_owned(), records);
        }
        input
    }

    fn conclusive(tokens: &[&str]) -> GoldenResult {
        GoldenResult::Conclusive(ValueSet::from_tokens(tokens.iter().copied()))
    }

    #[test]
    fn disagreeing_platform_is_marked_mismatch() {
        let input = input_with(&[
            ("a", ResultStatus::Ok(ValueSet::from_tokens(["0x5"]))),
            ("d", ResultStatus::Ok(ValueSet::from_tokens(["0x9"]))),
        ]);
        let mut golden = BTreeMap::new();
        golden.insert("t.cl".to_owned(), conclusive(&["0x5"]));

        let html = render_html(&input, &golden);
        assert_eq!(html.matches("class=\"mismatch\"").count(), 1);
        assert!(html.contains("0x9"));
    }

    #[test]
    fn run_error_overrides_mismatch() {
        let input = input_with(&[(
            "a",
            ResultStatus::RunError("CL_OUT_OF_RESOURCES".to_owned()),
        )]);
        let mut golden = BTreeMap::new();
        golden.insert("t.cl".to_owned(), conclusive(&["0x5"]));

        let html = render_html(&input, &golden);
        assert!(html.contains("class=\"error\""));
        assert!(!html.contains("class=\"mismatch\""));
    }

    #[test]
    fn inconclusive_rows_flag_golden_but_never_mismatch() {
        let input = input_with(&[
            ("a", ResultStatus::Ok(ValueSet::from_tokens(["0x5"]))),
            ("b", ResultStatus::Timeout),
        ]);
        let mut golden = BTreeMap::new();
        golden.insert("t.cl".to_owned(), GoldenResult::Inconclusive);

        let html = render_html(&input, &golden);
        assert!(html.contains("class=\"inconclusive\""));
        assert!(!html.contains("class=\"mismatch\""));
    }

    #[test]
    fn missing_coverage_renders_na_and_counts_as_mismatch() {
        let mut input = input_with(&[(
            "a",
            ResultStatus::Ok(ValueSet::from_tokens(["0x5"])),
        )]);
        // Platform `b` exists but never ran t.cl.
        input.platforms.insert("b".to_owned(), BTreeMap::new());
        let mut golden = BTreeMap::new();
        golden.insert("t.cl".to_owned(), conclusive(&["0x5"]));

        let html = render_html(&input, &golden);
        assert!(html.contains(MISSING_RECORD));
        assert_eq!(html.matches("class=\"mismatch\"").count(), 1);
    }

    #[test]
    fn oversized_value_lists_truncate_with_ellipsis() {
        let tokens: Vec<String> = (0..MAX_TOKENS_PER_CELL + 15)
            .map(|i| format!("{i:X}"))
            .collect();
        let values = ValueSet::from_tokens(tokens.iter().map(String::as_str));
        let input = input_with(&[("a", ResultStatus::Ok(values.clone()))]);
        let mut golden = BTreeMap::new();
        golden.insert("t.cl".to_owned(), GoldenResult::Conclusive(values));

        let html = render_html(&input, &golden);
        assert!(html.contains(ELLIPSIS_MARKER));
    }

    #[test]
    fn line_count_annotation_appears_under_the_test_name() {
        let input = input_with(&[("a", ResultStatus::Ok(ValueSet::from_tokens(["0x5"])))]);
        let html = render_html(&input, &BTreeMap::new());
        assert!(html.contains("Lines: 42"));
    }

    #[test]
    fn error_messages_are_html_escaped() {
        let input = input_with(&[(
            "a",
            ResultStatus::RunError("<kernel> failed & aborted".to_owned()),
        )]);
        let html = render_html(&input, &BTreeMap::new());
        assert!(html.contains("&lt;kernel&gt; failed &amp; aborted"));
        assert!(!html.contains("<kernel>"));
    }
}
