//! Replacement-preferring artifact merge.
//!
//! A pure text transform used to splice re-run results into an existing
//! artifact: the output follows the original's test ordering, and any
//! block whose header also appears in the replacement artifact is taken
//! from the replacement verbatim. Blocks only the replacement knows about
//! are dropped.

use std::fs;
use std::path::Path;

use clvote_error::Result;
use clvote_types::RESULT_HEADER_PREFIX;
use tracing::warn;

/// One raw block: the header key (header line without its line ending)
/// plus the block's exact bytes, header included.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RawBlock {
    header: String,
    text: String,
}

/// Split artifact text into raw blocks, preserving every byte. Text
/// before the first header has no identity and cannot be merged; it is
/// dropped with a warning.
fn raw_blocks(text: &str) -> Vec<RawBlock> {
    let mut blocks: Vec<RawBlock> = Vec::new();
    for line in text.split_inclusive('\n') {
        let stripped = line.strip_suffix('\n').unwrap_or(line);
        if stripped.trim_start().starts_with(RESULT_HEADER_PREFIX) {
            blocks.push(RawBlock {
                header: stripped.to_owned(),
                text: line.to_owned(),
            });
        } else if let Some(block) = blocks.last_mut() {
            block.text.push_str(line);
        } else if !stripped.trim().is_empty() {
            warn!(line = stripped, "text before first header, dropped by merge");
        }
    }
    blocks
}

/// Merge two artifacts, preferring the replacement's block wherever both
/// carry an identical header (exact text match, size annotation included).
#[must_use]
pub fn merge_artifacts(original: &str, replacement: &str) -> String {
    let replacements = raw_blocks(replacement);
    let mut merged = String::with_capacity(original.len());
    for block in raw_blocks(original) {
        let substitute = replacements.iter().find(|r| r.header == block.header);
        merged.push_str(&substitute.unwrap_or(&block).text);
    }
    merged
}

pub fn merge_files(original: &Path, replacement: &Path) -> Result<String> {
    let original_text = fs::read_to_string(original)?;
    let replacement_text = fs::read_to_string(replacement)?;
    Ok(merge_artifacts(&original_text, &replacement_text))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGINAL: &str = "RESULTS FOR a.cl (10)\n0x5,\nRESULTS FOR b.cl (20)\ntimeout\nRESULTS FOR c.cl\n0x1, 0x2,\n";

    #[test]
    fn self_merge_is_identity() {
        assert_eq!(merge_artifacts(ORIGINAL, ORIGINAL), ORIGINAL);
    }

    #[test]
    fn replacement_block_wins_on_exact_header_match() {
        let replacement = "RESULTS FOR b.cl (20)\n0x9,\n";
        let merged = merge_artifacts(ORIGINAL, replacement);
        assert_eq!(
            merged,
            "RESULTS FOR a.cl (10)\n0x5,\nRESULTS FOR b.cl (20)\n0x9,\nRESULTS FOR c.cl\n0x1, 0x2,\n"
        );
    }

    #[test]
    fn header_match_is_exact_including_size_annotation() {
        // Same test name, different annotation: not a match.
        let replacement = "RESULTS FOR b.cl (21)\n0x9,\n";
        assert_eq!(merge_artifacts(ORIGINAL, replacement), ORIGINAL);
    }

    #[test]
    fn replacement_only_blocks_are_dropped() {
        let replacement = "RESULTS FOR z.cl\n0xFF,\n";
        let merged = merge_artifacts(ORIGINAL, replacement);
        assert!(!merged.contains("z.cl"));
        assert_eq!(merged, ORIGINAL);
    }

    #[test]
    fn multi_line_bodies_move_as_a_unit() {
        let original = "RESULTS FOR a.cl\nrun_error: stage one\nextra context\n";
        let replacement = "RESULTS FOR a.cl\n0x5,\n";
        assert_eq!(merge_artifacts(original, replacement), replacement);
    }

    #[test]
    fn missing_trailing_newline_survives_self_merge() {
        let original = "RESULTS FOR a.cl\n0x5,";
        assert_eq!(merge_artifacts(original, original), original);
    }
}
