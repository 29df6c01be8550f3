//! Classification of raw runner outcomes into result statuses.
//!
//! This is the only place raw launcher output is interpreted. Everything
//! downstream matches on the resulting [`ResultStatus`] tag.

use clvote_error::{Result, VoteError};
use clvote_types::{DEVICE_MISMATCH_MARKER, ResultStatus, ValueSet};

use crate::runner::RunOutcome;

/// Launcher banner lines that carry no diagnostic value. They are dropped
/// before a run-error message is extracted.
pub const LAUNCHER_NOISE_PREFIXES: &[&str] = &["Platform:", "Device:", "Compiling kernel"];

/// Map a bounded-run outcome to a per-test status.
///
/// # Errors
///
/// Returns [`VoteError::DeviceMismatch`] when the launcher reports that
/// the requested device could not be matched — that diagnostic means the
/// environment, not the test, is broken, and the whole batch must stop.
pub fn normalize_outcome(outcome: &RunOutcome) -> Result<ResultStatus> {
    let RunOutcome::Completed {
        exit_code,
        stdout,
        stderr,
    } = outcome
    else {
        return Ok(ResultStatus::Timeout);
    };

    if let Some(diagnostic) = find_device_mismatch(stdout).or_else(|| find_device_mismatch(stderr))
    {
        return Err(VoteError::DeviceMismatch { diagnostic });
    }

    if *exit_code != Some(0) {
        return Ok(ResultStatus::RunError(diagnostic_message(stderr, stdout)));
    }

    Ok(ResultStatus::Ok(ValueSet::parse(stdout)))
}

fn find_device_mismatch(output: &str) -> Option<String> {
    output
        .lines()
        .find(|line| line.contains(DEVICE_MISMATCH_MARKER))
        .map(|line| line.trim().to_owned())
}

/// Pick the first meaningful diagnostic line: stderr first, then stdout,
/// skipping known banner noise.
fn diagnostic_message(stderr: &str, stdout: &str) -> String {
    first_signal_line(stderr)
        .or_else(|| first_signal_line(stdout))
        .unwrap_or_else(|| "launcher exited with failure status".to_owned())
}

fn first_signal_line(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| {
            !line.is_empty()
                && !LAUNCHER_NOISE_PREFIXES
                    .iter()
                    .any(|prefix| line.starts_with(prefix))
        })
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clvote_types::ValueSet;

    fn completed(exit_code: i32, stdout: &str, stderr: &str) -> RunOutcome {
        RunOutcome::Completed {
            exit_code: Some(exit_code),
            stdout: stdout.to_owned(),
            stderr: stderr.to_owned(),
        }
    }

    #[test]
    fn clean_exit_normalizes_tokens_into_a_set() {
        let status = normalize_outcome(&completed(0, "5,1A,0x5,\n", "")).unwrap();
        assert_eq!(
            status,
            ResultStatus::Ok(ValueSet::from_tokens(["0x5", "0x1A"]))
        );
    }

    #[test]
    fn timeout_outcome_maps_to_timeout_status() {
        let status = normalize_outcome(&RunOutcome::TimedOut).unwrap();
        assert_eq!(status, ResultStatus::Timeout);
    }

    #[test]
    fn failed_exit_takes_first_non_noise_diagnostic_line() {
        let stderr = "Platform: Intel OpenCL\nDevice: HD Graphics 4600\nCL_BUILD_PROGRAM_FAILURE\n";
        let status = normalize_outcome(&completed(1, "", stderr)).unwrap();
        assert_eq!(
            status,
            ResultStatus::RunError("CL_BUILD_PROGRAM_FAILURE".to_owned())
        );
    }

    #[test]
    fn failed_exit_with_silent_streams_still_carries_a_message() {
        let status = normalize_outcome(&completed(2, "", "")).unwrap();
        let ResultStatus::RunError(message) = status else {
            panic!("expected RunError");
        };
        assert!(!message.is_empty());
    }

    #[test]
    fn device_mismatch_escalates_instead_of_recording() {
        let stdout = format!("{DEVICE_MISMATCH_MARKER} `Tahiti`\n");
        let err = normalize_outcome(&completed(1, &stdout, "")).unwrap_err();
        assert!(err.is_device_mismatch(), "got: {err}");
    }
}
