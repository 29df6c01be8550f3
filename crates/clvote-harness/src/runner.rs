//! Bounded execution of one external command.
//!
//! The wait path and the deadline path race exactly once per invocation.
//! On unix the child is placed in its own process group so a timeout kill
//! takes its descendants with it — a lingering launcher process would
//! confound the next test's run.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use clvote_error::{Result, VoteError};
use tracing::warn;

/// How often the wait path re-checks the child between deadline checks.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Terminal outcome of one bounded run. Exactly one of these is returned;
/// the runner never hangs its caller.
#[derive(Debug)]
pub enum RunOutcome {
    /// The child terminated before the deadline.
    Completed {
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    /// The deadline elapsed first; the child was killed and reaped before
    /// this was returned.
    TimedOut,
}

impl RunOutcome {
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut)
    }
}

/// Executes commands with a hard wall-clock deadline.
#[derive(Debug, Clone, Copy)]
pub struct BoundedRunner {
    timeout: Duration,
}

impl BoundedRunner {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `command` to completion or to the deadline, whichever comes
    /// first. Output pipes are drained on background threads that are
    /// always joined before returning, so no work outlives the call.
    pub fn run(&self, command: &mut Command) -> Result<RunOutcome> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command.spawn().map_err(|source| VoteError::Spawn {
            command: format!("{command:?}"),
            source,
        })?;

        let stdout_drain = drain_pipe(child.stdout.take());
        let stderr_drain = drain_pipe(child.stderr.take());
        let deadline = Instant::now() + self.timeout;

        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(RunOutcome::Completed {
                    exit_code: status.code(),
                    stdout: join_drain(stdout_drain),
                    stderr: join_drain(stderr_drain),
                });
            }
            if Instant::now() >= deadline {
                kill_process_tree(&mut child);
                // Reap the child so the kill is observable before control
                // returns; this also closes the pipes and unblocks the
                // drain threads.
                child.wait()?;
                let _ = join_drain(stdout_drain);
                let _ = join_drain(stderr_drain);
                return Ok(RunOutcome::TimedOut);
            }
            thread::sleep(WAIT_POLL_INTERVAL);
        }
    }
}

fn drain_pipe<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut reader| {
        thread::spawn(move || {
            let mut bytes = Vec::new();
            if let Err(error) = reader.read_to_end(&mut bytes) {
                warn!(%error, "output pipe closed uncleanly");
            }
            String::from_utf8_lossy(&bytes).into_owned()
        })
    })
}

fn join_drain(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

/// Kill the child and, on unix, its whole process group. Failures here
/// are logged rather than propagated: the child may have exited between
/// the deadline check and the signal.
#[cfg(unix)]
fn kill_process_tree(child: &mut Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let group_killed = i32::try_from(child.id())
        .is_ok_and(|raw| killpg(Pid::from_raw(raw), Signal::SIGKILL).is_ok());
    if !group_killed {
        if let Err(error) = child.kill() {
            warn!(%error, pid = child.id(), "failed to kill timed-out child");
        }
    }
}

#[cfg(not(unix))]
fn kill_process_tree(child: &mut Child) {
    if let Err(error) = child.kill() {
        warn!(%error, pid = child.id(), "failed to kill timed-out child");
    }
}
