//! External command execution.
//!
//! Every git and gh invocation goes through a [`Runner`]. A non-zero exit is
//! not an error here: the exit code comes back in [`CommandOutput`] and the
//! caller decides what it means. Only a failure to spawn or a timeout is
//! reported as an error.

use std::{
    io::Read,
    path::Path,
    process::{Command, Stdio},
    thread,
    time::{Duration, Instant},
};

use crate::error::{Result, SyncError};

/// Poll interval while waiting on a child with a deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Captured result of one external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Stdout and stderr joined, for matching tool messages that may land on either.
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }

    /// Pass through on success, otherwise build an error from the output.
    pub fn ok_or_else(self, err: impl FnOnce(&Self) -> SyncError) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(err(&self))
        }
    }

    /// The most useful single-line summary of a failure.
    pub fn message(&self) -> String {
        let stderr = self.stderr.trim();
        let text = if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        };
        format!("exit {}: {text}", self.code)
    }
}

/// Runs external commands in an explicit working directory.
pub trait Runner {
    fn run(&self, argv: &[&str], cwd: &Path) -> Result<CommandOutput>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl Runner for SystemRunner {
    fn run(&self, argv: &[&str], cwd: &Path) -> Result<CommandOutput> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| SyncError::Config("empty command line".to_string()))?;
        let command_line = argv.join(" ");
        tracing::info!(cwd = %cwd.display(), "$ {command_line}");

        let mut child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SyncError::Spawn {
                program: (*program).to_string(),
                source,
            })?;

        // Drain both pipes on their own threads so a chatty child never blocks.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = match self.timeout {
            None => child.wait()?,
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                loop {
                    if let Some(status) = child.try_wait()? {
                        break status;
                    }
                    if Instant::now() >= deadline {
                        // The child may exit between the check and the kill.
                        let _ = child.kill();
                        let _ = child.wait();
                        tracing::error!(cwd = %cwd.display(), "timed out: {command_line}");
                        return Err(SyncError::Timeout {
                            command: command_line,
                            timeout,
                        });
                    }
                    thread::sleep(POLL_INTERVAL);
                }
            }
        };

        let output = CommandOutput {
            stdout: stdout.map(join_drain).unwrap_or_default(),
            stderr: stderr.map(join_drain).unwrap_or_default(),
            // Killed by a signal.
            code: status.code().unwrap_or(-1),
        };

        tracing::debug!(
            cwd = %cwd.display(),
            code = output.code,
            stdout = %output.stdout.trim_end(),
            stderr = %output.stderr.trim_end(),
            "finished: {command_line}"
        );

        Ok(output)
    }
}

fn drain(mut pipe: impl Read + Send + 'static) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_drain(handle: thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}


#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn captures_stdout_and_exit_code() {
        let dir = TempDir::new().unwrap();
        let runner = SystemRunner::default();

        let out = runner
            .run(&["sh", "-c", "echo hello; echo oops >&2; exit 3"], dir.path())
            .unwrap();

        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr.trim(), "oops");
        assert_eq!(out.code, 3);
        assert!(!out.success());
    }

    #[test]
    fn runs_in_the_given_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();

        let out = SystemRunner::default()
            .run(&["ls"], dir.path())
            .unwrap();

        assert!(out.stdout.contains("marker.txt"));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let dir = TempDir::new().unwrap();
        let err = SystemRunner::default()
            .run(&["definitely-not-a-real-program-xyz"], dir.path())
            .unwrap_err();

        assert!(matches!(err, SyncError::Spawn { .. }));
    }

    #[test]
    fn slow_command_times_out() {
        let dir = TempDir::new().unwrap();
        let runner = SystemRunner::new(Some(Duration::from_millis(200)));

        let err = runner.run(&["sleep", "5"], dir.path()).unwrap_err();

        assert!(matches!(err, SyncError::Timeout { .. }));
    }

    #[test]
    fn message_prefers_stderr() {
        let out = CommandOutput {
            stdout: "noise".into(),
            stderr: "fatal: not a git repository\n".into(),
            code: 128,
        };
        assert_eq!(out.message(), "exit 128: fatal: not a git repository");
    }
}
