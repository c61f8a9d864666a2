/// Execution Engine - External Process Invocation
///
/// **Core Responsibility:**
/// Run one external command (build, compile, link, or the test executable)
/// with a hard wall-clock timeout and capture its raw result.
///
/// **Critical Architectural Boundary:**
/// - Engine knows HOW to run a process
/// - Engine does NOT know which stage it is running
/// - Engine does NOT classify outcomes; the pipeline does
///
/// The `CommandRunner` trait is the seam between the pipeline state machine
/// and the operating system, so the state machine can be driven by a
/// scripted runner in tests.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

/// A fully resolved command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl StageCommand {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: cwd.into(),
        }
    }
}

impl fmt::Display for StageCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a process that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// What happened when a command was invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Completed(ProcessOutput),
    /// The budget ran out; the process has been killed.
    TimedOut { elapsed: Duration },
    /// The process could not be started or waited on.
    Failed { error: String },
}

pub trait CommandRunner {
    fn run(
        &self,
        command: &StageCommand,
        timeout: Duration,
    ) -> impl Future<Output = Invocation> + Send;
}

/// Runs commands as real child processes.
///
/// - stdin is closed, stdout/stderr are captured
/// - the child is killed when the timeout elapses (`kill_on_drop`)
/// - single attempt, no retries
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &StageCommand, timeout: Duration) -> Invocation {
        debug!(command = %command, cwd = %command.cwd.display(), "Running command");

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .current_dir(&command.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let start = Instant::now();
        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(command = %command, error = %e, "Failed to spawn command");
                return Invocation::Failed {
                    error: format!("failed to start {}: {}", command.program.display(), e),
                };
            }
        };

        // Dropping the wait future on timeout drops the child, which kills it.
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let result = ProcessOutput {
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    elapsed: start.elapsed(),
                };
                debug!(
                    exit_code = ?result.exit_code,
                    elapsed_ms = result.elapsed.as_millis() as u64,
                    "Command finished"
                );
                if !result.stdout.is_empty() {
                    debug!("stdout:\n{}", result.stdout);
                }
                if !result.stderr.is_empty() {
                    debug!("stderr:\n{}", result.stderr);
                }
                Invocation::Completed(result)
            }
            Ok(Err(e)) => {
                warn!(command = %command, error = %e, "Failed waiting for command");
                Invocation::Failed {
                    error: format!("failed waiting for {}: {}", command.program.display(), e),
                }
            }
            Err(_) => {
                let elapsed = start.elapsed();
                warn!(
                    command = %command,
                    timeout_s = timeout.as_secs_f64(),
                    "Command timed out and was killed"
                );
                Invocation::TimedOut { elapsed }
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> StageCommand {
        StageCommand::new(
            "sh",
            vec!["-c".to_string(), script.to_string()],
            std::env::temp_dir(),
        )
    }

    #[tokio::test]
    async fn test_captures_streams_and_exit_code() {
        let result = ProcessRunner
            .run(&sh("echo out; echo err >&2; exit 3"), Duration::from_secs(10))
            .await;

        match result {
            Invocation::Completed(output) => {
                assert_eq!(output.exit_code, Some(3));
                assert!(!output.success());
                assert_eq!(output.stdout, "out\n");
                assert_eq!(output.stderr, "err\n");
            }
            other => panic!("unexpected invocation result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_success() {
        let result = ProcessRunner
            .run(&sh("printf 8"), Duration::from_secs(10))
            .await;
        match result {
            Invocation::Completed(output) => {
                assert!(output.success());
                assert_eq!(output.stdout, "8");
            }
            other => panic!("unexpected invocation result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let start = Instant::now();
        let result = ProcessRunner
            .run(&sh("sleep 10"), Duration::from_millis(200))
            .await;

        assert!(matches!(result, Invocation::TimedOut { .. }));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_missing_program_fails() {
        let cmd = StageCommand::new("/no/such/program", vec![], std::env::temp_dir());
        let result = ProcessRunner.run(&cmd, Duration::from_secs(1)).await;
        assert!(matches!(result, Invocation::Failed { .. }));
    }

    #[test]
    fn test_display() {
        let cmd = StageCommand::new(
            "zig",
            vec!["cc".to_string(), "-o".to_string(), "dream".to_string()],
            "/tmp",
        );
        assert_eq!(cmd.to_string(), "zig cc -o dream");
    }
}
