//! Test runner adapter: runs the tutorial's test command and reduces the result
//! to pass/fail. Runner-internal problems (spawn errors, timeouts) are failures,
//! never errors.

use std::{path::PathBuf, process::Stdio, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{process::Command, sync::Mutex};
use tracing::{debug, info, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOutcome {
    Pass,
    Fail { message: String },
}

#[async_trait]
pub trait TestRunner: Send + Sync {
    async fn run_tests(&self) -> TestOutcome;
}

/// Runs the tests once and invokes exactly one of the callbacks exactly once,
/// returning whatever that callback returns.
pub async fn run<R, T, S, F>(runner: &R, on_success: S, on_fail: F) -> T
where
    R: TestRunner + ?Sized,
    S: FnOnce() -> T,
    F: FnOnce(String) -> T,
{
    match runner.run_tests().await {
        TestOutcome::Pass => on_success(),
        TestOutcome::Fail { message } => on_fail(message),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl TestCommand {
    /// Splits a command line on whitespace. Quoting is not supported.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub struct CommandTestRunner {
    command: TestCommand,
    cwd: PathBuf,
    timeout: Duration,
    // One run at a time; a second request waits for the first to finish.
    running: Mutex<()>,
}

impl CommandTestRunner {
    pub fn new(command: TestCommand, cwd: impl Into<PathBuf>) -> Self {
        Self {
            command,
            cwd: cwd.into(),
            timeout: DEFAULT_TIMEOUT,
            running: Mutex::new(()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn command(&self) -> &TestCommand {
        &self.command
    }
}

#[async_trait]
impl TestRunner for CommandTestRunner {
    async fn run_tests(&self) -> TestOutcome {
        let _guard = self.running.lock().await;
        let command_line = self.command.display();
        debug!(command = %command_line, cwd = %self.cwd.display(), "running tests");

        let child = Command::new(&self.command.program)
            .args(&self.command.args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                warn!(command = %command_line, error = %err, "failed to start test command");
                return TestOutcome::Fail {
                    message: format!("failed to start test command '{command_line}': {err}"),
                };
            }
            Err(_) => {
                warn!(command = %command_line, timeout_secs = self.timeout.as_secs_f64(), "test command timed out");
                return TestOutcome::Fail {
                    message: format!(
                        "test command timed out after {:.1}s",
                        self.timeout.as_secs_f64()
                    ),
                };
            }
        };

        if output.status.success() {
            info!(command = %command_line, "tests passed");
            return TestOutcome::Pass;
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = failure_message(&stdout, &stderr, output.status.code());
        info!(command = %command_line, %message, "tests failed");
        TestOutcome::Fail { message }
    }
}

/// Picks the most useful line to show for a failed run: the first TAP
/// `not ok` line, then the last stderr line, then the last stdout line.
pub fn failure_message(stdout: &str, stderr: &str, code: Option<i32>) -> String {
    if let Some(line) = stdout
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("not ok"))
    {
        return line.to_string();
    }

    let last_line = |text: &str| {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .map(str::to_string)
    };

    last_line(stderr)
        .or_else(|| last_line(stdout))
        .unwrap_or_else(|| match code {
            Some(code) => format!("test command exited with status {code}"),
            None => "test command terminated by signal".to_string(),
        })
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
