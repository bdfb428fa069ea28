//! External test programs (reproduction and invariant gates).
//!
//! The only contract is the exit status. Output is passed through untouched and
//! nothing is retried: one attempt, zero means pass.
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Result of a test program that actually ran.
///
/// Failing to locate or start the program is an `Err` from [`TestProgram::run`],
/// never one of these variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TestOutcome {
    Passed,
    Failed { exit_code: Option<i32> },
    TimedOut { seconds: u64 },
}

pub trait TestProgram {
    /// Command line as shown to the operator.
    fn describe(&self) -> String;
    fn run(&self) -> Result<TestOutcome>;
}

/// Where the child's stdout goes. Stderr is always inherited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputRoute {
    Inherit,
    /// Keeps our own stdout clean for machine-readable output.
    Stderr,
}

#[derive(Debug, Clone)]
pub struct ProcessTest {
    argv: Vec<String>,
    cwd: PathBuf,
    timeout: Option<Duration>,
    route: OutputRoute,
}

impl ProcessTest {
    pub fn new(argv: Vec<String>, cwd: &Path) -> Self {
        Self {
            argv,
            cwd: cwd.to_path_buf(),
            timeout: None,
            route: OutputRoute::Inherit,
        }
    }

    pub fn with_timeout(mut self, seconds: Option<u64>) -> Self {
        self.timeout = seconds.map(Duration::from_secs);
        self
    }

    pub fn with_route(mut self, route: OutputRoute) -> Self {
        self.route = route;
        self
    }

    /// Resolve argv[0]: bare names through `PATH`, anything with a separator
    /// relative to the working directory.
    fn resolve_program(&self) -> Result<PathBuf> {
        let program = self
            .argv
            .first()
            .ok_or_else(|| anyhow!("test command is empty"))?;
        let as_path = Path::new(program);
        if as_path.components().count() > 1 || as_path.is_absolute() {
            let resolved = if as_path.is_absolute() {
                as_path.to_path_buf()
            } else {
                self.cwd.join(as_path)
            };
            if !resolved.is_file() {
                return Err(anyhow!("test program not found: {}", resolved.display()));
            }
            return resolved
                .canonicalize()
                .with_context(|| format!("resolve {}", resolved.display()));
        }
        which::which(program).with_context(|| format!("test program not found on PATH: {program}"))
    }
}

impl TestProgram for ProcessTest {
    fn describe(&self) -> String {
        shell_words::join(&self.argv)
    }

    fn run(&self) -> Result<TestOutcome> {
        let program = self.resolve_program()?;
        let mut cmd = Command::new(&program);
        cmd.args(&self.argv[1..]).current_dir(&self.cwd);
        if self.route == OutputRoute::Stderr {
            cmd.stdout(Stdio::from(std::io::stderr()));
        }
        tracing::info!(command = %self.describe(), "starting test program");
        let started = Instant::now();
        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawn {}", program.display()))?;

        loop {
            if let Some(status) = child
                .try_wait()
                .with_context(|| format!("wait for {}", program.display()))?
            {
                tracing::info!(
                    exit_code = ?status.code(),
                    elapsed_ms = started.elapsed().as_millis(),
                    "test program exited"
                );
                return Ok(if status.success() {
                    TestOutcome::Passed
                } else {
                    TestOutcome::Failed {
                        exit_code: status.code(),
                    }
                });
            }
            if let Some(timeout) = self.timeout {
                if started.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    tracing::warn!(
                        command = %self.describe(),
                        seconds = timeout.as_secs(),
                        "test program timed out and was killed"
                    );
                    return Ok(TestOutcome::TimedOut {
                        seconds: timeout.as_secs(),
                    });
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}
