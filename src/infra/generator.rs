//! Runs the external stereogram generator as a child process.

use std::{
    ffi::OsString,
    io::ErrorKind,
    path::PathBuf,
    process::Stdio,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use metrics::histogram;
use tokio::process::Command;
use tracing::{info, warn};

use crate::application::generator::{GeneratorRunner, InvocationError, InvocationResult};

pub const METRIC_GENERATOR_MS: &str = "stereogramaxo_generator_ms";

const SOURCE: &str = "infra::generator";

/// Generator invoked directly (no shell) with a bounded wait.
#[derive(Debug, Clone)]
pub struct ProcessGenerator {
    program: PathBuf,
    leading_args: Vec<OsString>,
    timeout: Duration,
}

impl ProcessGenerator {
    pub fn new(program: PathBuf, leading_args: Vec<OsString>, timeout: Duration) -> Self {
        Self {
            program,
            leading_args,
            timeout,
        }
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }

    pub fn leading_args(&self) -> &[OsString] {
        &self.leading_args
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl GeneratorRunner for ProcessGenerator {
    async fn run(&self, args: Vec<OsString>) -> Result<InvocationResult, InvocationError> {
        let started_at = Instant::now();

        let child = Command::new(&self.program)
            .args(&self.leading_args)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                warn!(
                    target = SOURCE,
                    op = "generator::run",
                    result = "error",
                    error_code = "spawn",
                    program = %self.program.display(),
                    error = %err,
                    "Failed to spawn generator"
                );
                if err.kind() == ErrorKind::PermissionDenied {
                    InvocationError::PermissionDenied
                } else {
                    InvocationError::Spawn(err)
                }
            })?;

        // Dropping the wait future on timeout kills the child (kill_on_drop).
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(waited) => waited.map_err(InvocationError::Wait)?,
            Err(_) => {
                warn!(
                    target = SOURCE,
                    op = "generator::run",
                    result = "timeout",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Generator timed out and was terminated"
                );
                return Err(InvocationError::TimedOut {
                    after: self.timeout,
                });
            }
        };

        let elapsed = started_at.elapsed();
        histogram!(METRIC_GENERATOR_MS).record(elapsed.as_secs_f64() * 1000.0);

        let result = InvocationResult {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        info!(
            target = SOURCE,
            op = "generator::run",
            result = "exited",
            elapsed_ms = elapsed.as_millis() as u64,
            exit_code = result.exit_code.map(i64::from).unwrap_or(-1),
            stdout_bytes = result.stdout.len(),
            stderr = %result.stderr.trim(),
            "Generator finished"
        );

        Ok(result)
    }
}
