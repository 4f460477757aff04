//! Contract between the request pipeline and the external stereogram generator.

use std::{ffi::OsString, io, time::Duration};

use async_trait::async_trait;
use thiserror::Error;

/// Raw outcome of one generator run, handed to the response translator unmodified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResult {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl InvocationResult {
    pub fn new(exit_code: Option<i32>, stdout: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("generator could not be executed: permission denied")]
    PermissionDenied,
    #[error("failed to spawn generator: {0}")]
    Spawn(#[source] io::Error),
    #[error("failed while waiting for generator: {0}")]
    Wait(#[source] io::Error),
    #[error("generator did not finish within {after:?} and was terminated")]
    TimedOut { after: Duration },
    #[error("generator exited unsuccessfully (exit {exit_code:?}): {stderr}")]
    Failed {
        exit_code: Option<i32>,
        stderr: String,
    },
}

/// Runs the generator with the request-specific argument vector.
///
/// Implementations must pass every argument as a discrete token; no shell is involved.
#[async_trait]
pub trait GeneratorRunner: Send + Sync {
    async fn run(&self, args: Vec<OsString>) -> Result<InvocationResult, InvocationError>;
}
