use std::{io, net::SocketAddr, path::PathBuf};

use thiserror::Error;

use crate::config::LoadError;

/// Failures that stop the service before it can accept requests.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] LoadError),
    #[error("failed to install tracing subscriber: {0}")]
    Telemetry(String),
    #[error("cannot prepare {role} directory {path:?}: {source}")]
    Directory {
        role: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

impl InfraError {
    /// Error constructor for `map_err` on a directory preparation step.
    pub fn directory(
        role: &'static str,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Directory { role, path, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_failures_name_the_role_and_path() {
        let err = InfraError::directory("staging", "/srv/staging")(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert_eq!(
            err.to_string(),
            "cannot prepare staging directory \"/srv/staging\": denied"
        );
    }
}
