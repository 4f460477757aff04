use std::error::Error as StdError;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::infra::{error::InfraError, staging::UploadError};

use super::{
    generator::InvocationError,
    translate::{ProtocolError, ResponseEnvelope},
    validation::ValidationError,
};

const PERMISSION_MESSAGE: &str = "permission issue on server";
const TIMEOUT_MESSAGE: &str = "image generation timed out";
const UPLOAD_MESSAGE: &str = "unable to store uploaded file";
const UNKNOWN_MESSAGE: &str = "unknown server error";

/// Internal diagnostics attached to a response for the logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    /// Failure class such as `validation_error`; `None` for plain HTTP errors.
    pub kind: Option<&'static str>,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            kind: None,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            kind: None,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn with_kind(mut self, kind: &'static str) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Plain-text error for routes outside the JSON generation contract.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn with_kind(mut self, kind: &'static str) -> Self {
        self.report = self.report.with_kind(kind);
        self
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

/// Terminal failure of one generation request, tagged with the stage that produced it.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Invocation(#[from] InvocationError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl GenerationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GenerationError::Validation(_) => StatusCode::BAD_REQUEST,
            GenerationError::Upload(_)
            | GenerationError::Invocation(_)
            | GenerationError::Protocol(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client. Server-side causes stay generic.
    pub fn public_message(&self) -> String {
        match self {
            GenerationError::Validation(err) => err.to_string(),
            GenerationError::Upload(_) => UPLOAD_MESSAGE.to_string(),
            GenerationError::Invocation(InvocationError::PermissionDenied) => {
                PERMISSION_MESSAGE.to_string()
            }
            GenerationError::Invocation(InvocationError::TimedOut { .. }) => {
                TIMEOUT_MESSAGE.to_string()
            }
            GenerationError::Invocation(_) | GenerationError::Protocol(_) => {
                UNKNOWN_MESSAGE.to_string()
            }
        }
    }

    /// Short label used for logs and the outcome metric.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::Validation(_) => "validation_error",
            GenerationError::Upload(_) => "upload_error",
            GenerationError::Invocation(_) => "invocation_error",
            GenerationError::Protocol(_) => "protocol_error",
        }
    }

    pub fn envelope(&self) -> ResponseEnvelope {
        ResponseEnvelope::Failure {
            error: self.public_message(),
        }
    }
}

impl IntoResponse for GenerationError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, Json(self.envelope())).into_response();
        ErrorReport::from_error("application::generation", status, &self)
            .with_kind(self.kind())
            .attach(&mut response);
        response
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn validation_errors_are_client_errors_with_specific_messages() {
        let err = GenerationError::from(ValidationError::InvalidBlur);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "Invalid blur value");
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn server_errors_do_not_leak_details() {
        let err = GenerationError::from(InvocationError::Failed {
            exit_code: Some(1),
            stderr: "/home/generator/sirds.py: line 3".into(),
        });
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), UNKNOWN_MESSAGE);

        let err = GenerationError::from(InvocationError::TimedOut {
            after: Duration::from_secs(3),
        });
        assert_eq!(err.public_message(), TIMEOUT_MESSAGE);

        let err = GenerationError::from(UploadError::OutsideStagingRoot);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), UPLOAD_MESSAGE);
    }

    #[test]
    fn response_carries_json_envelope_and_report() {
        let response = GenerationError::from(ValidationError::MissingModes).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert_eq!(report.status, StatusCode::BAD_REQUEST);
        assert_eq!(report.kind, Some("validation_error"));
        assert_eq!(
            report.messages.first().map(String::as_str),
            Some("You must select a depthmap and pattern mode")
        );
    }
}
