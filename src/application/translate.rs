//! Interprets a finished generator run and shapes the client-facing envelope.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    error::GenerationError,
    generator::{InvocationError, InvocationResult},
};

/// Status code assumed when the generator omits one (older protocol revision).
pub const DEFAULT_REPORTED_CODE: u16 = 200;

/// Exit status the generator uses when it cannot be executed.
const EXIT_PERMISSION_DENIED: i32 = 126;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("generator exited successfully but printed nothing")]
    EmptyOutput,
    #[error("generator output is not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("generator reported an unusable file name `{0}`")]
    InvalidFileName(String),
    #[error("generator reported failure (code {code}): {text}")]
    ReportedFailure { code: u16, text: String },
}

#[derive(Debug, Deserialize)]
struct GeneratorReport {
    text: String,
    #[serde(default)]
    code: Option<u16>,
}

/// A generated image, addressed relative to the site root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedImage {
    #[serde(rename = "text")]
    pub url: String,
    pub code: u16,
}

/// JSON body returned for every generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResponseEnvelope {
    Success(GeneratedImage),
    Failure { error: String },
}

impl From<GeneratedImage> for ResponseEnvelope {
    fn from(image: GeneratedImage) -> Self {
        Self::Success(image)
    }
}

/// Translate a generator outcome into a servable image or a server-side error.
pub fn translate(
    result: InvocationResult,
    public_output_path: &str,
) -> Result<GeneratedImage, GenerationError> {
    match result.exit_code {
        Some(0) => {}
        Some(EXIT_PERMISSION_DENIED) => return Err(InvocationError::PermissionDenied.into()),
        exit_code => {
            return Err(InvocationError::Failed {
                exit_code,
                stderr: result.stderr,
            }
            .into());
        }
    }

    // Diagnostics may precede the result; the report is the last non-empty line.
    let line = result
        .stdout
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .ok_or(ProtocolError::EmptyOutput)?;

    let report: GeneratorReport = serde_json::from_str(line).map_err(ProtocolError::Malformed)?;
    let code = report.code.unwrap_or(DEFAULT_REPORTED_CODE);
    if !(200..300).contains(&code) {
        return Err(ProtocolError::ReportedFailure {
            code,
            text: report.text,
        }
        .into());
    }

    if !is_bare_file_name(&report.text) {
        return Err(ProtocolError::InvalidFileName(report.text).into());
    }

    let prefix = public_output_path.trim_matches('/');
    Ok(GeneratedImage {
        url: format!("{prefix}/{}", report.text),
        code,
    })
}

fn is_bare_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}
