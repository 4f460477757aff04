//! `POST /generate`: read the multipart form, hand it to the generation pipeline.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{
    Multipart,
    multipart::{Field, MultipartError, MultipartRejection},
};
use thiserror::Error;
use tracing::warn;

use crate::{
    application::{
        error::{ErrorReport, GenerationError},
        translate::ResponseEnvelope,
        validation::{FormSubmission, fields},
    },
    infra::staging::{ReceivedUpload, StagingArea, UploadError},
};

use super::HttpState;

const SOURCE: &str = "infra::http::generate";

/// File parts that are spooled to the staging area; any other file part is ignored.
const FILE_FIELDS: [&str; 2] = [fields::DEPTH_FILE, fields::PATTERN_FILE];

#[derive(Debug, Error)]
enum SubmissionError {
    #[error("request body too large")]
    TooLarge,
    #[error("malformed multipart request")]
    Malformed(String),
    #[error(transparent)]
    Upload(#[from] UploadError),
}

impl IntoResponse for SubmissionError {
    fn into_response(self) -> Response {
        let (status, report) = match self {
            SubmissionError::Upload(err) => return GenerationError::from(err).into_response(),
            SubmissionError::TooLarge => {
                let status = StatusCode::PAYLOAD_TOO_LARGE;
                (status, ErrorReport::from_error(SOURCE, status, &self))
            }
            SubmissionError::Malformed(ref detail) => {
                let status = StatusCode::BAD_REQUEST;
                (status, ErrorReport::from_message(SOURCE, status, detail.clone()))
            }
        };
        let envelope = ResponseEnvelope::Failure {
            error: self.to_string(),
        };
        let mut response = (status, Json(envelope)).into_response();
        report.with_kind("multipart_error").attach(&mut response);
        response
    }
}

pub(super) async fn generate(
    State(state): State<HttpState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => return SubmissionError::Malformed(rejection.body_text()).into_response(),
    };

    let submission = match read_submission(&mut multipart, state.generation.staging()).await {
        Ok(submission) => submission,
        Err(err) => return err.into_response(),
    };

    match state.generation.generate(submission).await {
        Ok(image) => (StatusCode::OK, Json(ResponseEnvelope::from(image))).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn read_submission(
    multipart: &mut Multipart,
    staging: &StagingArea,
) -> Result<FormSubmission<ReceivedUpload>, SubmissionError> {
    let mut submission = FormSubmission::new();

    while let Some(field) = multipart.next_field().await.map_err(map_multipart_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if field.file_name().is_some() {
            if !FILE_FIELDS.contains(&name.as_str()) {
                continue;
            }
            // Browsers send an empty part with an empty name when no file was chosen.
            let declared = field.file_name().unwrap_or_default().trim().to_string();
            if declared.is_empty() {
                continue;
            }
            if let Some(upload) = spool(field, &declared, staging).await? {
                submission.insert_file(name, upload);
            }
            continue;
        }

        let value = field.text().await.map_err(map_multipart_error)?;
        submission.insert_field(name, value);
    }

    Ok(submission)
}

async fn spool(
    mut field: Field,
    declared: &str,
    staging: &StagingArea,
) -> Result<Option<ReceivedUpload>, SubmissionError> {
    let mut incoming = staging.begin(declared)?;
    while let Some(chunk) = field.chunk().await.map_err(map_multipart_error)? {
        incoming.write_chunk(&chunk).await?;
    }
    Ok(incoming.finish().await?)
}

fn map_multipart_error(err: MultipartError) -> SubmissionError {
    let status = err.status();
    warn!(
        target = SOURCE,
        status = status.as_u16(),
        error = %err,
        "failed to read multipart payload"
    );
    match status {
        StatusCode::PAYLOAD_TOO_LARGE => SubmissionError::TooLarge,
        _ => SubmissionError::Malformed(err.to_string()),
    }
}
