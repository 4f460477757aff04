use std::io::ErrorKind;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use tokio::fs;
use tracing::error;

use crate::application::error::HttpError;

use super::HttpState;

const SOURCE: &str = "infra::http::outputs::serve_output";

pub(super) async fn serve_output(
    State(state): State<HttpState>,
    Path(file): Path<String>,
) -> Response {
    let Some(path) = state.generation.output().resolve(&file) else {
        return not_found(format!("rejected output name `{file}`"));
    };

    match fs::read(&path).await {
        Ok(bytes) => build_image_response(&file, bytes),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            not_found(format!("output `{file}` does not exist"))
        }
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path.display(),
                error = %err,
                "failed to read generated image"
            );
            HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read generated image",
                &err,
            )
            .with_kind("output_read_error")
            .into_response()
        }
    }
}

fn not_found(detail: String) -> Response {
    HttpError::new(SOURCE, StatusCode::NOT_FOUND, "Image not found", detail)
        .with_kind("output_not_found")
        .into_response()
}

fn build_image_response(file: &str, bytes: Vec<u8>) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(file).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("public, max-age=3600"));

    response
}
