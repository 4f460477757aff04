//! Request correlation and failure logging for every route.

use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::{Instrument, debug, error, info_span, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const TARGET: &str = "stereogramaxo::http::response";

/// Run the request inside a span carrying a fresh request id and echo the id to the client.
pub async fn set_request_context(request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Log failed responses with the stage and cause chain their handler reported.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let started_at = Instant::now();
    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started_at.elapsed().as_millis() as u64;

    if !status.is_client_error() && !status.is_server_error() {
        debug!(
            target = TARGET,
            status = status.as_u16(),
            elapsed_ms,
            "request completed"
        );
        return response;
    }

    let report = response.extensions_mut().remove::<ErrorReport>();
    let (source, kind, chain) = match report {
        Some(report) => (
            report.source,
            report.kind.unwrap_or("http_error"),
            report.messages,
        ),
        None => ("router", "unrouted", Vec::new()),
    };
    let cause = chain.first().map(String::as_str).unwrap_or("no route matched");

    if status.is_server_error() {
        error!(
            target = TARGET,
            status = status.as_u16(),
            elapsed_ms,
            kind,
            source,
            cause,
            chain = ?chain,
            "request failed"
        );
    } else {
        warn!(
            target = TARGET,
            status = status.as_u16(),
            elapsed_ms,
            kind,
            source,
            cause,
            "request rejected"
        );
    }

    response
}
