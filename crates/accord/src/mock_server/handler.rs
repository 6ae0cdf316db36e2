//! Per-request handling: convert the hyper request, match it against the
//! session and answer with the expected response or a diagnostic.

use super::state::{MatchOutcome, SessionState};
use crate::matching::Mismatch;
use crate::model::{HttpRequest, HttpResponse, MultiValueMap, OptionalBody};
use crate::verification::RequestSummary;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

/// Readiness probe header; such `OPTIONS` requests are never recorded.
pub const BOOTCHECK_HEADER: &str = "X-PACT-BOOTCHECK";
/// Set on every diagnostic response.
pub const UNEXPECTED_REQUEST_HEADER: &str = "X-Pact-Unexpected-Request";

pub(crate) async fn handle_request(
    req: Request<Incoming>,
    state: Arc<SessionState>,
    client_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    if req.method() == Method::OPTIONS && req.headers().contains_key(BOOTCHECK_HEADER) {
        return Ok(build_response_with_headers(
            StatusCode::OK,
            [(BOOTCHECK_HEADER, "true")],
            Bytes::new(),
        ));
    }

    let (parts, body) = req.into_parts();
    let summary = RequestSummary::new(
        parts.method.as_str(),
        parts.uri.path(),
        parts.uri.query().map(str::to_string),
    );
    debug!("Received {} from {}", summary, client_addr);
    let guard = state.begin(summary.clone());

    let body_bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            // Dropping the guard records the request as aborted.
            debug!("Failed to read body of {}: {}", summary, e);
            drop(guard);
            return Ok(build_response(
                StatusCode::BAD_REQUEST,
                format!("Failed to read request body: {e}"),
            ));
        }
    };

    let request = to_http_request(&parts, body_bytes);
    let outcome = state.handle(&request);
    let response = respond(outcome, &summary);
    guard.complete();
    Ok(response)
}

/// Convert the request head and collected body into the model type.
pub(crate) fn to_http_request(parts: &hyper::http::request::Parts, body: Bytes) -> HttpRequest {
    let mut headers = MultiValueMap::new();
    for (name, value) in &parts.headers {
        headers.insert(
            name.as_str(),
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
        );
    }
    let content_type = headers.first_ignore_case("content-type").map(str::to_string);
    let body = if body.is_empty() {
        OptionalBody::Missing
    } else {
        OptionalBody::present(body, content_type)
    };

    HttpRequest {
        method: parts.method.as_str().to_ascii_uppercase(),
        path: parts.uri.path().to_string(),
        query: parts
            .uri
            .query()
            .map(MultiValueMap::from_query_string)
            .unwrap_or_default(),
        headers,
        body,
        ..Default::default()
    }
}

fn respond(outcome: MatchOutcome, summary: &RequestSummary) -> Response<Full<Bytes>> {
    match outcome {
        MatchOutcome::Matched(response) => serve(&response),
        MatchOutcome::Mismatched {
            description,
            mismatches,
        } => diagnostic(
            format!("Request does not match interaction '{description}'"),
            summary,
            &mismatches,
        ),
        MatchOutcome::Unexpected => diagnostic(
            format!("Unexpected request: {summary}"),
            summary,
            &[],
        ),
    }
}

/// Build the wire response for a matched interaction.
pub(crate) fn serve(response: &HttpResponse) -> Response<Full<Bytes>> {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut headers: Vec<(String, String)> = response
        .headers
        .iter()
        .flat_map(|(name, values)| {
            values
                .iter()
                .map(move |value| (name.to_string(), value.clone()))
        })
        .collect();
    if !response.headers.contains_key_ignore_case("content-type") {
        if let Some(content_type) = response.body.content_type() {
            headers.push(("Content-Type".to_string(), content_type.to_string()));
        }
    }
    build_response_with_headers(
        status,
        headers,
        Bytes::copy_from_slice(response.body.bytes()),
    )
}

fn diagnostic(
    error: String,
    summary: &RequestSummary,
    mismatches: &[Mismatch],
) -> Response<Full<Bytes>> {
    let body = json!({
        "error": error,
        "request": summary,
        "mismatches": mismatches,
    });
    build_response_with_headers(
        StatusCode::INTERNAL_SERVER_ERROR,
        [
            ("Content-Type", "application/json"),
            (UNEXPECTED_REQUEST_HEADER, "1"),
        ],
        body.to_string(),
    )
}

pub fn build_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(body.into()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from("Internal Server Error"))))
}

/// Build a response with headers, falling back to a bare 500 when a header
/// cannot be encoded.
pub fn build_response_with_headers(
    status: StatusCode,
    headers: impl IntoIterator<Item = (impl AsRef<str>, impl AsRef<str>)>,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(status);
    for (key, value) in headers {
        builder = builder.header(key.as_ref(), value.as_ref());
    }
    builder
        .body(Full::new(body.into()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from("Internal Server Error"))))
}
