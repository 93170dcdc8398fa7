//! Response builders shared by handlers.

use crate::core::error::PlaneError;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, LOCATION};
use http::{Response, StatusCode};
use serde::Serialize;
use serde_json::json;

/// Build a JSON response.
pub fn json<T: Serialize>(status: StatusCode, body: &T) -> Response<Bytes> {
    match serde_json::to_vec(body) {
        Ok(body) => build(status, "application/json", Bytes::from(body)),
        Err(error) => text(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to encode response: {}", error),
        ),
    }
}

/// Build a plain-text response.
pub fn text(status: StatusCode, body: impl Into<String>) -> Response<Bytes> {
    build(status, "text/plain; charset=utf-8", Bytes::from(body.into()))
}

/// Build a status-object response for an error.
pub fn error(err: &PlaneError) -> Response<Bytes> {
    let status = err.http_status();
    json(
        status,
        &json!({
            "kind": "Status",
            "apiVersion": "v1",
            "status": "Failure",
            "message": err.to_string(),
            "reason": err.reason(),
            "code": status.as_u16(),
        }),
    )
}

/// Build a temporary redirect.
pub fn redirect(location: &str) -> Response<Bytes> {
    let mut response = text(StatusCode::TEMPORARY_REDIRECT, "");
    if let Ok(value) = location.parse() {
        response.headers_mut().insert(LOCATION, value);
    }
    response
}

fn build(status: StatusCode, content_type: &'static str, body: Bytes) -> Response<Bytes> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, http::HeaderValue::from_static(content_type));
    response
}
