//! JSON response helpers
//!
//! Every response carries permissive CORS headers. Bodies are JSON envelopes:
//! `{status: "success", ...}` or `{status: "error", message}`.

use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE, WWW_AUTHENTICATE};
use hyper::{Response, StatusCode};
use serde::Serialize;
use serde_json::json;

const CORS_HEADERS: [(&str, &str); 4] = [
    ("access-control-allow-origin", "*"),
    (
        "access-control-allow-methods",
        "GET, POST, PUT, PATCH, DELETE, OPTIONS",
    ),
    (
        "access-control-allow-headers",
        "Origin, Content-Type, Accept, Authorization",
    ),
    ("access-control-max-age", "86400"),
];

/// Serialize `body` as the response payload
pub fn json<T: Serialize>(status: StatusCode, body: &T) -> Response<String> {
    match serde_json::to_string(body) {
        Ok(body) => build(status, body),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize response body");
            build(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"status": "error", "message": "Failed to serialize response"})
                    .to_string(),
            )
        }
    }
}

/// `{status: "error", message}`
pub fn error(status: StatusCode, message: impl AsRef<str>) -> Response<String> {
    json(
        status,
        &json!({
            "status": "error",
            "message": message.as_ref(),
        }),
    )
}

/// 401 with a bearer challenge
pub fn unauthorized(message: impl AsRef<str>) -> Response<String> {
    let mut response = error(StatusCode::UNAUTHORIZED, message);
    response
        .headers_mut()
        .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}

/// Empty 204 answer to a CORS preflight
pub fn preflight() -> Response<String> {
    let mut response = Response::new(String::new());
    *response.status_mut() = StatusCode::NO_CONTENT;
    apply_cors(&mut response);
    response
}

fn build(status: StatusCode, body: String) -> Response<String> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    apply_cors(&mut response);
    response
}

fn apply_cors(response: &mut Response<String>) {
    let headers = response.headers_mut();
    for (name, value) in CORS_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
}
