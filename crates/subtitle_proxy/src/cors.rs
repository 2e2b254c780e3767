use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE,
};
use axum::http::{HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};

const ALLOW_ORIGIN: &str = "*";
const ALLOW_METHODS: &str = "GET, POST, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type";
const JSON: &str = "application/json";

pub(crate) fn cors_headers() -> [(HeaderName, &'static str); 3] {
    [
        (ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW_ORIGIN),
        (ACCESS_CONTROL_ALLOW_METHODS, ALLOW_METHODS),
        (ACCESS_CONTROL_ALLOW_HEADERS, ALLOW_HEADERS),
    ]
}

/// 204 with the CORS set; upstream is never contacted.
pub(crate) async fn preflight() -> Response {
    (StatusCode::NO_CONTENT, cors_headers()).into_response()
}

/// Upstream reply passed through byte for byte.
pub(crate) fn relayed(status: StatusCode, body: axum::body::Bytes) -> Response {
    (status, cors_headers(), [(CONTENT_TYPE, JSON)], body).into_response()
}

/// Synthetic reply for a transport failure. Only the origin header is set.
pub(crate) fn upstream_failure(message: &str) -> Response {
    let body = serde_json::json!({ "error": message }).to_string();
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(CONTENT_TYPE, JSON), (ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW_ORIGIN)],
        body,
    )
        .into_response()
}
