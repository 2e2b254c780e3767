use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{Method, Uri};
use axum::response::Response;
use axum::routing::options;
use axum::Router;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use subtitle_logging::{subtitle_info, subtitle_warn};
use url::Url;

use crate::cors::{preflight, relayed, upstream_failure};
use crate::{ProxyError, ProxySettings};

const PREFIX: &str = "/api/";
/// Subtitle payloads can exceed axum's 2 MiB default.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

struct ProxyState {
    http: reqwest::Client,
    /// Upstream base without a trailing slash.
    upstream: String,
}

/// Builds the proxy router.
///
/// `OPTIONS` under the prefix is answered locally; every other method is
/// forwarded.
pub fn router(settings: ProxySettings) -> Result<Router, ProxyError> {
    let upstream = Url::parse(&settings.upstream_base).map_err(|source| {
        ProxyError::InvalidUpstream {
            url: settings.upstream_base.clone(),
            source,
        }
    })?;
    let http = reqwest::Client::builder()
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.request_timeout)
        .build()?;
    let state = Arc::new(ProxyState {
        http,
        upstream: upstream.as_str().trim_end_matches('/').to_string(),
    });

    let handler = options(preflight).fallback(forward);
    Ok(Router::new()
        .route("/api/", handler.clone())
        .route("/api/{*rest}", handler)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state))
}

async fn forward(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    let rest = uri.path().strip_prefix(PREFIX).unwrap_or_default();
    let target = match uri.query() {
        Some(query) => format!("{}/{rest}?{query}", state.upstream),
        None => format!("{}/{rest}", state.upstream),
    };

    let started = Instant::now();
    let mut request = state
        .http
        .request(method.clone(), &target)
        .header(CONTENT_TYPE, "application/json")
        .header(ACCEPT, "application/json");
    if !matches!(method, Method::GET | Method::HEAD) {
        request = request.body(body);
    }

    let outcome = match request.send().await {
        Ok(response) => {
            let status = response.status();
            response.bytes().await.map(|bytes| (status, bytes))
        }
        Err(err) => Err(err),
    };

    match outcome {
        Ok((status, bytes)) => {
            subtitle_info!(
                "{} {} -> {} ({} bytes) in {:?}",
                method,
                uri.path(),
                status.as_u16(),
                bytes.len(),
                started.elapsed()
            );
            relayed(status, bytes)
        }
        Err(err) => {
            subtitle_warn!(
                "{} {} -> upstream failure after {:?}: {}",
                method,
                uri.path(),
                started.elapsed(),
                err
            );
            upstream_failure(&err.to_string())
        }
    }
}
