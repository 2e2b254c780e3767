//! Same-origin proxy in front of the zhconvert API.
//!
//! `/api/<rest>?<query>` is forwarded to `<upstream>/<rest>?<query>` and the
//! reply is returned untouched apart from its headers, which gain the CORS
//! set the upstream service does not send. Preflight requests are answered
//! locally.
mod cors;
mod forward;
mod server;

use std::time::Duration;

pub use forward::router;
pub use server::ProxyServer;

pub const DEFAULT_UPSTREAM: &str = "https://api.zhconvert.org";

#[derive(Debug, Clone)]
pub struct ProxySettings {
    pub upstream_base: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            upstream_base: DEFAULT_UPSTREAM.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("invalid upstream url {url:?}: {source}")]
    InvalidUpstream {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}
