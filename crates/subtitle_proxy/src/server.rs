use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use subtitle_logging::subtitle_info;
use tokio::net::TcpListener;

use crate::{router, ProxyError, ProxySettings};

/// Hosts the proxy router on a TCP listener.
pub struct ProxyServer {
    router: Router,
}

impl ProxyServer {
    pub fn new(settings: ProxySettings) -> Result<Self, ProxyError> {
        subtitle_info!("Proxying /api/ to {}", settings.upstream_base);
        Ok(Self {
            router: router(settings)?,
        })
    }

    pub async fn serve(
        self,
        addr: SocketAddr,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ProxyError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ProxyError::Bind { addr, source })?;
        self.serve_listener(listener, shutdown).await
    }

    /// Serves on an already bound listener, e.g. one bound to port 0.
    pub async fn serve_listener(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ProxyError> {
        let local = listener.local_addr().map_err(ProxyError::Serve)?;
        subtitle_info!("Starting proxy on {}", local);
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(ProxyError::Serve)?;
        subtitle_info!("Proxy on {} stopped", local);
        Ok(())
    }
}
