//! Axum HTTP server.

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;

use crate::error::RpcError;

pub struct RpcServer {
    listener: TcpListener,
    router: Router,
}

impl RpcServer {
    pub async fn bind(addr: &str, router: Router) -> Result<Self, RpcError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, router })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RpcError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn serve(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<(), RpcError> {
        tracing::info!(addr = %self.local_addr()?, "HTTP API listening");
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;
        tracing::info!("HTTP API stopped");
        Ok(())
    }
}
