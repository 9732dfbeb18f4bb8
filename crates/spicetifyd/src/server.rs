//! HTTP surface of the daemon: the reverse proxy and the RPC websocket.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{any, get};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

use crate::proxy::{self, ProxyTransport};
use crate::rpc;
use crate::settings::SettingsCell;

const SERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");

/// Errors raised by the HTTP listener.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding the listen address failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Configured address.
        addr: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The bound socket reported no local address.
    #[error("failed to read local address: {source}")]
    LocalAddr {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The accept loop failed.
    #[error("HTTP server failed: {source}")]
    Serve {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// State shared by the HTTP handlers.
#[derive(Clone)]
pub struct DaemonState {
    settings: Arc<SettingsCell>,
    transport: Arc<dyn ProxyTransport>,
}

impl DaemonState {
    /// Bundles the settings cell with the proxy transport.
    pub fn new(settings: Arc<SettingsCell>, transport: Arc<dyn ProxyTransport>) -> Self {
        Self {
            settings,
            transport,
        }
    }

    /// Settings cell read at the top of every request.
    #[must_use]
    pub fn settings(&self) -> &Arc<SettingsCell> {
        &self.settings
    }

    /// Upstream transport of the proxy.
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn ProxyTransport> {
        &self.transport
    }
}

/// Routes `/proxy/*` and `/rpc`.
pub fn router(state: DaemonState) -> Router {
    Router::new()
        .route("/proxy/{*target}", any(proxy::forward))
        .route("/rpc", get(rpc::upgrade))
        .with_state(state)
}

/// Bound listener, not yet serving.
#[derive(Debug)]
pub struct HttpListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl HttpListener {
    /// Binds `addr`; a failure here is fatal for the daemon.
    pub async fn bind(addr: &str) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_owned(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::LocalAddr { source })?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Address actually bound.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves on a background task. Aborting the task drops open
    /// connections without draining them.
    pub fn serve(self, state: DaemonState) -> JoinHandle<Result<(), ServerError>> {
        info!(target: SERVER_TARGET, addr = %self.local_addr, "serving proxy and rpc");
        let app = router(state);
        tokio::spawn(async move {
            axum::serve(self.listener, app)
                .await
                .map_err(|source| ServerError::Serve { source })
        })
    }
}
