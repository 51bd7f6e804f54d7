use std::net::SocketAddr;

use telesink_core::error::{Result, TelesinkError};
use tokio::net::TcpListener;

use crate::http::router;
use crate::state::AppState;

pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| TelesinkError::Io(format!("failed to bind http listener on {addr}: {e}")))
}

/// Serves the router on an already bound listener until the task is dropped.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, storage = %state.store.kind(), "http server listening");
    }
    axum::serve(listener, router(state))
        .await
        .map_err(|e| TelesinkError::Io(format!("http server failed: {e}")))
}
