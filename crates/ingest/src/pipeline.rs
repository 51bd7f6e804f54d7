use std::time::Duration;

use telesink_store::Store;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Background writer for the buffered spreadsheet adapter.
pub struct FlushLoop {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl FlushLoop {
    /// Starts the loop when the store buffers writes; `None` otherwise.
    pub fn spawn(store: Store, flush_interval: Duration) -> Option<Self> {
        if !store.is_buffered() {
            return None;
        }
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(run_flush_loop(store, flush_interval, stop_rx));
        info!(interval = ?flush_interval, "buffered flush loop started");
        Some(Self { stop_tx, handle })
    }

    /// Stops ticking, runs one last flush and waits for it.
    pub async fn shutdown(self) {
        let _ = self.stop_tx.send(());
        if let Err(e) = self.handle.await {
            warn!(error = %e, "flush loop task failed");
        }
    }
}

async fn run_flush_loop(store: Store, flush_interval: Duration, mut stop_rx: oneshot::Receiver<()>) {
    let mut ticker = tokio::time::interval(flush_interval);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                flush_once(&store).await;
            }
            _ = &mut stop_rx => {
                flush_once(&store).await;
                break;
            }
        }
    }
}

/// One flush pass. A failed batch is logged and dropped.
pub async fn flush_once(store: &Store) -> usize {
    let queued = store.pending_len();
    match store.flush_pending().await {
        Ok(0) => 0,
        Ok(written) => {
            info!(count = written, "flushed buffered records");
            written
        }
        Err(e) => {
            warn!(count = queued, error = ?e, "failed to flush buffered records; batch dropped");
            0
        }
    }
}
