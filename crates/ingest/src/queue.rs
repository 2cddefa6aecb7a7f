use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracevault_core::error::{Result, TraceVaultError};
use tracevault_core::model::ExportRequest;
use tracing::warn;

use crate::sink::TraceSink;

/// Bounded FIFO between the receiver and a downstream sink with exactly
/// one consumer task. Admission blocks while the queue is full and fails
/// with `QueueClosed` once [`QueueSink::close`] has run. A request that
/// was admitted before close is always delivered: the worker drains the
/// channel before exiting.
pub struct QueueSink {
    tx: Mutex<Option<mpsc::Sender<ExportRequest>>>,
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    sink: Arc<dyn TraceSink>,
}

impl QueueSink {
    pub fn new(sink: Arc<dyn TraceSink>, capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            warn!(capacity, fallback = 1, "invalid queue capacity");
            1
        } else {
            capacity
        };

        let (tx, rx) = mpsc::channel(capacity);
        let worker = tokio::spawn(run_worker(rx, Arc::clone(&sink)));

        Self {
            tx: Mutex::new(Some(tx)),
            worker: tokio::sync::Mutex::new(Some(worker)),
            sink,
        }
    }

    /// Idempotent shutdown: stops admission, waits for the worker to
    /// drain everything already enqueued, then closes the downstream
    /// sink exactly once.
    pub async fn close(&self) -> Result<()> {
        drop(self.tx.lock().expect("queue sender mutex poisoned").take());

        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| TraceVaultError::Internal(format!("queue worker panicked: {e}")))?;
            self.sink.close().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl TraceSink for QueueSink {
    async fn consume(&self, req: ExportRequest) -> Result<()> {
        let tx = self
            .tx
            .lock()
            .expect("queue sender mutex poisoned")
            .clone();
        let Some(tx) = tx else {
            return Err(TraceVaultError::QueueClosed);
        };
        tx.send(req).await.map_err(|_| TraceVaultError::QueueClosed)
    }

    async fn close(&self) -> Result<()> {
        QueueSink::close(self).await
    }
}

// One consumer serializes all persistence. A failing request is logged
// and swallowed so it never stops the worker, and the downstream call is
// not tied to any client's cancellation.
async fn run_worker(mut rx: mpsc::Receiver<ExportRequest>, sink: Arc<dyn TraceSink>) {
    while let Some(req) = rx.recv().await {
        if let Err(err) = sink.consume(req).await {
            warn!(error = %err, "queue worker failed to persist export");
        }
    }
}
