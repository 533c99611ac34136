//! Bounded batch queue between the event consumer and the indexer.
//!
//! Documents accumulate until the batch size is reached, the flush interval
//! elapses, or the queue stops. Flushing swaps the buffer under the lock and
//! invokes the sink outside it, so producers observe an empty queue the
//! moment a flush begins. Sink errors are logged; the flush loop never dies
//! from one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::indexer::IndexError;

/// Queue tuning.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum documents per flushed batch.
    pub batch_size: usize,
    /// Maximum milliseconds a pending batch may age.
    pub flush_interval_ms: u64,
    /// Maximum pending documents before `add` refuses.
    pub max_queue_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            flush_interval_ms: 5_000,
            max_queue_size: 1_000,
        }
    }
}

/// One document headed for the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Globally unique id (ULID/UUID).
    pub id: String,
    /// Text content.
    pub content: String,
    /// Tenant isolation key.
    pub org_id: String,
    /// Arbitrary metadata folded into the point payload.
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Session the document belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Error)]
/// `add` refusal: the queue is at capacity.
#[error("batch queue at capacity ({capacity})")]
pub struct QueueFull {
    /// Configured capacity.
    pub capacity: usize,
}

/// Receiver of flushed batches.
#[async_trait]
pub trait BatchSink: Send + Sync {
    /// Consumes one batch, returning how many documents were written.
    async fn flush(&self, batch: Vec<Document>) -> Result<usize, IndexError>;
}

/// Size- and time-triggered batching queue.
pub struct BatchQueue {
    config: BatchConfig,
    sink: Arc<dyn BatchSink>,
    buffer: Arc<Mutex<Vec<Document>>>,
    running: Arc<AtomicBool>,
    timer: SyncMutex<Option<JoinHandle<()>>>,
}

impl BatchQueue {
    /// Creates a stopped queue over `sink`.
    pub fn new(config: BatchConfig, sink: Arc<dyn BatchSink>) -> Self {
        Self {
            config,
            sink,
            buffer: Arc::new(Mutex::new(Vec::new())),
            running: Arc::new(AtomicBool::new(false)),
            timer: SyncMutex::new(None),
        }
    }

    /// Starts the background flush timer. No-op when already running.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::AcqRel) {
            warn!("batch queue already started");
            return;
        }

        info!(
            batch_size = self.config.batch_size,
            flush_interval_ms = self.config.flush_interval_ms,
            "batch queue started"
        );

        let buffer = Arc::clone(&self.buffer);
        let sink = Arc::clone(&self.sink);
        let running = Arc::clone(&self.running);
        let interval = Duration::from_millis(self.config.flush_interval_ms);

        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if !running.load(Ordering::Acquire) {
                    break;
                }
                flush(&buffer, &sink).await;
            }
        });

        *self.timer.lock() = Some(handle);
    }

    /// Enqueues one document.
    ///
    /// Fails with [`QueueFull`] at capacity. When the addition fills a
    /// batch, the same call performs the flush; the queue is empty again by
    /// the time it returns.
    pub async fn add(&self, document: Document) -> Result<(), QueueFull> {
        let should_flush = {
            let mut buffer = self.buffer.lock().await;

            if buffer.len() >= self.config.max_queue_size {
                error!(
                    capacity = self.config.max_queue_size,
                    "batch queue at capacity, refusing document"
                );
                return Err(QueueFull {
                    capacity: self.config.max_queue_size,
                });
            }

            buffer.push(document);
            buffer.len() >= self.config.batch_size
        };

        if should_flush {
            flush(&self.buffer, &self.sink).await;
        }

        Ok(())
    }

    /// Stops the timer and drains whatever is pending.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }

        if let Some(handle) = self.timer.lock().take() {
            handle.abort();
        }

        flush(&self.buffer, &self.sink).await;
        info!("batch queue stopped");
    }

    /// Flushes the pending buffer immediately.
    pub async fn flush_now(&self) {
        flush(&self.buffer, &self.sink).await;
    }

    /// Number of pending documents.
    pub async fn len(&self) -> usize {
        self.buffer.lock().await.len()
    }

    /// `true` when nothing is pending.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Swap-then-flush. The buffer lock is held only for the swap; the sink runs
/// outside it so producers never wait on indexing.
async fn flush(buffer: &Mutex<Vec<Document>>, sink: &Arc<dyn BatchSink>) {
    let batch = {
        let mut buffer = buffer.lock().await;
        if buffer.is_empty() {
            return;
        }
        std::mem::take(&mut *buffer)
    };

    let size = batch.len();
    debug!(size, "flushing batch");

    match sink.flush(batch).await {
        Ok(indexed) => debug!(indexed, "batch flushed"),
        Err(e) => error!(error = %e, size, "batch flush failed"),
    }
}
