//! Durable event consumer feeding the batch queue.
//!
//! Subscribes to memory-node-created events, parses each into a
//! [`Document`], and enqueues it. Acknowledgement policy preserves
//! at-least-once semantics: a message is acked only once the queue accepted
//! its document; a full queue naks so the broker redelivers; malformed
//! payloads are poison and get acked away. Liveness flows to the status bus
//! as ready / heartbeat / disconnected records.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::messaging::{Broker, BrokerMessage, ConsumerStatus, StatusBus, StatusKind, Subscription};

use super::batch::{BatchQueue, Document};

/// Consumer tuning.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Topic carrying memory-node events.
    pub topic: String,
    /// Durable consumer group.
    pub group_id: String,
    /// Maximum messages per fetch.
    pub fetch_batch_size: usize,
    /// Fetch wait deadline in milliseconds.
    pub fetch_timeout_ms: u64,
    /// Liveness cadence in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Instance id within the group.
    pub service_id: String,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            topic: "memory.node_created".to_string(),
            group_id: "search-indexer".to_string(),
            fetch_batch_size: 10,
            fetch_timeout_ms: 5_000,
            heartbeat_interval_ms: 30_000,
            service_id: uuid::Uuid::new_v4().to_string()[..8].to_string(),
        }
    }
}

/// Event consumer lifecycle: idle -> starting -> running -> stopping.
pub struct MemoryEventConsumer {
    broker: Arc<dyn Broker>,
    status: Option<Arc<dyn StatusBus>>,
    queue: Arc<BatchQueue>,
    config: ConsumerConfig,
    running: Arc<AtomicBool>,
    fetch_task: Mutex<Option<JoinHandle<()>>>,
    heartbeat_task: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryEventConsumer {
    /// Creates an idle consumer.
    pub fn new(
        broker: Arc<dyn Broker>,
        queue: Arc<BatchQueue>,
        status: Option<Arc<dyn StatusBus>>,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            broker,
            status,
            queue,
            config,
            running: Arc::new(AtomicBool::new(false)),
            fetch_task: Mutex::new(None),
            heartbeat_task: Mutex::new(None),
        }
    }

    /// `true` while the fetch loop is live.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Subscribes, starts the queue, and spawns the fetch and heartbeat
    /// loops. Re-entry is a logged no-op.
    pub async fn start(&self) -> Result<(), crate::messaging::BrokerError> {
        if self.running.swap(true, Ordering::AcqRel) {
            warn!("consumer already running");
            return Ok(());
        }

        info!(
            topic = %self.config.topic,
            group_id = %self.config.group_id,
            service_id = %self.config.service_id,
            "starting memory event consumer"
        );

        let subscription = match self
            .broker
            .subscribe(&self.config.topic, &self.config.group_id)
            .await
        {
            Ok(subscription) => subscription,
            Err(e) => {
                self.running.store(false, Ordering::Release);
                return Err(e);
            }
        };

        self.queue.start();
        self.publish_status(StatusKind::ConsumerReady).await;

        self.spawn_heartbeat();
        self.spawn_fetch_loop(subscription);

        Ok(())
    }

    /// Stops consumption: drains the queue, closes the loops, and emits the
    /// disconnect record.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }

        info!("stopping memory event consumer");

        if let Some(handle) = self.heartbeat_task.lock().take() {
            handle.abort();
        }

        // The fetch loop re-checks the running flag after each fetch
        // deadline, so it exits within one poll interval.
        let fetch = self.fetch_task.lock().take();
        if let Some(handle) = fetch {
            let _ = handle.await;
        }

        self.queue.stop().await;
        self.publish_status(StatusKind::ConsumerDisconnected).await;

        info!("memory event consumer stopped");
    }

    fn spawn_fetch_loop(&self, mut subscription: Box<dyn Subscription>) {
        let queue = Arc::clone(&self.queue);
        let running = Arc::clone(&self.running);
        let batch_size = self.config.fetch_batch_size;
        let timeout = Duration::from_millis(self.config.fetch_timeout_ms);

        let handle = tokio::spawn(async move {
            while running.load(Ordering::Acquire) {
                match subscription.fetch(batch_size, timeout).await {
                    Ok(messages) => {
                        for message in messages {
                            handle_message(&queue, subscription.as_mut(), message).await;
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "fetch failed, backing off");
                        tokio::time::sleep(Duration::from_millis(250)).await;
                    }
                }
            }

            if let Err(e) = subscription.close().await {
                warn!(error = %e, "failed to close subscription");
            }
        });

        *self.fetch_task.lock() = Some(handle);
    }

    fn spawn_heartbeat(&self) {
        let Some(status) = self.status.clone() else {
            return;
        };

        let running = Arc::clone(&self.running);
        let interval = Duration::from_millis(self.config.heartbeat_interval_ms);
        let group_id = self.config.group_id.clone();
        let service_id = self.config.service_id.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if !running.load(Ordering::Acquire) {
                    break;
                }

                let record =
                    ConsumerStatus::now(StatusKind::ConsumerHeartbeat, &group_id, &service_id);
                if let Err(e) = status.publish(record).await {
                    warn!(error = %e, "heartbeat publish failed");
                } else {
                    debug!("heartbeat published");
                }
            }
        });

        *self.heartbeat_task.lock() = Some(handle);
    }

    async fn publish_status(&self, kind: StatusKind) {
        let Some(ref status) = self.status else {
            return;
        };

        let record = ConsumerStatus::now(kind, &self.config.group_id, &self.config.service_id);
        if let Err(e) = status.publish(record).await {
            warn!(error = %e, ?kind, "status publish failed");
        }
    }
}

/// Decode, parse, enqueue, acknowledge.
async fn handle_message(
    queue: &BatchQueue,
    subscription: &mut dyn Subscription,
    message: BrokerMessage,
) {
    let payload: serde_json::Value = match serde_json::from_slice(&message.payload) {
        Ok(payload) => payload,
        Err(e) => {
            // Poison: redelivery would fail the same way.
            warn!(message_id = %message.id, error = %e, "undecodable message, acking away");
            ack(subscription, &message).await;
            return;
        }
    };

    let Some(document) = parse_memory_node(&payload) else {
        warn!(message_id = %message.id, "malformed memory node, acking away");
        ack(subscription, &message).await;
        return;
    };

    match queue.add(document).await {
        Ok(()) => {
            debug!(message_id = %message.id, "document enqueued");
            ack(subscription, &message).await;
        }
        Err(e) => {
            // Backpressure: leave the message to the broker.
            warn!(message_id = %message.id, error = %e, "queue full, nacking for redelivery");
            if let Err(e) = subscription.nak(&message).await {
                error!(message_id = %message.id, error = %e, "nak failed");
            }
        }
    }
}

async fn ack(subscription: &mut dyn Subscription, message: &BrokerMessage) {
    if let Err(e) = subscription.ack(message).await {
        error!(message_id = %message.id, error = %e, "ack failed");
    }
}

/// Parses a memory-node event into a [`Document`].
///
/// Required: non-empty `id`, `content`, and `orgId` (a tenant-less document
/// could never be indexed). Optional: `type` (folded into metadata),
/// `sessionId`, `metadata`. Returns `None` on any violation.
pub fn parse_memory_node(data: &serde_json::Value) -> Option<Document> {
    let id = data.get("id")?.as_str().filter(|s| !s.is_empty())?;
    let content = data.get("content")?.as_str().filter(|s| !s.is_empty())?;
    let org_id = data
        .get("orgId")
        .or_else(|| data.get("org_id"))?
        .as_str()
        .filter(|s| !s.is_empty())?;

    let mut metadata = data
        .get("metadata")
        .and_then(|m| m.as_object().cloned())
        .unwrap_or_default();

    if let Some(node_type) = data.get("type").and_then(|t| t.as_str()) {
        metadata.insert("type".to_string(), serde_json::json!(node_type));
    }

    let session_id = data
        .get("sessionId")
        .and_then(|s| s.as_str())
        .map(|s| s.to_string());

    Some(Document {
        id: id.to_string(),
        content: content.to_string(),
        org_id: org_id.to_string(),
        metadata,
        session_id,
    })
}
