//! Messaging collaborator seams.
//!
//! The consumer talks to two externals through these traits: a durable
//! [`Broker`] with at-least-once delivery and explicit ack/nak, and a
//! best-effort [`StatusBus`] for liveness records. No broker client ships
//! with the crate; deployments wire their own implementation and tests use
//! the in-memory mocks.

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(test)]
mod tests;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockBroker, MockStatusBus};

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
/// Errors surfaced by the broker seam.
pub enum BrokerError {
    /// Could not reach the broker.
    #[error("broker connection failed: {reason}")]
    Connection {
        /// Error message.
        reason: String,
    },

    /// Creating the durable subscription failed.
    #[error("subscribe failed for '{topic}': {reason}")]
    Subscribe {
        /// Topic name.
        topic: String,
        /// Error message.
        reason: String,
    },

    /// A fetch failed.
    #[error("fetch failed: {reason}")]
    Fetch {
        /// Error message.
        reason: String,
    },

    /// Acknowledging or rejecting a message failed.
    #[error("ack/nak failed for message '{message_id}': {reason}")]
    Ack {
        /// Message id.
        message_id: String,
        /// Error message.
        reason: String,
    },
}

/// One delivered message.
#[derive(Debug, Clone)]
pub struct BrokerMessage {
    /// Broker-assigned message id (deduplication header).
    pub id: String,
    /// Subject the message arrived on.
    pub subject: String,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

/// A durable subscription handle.
#[async_trait]
pub trait Subscription: Send + Sync {
    /// Pulls up to `max_messages`, waiting at most `timeout`. An empty batch
    /// after the timeout is not an error.
    async fn fetch(
        &mut self,
        max_messages: usize,
        timeout: Duration,
    ) -> Result<Vec<BrokerMessage>, BrokerError>;

    /// Acknowledges a message (it will not be redelivered).
    async fn ack(&mut self, message: &BrokerMessage) -> Result<(), BrokerError>;

    /// Rejects a message for redelivery.
    async fn nak(&mut self, message: &BrokerMessage) -> Result<(), BrokerError>;

    /// Closes the subscription handle; the durable consumer state survives.
    async fn close(&mut self) -> Result<(), BrokerError>;
}

/// Durable message broker with at-least-once delivery.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Creates (or resumes) the durable subscription `group_id` on `topic`.
    async fn subscribe(
        &self,
        topic: &str,
        group_id: &str,
    ) -> Result<Box<dyn Subscription>, BrokerError>;
}

/// Consumer liveness record kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    /// Subscription established, consumption begins.
    ConsumerReady,
    /// Periodic liveness signal.
    ConsumerHeartbeat,
    /// Graceful shutdown completed.
    ConsumerDisconnected,
}

/// One liveness record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerStatus {
    /// Record kind.
    pub status: StatusKind,
    /// Consumer group.
    pub group_id: String,
    /// Instance id within the group.
    pub service_id: String,
    /// Publication time, epoch milliseconds.
    pub timestamp_ms: i64,
}

impl ConsumerStatus {
    /// Builds a record stamped with the current time.
    pub fn now(status: StatusKind, group_id: &str, service_id: &str) -> Self {
        Self {
            status,
            group_id: group_id.to_string(),
            service_id: service_id.to_string(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Debug, Error)]
/// Error publishing a status record. Best-effort: callers log and move on.
#[error("status publish failed: {reason}")]
pub struct StatusBusError {
    /// Error message.
    pub reason: String,
}

/// Best-effort status publication.
#[async_trait]
pub trait StatusBus: Send + Sync {
    /// Publishes one record.
    async fn publish(&self, status: ConsumerStatus) -> Result<(), StatusBusError>;
}
