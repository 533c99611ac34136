//! In-memory broker and status bus for tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{
    Broker, BrokerError, BrokerMessage, ConsumerStatus, StatusBus, StatusBusError, Subscription,
};

#[derive(Default)]
struct MockBrokerState {
    pending: VecDeque<BrokerMessage>,
    acked: Vec<String>,
    naked: Vec<String>,
}

/// In-memory [`Broker`]: messages pushed by the test are fetched in order;
/// nak'd messages go back to the front of the queue (redelivery).
#[derive(Default)]
pub struct MockBroker {
    state: Arc<Mutex<MockBrokerState>>,
    fail_subscribe: AtomicBool,
}

impl MockBroker {
    /// Creates an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a message for delivery.
    pub fn publish(&self, id: &str, subject: &str, payload: serde_json::Value) {
        self.state.lock().pending.push_back(BrokerMessage {
            id: id.to_string(),
            subject: subject.to_string(),
            payload: payload.to_string().into_bytes(),
        });
    }

    /// Queues a message with raw (possibly malformed) bytes.
    pub fn publish_raw(&self, id: &str, subject: &str, payload: &[u8]) {
        self.state.lock().pending.push_back(BrokerMessage {
            id: id.to_string(),
            subject: subject.to_string(),
            payload: payload.to_vec(),
        });
    }

    /// Makes `subscribe` fail until cleared.
    pub fn fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    /// Ids acknowledged so far.
    pub fn acked(&self) -> Vec<String> {
        self.state.lock().acked.clone()
    }

    /// Ids negatively acknowledged so far.
    pub fn naked(&self) -> Vec<String> {
        self.state.lock().naked.clone()
    }

    /// Messages still waiting for delivery.
    pub fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }
}

struct MockSubscription {
    state: Arc<Mutex<MockBrokerState>>,
}

#[async_trait]
impl Subscription for MockSubscription {
    async fn fetch(
        &mut self,
        max_messages: usize,
        timeout: Duration,
    ) -> Result<Vec<BrokerMessage>, BrokerError> {
        let messages: Vec<BrokerMessage> = {
            let mut state = self.state.lock();
            let take = max_messages.min(state.pending.len());
            state.pending.drain(..take).collect()
        };

        if messages.is_empty() {
            // Model the broker blocking until the fetch deadline.
            tokio::time::sleep(timeout).await;
        }

        Ok(messages)
    }

    async fn ack(&mut self, message: &BrokerMessage) -> Result<(), BrokerError> {
        self.state.lock().acked.push(message.id.clone());
        Ok(())
    }

    async fn nak(&mut self, message: &BrokerMessage) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        state.naked.push(message.id.clone());
        state.pending.push_front(message.clone());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BrokerError> {
        Ok(())
    }
}

#[async_trait]
impl Broker for MockBroker {
    async fn subscribe(
        &self,
        topic: &str,
        _group_id: &str,
    ) -> Result<Box<dyn Subscription>, BrokerError> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(BrokerError::Subscribe {
                topic: topic.to_string(),
                reason: "injected subscribe failure".to_string(),
            });
        }

        Ok(Box::new(MockSubscription {
            state: Arc::clone(&self.state),
        }))
    }
}

/// Recording [`StatusBus`] with optional failure injection.
#[derive(Default)]
pub struct MockStatusBus {
    records: Mutex<Vec<ConsumerStatus>>,
    fail: AtomicBool,
}

impl MockStatusBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every publish fail until cleared.
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Records published so far.
    pub fn records(&self) -> Vec<ConsumerStatus> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl StatusBus for MockStatusBus {
    async fn publish(&self, status: ConsumerStatus) -> Result<(), StatusBusError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StatusBusError {
                reason: "injected status failure".to_string(),
            });
        }

        self.records.lock().push(status);
        Ok(())
    }
}
