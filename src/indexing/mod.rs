//! The write path: event consumer -> batch queue -> document indexer.
//!
//! Memory-node events stream in from the broker, batch up in a bounded
//! queue, and land in the store as multi-vector points. Acknowledgement is
//! tied to queue admission so nothing is lost between the broker and the
//! store.

/// Batching queue.
pub mod batch;
/// Durable event consumer.
pub mod consumer;
/// Multi-vector indexer.
pub mod indexer;


pub use batch::{BatchConfig, BatchQueue, BatchSink, Document, QueueFull};
pub use consumer::{ConsumerConfig, MemoryEventConsumer, parse_memory_node};
pub use indexer::{DocumentIndexer, IndexError, IndexerConfig};
