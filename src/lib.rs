//! # healthstream - service health event materialization
//!
//! healthstream turns a committed catalog transaction (node, service and check
//! mutations) into the change events subscribers need to keep a replicated
//! view of service health consistent with the catalog.
//!
//! ## Core Concepts
//!
//! - **MutationRecord**: one write within a transaction, scoped to its owning node
//! - **Intent**: last-write-wins summary per node, `Touched` or `Removed`
//! - **HealthResolver**: the snapshot join from a node to its health views
//! - **ChangeEvent**: an upsert carrying a full view, or a tombstone
//! - **EventSink**: collect-then-order, or append into a capped [`EventBuffer`]
//!
//! ## Usage
//!
//! ```rust
//! use healthstream::{
//!     Materializer, MemoryCatalog, MutationRecord, Node, NodeId, ServiceInstance, Verb,
//! };
//!
//! let catalog = MemoryCatalog::new();
//! let node1 = NodeId::new("node1")?;
//! catalog.register_node(Node::new(node1.clone(), "10.0.0.1"))?;
//! catalog.register_service(&node1, ServiceInstance::new("web", 80))?;
//!
//! let batch = vec![
//!     MutationRecord::node(node1.clone(), Verb::Register),
//!     MutationRecord::service(node1, "web", Verb::Register),
//!     MutationRecord::node(NodeId::new("node2")?, Verb::Delete),
//! ];
//!
//! let events = Materializer::default().materialize(&catalog, 7, &batch)?;
//! assert_eq!(events.len(), 2);
//! assert_eq!(events[0].key, "web");
//! assert!(events[1].is_tombstone());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod buffer;
pub mod catalog;
pub mod error;
pub mod event;
pub mod materialize;
pub mod mutation;
pub mod resolver;
pub mod sink;

// Re-export primary types at crate root for convenience
pub use buffer::{BufferTxn, EventBuffer};
pub use catalog::{CheckStatus, HealthCheck, HealthView, Node, NodeId, ServiceInstance, ServiceKind};
pub use error::{ContractViolation, HealthResult, MaterializeError, ResolverError, SinkError};
pub use event::{CatalogOp, ChangeEvent, EventDigest, EventPayload, Topic};
pub use materialize::{Intent, Intents, Materializer, MaterializerConfig, DEFAULT_BUFFER_CAPACITY};
pub use mutation::{decode_ops, MutationRecord, TxnOp, Verb};
pub use resolver::{CatalogSnapshot, HealthResolver, MemoryCatalog, ViewFilter};
pub use sink::{BufferSink, Collector, EventSink};
