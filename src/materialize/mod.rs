//! Transaction materialization.
//!
//! A committed transaction's mutation records are reduced to per-node intents,
//! each intent is expanded into events through the resolver, and the events are
//! handed to a sink. Collecting mode orders the full event set before returning
//! it; buffered mode stages events in the bus buffer in node-processing order
//! and publishes them when the whole transaction succeeded.

/// Intent expansion into events.
pub mod expander;
/// Canonical event ordering.
pub mod orderer;
/// Mutation batch reduction.
pub mod reducer;

use serde::{Deserialize, Serialize};

use crate::buffer::EventBuffer;
use crate::error::HealthResult;
use crate::event::{ChangeEvent, Topic};
use crate::mutation::{decode_ops, MutationRecord, TxnOp};
use crate::resolver::{CatalogSnapshot, HealthResolver};
use crate::sink::{BufferSink, Collector, EventSink};

pub use expander::expand;
pub use orderer::order;
pub use reducer::{reduce, Intent, Intents};

/// Default number of events an [`EventBuffer`] retains.
pub const DEFAULT_BUFFER_CAPACITY: usize = 4096;

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterializerConfig {
    /// Topic upserts are published on. Tombstones always use the plain topic.
    pub topic: Topic,
    /// Capacity of buffers created through [`Materializer::new_buffer`].
    pub buffer_capacity: usize,
}

impl Default for MaterializerConfig {
    fn default() -> Self {
        Self {
            topic: Topic::ServiceHealth,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

/// Runs the reduce, expand and order pipeline for committed transactions.
///
/// Stateless between calls: concurrent transactions may share one
/// `Materializer`, each against its own snapshot.
#[derive(Debug, Clone, Default)]
pub struct Materializer {
    cfg: MaterializerConfig,
}

impl Materializer {
    /// Create a materializer with the given configuration.
    #[must_use]
    pub fn new(cfg: MaterializerConfig) -> Self {
        Self { cfg }
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &MaterializerConfig {
        &self.cfg
    }

    /// A fresh buffer sized from the configuration.
    #[must_use]
    pub fn new_buffer(&self) -> EventBuffer {
        EventBuffer::new(self.cfg.buffer_capacity)
    }

    /// Collecting mode: every event for the transaction, in canonical order.
    ///
    /// All or nothing: on error no events are returned.
    pub fn materialize<R>(&self, resolver: &R, index: u64, batch: &[MutationRecord]) -> HealthResult<Vec<ChangeEvent>>
    where
        R: HealthResolver + ?Sized,
    {
        let intents = reduce(batch);
        let mut sink = Collector::new();
        self.expand_all(resolver, index, &intents, &mut sink)?;

        let mut events = sink.into_events();
        order(&mut events);

        tracing::debug!(
            index,
            mutations = batch.len(),
            nodes = intents.len(),
            removed = intents.removed_count(),
            events = events.len(),
            topic = %self.cfg.topic,
            "materialized transaction"
        );
        Ok(events)
    }

    /// Collecting mode over wire operations.
    ///
    /// # Errors
    /// - `ContractViolation`: an operation is malformed; nothing is resolved
    pub fn materialize_ops<R>(&self, resolver: &R, index: u64, ops: &[TxnOp]) -> HealthResult<Vec<ChangeEvent>>
    where
        R: HealthResolver + ?Sized,
    {
        let batch = decode_ops(ops)?;
        self.materialize(resolver, index, &batch)
    }

    /// Buffered mode: append events for the transaction into `buffer`.
    ///
    /// Returns the number of events appended. The buffer is locked for the
    /// whole transaction; on error it is left exactly as it was.
    pub fn materialize_into<R>(
        &self,
        resolver: &R,
        index: u64,
        batch: &[MutationRecord],
        buffer: &EventBuffer,
    ) -> HealthResult<usize>
    where
        R: HealthResolver + ?Sized,
    {
        let intents = reduce(batch);
        let mut sink = BufferSink::new(buffer);
        self.expand_all(resolver, index, &intents, &mut sink)?;
        let appended = sink.commit();

        tracing::debug!(
            index,
            mutations = batch.len(),
            nodes = intents.len(),
            appended,
            "materialized transaction into buffer"
        );
        Ok(appended)
    }

    /// Bulk catch-up: append upserts for every node in `snapshot`.
    ///
    /// Nodes are visited in the snapshot's order; events are never collected.
    /// Only the node identities are held up front, and at most one buffer's
    /// worth of events is staged. Like [`Materializer::materialize_into`], a
    /// failure leaves the buffer unchanged.
    pub fn snapshot_into<C>(&self, snapshot: &C, index: u64, buffer: &EventBuffer) -> HealthResult<usize>
    where
        C: CatalogSnapshot + ?Sized,
    {
        let nodes = snapshot.node_ids()?;
        let mut sink = BufferSink::new(buffer);
        for node in &nodes {
            if let Err(err) = expand(index, node, Intent::Touched, self.cfg.topic, snapshot, &mut sink) {
                tracing::warn!(index, %node, error = %err, "aborting catalog snapshot");
                return Err(err);
            }
        }
        let appended = sink.commit();

        tracing::debug!(
            index,
            nodes = nodes.len(),
            appended,
            topic = %self.cfg.topic,
            "materialized catalog snapshot"
        );
        Ok(appended)
    }

    fn expand_all<R, S>(&self, resolver: &R, index: u64, intents: &Intents, sink: &mut S) -> HealthResult<()>
    where
        R: HealthResolver + ?Sized,
        S: EventSink + ?Sized,
    {
        for (node, intent) in intents {
            if let Err(err) = expand(index, node, *intent, self.cfg.topic, resolver, sink) {
                tracing::warn!(index, %node, error = %err, "aborting transaction materialization");
                return Err(err);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Node, NodeId, ServiceInstance};
    use crate::mutation::Verb;
    use crate::resolver::MemoryCatalog;

    fn nid(s: &str) -> NodeId {
        NodeId::new(s).unwrap()
    }

    #[test]
    fn config_defaults_and_partial_json() {
        let cfg = MaterializerConfig::default();
        assert_eq!(cfg.topic, Topic::ServiceHealth);
        assert_eq!(cfg.buffer_capacity, DEFAULT_BUFFER_CAPACITY);

        let cfg: MaterializerConfig = serde_json::from_str(r#"{"topic": "service_health_connect"}"#).unwrap();
        assert_eq!(cfg.topic, Topic::ServiceHealthConnect);
        assert_eq!(cfg.buffer_capacity, DEFAULT_BUFFER_CAPACITY);
    }

    #[test]
    fn new_buffer_uses_configured_capacity() {
        let m = Materializer::new(MaterializerConfig {
            buffer_capacity: 16,
            ..MaterializerConfig::default()
        });
        assert_eq!(m.new_buffer().capacity(), 16);
    }

    #[test]
    fn materialize_ops_rejects_malformed_batch() {
        let catalog = MemoryCatalog::new();
        let m = Materializer::default();
        let ops: Vec<TxnOp> = serde_json::from_str(r#"[{"service": {"verb": "set", "service": "web"}}]"#).unwrap();
        let err = m.materialize_ops(&catalog, 1, &ops).unwrap_err();
        assert!(err.is_contract_violation());
    }

    #[test]
    fn materialize_ops_skips_non_catalog_ops() {
        let catalog = MemoryCatalog::new();
        catalog.register_node(Node::new(nid("n1"), "10.0.0.1")).unwrap();
        catalog.register_service(&nid("n1"), ServiceInstance::new("web", 80)).unwrap();

        let json = r#"[
            {"kv": {"verb": "set", "key": "foo"}},
            {"node": {"verb": "set", "node": "n1"}}
        ]"#;
        let ops: Vec<TxnOp> = serde_json::from_str(json).unwrap();
        let events = Materializer::default().materialize_ops(&catalog, 4, &ops).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].key, "web");
    }

    #[test]
    fn buffered_mode_appends_without_ordering_guarantee() {
        let catalog = MemoryCatalog::new();
        catalog.register_node(Node::new(nid("a"), "10.0.0.1")).unwrap();
        catalog.register_service(&nid("a"), ServiceInstance::new("web", 80)).unwrap();

        let m = Materializer::default();
        let buffer = m.new_buffer();
        let batch = vec![
            MutationRecord::service(nid("a"), "web", Verb::Register),
            MutationRecord::node(nid("b"), Verb::Delete),
        ];
        let appended = m.materialize_into(&catalog, 3, &batch, &buffer).unwrap();

        assert_eq!(appended, 2);
        let mut events = buffer.drain();
        order(&mut events);
        assert_eq!(events[0].key, "web");
        assert!(events[1].is_tombstone());
    }

    #[test]
    fn snapshot_covers_every_node() {
        let catalog = MemoryCatalog::new();
        for (node, svc) in [("a", "web"), ("b", "db"), ("c", "cache")] {
            catalog.register_node(Node::new(nid(node), "10.0.0.1")).unwrap();
            catalog.register_service(&nid(node), ServiceInstance::new(svc, 80)).unwrap();
        }

        let m = Materializer::default();
        let buffer = m.new_buffer();
        let appended = m.snapshot_into(&catalog, 42, &buffer).unwrap();

        assert_eq!(appended, 3);
        let keys: Vec<String> = buffer.drain().into_iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["web", "db", "cache"]);
    }
}
