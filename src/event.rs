//! Change events handed to the event bus.
//!
//! These types are serializable so the bus can put them on the wire without
//! another conversion layer.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::{HealthView, NodeId};

/// Topic an event is published on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Plain service health.
    #[default]
    ServiceHealth,
    /// Connect-aware service health: only proxies, gateways and connect-native
    /// services.
    ServiceHealthConnect,
}

impl Topic {
    /// Returns true for the connect-aware topic.
    #[must_use]
    pub const fn is_connect(self) -> bool {
        matches!(self, Self::ServiceHealthConnect)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServiceHealth => write!(f, "service_health"),
            Self::ServiceHealthConnect => write!(f, "service_health_connect"),
        }
    }
}

/// Catalog operation an event represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogOp {
    /// Entity registered or updated.
    Register,
    /// Entity removed.
    Deregister,
}

/// Event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// The entity's current full state.
    Upsert {
        /// Resolved health view.
        view: HealthView,
    },
    /// The node and everything under it no longer exist.
    Tombstone {
        /// The removed node.
        node: NodeId,
    },
}

/// A single change notification.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub topic: Topic,
    /// Commit index of the transaction that produced the event.
    pub index: u64,
    /// Routing key: the service name, empty for bare nodes and tombstones.
    #[serde(default)]
    pub key: String,
    pub payload: EventPayload,
}

impl ChangeEvent {
    /// Builds an upsert event for a resolved view.
    #[must_use]
    pub fn upsert(topic: Topic, index: u64, view: HealthView) -> Self {
        Self {
            topic,
            index,
            key: view.service_name().to_string(),
            payload: EventPayload::Upsert { view },
        }
    }

    /// Builds a tombstone event from nothing but the node identity.
    ///
    /// Tombstones are always published on [`Topic::ServiceHealth`].
    #[must_use]
    pub fn tombstone(index: u64, node: NodeId) -> Self {
        Self {
            topic: Topic::ServiceHealth,
            index,
            key: String::new(),
            payload: EventPayload::Tombstone { node },
        }
    }

    /// The node this event is about.
    #[must_use]
    pub fn node_id(&self) -> &NodeId {
        match &self.payload {
            EventPayload::Upsert { view } => view.node_id(),
            EventPayload::Tombstone { node } => node,
        }
    }

    /// The catalog operation this event represents.
    #[must_use]
    pub const fn op(&self) -> CatalogOp {
        match self.payload {
            EventPayload::Upsert { .. } => CatalogOp::Register,
            EventPayload::Tombstone { .. } => CatalogOp::Deregister,
        }
    }

    /// Returns true for tombstones.
    #[must_use]
    pub const fn is_tombstone(&self) -> bool {
        matches!(self.payload, EventPayload::Tombstone { .. })
    }

    /// The resolved view for upserts.
    #[must_use]
    pub fn view(&self) -> Option<&HealthView> {
        match &self.payload {
            EventPayload::Upsert { view } => Some(view),
            EventPayload::Tombstone { .. } => None,
        }
    }
}

/// Stable blake3 digest over an ordered event sequence.
///
/// Two independently computed event sets are identical iff their digests are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventDigest([u8; 32]);

impl EventDigest {
    /// Hashes the canonical JSON encoding of each event, length-prefixed, in
    /// sequence order.
    pub fn compute(events: &[ChangeEvent]) -> Result<Self, serde_json::Error> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(events.len() as u64).to_le_bytes());
        for event in events {
            let bytes = serde_json::to_vec(event)?;
            hasher.update(&(bytes.len() as u64).to_le_bytes());
            hasher.update(&bytes);
        }
        Ok(Self(*hasher.finalize().as_bytes()))
    }

    /// Raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for EventDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}
