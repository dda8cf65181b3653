//! Resolver traits.
//!
//! These traits are the boundary to the storage engine that owns the catalog.
//! The implementing value *is* the post-transaction snapshot: it must be
//! immutable for the duration of a materialization, so repeated calls for the
//! same node return the same views.

use crate::catalog::{HealthView, NodeId};
use crate::error::ResolverError;
use crate::event::Topic;

/// Filters applied by the join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewFilter {
    /// Only include proxies, gateways and connect-native services.
    pub connect: bool,
}

impl ViewFilter {
    /// The filter matching what subscribers of `topic` expect.
    #[must_use]
    pub const fn for_topic(topic: Topic) -> Self {
        Self {
            connect: topic.is_connect(),
        }
    }
}

/// Joins a node into its effective health views.
pub trait HealthResolver: Send + Sync {
    /// Resolve every view for `node` that passes `filter`.
    ///
    /// Returns an empty list, not an error, when the node exists but has no
    /// matching services.
    ///
    /// # Errors
    /// - `NodeNotFound`: the node is absent from the snapshot
    /// - `Backend`: lower-level read failure
    fn resolve(&self, node: &NodeId, filter: &ViewFilter) -> Result<Vec<HealthView>, ResolverError>;
}

/// A snapshot that can also enumerate its nodes, for bulk materialization.
pub trait CatalogSnapshot: HealthResolver {
    /// Every node identity in the snapshot, in ascending order.
    fn node_ids(&self) -> Result<Vec<NodeId>, ResolverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test: ensure traits are object-safe
    fn _assert_resolver_object_safe(_: &dyn HealthResolver) {}
    fn _assert_snapshot_object_safe(_: &dyn CatalogSnapshot) {}

    #[test]
    fn filter_follows_topic() {
        assert!(!ViewFilter::for_topic(Topic::ServiceHealth).connect);
        assert!(ViewFilter::for_topic(Topic::ServiceHealthConnect).connect);
        assert_eq!(ViewFilter::default(), ViewFilter::for_topic(Topic::default()));
    }
}
