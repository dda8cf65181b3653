//! Mutation reduction.
//!
//! Collapses a transaction's mutation records into one intent per node. The
//! batch is walked in commit order and every non-read record overwrites the
//! intent for its owning node, so the last write to a node decides whether it
//! is tombstoned or re-resolved.

use std::collections::hash_map;
use std::collections::HashMap;

use crate::catalog::NodeId;
use crate::mutation::MutationRecord;

/// What the transaction did to a node, as far as subscribers care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    /// The node or something under it was written; re-resolve it.
    Touched,
    /// The node was deleted; emit a tombstone.
    Removed,
}

impl Intent {
    /// Returns true for [`Intent::Removed`].
    #[must_use]
    pub const fn is_removed(self) -> bool {
        matches!(self, Self::Removed)
    }

    fn of(record: &MutationRecord) -> Option<Self> {
        let verb = record.verb();
        if verb.is_read() {
            return None;
        }
        match record {
            MutationRecord::Node { .. } if verb.is_delete() => Some(Self::Removed),
            MutationRecord::Node { .. } | MutationRecord::Service { .. } | MutationRecord::Check { .. } => {
                Some(Self::Touched)
            }
        }
    }
}

/// Per-node intents for one transaction. Iteration order is unspecified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Intents {
    by_node: HashMap<NodeId, Intent>,
}

impl Intents {
    /// Intent recorded for `node`, if the transaction wrote to it.
    #[must_use]
    pub fn get(&self, node: &NodeId) -> Option<Intent> {
        self.by_node.get(node).copied()
    }

    /// Number of distinct nodes written.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_node.len()
    }

    /// Returns true if the transaction wrote nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_node.is_empty()
    }

    /// Number of nodes that will be tombstoned.
    #[must_use]
    pub fn removed_count(&self) -> usize {
        self.by_node.values().filter(|i| i.is_removed()).count()
    }

    /// Iterate `(node, intent)` pairs in unspecified order.
    pub fn iter(&self) -> hash_map::Iter<'_, NodeId, Intent> {
        self.by_node.iter()
    }
}

impl<'a> IntoIterator for &'a Intents {
    type Item = (&'a NodeId, &'a Intent);
    type IntoIter = hash_map::Iter<'a, NodeId, Intent>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Reduce a commit-ordered batch into per-node intents.
#[must_use]
pub fn reduce(batch: &[MutationRecord]) -> Intents {
    let mut by_node = HashMap::new();
    for record in batch {
        if let Some(intent) = Intent::of(record) {
            by_node.insert(record.owner().clone(), intent);
        }
    }
    Intents { by_node }
}
