//! Mutation records applied within one catalog transaction.
//!
//! [`MutationRecord`] is the closed sum type the pipeline consumes. [`TxnOp`]
//! is the field-presence encoding a transaction API hands over on the wire;
//! decoding it fails loudly on anything that does not name exactly one
//! operation with an owning node.

use serde::{Deserialize, Serialize};

use crate::catalog::NodeId;
use crate::error::ContractViolation;

/// The intent of a single write operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verb {
    /// Read-only lookup. Contributes no intent.
    #[serde(rename = "get")]
    Get,
    /// Register or update.
    #[serde(rename = "set", alias = "register")]
    Register,
    /// Unconditional delete.
    #[serde(rename = "delete")]
    Delete,
    /// Delete guarded by a modify index check.
    #[serde(rename = "delete-cas")]
    DeleteConditional,
}

impl Verb {
    /// Returns true for verbs that do not modify the catalog.
    #[must_use]
    pub const fn is_read(self) -> bool {
        matches!(self, Self::Get)
    }

    /// Returns true for both delete flavours.
    #[must_use]
    pub const fn is_delete(self) -> bool {
        matches!(self, Self::Delete | Self::DeleteConditional)
    }
}

/// One mutation applied within a transaction, scoped to its owning node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MutationRecord {
    /// A write to the node itself.
    Node {
        /// The node being written.
        node: NodeId,
        /// What was done to it.
        verb: Verb,
    },
    /// A write to a service instance.
    Service {
        /// The owning node.
        node: NodeId,
        /// Service name.
        service: String,
        /// What was done to it.
        verb: Verb,
    },
    /// A write to a health check.
    Check {
        /// The owning node.
        node: NodeId,
        /// Check identifier.
        check_id: String,
        /// What was done to it.
        verb: Verb,
    },
}

impl MutationRecord {
    /// Shorthand for a node mutation.
    #[must_use]
    pub fn node(node: NodeId, verb: Verb) -> Self {
        Self::Node { node, verb }
    }

    /// Shorthand for a service mutation.
    #[must_use]
    pub fn service(node: NodeId, service: impl Into<String>, verb: Verb) -> Self {
        Self::Service {
            node,
            service: service.into(),
            verb,
        }
    }

    /// Shorthand for a check mutation.
    #[must_use]
    pub fn check(node: NodeId, check_id: impl Into<String>, verb: Verb) -> Self {
        Self::Check {
            node,
            check_id: check_id.into(),
            verb,
        }
    }

    /// The node this record is scoped to.
    #[must_use]
    pub const fn owner(&self) -> &NodeId {
        match self {
            Self::Node { node, .. } | Self::Service { node, .. } | Self::Check { node, .. } => node,
        }
    }

    /// The verb carried by the record.
    #[must_use]
    pub const fn verb(&self) -> Verb {
        match self {
            Self::Node { verb, .. } | Self::Service { verb, .. } | Self::Check { verb, .. } => *verb,
        }
    }
}

/// Node slot of a wire operation.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeOp {
    pub verb: Verb,
    #[serde(default)]
    pub node: String,
}

/// Service slot of a wire operation.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceOp {
    pub verb: Verb,
    #[serde(default)]
    pub node: String,
    #[serde(default)]
    pub service: String,
}

/// Check slot of a wire operation.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOp {
    pub verb: Verb,
    #[serde(default)]
    pub node: String,
    #[serde(default)]
    pub check_id: String,
}

/// A transaction operation as received on the wire.
///
/// At most one catalog slot may be set. Operations on other stores (KV,
/// sessions, intentions) decode with every slot empty and carry no catalog
/// mutation.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxnOp {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeOp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceOp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<CheckOp>,
}

impl TxnOp {
    /// Converts the wire operation at `position` into a [`MutationRecord`],
    /// or `None` when it touches no catalog entity.
    ///
    /// # Errors
    /// - `AmbiguousOperation`: more than one catalog slot is set
    /// - `MissingOwner`: the set slot names no node
    pub fn into_record(self, position: usize) -> Result<Option<MutationRecord>, ContractViolation> {
        let owner = |node: String, kind: &'static str| {
            if node.is_empty() {
                Err(ContractViolation::MissingOwner { position, kind })
            } else {
                NodeId::new(node)
            }
        };

        match (self.node, self.service, self.check) {
            (Some(op), None, None) => Ok(Some(MutationRecord::Node {
                node: owner(op.node, "node")?,
                verb: op.verb,
            })),
            (None, Some(op), None) => Ok(Some(MutationRecord::Service {
                node: owner(op.node, "service")?,
                service: op.service,
                verb: op.verb,
            })),
            (None, None, Some(op)) => Ok(Some(MutationRecord::Check {
                node: owner(op.node, "check")?,
                check_id: op.check_id,
                verb: op.verb,
            })),
            (None, None, None) => Ok(None),
            _ => Err(ContractViolation::AmbiguousOperation { position }),
        }
    }
}

/// Decodes a whole transaction's wire operations, preserving commit order.
///
/// Operations outside the catalog are skipped. Stops at the first malformed
/// catalog operation.
///
/// # Errors
/// - `AmbiguousOperation`, `MissingOwner`: see [`TxnOp::into_record`]
pub fn decode_ops(ops: &[TxnOp]) -> Result<Vec<MutationRecord>, ContractViolation> {
    ops.iter()
        .cloned()
        .enumerate()
        .filter_map(|(position, op)| op.into_record(position).transpose())
        .collect()
}
