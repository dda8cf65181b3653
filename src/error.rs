//! Error types for healthstream.
//!
//! All errors are strongly typed using thiserror so callers can tell a failed
//! snapshot join apart from malformed input without parsing messages.

use thiserror::Error;

use crate::catalog::NodeId;

/// Malformed input handed to the pipeline by its caller.
///
/// These are programming errors on the caller side. They are raised when a
/// record is constructed or decoded and are never skipped silently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    #[error("Node identity cannot be empty")]
    EmptyNodeId,

    #[error("Transaction operation {position} carries more than one of node, service, check")]
    AmbiguousOperation {
        position: usize,
    },

    #[error("Transaction operation {position} ({kind}) has no owning node")]
    MissingOwner {
        position: usize,
        kind: &'static str,
    },
}

/// Errors raised by a [`HealthResolver`](crate::resolver::HealthResolver) join.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolverError {
    /// The node was touched by the transaction but is missing from the snapshot.
    #[error("Node not found in snapshot: {0}")]
    NodeNotFound(NodeId),

    /// Lower-level read failure.
    #[error("Snapshot backend error: {0}")]
    Backend(String),
}

/// Errors raised when handing an event to a sink.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("Event index {index} is lower than last appended index {last}")]
    IndexRegression {
        last: u64,
        index: u64,
    },
}

/// Top-level error type for a materialization.
///
/// There is no partial-success variant: any error aborts the materialization
/// of the whole transaction.
#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("Resolver failure: {0}")]
    Resolver(#[from] ResolverError),

    #[error("Contract violation: {0}")]
    ContractViolation(#[from] ContractViolation),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
}

impl MaterializeError {
    /// Returns true if the snapshot join failed.
    #[must_use]
    pub const fn is_resolver_failure(&self) -> bool {
        matches!(self, Self::Resolver(_))
    }

    /// Returns true if the caller handed in malformed input.
    #[must_use]
    pub const fn is_contract_violation(&self) -> bool {
        matches!(self, Self::ContractViolation(_))
    }

    /// Returns true if re-running the whole materialization may succeed.
    ///
    /// Only backend read failures qualify. A missing node means the snapshot is
    /// inconsistent and will stay that way.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Resolver(ResolverError::Backend(_)))
    }
}

/// Result type alias for materialization operations.
pub type HealthResult<T> = Result<T, MaterializeError>;
