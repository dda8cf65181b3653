//! Intent expansion.
//!
//! Turns one node's intent into events. Removed nodes become a single
//! tombstone without touching the snapshot; touched nodes are joined through
//! the resolver and produce one upsert per view.

use crate::catalog::NodeId;
use crate::error::HealthResult;
use crate::event::{ChangeEvent, Topic};
use crate::resolver::{HealthResolver, ViewFilter};
use crate::sink::EventSink;

use super::reducer::Intent;

/// Expand one node's intent into `sink`, returning the number of events emitted.
///
/// # Errors
/// - `Resolver`: the join failed for a touched node; nothing further should be
///   emitted for the transaction
/// - `Sink`: the sink refused an event
pub fn expand<R, S>(
    index: u64,
    node: &NodeId,
    intent: Intent,
    topic: Topic,
    resolver: &R,
    sink: &mut S,
) -> HealthResult<usize>
where
    R: HealthResolver + ?Sized,
    S: EventSink + ?Sized,
{
    if intent.is_removed() {
        sink.emit(ChangeEvent::tombstone(index, node.clone()))?;
        tracing::trace!(index, %node, "emitted tombstone");
        return Ok(1);
    }

    let views = resolver.resolve(node, &ViewFilter::for_topic(topic))?;
    let count = views.len();
    for view in views {
        let event = ChangeEvent::upsert(topic, index, view);
        tracing::trace!(index, %node, key = %event.key, %topic, "emitted upsert");
        sink.emit(event)?;
    }
    Ok(count)
}
