//! Canonical event order for collecting mode.

use std::cmp::Ordering;

use crate::event::ChangeEvent;

/// Compares two events by node identity, then routing key.
///
/// Bare-node events and tombstones carry an empty key and so sort before any
/// named service on the same node.
#[must_use]
pub fn compare(a: &ChangeEvent, b: &ChangeEvent) -> Ordering {
    a.node_id()
        .cmp(b.node_id())
        .then_with(|| a.key.cmp(&b.key))
}

/// Stable in-place sort into canonical order.
pub fn order(events: &mut [ChangeEvent]) {
    events.sort_by(compare);
}
