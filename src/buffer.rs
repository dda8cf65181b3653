//! Capped, append-only event buffer shared with the event bus.
//!
//! Writes are serialized behind a mutex so concurrent materializations keep
//! the buffer's index order monotonic. A transaction's events are staged under
//! the lock and become visible together, or not at all. Once full, the oldest
//! events are evicted at commit.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::SinkError;
use crate::event::ChangeEvent;

#[derive(Debug, Default)]
struct BufferState {
    events: VecDeque<ChangeEvent>,
    last_index: Option<u64>,
    evicted: u64,
}

/// Capped event log.
#[derive(Debug)]
pub struct EventBuffer {
    capacity: usize,
    state: Mutex<BufferState>,
}

impl EventBuffer {
    /// Create a buffer holding at most `capacity` events (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            state: Mutex::new(BufferState {
                events: VecDeque::with_capacity(capacity.min(1024)),
                last_index: None,
                evicted: 0,
            }),
        }
    }

    // Every mutation below leaves the state consistent before it can panic,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one event as its own transaction.
    ///
    /// # Errors
    /// - `IndexRegression`: `event.index` is lower than the last appended index
    pub fn append(&self, event: ChangeEvent) -> Result<(), SinkError> {
        let mut txn = self.begin();
        txn.append(event)?;
        txn.commit();
        Ok(())
    }

    /// Start a transaction holding the buffer lock until it is committed or dropped.
    ///
    /// Readers and other writers block for the transaction's lifetime, so do
    /// not call other buffer methods from the same thread while it is open.
    #[must_use]
    pub fn begin(&self) -> BufferTxn<'_> {
        let state = self.lock();
        BufferTxn {
            capacity: self.capacity,
            base_len: state.events.len(),
            base_last: state.last_index,
            state,
            pending: 0,
            dropped: 0,
            committed: false,
        }
    }

    /// Maximum number of retained events.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of retained events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    /// Returns true if nothing is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().events.is_empty()
    }

    /// Index of the most recent append, if any.
    #[must_use]
    pub fn last_index(&self) -> Option<u64> {
        self.lock().last_index
    }

    /// Total number of events evicted since creation.
    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.lock().evicted
    }

    /// Retained events with `index >= from`, in append order.
    #[must_use]
    pub fn events_since(&self, from: u64) -> Vec<ChangeEvent> {
        let state = self.lock();
        // Indexes are monotonic, so everything after the first match qualifies.
        let start = state.events.partition_point(|e| e.index < from);
        state.events.range(start..).cloned().collect()
    }

    /// Remove and return every retained event, in append order.
    ///
    /// The monotonic index watermark is kept.
    pub fn drain(&self) -> Vec<ChangeEvent> {
        self.lock().events.drain(..).collect()
    }
}

/// An open write transaction on an [`EventBuffer`].
///
/// Events appended through it become visible together on [`BufferTxn::commit`].
/// Dropping it uncommitted restores the buffer to its state before
/// [`EventBuffer::begin`]. Eviction of older events happens at commit, so a
/// rolled-back transaction never costs the buffer anything.
#[derive(Debug)]
pub struct BufferTxn<'a> {
    capacity: usize,
    state: MutexGuard<'a, BufferState>,
    base_len: usize,
    base_last: Option<u64>,
    // Events of this transaction currently held, all after `base_len`.
    pending: usize,
    // Events of this transaction already pushed out by later ones.
    dropped: usize,
    committed: bool,
}

impl BufferTxn<'_> {
    /// Stage one event.
    ///
    /// Held events stay bounded: once the transaction alone fills the
    /// capacity, its own oldest event is dropped, as commit would evict it anyway.
    ///
    /// # Errors
    /// - `IndexRegression`: `event.index` is lower than the last appended index
    pub fn append(&mut self, event: ChangeEvent) -> Result<(), SinkError> {
        if let Some(last) = self.state.last_index {
            if event.index < last {
                tracing::warn!(last, index = event.index, "rejecting out-of-order event append");
                return Err(SinkError::IndexRegression {
                    last,
                    index: event.index,
                });
            }
        }

        if self.pending >= self.capacity {
            let base = self.base_len;
            if self.state.events.remove(base).is_some() {
                self.pending -= 1;
                self.dropped += 1;
            }
        }

        self.state.last_index = Some(event.index);
        self.state.events.push_back(event);
        self.pending += 1;
        Ok(())
    }

    /// Number of events staged so far, including ones the transaction itself overflowed.
    #[must_use]
    pub fn staged(&self) -> usize {
        self.pending + self.dropped
    }

    /// Publish the staged events, evicting the oldest retained ones past capacity.
    pub fn commit(mut self) -> usize {
        let overflow = self.state.events.len().saturating_sub(self.capacity);
        if overflow > 0 {
            self.state.events.drain(..overflow);
            tracing::trace!(evicted = overflow, "event buffer full, evicted oldest");
        }
        self.state.evicted += (overflow + self.dropped) as u64;
        self.committed = true;
        self.staged()
    }
}

impl Drop for BufferTxn<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let base_len = self.base_len;
        self.state.events.truncate(base_len);
        self.state.last_index = self.base_last;
        if self.pending > 0 || self.dropped > 0 {
            tracing::debug!(discarded = self.staged(), "rolled back event buffer transaction");
        }
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new(crate::materialize::DEFAULT_BUFFER_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::catalog::NodeId;

    fn tomb(index: u64, node: &str) -> ChangeEvent {
        ChangeEvent::tombstone(index, NodeId::new(node).unwrap())
    }

    #[test]
    fn append_preserves_order() {
        let buf = EventBuffer::new(8);
        buf.append(tomb(1, "a")).unwrap();
        buf.append(tomb(1, "b")).unwrap();
        buf.append(tomb(2, "c")).unwrap();

        assert_eq!(buf.len(), 3);
        assert_eq!(buf.last_index(), Some(2));
        let nodes: Vec<String> = buf.drain().iter().map(|e| e.node_id().to_string()).collect();
        assert_eq!(nodes, vec!["a", "b", "c"]);
        assert!(buf.is_empty());
        assert_eq!(buf.last_index(), Some(2));
    }

    #[test]
    fn rejects_index_regression() {
        let buf = EventBuffer::new(8);
        buf.append(tomb(5, "a")).unwrap();
        let err = buf.append(tomb(4, "b")).unwrap_err();
        assert_eq!(err, SinkError::IndexRegression { last: 5, index: 4 });
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn evicts_oldest_when_full() {
        let buf = EventBuffer::new(2);
        buf.append(tomb(1, "a")).unwrap();
        buf.append(tomb(2, "b")).unwrap();
        buf.append(tomb(3, "c")).unwrap();

        assert_eq!(buf.len(), 2);
        assert_eq!(buf.evicted(), 1);
        let indexes: Vec<u64> = buf.events_since(0).iter().map(|e| e.index).collect();
        assert_eq!(indexes, vec![2, 3]);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let buf = EventBuffer::new(0);
        assert_eq!(buf.capacity(), 1);
        buf.append(tomb(1, "a")).unwrap();
        buf.append(tomb(1, "b")).unwrap();
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn events_since_filters_by_index() {
        let buf = EventBuffer::new(16);
        for (i, n) in ["a", "b", "c", "d"].iter().enumerate() {
            buf.append(tomb(10 + i as u64, n)).unwrap();
        }
        let tail: Vec<u64> = buf.events_since(12).iter().map(|e| e.index).collect();
        assert_eq!(tail, vec![12, 13]);
        assert!(buf.events_since(100).is_empty());
    }

    #[test]
    fn dropped_transaction_leaves_buffer_untouched() {
        let buf = EventBuffer::new(2);
        buf.append(tomb(1, "a")).unwrap();
        buf.append(tomb(2, "b")).unwrap();

        {
            let mut txn = buf.begin();
            txn.append(tomb(3, "c")).unwrap();
            txn.append(tomb(3, "d")).unwrap();
            txn.append(tomb(3, "e")).unwrap();
            assert_eq!(txn.staged(), 3);
        }

        assert_eq!(buf.last_index(), Some(2));
        assert_eq!(buf.evicted(), 0);
        let nodes: Vec<String> = buf.drain().iter().map(|e| e.node_id().to_string()).collect();
        assert_eq!(nodes, vec!["a", "b"]);
    }

    #[test]
    fn committed_transaction_evicts_at_commit() {
        let buf = EventBuffer::new(3);
        buf.append(tomb(1, "a")).unwrap();
        buf.append(tomb(1, "b")).unwrap();

        let mut txn = buf.begin();
        for n in ["c", "d", "e", "f"] {
            txn.append(tomb(2, n)).unwrap();
        }
        assert_eq!(txn.commit(), 4);

        assert_eq!(buf.evicted(), 3);
        let nodes: Vec<String> = buf.drain().iter().map(|e| e.node_id().to_string()).collect();
        assert_eq!(nodes, vec!["d", "e", "f"]);
    }

    #[test]
    fn transaction_regression_keeps_earlier_staged_events_private() {
        let buf = EventBuffer::new(8);
        buf.append(tomb(5, "a")).unwrap();

        let mut txn = buf.begin();
        txn.append(tomb(6, "b")).unwrap();
        let err = txn.append(tomb(4, "c")).unwrap_err();
        assert_eq!(err, SinkError::IndexRegression { last: 6, index: 4 });
        drop(txn);

        assert_eq!(buf.len(), 1);
        assert_eq!(buf.last_index(), Some(5));
    }

    #[test]
    fn concurrent_appends_stay_monotonic() {
        let buf = Arc::new(EventBuffer::new(10_000));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let buf = Arc::clone(&buf);
                thread::spawn(move || {
                    for i in 0..100u64 {
                        // Ignore regressions: other threads may have moved the watermark.
                        let _ = buf.append(tomb(i, &format!("t{t}-{i}")));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let indexes: Vec<u64> = buf.drain().iter().map(|e| e.index).collect();
        assert!(!indexes.is_empty());
        assert!(indexes.windows(2).all(|w| w[0] <= w[1]));
    }
}
