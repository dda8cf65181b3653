//! Emission sinks.
//!
//! The expander hands every event to an [`EventSink`] one at a time. Whether
//! events are collected for ordering or appended straight into the bus buffer
//! is decided by the caller when it picks the sink. Buffered appends are
//! transactional: a transaction's events reach buffer readers together or not
//! at all.

use crate::buffer::{BufferTxn, EventBuffer};
use crate::error::SinkError;
use crate::event::ChangeEvent;

/// Receives events one at a time.
pub trait EventSink {
    /// Accept one event.
    fn emit(&mut self, event: ChangeEvent) -> Result<(), SinkError>;
}

/// Collects events in memory so they can be ordered before handoff.
#[derive(Debug, Default)]
pub struct Collector {
    events: Vec<ChangeEvent>,
}

impl Collector {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Consume the collector, returning events in emission order.
    #[must_use]
    pub fn into_events(self) -> Vec<ChangeEvent> {
        self.events
    }
}

impl EventSink for Collector {
    fn emit(&mut self, event: ChangeEvent) -> Result<(), SinkError> {
        self.events.push(event);
        Ok(())
    }
}

/// Appends events into a shared [`EventBuffer`] inside one buffer transaction.
///
/// Nothing becomes visible to buffer readers until [`BufferSink::commit`];
/// dropping the sink uncommitted discards everything it appended.
#[derive(Debug)]
pub struct BufferSink<'a> {
    txn: BufferTxn<'a>,
}

impl<'a> BufferSink<'a> {
    /// Open a transaction on a shared buffer.
    #[must_use]
    pub fn new(buffer: &'a EventBuffer) -> Self {
        Self { txn: buffer.begin() }
    }

    /// Events appended through this sink.
    #[must_use]
    pub fn appended(&self) -> usize {
        self.txn.staged()
    }

    /// Publish the appended events, returning how many there were.
    pub fn commit(self) -> usize {
        self.txn.commit()
    }
}

impl EventSink for BufferSink<'_> {
    fn emit(&mut self, event: ChangeEvent) -> Result<(), SinkError> {
        self.txn.append(event)
    }
}
