//! Relay counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Running counters of one relay
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Messages taken from the source queue
    received: AtomicU64,
    /// Messages delivered to every destination
    forwarded: AtomicU64,
    /// Messages reported and dropped
    rejected: AtomicU64,
    /// Messages with at least one failed copy
    delivery_failures: AtomicU64,
    /// Individual copies accepted by the broker
    copies_published: AtomicU64,
    /// Errors surfaced by the consumer stream
    consume_errors: AtomicU64,
}

impl RelayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn inc_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    pub fn inc_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn inc_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delivery_failures(&self) -> u64 {
        self.delivery_failures.load(Ordering::Relaxed)
    }

    pub fn inc_delivery_failures(&self) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn copies_published(&self) -> u64 {
        self.copies_published.load(Ordering::Relaxed)
    }

    /// Add the copies delivered by one fan-out
    pub fn add_copies_published(&self, copies: usize) {
        self.copies_published
            .fetch_add(copies as u64, Ordering::Relaxed);
    }

    pub fn consume_errors(&self) -> u64 {
        self.consume_errors.load(Ordering::Relaxed)
    }

    pub fn inc_consume_errors(&self) {
        self.consume_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            received: self.received(),
            forwarded: self.forwarded(),
            rejected: self.rejected(),
            delivery_failures: self.delivery_failures(),
            copies_published: self.copies_published(),
            consume_errors: self.consume_errors(),
        }
    }
}

/// Snapshot of relay counters (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub received: u64,
    pub forwarded: u64,
    pub rejected: u64,
    pub delivery_failures: u64,
    pub copies_published: u64,
    pub consume_errors: u64,
}
