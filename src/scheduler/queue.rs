//! Pending work ordered by priority, then arrival.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::priority::Priority;

/// One admitted, not yet serviced unit of work.
#[derive(Debug)]
pub struct QueueEntry<T> {
    pub priority: Priority,
    /// Arrival order, assigned by the queue.
    pub sequence: u64,
    pub payload: T,
}

impl<T> QueueEntry<T> {
    fn key(&self) -> (Priority, u64) {
        (self.priority, self.sequence)
    }
}

impl<T> PartialEq for QueueEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<T> Eq for QueueEntry<T> {}

impl<T> PartialOrd for QueueEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for QueueEntry<T> {
    // Reversed so the max-heap yields the lowest (priority, sequence) first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

/// Pending entries, always drained in (priority asc, sequence asc) order.
///
/// Sequences are unique, so equal priorities come out FIFO.
#[derive(Debug)]
pub struct PendingSet<T> {
    heap: BinaryHeap<QueueEntry<T>>,
    next_sequence: u64,
}

impl<T> PendingSet<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_sequence: 0,
        }
    }

    /// Insert `payload`, returning the arrival sequence it was given.
    pub fn push(&mut self, priority: Priority, payload: T) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(QueueEntry {
            priority,
            sequence,
            payload,
        });
        sequence
    }

    /// Remove the most urgent entry.
    pub fn pop(&mut self) -> Option<QueueEntry<T>> {
        self.heap.pop()
    }

    /// Priority of the entry `pop` would return.
    pub fn peek_priority(&self) -> Option<Priority> {
        self.heap.peek().map(|entry| entry.priority)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl<T> Default for PendingSet<T> {
    fn default() -> Self {
        Self::new()
    }
}
