//! # Bounded Ring Buffers
//!
//! Fixed-capacity FIFO used for both the UART byte queue and the parsed record queue.
//! Capacity is never exceeded: when full, the configured [`OverflowPolicy`] decides
//! whether the incoming item or the oldest buffered item is lost, and every loss is
//! counted.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// What to give up when a push hits capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Reject the incoming item.
    DropNewest,
    /// Evict the oldest item to make room.
    DropOldest,
}

/// Outcome of a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Stored,
    /// The buffer was full and the incoming item was rejected.
    Rejected,
    /// The buffer was full and the oldest item was evicted.
    Evicted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RingStats {
    pub pushed: u64,
    pub popped: u64,
    pub dropped: u64,
    pub high_water: usize,
}

#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    data: VecDeque<T>,
    capacity: usize,
    policy: OverflowPolicy,
    stats: RingStats,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        RingBuffer {
            data: VecDeque::with_capacity(capacity),
            capacity,
            policy,
            stats: RingStats::default(),
        }
    }

    pub fn push(&mut self, item: T) -> PushOutcome {
        let outcome = if self.data.len() < self.capacity {
            self.data.push_back(item);
            PushOutcome::Stored
        } else {
            self.stats.dropped += 1;
            match self.policy {
                OverflowPolicy::DropNewest => return PushOutcome::Rejected,
                OverflowPolicy::DropOldest => {
                    if self.data.pop_front().is_none() {
                        // zero capacity
                        return PushOutcome::Rejected;
                    }
                    self.data.push_back(item);
                    PushOutcome::Evicted
                }
            }
        };
        self.stats.pushed += 1;
        self.stats.high_water = self.stats.high_water.max(self.data.len());
        outcome
    }

    pub fn pop(&mut self) -> Option<T> {
        let item = self.data.pop_front();
        if item.is_some() {
            self.stats.popped += 1;
        }
        item
    }

    /// Removes up to `max` items from the front, oldest first.
    pub fn drain_up_to(&mut self, max: usize) -> Vec<T> {
        let count = max.min(self.data.len());
        self.stats.popped += count as u64;
        self.data.drain(..count).collect()
    }

    /// Most recently pushed item.
    pub fn peek_last(&self) -> Option<&T> {
        self.data.back()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> RingStats {
        self.stats
    }
}
