//! Bounded history buffer.
//!
//! Fixed-capacity ring buffer used to keep the most recent decisions of a
//! simulation call. Once full, every push evicts the oldest entry.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Ring buffer with explicit capacity and oldest-first eviction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RingBuffer<T> {
    capacity: usize,
    items: VecDeque<T>,
    /// Total number of pushes, including evicted ones.
    pushed: u64,
}

impl<T> RingBuffer<T> {
    /// Create an empty buffer. A zero capacity keeps nothing.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
            pushed: 0,
        }
    }

    /// Push an item, returning the evicted one if the buffer was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        self.pushed += 1;
        if self.capacity == 0 {
            return Some(item);
        }
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// Maximum number of retained items.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of retained items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total pushes since creation.
    #[must_use]
    pub const fn total_pushed(&self) -> u64 {
        self.pushed
    }

    /// Number of evicted (or rejected) items.
    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.pushed - self.items.len() as u64
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Drop all retained items.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_within_capacity() {
        let mut buf = RingBuffer::with_capacity(3);
        assert!(buf.push(1).is_none());
        assert!(buf.push(2).is_none());
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_evicts_oldest() {
        let mut buf = RingBuffer::with_capacity(3);
        for i in 1..=5 {
            buf.push(i);
        }
        assert_eq!(buf.iter().copied().collect::<Vec<_>>(), vec![3, 4, 5]);
        assert_eq!(buf.total_pushed(), 5);
        assert_eq!(buf.evicted(), 2);
    }

    #[test]
    fn test_push_returns_evicted() {
        let mut buf = RingBuffer::with_capacity(1);
        buf.push("a");
        assert_eq!(buf.push("b"), Some("a"));
    }

    #[test]
    fn test_zero_capacity() {
        let mut buf = RingBuffer::with_capacity(0);
        assert_eq!(buf.push(7), Some(7));
        assert!(buf.is_empty());
        assert_eq!(buf.evicted(), 1);
    }

    #[test]
    fn test_clear() {
        let mut buf = RingBuffer::with_capacity(4);
        buf.push(1);
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 4);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Falsification: length never exceeds capacity and the newest items survive.
        #[test]
        fn prop_bounded(capacity in 0usize..32, items in prop::collection::vec(any::<i32>(), 0..100)) {
            let mut buf = RingBuffer::with_capacity(capacity);
            for &i in &items {
                buf.push(i);
            }
            prop_assert!(buf.len() <= capacity);
            let kept: Vec<i32> = buf.iter().copied().collect();
            let start = items.len() - kept.len();
            prop_assert_eq!(&kept[..], &items[start..]);
        }
    }
}
