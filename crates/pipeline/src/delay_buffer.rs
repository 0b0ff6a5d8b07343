//! Timestamp-ordered release queue
//!
//! One instance per output channel. Entries are appended in capture order by
//! the single pipeline thread, so the release scan can stop at the first
//! entry that is not old enough. The ring is bounded; overflow drops the
//! oldest entry and counts it.

use ringbuf::{traits::*, HeapRb};

/// Delay buffer over (timestamp, item) pairs
pub struct DelayBuffer<T> {
    ring: HeapRb<(i64, T)>,
    dropped_count: u64,
    out_of_order_count: u64,
    last_timestamp: Option<i64>,
}

impl<T> std::fmt::Debug for DelayBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayBuffer")
            .field("len", &self.ring.occupied_len())
            .field("dropped", &self.dropped_count)
            .finish()
    }
}

impl<T> DelayBuffer<T> {
    /// Create a buffer holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: HeapRb::new(capacity.max(1)),
            dropped_count: 0,
            out_of_order_count: 0,
            last_timestamp: None,
        }
    }

    /// Append an item stamped with its capture timestamp (nanoseconds).
    ///
    /// Insertion is expected to be approximately time-ordered; out-of-order
    /// pushes are counted but not reordered. A full ring drops its oldest
    /// entry first.
    pub fn push(&mut self, timestamp_ns: i64, item: T) {
        if let Some(last) = self.last_timestamp {
            if timestamp_ns < last {
                self.out_of_order_count += 1;
            }
        }
        self.last_timestamp = Some(timestamp_ns);

        if self.ring.is_full() {
            let _ = self.ring.try_pop();
            self.dropped_count += 1;
        }
        let _ = self.ring.try_push((timestamp_ns, item));
    }

    /// Release the newest entry that has aged at least `delay_ms`, removing
    /// it and every earlier entry.
    ///
    /// Scans from the front and stops at the first entry not old enough,
    /// relying on monotonic insertion order. Returns `None` when nothing
    /// qualifies.
    pub fn release_ready(&mut self, now_ns: i64, delay_ms: i64) -> Option<T> {
        let mut qualifying = 0usize;
        for (timestamp, _) in self.ring.iter() {
            let age_ms = (now_ns - timestamp) / 1_000_000;
            if age_ms >= delay_ms {
                qualifying += 1;
            } else {
                break;
            }
        }

        if qualifying == 0 {
            return None;
        }

        // discard everything older than the released entry
        for _ in 0..qualifying - 1 {
            let _ = self.ring.try_pop();
        }
        self.ring.try_pop().map(|(_, item)| item)
    }

    pub fn len(&self) -> usize {
        self.ring.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Entries lost to ring overflow
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count
    }

    /// Pushes that arrived with a timestamp older than their predecessor
    pub fn out_of_order_count(&self) -> u64 {
        self.out_of_order_count
    }
}
