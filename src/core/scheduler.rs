//! # Bounded-concurrency admission queue for first connections.
//!
//! [`ConnectionScheduler`] protects the server from a thundering herd when a
//! large fleet starts: at most `limit` clients may be attempting their first
//! connection at any moment; the rest wait in FIFO order.
//!
//! ## Rules
//! - `try_admit_next()` is called after every enqueue and after every release.
//! - An entry is admitted at most once; once admitted it leaves the queue.
//! - A slot is released only when a slot holder's *first* connection settles
//!   (online or failed). Reconnects never pass through here.
//! - `clear()` on fleet stop/restart drops the queue and resets `active`.
//!
//! ```text
//!  enqueue ──► [ e4 | e5 ] ──try_admit_next()──► active: e1 e2 e3  (limit 3)
//!                                ▲                        │
//!                                └──── release() ◄────────┘ settle
//! ```

use std::collections::VecDeque;

use super::types::Identity;

/// A deferred first-connection attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdmissionEntry {
    /// Client waiting for admission.
    pub identity: Identity,
    /// Record incarnation the entry was created for.
    pub incarnation: u64,
}

/// FIFO admission queue plus in-flight counter.
#[derive(Debug)]
pub struct ConnectionScheduler {
    queue: VecDeque<AdmissionEntry>,
    active: usize,
    limit: usize,
}

impl ConnectionScheduler {
    /// Creates a scheduler admitting at most `limit` (min 1) concurrent first connections.
    pub fn new(limit: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            active: 0,
            limit: limit.max(1),
        }
    }

    /// Appends an entry to the tail of the queue.
    pub fn enqueue(&mut self, entry: AdmissionEntry) {
        self.queue.push_back(entry);
    }

    /// Admits the head entry if a slot is free.
    ///
    /// Returns the admitted entry; the caller must run its connect action exactly once.
    pub fn try_admit_next(&mut self) -> Option<AdmissionEntry> {
        if self.active >= self.limit {
            return None;
        }
        let entry = self.queue.pop_front()?;
        self.active += 1;
        Some(entry)
    }

    /// Frees one admission slot.
    pub fn release(&mut self) {
        debug_assert!(self.active > 0, "release without admission");
        self.active = self.active.saturating_sub(1);
    }

    /// Removes a not-yet-admitted entry. Returns `true` if one was queued.
    pub fn remove(&mut self, identity: &Identity) -> bool {
        let before = self.queue.len();
        self.queue.retain(|e| &e.identity != identity);
        self.queue.len() != before
    }

    /// Drops every queued entry and resets the in-flight counter.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.active = 0;
    }

    /// Admitted first connections awaiting an outcome.
    #[inline]
    pub fn active(&self) -> usize {
        self.active
    }

    /// Entries waiting for admission.
    #[inline]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(i: usize) -> AdmissionEntry {
        AdmissionEntry {
            identity: Identity::derive("bot_", i),
            incarnation: i as u64,
        }
    }

    #[test]
    fn admits_up_to_limit_in_fifo_order() {
        let mut s = ConnectionScheduler::new(3);
        for i in 1..=5 {
            s.enqueue(entry(i));
        }
        let admitted: Vec<_> = std::iter::from_fn(|| s.try_admit_next()).collect();
        assert_eq!(admitted, vec![entry(1), entry(2), entry(3)]);
        assert_eq!(s.active(), 3);
        assert_eq!(s.queued(), 2);
    }

    #[test]
    fn release_admits_next_in_line() {
        let mut s = ConnectionScheduler::new(3);
        for i in 1..=5 {
            s.enqueue(entry(i));
            s.try_admit_next();
        }
        assert!(s.try_admit_next().is_none());

        s.release();
        assert_eq!(s.try_admit_next(), Some(entry(4)));
        assert!(s.try_admit_next().is_none());
        assert_eq!(s.active(), 3);
    }

    #[test]
    fn remove_drops_only_queued_entries() {
        let mut s = ConnectionScheduler::new(1);
        s.enqueue(entry(1));
        s.enqueue(entry(2));
        s.try_admit_next();

        assert!(!s.remove(&Identity::derive("bot_", 1)));
        assert!(s.remove(&Identity::derive("bot_", 2)));
        assert_eq!(s.queued(), 0);
    }

    #[test]
    fn clear_resets_counters() {
        let mut s = ConnectionScheduler::new(2);
        for i in 1..=4 {
            s.enqueue(entry(i));
            s.try_admit_next();
        }
        s.clear();
        assert_eq!((s.active(), s.queued()), (0, 0));
    }

    #[test]
    fn zero_limit_is_clamped() {
        let mut s = ConnectionScheduler::new(0);
        s.enqueue(entry(1));
        assert!(s.try_admit_next().is_some());
    }
}
