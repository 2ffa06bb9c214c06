//! # Fleet-wide readiness aggregation.
//!
//! [`ReadinessAggregator`] counts how many clients of the current generation
//! have *settled* (first connection online or failed) and, when the last one
//! does, produces the generation's single [`Settlement`].
//!
//! ## Rules
//! - Settling is keyed by identity: a second report for the same identity
//!   (e.g. a restored client settling again) is ignored.
//! - `all_ready` flips false → true exactly once per generation; later reports
//!   never produce another settlement.
//! - Settlement order across identities does not matter.

use std::collections::HashMap;

use super::types::Identity;

/// Terminal summary of a generation's first connections.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Settlement {
    /// Every client came online.
    AllOnline {
        /// Generation size.
        total: usize,
    },
    /// Some clients failed.
    Partial {
        /// Clients online.
        online: usize,
        /// Generation size.
        total: usize,
    },
    /// Every client failed; the service stops.
    TotalFailure {
        /// Generation size.
        total: usize,
    },
}

impl Settlement {
    fn from_counts(online: usize, total: usize) -> Self {
        match online {
            0 => Settlement::TotalFailure { total },
            n if n == total => Settlement::AllOnline { total },
            n => Settlement::Partial { online: n, total },
        }
    }

    /// Short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Settlement::AllOnline { .. } => "all_online",
            Settlement::Partial { .. } => "partial",
            Settlement::TotalFailure { .. } => "total_failure",
        }
    }

    /// Clients online at settlement.
    pub fn online(&self) -> usize {
        match *self {
            Settlement::AllOnline { total } => total,
            Settlement::Partial { online, .. } => online,
            Settlement::TotalFailure { .. } => 0,
        }
    }

    /// Generation size.
    pub fn total(&self) -> usize {
        match *self {
            Settlement::AllOnline { total }
            | Settlement::Partial { total, .. }
            | Settlement::TotalFailure { total } => total,
        }
    }
}

/// Settled-vs-total counter for one generation.
#[derive(Debug, Default)]
pub struct ReadinessAggregator {
    total: usize,
    outcomes: HashMap<Identity, bool>,
    all_ready: bool,
}

impl ReadinessAggregator {
    /// Starts tracking a generation of `total` clients.
    pub fn new(total: usize) -> Self {
        Self {
            total,
            outcomes: HashMap::with_capacity(total),
            all_ready: false,
        }
    }

    /// Records a client's first-connection outcome.
    ///
    /// Returns the settlement exactly once: on the call that completes the generation.
    pub fn settle(&mut self, identity: &Identity, online: bool) -> Option<Settlement> {
        if self.all_ready || self.total == 0 {
            return None;
        }
        self.outcomes.entry(identity.clone()).or_insert(online);
        if self.outcomes.len() < self.total {
            return None;
        }
        self.all_ready = true;
        let online = self.outcomes.values().filter(|ok| **ok).count();
        Some(Settlement::from_counts(online, self.total))
    }

    /// Clients settled so far.
    #[inline]
    pub fn settled(&self) -> usize {
        self.outcomes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(i: usize) -> Identity {
        Identity::derive("bot_", i)
    }

    #[test]
    fn settles_once_when_everyone_reported() {
        let mut agg = ReadinessAggregator::new(3);
        assert_eq!(agg.settle(&id(2), true), None);
        assert_eq!(agg.settle(&id(3), false), None);
        assert_eq!(agg.settled(), 2);

        let s = agg.settle(&id(1), true);
        assert_eq!(s, Some(Settlement::Partial { online: 2, total: 3 }));
        assert_eq!(agg.settled(), 3);

        assert_eq!(agg.settle(&id(1), true), None);
        assert_eq!(agg.settle(&id(4), true), None);
    }

    #[test]
    fn duplicate_reports_do_not_count_twice() {
        let mut agg = ReadinessAggregator::new(2);
        agg.settle(&id(1), false);
        assert_eq!(agg.settle(&id(1), true), None);
        assert_eq!(agg.settled(), 1);
    }

    #[test]
    fn classifies_outcomes() {
        let mut ok = ReadinessAggregator::new(1);
        assert_eq!(ok.settle(&id(1), true), Some(Settlement::AllOnline { total: 1 }));

        let mut bad = ReadinessAggregator::new(2);
        bad.settle(&id(1), false);
        let s = bad.settle(&id(2), false).unwrap();
        assert_eq!(s, Settlement::TotalFailure { total: 2 });
        assert_eq!(s.as_label(), "total_failure");
    }

    #[test]
    fn empty_generation_never_settles() {
        let mut agg = ReadinessAggregator::new(0);
        assert_eq!(agg.settle(&id(1), true), None);
    }
}
