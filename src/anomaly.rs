//! Bounded reporting of data-integrity anomalies.
//!
//! Latest-version queries keep going when they meet malformed data. Each occurrence is counted;
//! only the first `limit` are logged so a badly damaged store cannot flood the log.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::warn;

use crate::stamp::StampId;

pub const DEFAULT_WARNING_LIMIT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anomaly {
    /// Two distinct versions carry stamps that compare EQUAL.
    EqualStamps { kept: StampId, candidate: StampId },
    /// A comparison came back UNREACHABLE for stamps that were both on route.
    UnreachableOnRoute { kept: StampId, candidate: StampId },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::EqualStamps { kept, candidate } => write!(
                f,
                "distinct versions with equal positions: {kept} and {candidate}"
            ),
            Anomaly::UnreachableOnRoute { kept, candidate } => write!(
                f,
                "on-route stamps compared unreachable: {kept} and {candidate}"
            ),
        }
    }
}

#[derive(Debug)]
pub struct AnomalyLog {
    limit: usize,
    seen: AtomicUsize,
}

impl AnomalyLog {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            seen: AtomicUsize::new(0),
        }
    }

    pub fn report(&self, anomaly: Anomaly) {
        let seen = self.seen.fetch_add(1, Ordering::Relaxed);
        if seen < self.limit {
            warn!(%anomaly, "data integrity anomaly");
        } else if seen == self.limit {
            warn!(limit = self.limit, "further data integrity anomalies will not be logged");
        }
    }

    /// Total anomalies reported, logged or not.
    pub fn count(&self) -> usize {
        self.seen.load(Ordering::Relaxed)
    }
}

impl Default for AnomalyLog {
    fn default() -> Self {
        Self::new(DEFAULT_WARNING_LIMIT)
    }
}
