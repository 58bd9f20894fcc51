//! Timestamped updates drawn from provider streams.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A value plus the instant it was measured. Ordering between updates of the
/// same kind is defined by `when`; accuracy is a separate axis judged by the
/// update policies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Update<T> {
    pub value: T,
    pub when: DateTime<Utc>,
}

impl<T> Update<T> {
    pub fn new(value: T, when: DateTime<Utc>) -> Self {
        Self { value, when }
    }

    /// Stamps the value with the current wall clock.
    pub fn now(value: T) -> Self {
        Self {
            value,
            when: Utc::now(),
        }
    }

    pub fn is_newer_than<U>(&self, other: &Update<U>) -> bool {
        self.when > other.when
    }
}
