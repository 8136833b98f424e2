//! Run report: what one reconciler run did, key by key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::key::Key;

/// What happened to a single key of the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyOutcome {
    /// The document had no usable expiry; it now expires at `now + increment`.
    Initialized { expire_at: DateTime<Utc> },

    /// The document's expiry was pushed from `previous` to `expire_at`.
    Extended {
        previous: DateTime<Utc>,
        expire_at: DateTime<Utc>,
    },

    /// No document for this key. Nothing was written, the key is still removed.
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyReport {
    pub key: Key,
    #[serde(flatten)]
    pub outcome: KeyOutcome,
}

/// Summary counters, cheap to log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub batch: usize,
    pub initialized: usize,
    pub extended: usize,
    pub missing: usize,
    pub removed: usize,
}

/// The result of a successful run.
///
/// `keys` is in processing order, which is the order the key source returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub keys: Vec<KeyReport>,

    /// Members actually removed from the set (as reported by the key source).
    pub removed: usize,
}

impl RunReport {
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn outcome(&self, key: &str) -> Option<&KeyOutcome> {
        self.keys
            .iter()
            .find(|r| r.key.as_str() == key)
            .map(|r| &r.outcome)
    }

    pub fn counts(&self) -> RunCounts {
        let mut counts = RunCounts {
            batch: self.keys.len(),
            removed: self.removed,
            ..RunCounts::default()
        };
        for report in &self.keys {
            match report.outcome {
                KeyOutcome::Initialized { .. } => counts.initialized += 1,
                KeyOutcome::Extended { .. } => counts.extended += 1,
                KeyOutcome::Missing => counts.missing += 1,
            }
        }
        counts
    }
}
