//! Poll record.

use serde::{Deserialize, Serialize};

/// A poll document together with its aggregate vote counters.
///
/// `votes[i]` is the count for `options[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollRecord {
    /// Poll id, immutable once created.
    pub id: String,
    /// The question being asked.
    pub question: String,
    /// Ordered answer options.
    pub options: Vec<String>,
    /// Advisory time-to-live in seconds.
    pub ttl: u64,
    /// Creation time in milliseconds since the Unix epoch.
    pub created_at: i64,
    /// Subject of the identity that created the poll.
    pub owner_id: String,
    /// Per-option counters, index-aligned with `options`.
    #[serde(default)]
    pub votes: Vec<u64>,
}

impl PollRecord {
    /// Bring `votes` to the same length as `options`.
    ///
    /// Missing counters (legacy partial writes, grown option lists) are
    /// zero-filled; counters past the last option are dropped.
    pub fn align_votes(&mut self) {
        if self.votes.len() != self.options.len() {
            self.votes.resize(self.options.len(), 0);
        }
    }

    /// Sum of all option counters.
    #[must_use]
    pub fn total_votes(&self) -> u64 {
        self.votes.iter().sum()
    }

    /// Whether `subject` owns this poll.
    #[must_use]
    pub fn is_owned_by(&self, subject: &str) -> bool {
        self.owner_id == subject
    }
}
