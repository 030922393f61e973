//! Identity record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-identity bookkeeping: polls created and votes cast.
///
/// The `votes` map is the double-vote guard: at most one entry per poll id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    /// Ids of polls this identity created.
    #[serde(default)]
    pub owned_poll_ids: Vec<String>,
    /// Poll id to chosen option index.
    #[serde(default)]
    pub votes: BTreeMap<String, u32>,
}

impl IdentityRecord {
    /// Append a poll id unless already present. Returns whether it was added.
    pub fn add_owned_poll(&mut self, poll_id: &str) -> bool {
        if self.owned_poll_ids.iter().any(|id| id == poll_id) {
            return false;
        }
        self.owned_poll_ids.push(poll_id.to_string());
        true
    }

    /// Drop a poll id. Returns whether it was present.
    pub fn remove_owned_poll(&mut self, poll_id: &str) -> bool {
        let before = self.owned_poll_ids.len();
        self.owned_poll_ids.retain(|id| id != poll_id);
        before != self.owned_poll_ids.len()
    }

    /// The recorded choice for a poll, if any.
    #[must_use]
    pub fn vote_for(&self, poll_id: &str) -> Option<u32> {
        self.votes.get(poll_id).copied()
    }

    /// Insert or overwrite the vote entry for a poll.
    pub fn record_vote(&mut self, poll_id: &str, option_index: u32) {
        self.votes.insert(poll_id.to_string(), option_index);
    }

    /// Erase the vote entry for a poll, returning the erased choice.
    pub fn remove_vote(&mut self, poll_id: &str) -> Option<u32> {
        self.votes.remove(poll_id)
    }
}
