//! Poll repository.

use ballotbox_common::{AppError, AppResult};

use crate::entities::PollRecord;
use crate::store::SharedStore;

/// Poll repository, one row per poll id.
#[derive(Clone)]
pub struct PollRepository {
    store: SharedStore,
}

impl PollRepository {
    /// Create a new poll repository.
    #[must_use]
    pub const fn new(store: SharedStore) -> Self {
        Self { store }
    }

    fn key(poll_id: &str) -> String {
        format!("poll:{poll_id}")
    }

    /// Find a poll by ID.
    pub async fn find(&self, poll_id: &str) -> AppResult<Option<PollRecord>> {
        match self.store.get(&Self::key(poll_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Get a poll by ID, returning error if not found.
    pub async fn get(&self, poll_id: &str) -> AppResult<PollRecord> {
        self.find(poll_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Poll not found: {poll_id}")))
    }

    /// Persist a poll, replacing any previous value.
    pub async fn save(&self, poll: &PollRecord) -> AppResult<()> {
        let raw = serde_json::to_string(poll)?;
        self.store.put(&Self::key(&poll.id), raw).await
    }

    /// Erase a poll.
    pub async fn delete(&self, poll_id: &str) -> AppResult<()> {
        self.store.delete(&Self::key(poll_id)).await
    }
}
