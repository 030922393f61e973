//! Identity repository.

use ballotbox_common::AppResult;

use crate::entities::IdentityRecord;
use crate::store::SharedStore;

/// Identity repository, one row per claim subject.
#[derive(Clone)]
pub struct IdentityRepository {
    store: SharedStore,
}

impl IdentityRepository {
    /// Create a new identity repository.
    #[must_use]
    pub const fn new(store: SharedStore) -> Self {
        Self { store }
    }

    fn key(subject: &str) -> String {
        format!("identity:{subject}")
    }

    /// Load an identity, falling back to an empty record on first access.
    pub async fn load(&self, subject: &str) -> AppResult<IdentityRecord> {
        match self.store.get(&Self::key(subject)).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(IdentityRecord::default()),
        }
    }

    /// Persist an identity, replacing any previous value.
    pub async fn save(&self, subject: &str, identity: &IdentityRecord) -> AppResult<()> {
        let raw = serde_json::to_string(identity)?;
        self.store.put(&Self::key(subject), raw).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_load_defaults_then_persists() {
        let repo = IdentityRepository::new(Arc::new(MemoryStore::new()));

        let mut identity = repo.load("anon-1").await.unwrap();
        assert_eq!(identity, IdentityRecord::default());

        identity.add_owned_poll("p1");
        identity.record_vote("p2", 1);
        repo.save("anon-1", &identity).await.unwrap();

        let reloaded = repo.load("anon-1").await.unwrap();
        assert_eq!(reloaded.owned_poll_ids, vec!["p1"]);
        assert_eq!(reloaded.vote_for("p2"), Some(1));
        assert_eq!(repo.load("anon-2").await.unwrap(), IdentityRecord::default());
    }
}
