//! State layer for ballotbox.
//!
//! Two independent keyed stores back the actors: one row per poll id and
//! one row per identity subject. No secondary indexes are kept.

pub mod entities;
pub mod redis_store;
pub mod repositories;
pub mod store;
pub mod test_utils;

use std::sync::Arc;

use ballotbox_common::{AppError, AppResult, StorageBackend, StorageConfig};
use tracing::info;

pub use entities::{IdentityRecord, PollRecord};
pub use redis_store::RedisStore;
pub use repositories::{IdentityRepository, PollRepository};
pub use store::{KeyValueStore, MemoryStore, SharedStore};

/// Initialize the configured state store.
pub async fn init(config: &StorageConfig) -> AppResult<SharedStore> {
    match config.backend {
        StorageBackend::Memory => {
            info!("Using in-memory state store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Redis => {
            let url = config.redis_url.as_deref().ok_or_else(|| {
                AppError::Config("storage.redis_url is required for the redis backend".to_string())
            })?;
            let store = RedisStore::connect(url, config.prefix.clone()).await?;
            Ok(Arc::new(store))
        }
    }
}
