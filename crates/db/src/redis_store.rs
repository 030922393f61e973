//! Redis-backed state store.

use std::sync::Arc;

use async_trait::async_trait;
use ballotbox_common::{AppError, AppResult};
use fred::clients::Client as RedisClient;
use fred::interfaces::{ClientLike, KeysInterface};
use tracing::{debug, info};

use crate::store::KeyValueStore;

/// Store that keeps each record as one Redis string under `{prefix}:{key}`.
#[derive(Clone)]
pub struct RedisStore {
    redis: Arc<RedisClient>,
    prefix: String,
}

impl RedisStore {
    /// Wrap an already connected client.
    #[must_use]
    pub fn new(redis: Arc<RedisClient>, prefix: impl Into<String>) -> Self {
        Self {
            redis,
            prefix: prefix.into(),
        }
    }

    /// Connect to `url` and wait until the connection is usable.
    pub async fn connect(url: &str, prefix: impl Into<String>) -> AppResult<Self> {
        let config = fred::types::config::Config::from_url(url)
            .map_err(|e| AppError::Config(format!("Invalid Redis URL: {e}")))?;
        let client = RedisClient::new(config, None, None, None);
        client.connect();
        client
            .wait_for_connect()
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;
        info!("Connected to Redis state store");

        Ok(Self::new(Arc::new(client), prefix))
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{key}", self.prefix)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let key = self.namespaced(key);
        let value: Option<String> = self
            .redis
            .get(key.clone())
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;
        debug!(key = %key, hit = value.is_some(), "Redis get");
        Ok(value)
    }

    async fn put(&self, key: &str, value: String) -> AppResult<()> {
        self.redis
            .set::<(), _, _>(self.namespaced(key), value, None, None, false)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.redis
            .del::<(), _>(self.namespaced(key))
            .await
            .map_err(|e| AppError::Storage(e.to_string()))
    }
}
