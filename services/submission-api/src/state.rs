//! Shared application state wired from [`landmarks_common::Config`].

use std::sync::Arc;
use std::time::Duration;

use landmarks_common::{Config, Result};
use landmarks_storage::{HotCache, PostgresStore, Queue, RedisQueue, Store};

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub queue: Arc<dyn Queue>,
    pub requests_cache: HotCache,
    pub landmarks_cache: HotCache,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self> {
        let store = PostgresStore::connect(&config.database_url).await?;
        store.migrate().await?;

        let queue = RedisQueue::connect(
            &config.redis_url,
            &config.queue_topic,
            &config.consumer_group,
        )
        .await?;

        let ttl = Duration::from_secs(config.cache_ttl_seconds);
        let requests_cache = HotCache::new(config.cache_max_entries, ttl);
        let landmarks_cache = HotCache::new(config.cache_max_entries, ttl);

        Ok(Self {
            config,
            store: Arc::new(store),
            queue: Arc::new(queue),
            requests_cache,
            landmarks_cache,
        })
    }
}
