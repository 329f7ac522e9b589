//! Processing Worker service — runs `workerConcurrency` consumer tasks
//! against the durable queue, each independently draining messages.

mod pipeline;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::Duration;

use landmarks_common::{Config, LandmarkFetcher, ProcessingMessage};
use landmarks_overpass::OverpassClient;
use landmarks_storage::{consumer_name, HotCache, PostgresStore, Queue, RedisQueue, Store};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pipeline::{Disposition, Pipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = Config::from_env()?;
    info!(concurrency = config.worker_concurrency, "starting processing-worker");

    let postgres_store = PostgresStore::connect(&config.database_url).await?;
    postgres_store.migrate().await?;
    let store: Arc<dyn Store> = Arc::new(postgres_store);

    let ttl = Duration::from_secs(config.cache_ttl_seconds);
    let requests_cache = HotCache::new(config.cache_max_entries, ttl);
    let landmarks_cache = HotCache::new(config.cache_max_entries, ttl);

    let overpass: Arc<dyn LandmarkFetcher> = Arc::new(OverpassClient::new(
        config.overpass_endpoint.clone(),
        Duration::from_secs(config.external_timeout_seconds),
        config.external_transport_retries,
    )?);

    let pipeline = Arc::new(Pipeline {
        store: Arc::clone(&store),
        overpass,
        requests_cache,
        landmarks_cache,
        config: config.clone(),
    });

    let queue_block_ms = config.queue_block_ms;
    let mut handles = Vec::with_capacity(config.worker_concurrency);
    for worker_index in 0..config.worker_concurrency {
        let queue: Arc<dyn Queue> = Arc::new(
            RedisQueue::connect(&config.redis_url, &config.queue_topic, &config.consumer_group).await?,
        );
        let pipeline = Arc::clone(&pipeline);
        let name = consumer_name(&format!("worker-{worker_index}"));
        handles.push(tokio::spawn(consumer_loop(name, queue, pipeline, queue_block_ms)));
    }

    if let Some(threshold_secs) = config.sweep_pending_older_than_secs {
        let store = Arc::clone(&store);
        let queue: Arc<dyn Queue> = Arc::new(
            RedisQueue::connect(&config.redis_url, &config.queue_topic, &config.consumer_group).await?,
        );
        handles.push(tokio::spawn(sweep_loop(store, queue, threshold_secs)));
    }

    for handle in handles {
        handle.await?;
    }

    Ok(())
}

async fn consumer_loop(name: String, queue: Arc<dyn Queue>, pipeline: Arc<Pipeline>, block_ms: u64) {
    info!(consumer = %name, "consumer started");
    loop {
        match queue.claim_next(&name, block_ms).await {
            Ok(Some(claimed)) => {
                let disposition = pipeline.process(&claimed.message).await;
                match disposition {
                    Disposition::Acknowledge => {
                        if let Err(e) = queue.ack(&claimed.entry_id).await {
                            error!(error = %e, "failed to ack entry");
                        }
                    }
                    Disposition::Redeliver => {
                        warn!(entry_id = %claimed.entry_id, "leaving entry unacked for redelivery");
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                error!(consumer = %name, error = %e, "error claiming message");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// Optional sweep for PENDING requests stuck past `threshold_secs` —
/// a crashed worker can otherwise leave a record PENDING forever.
/// Disabled unless `SWEEP_PENDING_OLDER_THAN_SECS` is set.
async fn sweep_loop(store: Arc<dyn Store>, queue: Arc<dyn Queue>, threshold_secs: u64) {
    let interval = Duration::from_secs(60).max(Duration::from_secs(threshold_secs / 10).min(Duration::from_secs(300)));
    loop {
        tokio::time::sleep(interval).await;
        let cutoff = chrono::Utc::now() - chrono::Duration::seconds(threshold_secs as i64);
        match store.find_stale_pending_requests(cutoff).await {
            Ok(stale) => {
                for record in stale {
                    warn!(request_id = %record.id, "re-enqueueing stale pending request");
                    let message = ProcessingMessage {
                        request_id: record.id,
                        key_lat: record.key_lat,
                        key_lng: record.key_lng,
                        radius_m: record.radius_m,
                    };
                    if let Err(e) = queue.enqueue(&message).await {
                        error!(request_id = %record.id, error = %e, "failed to re-enqueue stale request");
                    }
                }
            }
            Err(e) => error!(error = %e, "failed to query stale pending requests"),
        }
    }
}
