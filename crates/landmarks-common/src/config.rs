//! Process configuration, loaded from the environment.
//!
//! Both `submission-api` and `processing-worker` share this struct; each
//! binary only reads the fields relevant to it.

use crate::error::{Error, Result};

const SECONDS_PER_DAY: u64 = 86_400;

fn env_var(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| Error::InvalidInput(format!("missing env var {name}")))
}

fn env_var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_var_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct Config {
    /// `DATABASE_URL` — Postgres connection string for the request/landmark store.
    pub database_url: String,
    /// `REDIS_URL` — Redis connection string backing the durable queue stream.
    pub redis_url: String,
    /// `OVERPASS_ENDPOINT` — base URL of the Overpass-compatible query API.
    pub overpass_endpoint: String,
    /// `WEBHOOK_SECRET` — bearer token required on inbound `POST /webhook` calls.
    pub webhook_secret: String,
    /// `LISTEN_ADDR` — address `submission-api` binds to.
    pub listen_addr: String,
    /// `QUERY_RADIUS_METERS` — radius applied to every canonical key.
    pub query_radius_meters: u32,
    /// `CACHE_EXPIRATION_DAYS` — freshness horizon for a `RequestRecord`,
    /// in days; converted to seconds as `cache_expiration_secs`.
    pub cache_expiration_secs: u64,
    /// `CACHE_TTL_SECONDS` — hot-cache TTL for both namespaces.
    pub cache_ttl_seconds: u64,
    /// `CACHE_MAX_ENTRIES` — hot-cache capacity per namespace.
    pub cache_max_entries: usize,
    /// `EXTERNAL_TIMEOUT_SECONDS` — upstream per-call deadline.
    pub external_timeout_seconds: u64,
    /// `EXTERNAL_TRANSPORT_RETRIES` — transient-error retries (non-HTTP-status).
    pub external_transport_retries: u32,
    /// `WORKER_CONCURRENCY` — parallel consumers per group.
    pub worker_concurrency: usize,
    /// `QUEUE_TOPIC` — durable queue topic (Redis Streams key).
    pub queue_topic: String,
    /// `CONSUMER_GROUP` — durable queue consumer group id.
    pub consumer_group: String,
    /// `QUEUE_BLOCK_MS` — how long a consumer blocks waiting for new entries.
    pub queue_block_ms: u64,
    /// `SWEEP_PENDING_OLDER_THAN_SECS` — optional sweeper threshold;
    /// `None` disables the sweep entirely, which is the default.
    pub sweep_pending_older_than_secs: Option<u64>,
}

impl Config {
    /// Loads configuration from the environment, calling `dotenvy::dotenv()`
    /// first so a local `.env` file is picked up in development.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let cache_expiration_days: u64 = env_var_parsed("CACHE_EXPIRATION_DAYS", 60);

        Ok(Self {
            database_url: env_var("DATABASE_URL")?,
            redis_url: env_var("REDIS_URL")?,
            overpass_endpoint: env_var_or(
                "OVERPASS_ENDPOINT",
                "https://overpass-api.de/api/interpreter",
            ),
            webhook_secret: env_var("WEBHOOK_SECRET")?,
            listen_addr: env_var_or("LISTEN_ADDR", "0.0.0.0:8080"),
            query_radius_meters: env_var_parsed("QUERY_RADIUS_METERS", 500),
            cache_expiration_secs: cache_expiration_days * SECONDS_PER_DAY,
            cache_ttl_seconds: env_var_parsed("CACHE_TTL_SECONDS", 600),
            cache_max_entries: env_var_parsed("CACHE_MAX_ENTRIES", 10_000),
            external_timeout_seconds: env_var_parsed("EXTERNAL_TIMEOUT_SECONDS", 30),
            external_transport_retries: env_var_parsed("EXTERNAL_TRANSPORT_RETRIES", 2),
            worker_concurrency: env_var_parsed("WORKER_CONCURRENCY", 3),
            queue_topic: env_var_or("QUEUE_TOPIC", "webhook-processing"),
            consumer_group: env_var_or("CONSUMER_GROUP", "webhook-processor-group"),
            queue_block_ms: env_var_parsed("QUEUE_BLOCK_MS", 5000),
            sweep_pending_older_than_secs: std::env::var("SWEEP_PENDING_OLDER_THAN_SECS")
                .ok()
                .and_then(|v| v.parse().ok()),
        })
    }
}
