//! Processing Worker per-message algorithm.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use landmarks_common::{
    Config, LandmarkFetcher, LandmarkProjection, ProcessingMessage, RequestRecord, RequestStatus,
};
use landmarks_storage::{HotCache, Store};
use tracing::{error, info, warn};
use uuid::Uuid;

pub struct Pipeline {
    pub store: Arc<dyn Store>,
    pub overpass: Arc<dyn LandmarkFetcher>,
    pub requests_cache: HotCache,
    pub landmarks_cache: HotCache,
    pub config: Config,
}

/// Whether the caller should acknowledge the queue entry after this message.
pub enum Disposition {
    Acknowledge,
    Redeliver,
}

impl Pipeline {
    pub async fn process(&self, message: &ProcessingMessage) -> Disposition {
        match self.process_inner(message).await {
            Ok(disposition) => disposition,
            Err(err) => {
                error!(request_id = %message.request_id, error = %err, "unexpected processing failure");
                if let Err(mark_err) = self
                    .store
                    .mark_request_error(message.request_id, &err.to_string())
                    .await
                {
                    error!(request_id = %message.request_id, error = %mark_err, "failed to mark request errored");
                }
                Disposition::Redeliver
            }
        }
    }

    async fn process_inner(&self, message: &ProcessingMessage) -> landmarks_common::Result<Disposition> {
        let request_id = message.request_id;

        let Some(mut record) = self.store.get_request(request_id).await? else {
            info!(%request_id, "request no longer live, acknowledging");
            return Ok(Disposition::Acknowledge);
        };

        if record.status != RequestStatus::Pending {
            info!(%request_id, status = %record.status, "duplicate delivery after completion");
            return Ok(Disposition::Acknowledge);
        }

        let cache_key = format!(
            "{:.4}:{:.4}:{}",
            message.key_lat, message.key_lng, message.radius_m
        );

        if self
            .landmarks_cache
            .get::<Vec<LandmarkProjection>>(&cache_key)
            .await
            .is_some()
        {
            let existing = self.store.list_landmarks_for_request(request_id).await?;
            if !existing.is_empty() {
                self.finish_found(&mut record, &cache_key).await?;
                return Ok(Disposition::Acknowledge);
            }
        }

        if let Some(other) = self
            .store
            .find_live_request_by_key(message.key_lat, message.key_lng, message.radius_m)
            .await?
        {
            if other.id != request_id && other.status != RequestStatus::Pending && !self.is_expired(&other)
            {
                let landmarks = self.store.list_landmarks_for_request(other.id).await?;
                if !landmarks.is_empty() {
                    let ids: Vec<Uuid> = landmarks.iter().map(|l| l.id).collect();
                    self.store.adopt_landmarks(request_id, &ids).await?;
                    let projections: Vec<LandmarkProjection> =
                        landmarks.iter().map(LandmarkProjection::from).collect();
                    self.landmarks_cache.set(&cache_key, &projections).await;
                    self.requests_cache.invalidate(&cache_key).await;
                    info!(%request_id, reused_from = %other.id, "reused landmarks via db shortcut");
                    return Ok(Disposition::Acknowledge);
                }
            }
        }

        match self
            .overpass
            .fetch(message.key_lat, message.key_lng, message.radius_m as u32)
            .await
        {
            Ok(fetched) => {
                let persisted = self.store.complete_request(request_id, fetched).await?;
                let projections: Vec<LandmarkProjection> =
                    persisted.iter().map(LandmarkProjection::from).collect();
                if !projections.is_empty() {
                    self.landmarks_cache.set(&cache_key, &projections).await;
                }
                self.requests_cache.invalidate(&cache_key).await;
                info!(%request_id, count = projections.len(), "fetch complete");
                Ok(Disposition::Acknowledge)
            }
            Err(err) => {
                warn!(%request_id, error = %err, "external fetch failed");
                self.store.mark_request_error(request_id, &err.to_string()).await?;
                self.requests_cache.invalidate(&cache_key).await;
                Ok(Disposition::Acknowledge)
            }
        }
    }

    async fn finish_found(&self, record: &mut RequestRecord, cache_key: &str) -> landmarks_common::Result<()> {
        record.set_found();
        self.store.mark_request_found(record.id).await?;
        self.requests_cache.invalidate(cache_key).await;
        Ok(())
    }

    fn is_expired(&self, record: &RequestRecord) -> bool {
        let horizon = ChronoDuration::seconds(self.config.cache_expiration_secs as i64);
        Utc::now() - record.created_at > horizon
    }
}
