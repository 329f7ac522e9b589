//! Narrow trait seams over the durable store and queue, so the
//! Submission Coordinator and Processing Worker can be exercised
//! against fakes instead of a live Postgres/Redis instance.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use landmarks_common::{FetchedLandmark, LandmarkRecord, ProcessingMessage, RequestRecord, Result};
use uuid::Uuid;

use crate::queue::ClaimedMessage;

#[async_trait]
pub trait Store: Send + Sync {
    async fn create_or_get_pending_request(
        &self,
        key_lat: f64,
        key_lng: f64,
        radius_m: i32,
    ) -> Result<(RequestRecord, bool)>;

    async fn find_live_request_by_key(
        &self,
        key_lat: f64,
        key_lng: f64,
        radius_m: i32,
    ) -> Result<Option<RequestRecord>>;

    async fn get_request(&self, id: Uuid) -> Result<Option<RequestRecord>>;

    async fn refresh_expired_request(&self, expired: &RequestRecord) -> Result<RequestRecord>;

    async fn soft_delete_request(&self, id: Uuid) -> Result<()>;

    async fn mark_request_error(&self, id: Uuid, message: &str) -> Result<()>;

    async fn mark_request_found(&self, id: Uuid) -> Result<()>;

    async fn complete_request(
        &self,
        request_id: Uuid,
        landmarks: Vec<FetchedLandmark>,
    ) -> Result<Vec<LandmarkRecord>>;

    async fn adopt_landmarks(&self, request_id: Uuid, landmark_ids: &[Uuid]) -> Result<()>;

    async fn list_landmarks_for_request(&self, request_id: Uuid) -> Result<Vec<LandmarkRecord>>;

    async fn find_stale_pending_requests(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<RequestRecord>>;
}

#[async_trait]
pub trait Queue: Send + Sync {
    async fn enqueue(&self, message: &ProcessingMessage) -> Result<String>;

    async fn claim_next(&self, consumer_name: &str, block_ms: u64) -> Result<Option<ClaimedMessage>>;

    async fn ack(&self, entry_id: &str) -> Result<()>;
}
