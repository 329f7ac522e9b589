//! In-memory fakes for [`landmarks_storage::Store`] and
//! [`landmarks_storage::Queue`], shared by the coordinator and retrieval
//! unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use landmarks_common::{
    Config, Error, FetchedLandmark, LandmarkRecord, ProcessingMessage, RequestRecord,
    RequestStatus, Result,
};
use landmarks_storage::{ClaimedMessage, HotCache, Queue, Store};
use uuid::Uuid;

use crate::state::AppState;

#[derive(Default)]
pub struct FakeStore {
    requests: Mutex<HashMap<Uuid, RequestRecord>>,
    landmarks: Mutex<HashMap<Uuid, LandmarkRecord>>,
    links: Mutex<HashMap<Uuid, Vec<Uuid>>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_request(&self, record: RequestRecord) {
        self.requests.lock().unwrap().insert(record.id, record);
    }
}

#[async_trait]
impl Store for FakeStore {
    async fn create_or_get_pending_request(
        &self,
        key_lat: f64,
        key_lng: f64,
        radius_m: i32,
    ) -> Result<(RequestRecord, bool)> {
        let mut requests = self.requests.lock().unwrap();
        if let Some(existing) = requests.values().find(|r| {
            r.is_live() && r.key_lat == key_lat && r.key_lng == key_lng && r.radius_m == radius_m
        }) {
            return Ok((existing.clone(), false));
        }
        let record = RequestRecord::new_pending(key_lat, key_lng, radius_m);
        requests.insert(record.id, record.clone());
        Ok((record, true))
    }

    async fn find_live_request_by_key(
        &self,
        key_lat: f64,
        key_lng: f64,
        radius_m: i32,
    ) -> Result<Option<RequestRecord>> {
        let requests = self.requests.lock().unwrap();
        Ok(requests
            .values()
            .find(|r| r.is_live() && r.key_lat == key_lat && r.key_lng == key_lng && r.radius_m == radius_m)
            .cloned())
    }

    async fn get_request(&self, id: Uuid) -> Result<Option<RequestRecord>> {
        Ok(self.requests.lock().unwrap().get(&id).cloned())
    }

    async fn refresh_expired_request(&self, expired: &RequestRecord) -> Result<RequestRecord> {
        let mut requests = self.requests.lock().unwrap();
        let mut landmarks = self.landmarks.lock().unwrap();
        let mut links = self.links.lock().unwrap();

        if let Some(old) = requests.get_mut(&expired.id) {
            old.deleted_at = Some(Utc::now());
        }
        if let Some(linked) = links.remove(&expired.id) {
            for landmark_id in linked {
                if let Some(landmark) = landmarks.get_mut(&landmark_id) {
                    landmark.deleted_at = Some(Utc::now());
                }
            }
        }

        let fresh = RequestRecord::new_pending(expired.key_lat, expired.key_lng, expired.radius_m);
        requests.insert(fresh.id, fresh.clone());
        Ok(fresh)
    }

    async fn soft_delete_request(&self, id: Uuid) -> Result<()> {
        if let Some(record) = self.requests.lock().unwrap().get_mut(&id) {
            record.deleted_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn mark_request_error(&self, id: Uuid, message: &str) -> Result<()> {
        let mut requests = self.requests.lock().unwrap();
        let record = requests
            .get_mut(&id)
            .ok_or_else(|| Error::StoreError(format!("request {id} not found")))?;
        record.set_error(message);
        Ok(())
    }

    async fn mark_request_found(&self, id: Uuid) -> Result<()> {
        if let Some(record) = self.requests.lock().unwrap().get_mut(&id) {
            record.set_found();
        }
        Ok(())
    }

    async fn complete_request(
        &self,
        request_id: Uuid,
        fetched: Vec<FetchedLandmark>,
    ) -> Result<Vec<LandmarkRecord>> {
        let mut landmarks = self.landmarks.lock().unwrap();
        let mut links = self.links.lock().unwrap();
        let mut persisted = Vec::with_capacity(fetched.len());

        for item in fetched {
            let id = Uuid::new_v4();
            let record = LandmarkRecord {
                id,
                osm_type: item.osm_type,
                osm_id: item.osm_id,
                name: item.name,
                lat: item.lat,
                lng: item.lng,
                tags: item.tags,
                created_at: Utc::now(),
                deleted_at: None,
            };
            landmarks.insert(id, record.clone());
            links.entry(request_id).or_default().push(id);
            persisted.push(record);
        }

        let mut requests = self.requests.lock().unwrap();
        if let Some(record) = requests.get_mut(&request_id) {
            if persisted.is_empty() {
                record.set_empty();
            } else {
                record.set_found();
            }
        }
        Ok(persisted)
    }

    async fn adopt_landmarks(&self, request_id: Uuid, landmark_ids: &[Uuid]) -> Result<()> {
        self.links
            .lock()
            .unwrap()
            .entry(request_id)
            .or_default()
            .extend(landmark_ids.iter().copied());
        if let Some(record) = self.requests.lock().unwrap().get_mut(&request_id) {
            record.set_found();
        }
        Ok(())
    }

    async fn list_landmarks_for_request(&self, request_id: Uuid) -> Result<Vec<LandmarkRecord>> {
        let links = self.links.lock().unwrap();
        let landmarks = self.landmarks.lock().unwrap();
        Ok(links
            .get(&request_id)
            .into_iter()
            .flatten()
            .filter_map(|id| landmarks.get(id).filter(|l| l.is_live()).cloned())
            .collect())
    }

    async fn find_stale_pending_requests(&self, older_than: DateTime<Utc>) -> Result<Vec<RequestRecord>> {
        Ok(self
            .requests
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.is_live() && r.status == RequestStatus::Pending && r.created_at < older_than)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct FakeQueue {
    pub enqueued: Mutex<Vec<ProcessingMessage>>,
    pub fail_enqueue: std::sync::atomic::AtomicBool,
}

impl FakeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let queue = Self::default();
        queue.fail_enqueue.store(true, std::sync::atomic::Ordering::SeqCst);
        queue
    }
}

#[async_trait]
impl Queue for FakeQueue {
    async fn enqueue(&self, message: &ProcessingMessage) -> Result<String> {
        if self.fail_enqueue.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(Error::QueueError("simulated enqueue failure".into()));
        }
        self.enqueued.lock().unwrap().push(message.clone());
        Ok(Uuid::new_v4().to_string())
    }

    async fn claim_next(&self, _consumer_name: &str, _block_ms: u64) -> Result<Option<ClaimedMessage>> {
        Ok(None)
    }

    async fn ack(&self, _entry_id: &str) -> Result<()> {
        Ok(())
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://unused".into(),
        redis_url: "redis://unused".into(),
        overpass_endpoint: "https://unused.example".into(),
        webhook_secret: "supersecret".into(),
        listen_addr: "0.0.0.0:0".into(),
        query_radius_meters: 500,
        cache_expiration_secs: 60 * 86_400,
        cache_ttl_seconds: 600,
        cache_max_entries: 100,
        external_timeout_seconds: 30,
        external_transport_retries: 2,
        worker_concurrency: 1,
        queue_topic: "webhook-processing".into(),
        consumer_group: "webhook-processor-group".into(),
        queue_block_ms: 5000,
        sweep_pending_older_than_secs: None,
    }
}

pub fn test_state(
    store: FakeStore,
    queue: FakeQueue,
) -> (AppState, std::sync::Arc<FakeStore>, std::sync::Arc<FakeQueue>) {
    let store = std::sync::Arc::new(store);
    let queue = std::sync::Arc::new(queue);
    let ttl = Duration::from_secs(test_config().cache_ttl_seconds);
    let state = AppState {
        config: test_config(),
        store: store.clone(),
        queue: queue.clone(),
        requests_cache: HotCache::new(100, ttl),
        landmarks_cache: HotCache::new(100, ttl),
    };
    (state, store, queue)
}
