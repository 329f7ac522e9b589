//! In-memory fakes for [`landmarks_storage::Store`] and
//! [`landmarks_common::LandmarkFetcher`], used by the pipeline's unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use landmarks_common::{
    Error, FetchedLandmark, LandmarkFetcher, LandmarkRecord, RequestRecord, RequestStatus, Result,
};
use landmarks_storage::Store;
use uuid::Uuid;

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

    pub fn seed_landmark(&self, request_id: Uuid, landmark: LandmarkRecord) {
        let id = landmark.id;
        self.landmarks.lock().unwrap().insert(id, landmark);
        self.links.lock().unwrap().entry(request_id).or_default().push(id);
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
        if let Some(old) = requests.get_mut(&expired.id) {
            old.deleted_at = Some(Utc::now());
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

/// Fetcher stub returning a canned result or a canned failure.
pub struct FakeFetcher {
    outcome: Mutex<Option<Result<Vec<FetchedLandmark>>>>,
    pub calls: Mutex<u32>,
}

impl FakeFetcher {
    pub fn returning(landmarks: Vec<FetchedLandmark>) -> Self {
        Self {
            outcome: Mutex::new(Some(Ok(landmarks))),
            calls: Mutex::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Mutex::new(Some(Err(Error::ExternalError {
                kind: landmarks_common::ExternalErrorKind::Transport,
                message: message.to_string(),
            }))),
            calls: Mutex::new(0),
        }
    }
}

#[async_trait]
impl LandmarkFetcher for FakeFetcher {
    async fn fetch(&self, _lat: f64, _lng: f64, _radius_m: u32) -> Result<Vec<FetchedLandmark>> {
        *self.calls.lock().unwrap() += 1;
        match self.outcome.lock().unwrap().take() {
            Some(Ok(landmarks)) => Ok(landmarks),
            Some(Err(err)) => Err(err),
            None => Ok(Vec::new()),
        }
    }
}
