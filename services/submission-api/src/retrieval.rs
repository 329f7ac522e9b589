//! Retrieval Service: lookup by id or by canonical coordinate key.

use landmarks_common::{CanonicalKey, LandmarkProjection, RequestRecord, RequestStatus, Result};
use uuid::Uuid;

use crate::dto::{LandmarksKey, LandmarksResponse, ResponseSource, WebhookKey, WebhookStatusResponse};
use crate::state::AppState;

pub enum ByIdOutcome {
    Ready(WebhookStatusResponse),
    NotReady,
    NotFound,
}

/// `GetById`.
pub async fn get_by_id(state: &AppState, id: Uuid) -> Result<ByIdOutcome> {
    let Some(record) = state.store.get_request(id).await? else {
        return Ok(ByIdOutcome::NotFound);
    };

    if record.status == RequestStatus::Pending {
        return Ok(ByIdOutcome::NotReady);
    }

    let key = CanonicalKey {
        key_lat: record.key_lat,
        key_lng: record.key_lng,
        radius_m: record.radius_m as u32,
    };
    let cache_key = key.cache_key();

    let landmarks = match state.landmarks_cache.get::<Vec<LandmarkProjection>>(&cache_key).await {
        Some(cached) => cached,
        None => {
            let loaded = load_and_cache_landmarks(state, &record, &cache_key).await?;
            loaded
        }
    };

    Ok(ByIdOutcome::Ready(WebhookStatusResponse {
        key: WebhookKey {
            lat: record.key_lat,
            lng: record.key_lng,
        },
        count: landmarks.len(),
        radius_meters: record.radius_m as u32,
        landmarks,
    }))
}

/// `GetByCoordinates`.
pub async fn get_by_coordinates(state: &AppState, lat: f64, lng: f64) -> Result<LandmarksResponse> {
    let key = CanonicalKey::canonicalize(lat, lng, state.config.query_radius_meters)?;
    let cache_key = key.cache_key();
    let response_key = LandmarksKey {
        lat: key.key_lat,
        lng: key.key_lng,
        radius_meters: key.radius_m,
    };

    if let Some(cached) = state
        .landmarks_cache
        .get::<Vec<LandmarkProjection>>(&cache_key)
        .await
    {
        return Ok(LandmarksResponse {
            key: response_key,
            source: ResponseSource::Cache,
            landmarks: cached,
        });
    }

    let live: Option<RequestRecord> = match state.requests_cache.get(&cache_key).await {
        Some(record) => Some(record),
        None => {
            let from_store = state
                .store
                .find_live_request_by_key(key.key_lat, key.key_lng, key.radius_m as i32)
                .await?;
            if let Some(record) = &from_store {
                state.requests_cache.set(&cache_key, record).await;
            }
            from_store
        }
    };

    let Some(record) = live else {
        return Ok(LandmarksResponse {
            key: response_key,
            source: ResponseSource::None,
            landmarks: Vec::new(),
        });
    };

    let landmarks = load_and_cache_landmarks(state, &record, &cache_key).await?;
    Ok(LandmarksResponse {
        key: response_key,
        source: ResponseSource::Db,
        landmarks,
    })
}

async fn load_and_cache_landmarks(
    state: &AppState,
    record: &RequestRecord,
    cache_key: &str,
) -> Result<Vec<LandmarkProjection>> {
    let records = state.store.list_landmarks_for_request(record.id).await?;
    let projections: Vec<LandmarkProjection> = records.iter().map(LandmarkProjection::from).collect();
    if !projections.is_empty() {
        state.landmarks_cache.set(cache_key, &projections).await;
    }
    Ok(projections)
}
