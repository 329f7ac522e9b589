//! Submission Coordinator: cache-probe/store/enqueue algorithm for incoming webhooks.

use chrono::{Duration as ChronoDuration, Utc};
use landmarks_common::{CanonicalKey, ProcessingMessage, RequestRecord, RequestStatus, Result};
use tracing::{info, warn};

use crate::state::AppState;

pub struct SubmitOutcome {
    pub id: uuid::Uuid,
    pub status: RequestStatus,
}

/// Runs the full coalesce/create/enqueue algorithm for one `(lat, lng)` pair.
pub async fn submit(state: &AppState, lat: f64, lng: f64) -> Result<SubmitOutcome> {
    let key = CanonicalKey::canonicalize(lat, lng, state.config.query_radius_meters)?;
    let cache_key = key.cache_key();

    let existing: Option<RequestRecord> = match state.requests_cache.get(&cache_key).await {
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

    let Some(live) = existing else {
        return create_and_enqueue(state, &key, &cache_key).await;
    };

    if live.status == RequestStatus::Pending {
        info!(request_id = %live.id, "coalescing submission onto pending request");
        return Ok(SubmitOutcome {
            id: live.id,
            status: live.status,
        });
    }

    let expiration = ChronoDuration::seconds(state.config.cache_expiration_secs as i64);
    if Utc::now() - live.created_at <= expiration {
        return Ok(SubmitOutcome {
            id: live.id,
            status: live.status,
        });
    }

    warn!(request_id = %live.id, "request expired, refreshing");
    let fresh = state.store.refresh_expired_request(&live).await?;
    state.requests_cache.invalidate(&cache_key).await;
    state.landmarks_cache.invalidate(&cache_key).await;

    enqueue(state, &fresh, &key, &cache_key).await?;
    Ok(SubmitOutcome {
        id: fresh.id,
        status: fresh.status,
    })
}

async fn create_and_enqueue(
    state: &AppState,
    key: &CanonicalKey,
    cache_key: &str,
) -> Result<SubmitOutcome> {
    let (record, created) = state
        .store
        .create_or_get_pending_request(key.key_lat, key.key_lng, key.radius_m as i32)
        .await?;

    if created {
        enqueue(state, &record, key, cache_key).await?;
    } else {
        state.requests_cache.set(cache_key, &record).await;
    }

    Ok(SubmitOutcome {
        id: record.id,
        status: record.status,
    })
}

/// Enqueues the processing message for a freshly-created PENDING record.
/// If the queue rejects it, the insert is compensated with a soft-delete
/// so the key is free again and the failed submission leaves no live row
/// behind.
async fn enqueue(
    state: &AppState,
    record: &RequestRecord,
    key: &CanonicalKey,
    cache_key: &str,
) -> Result<()> {
    let message = ProcessingMessage {
        request_id: record.id,
        key_lat: key.key_lat,
        key_lng: key.key_lng,
        radius_m: key.radius_m as i32,
    };

    if let Err(err) = state.queue.enqueue(&message).await {
        warn!(request_id = %record.id, "enqueue failed, rolling back pending request");
        state.requests_cache.invalidate(cache_key).await;
        state.store.soft_delete_request(record.id).await?;
        return Err(err);
    }

    state.requests_cache.set(cache_key, record).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_state, FakeQueue, FakeStore};
    use landmarks_common::RequestStatus;
    use landmarks_storage::Store;

    #[tokio::test]
    async fn first_submission_creates_and_enqueues() {
        let (state, _store, queue) = test_state(FakeStore::new(), FakeQueue::new());
        let outcome = submit(&state, 48.8584123, 2.2944812).await.unwrap();
        assert_eq!(outcome.status, RequestStatus::Pending);

        let enqueued = queue.enqueued.lock().unwrap();
        assert_eq!(enqueued.len(), 1);
        assert_eq!(enqueued[0].request_id, outcome.id);
    }

    #[tokio::test]
    async fn second_submission_for_same_key_coalesces() {
        let (state, _store, queue) = test_state(FakeStore::new(), FakeQueue::new());
        let first = submit(&state, 48.8584123, 2.2944812).await.unwrap();
        let second = submit(&state, 48.85841, 2.29448).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(queue.enqueued.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn enqueue_failure_rolls_back_pending_request() {
        let (state, store, _queue) = test_state(FakeStore::new(), FakeQueue::failing());
        let result = submit(&state, 48.8584123, 2.2944812).await;
        assert!(result.is_err());

        let key = CanonicalKey::canonicalize(48.8584123, 2.2944812, state.config.query_radius_meters).unwrap();
        let live = store
            .find_live_request_by_key(key.key_lat, key.key_lng, key.radius_m as i32)
            .await
            .unwrap();
        assert!(live.is_none(), "rolled-back request must not remain live");
    }

    #[tokio::test]
    async fn expired_request_is_refreshed_on_resubmission() {
        let fake_store = FakeStore::new();
        let mut seeded = RequestRecord::new_pending(48.8584, 2.2945, 500);
        seeded.set_found();
        seeded.created_at = Utc::now() - ChronoDuration::days(61);
        let seeded_id = seeded.id;
        fake_store.seed_request(seeded);

        let (state, store, _queue) = test_state(fake_store, FakeQueue::new());
        let outcome = submit(&state, 48.8584, 2.2945).await.unwrap();

        assert_ne!(outcome.id, seeded_id);
        assert_eq!(outcome.status, RequestStatus::Pending);

        let old = store.get_request(seeded_id).await.unwrap().unwrap();
        assert!(!old.is_live());
    }
}
