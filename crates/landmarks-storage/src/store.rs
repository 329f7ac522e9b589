//! Durable store — Postgres-backed request and landmark persistence
//! via `sqlx`.
//!
//! Both tables are soft-deleted: a row is never physically removed, only
//! marked via `deleted_at`, and uniqueness is enforced with a partial
//! index scoped to live rows so a deleted key can be reused.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use landmarks_common::{Error, FetchedLandmark, LandmarkRecord, OsmType, RequestRecord, RequestStatus, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use crate::traits::Store;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS requests (
    id UUID PRIMARY KEY,
    key_lat DOUBLE PRECISION NOT NULL,
    key_lng DOUBLE PRECISION NOT NULL,
    radius_m INTEGER NOT NULL,
    status TEXT NOT NULL,
    error_message TEXT,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    deleted_at TIMESTAMPTZ
);

CREATE UNIQUE INDEX IF NOT EXISTS requests_live_key_idx
    ON requests (key_lat, key_lng, radius_m)
    WHERE deleted_at IS NULL;

CREATE TABLE IF NOT EXISTS landmarks (
    id UUID PRIMARY KEY,
    osm_type TEXT NOT NULL,
    osm_id BIGINT NOT NULL,
    name TEXT,
    lat DOUBLE PRECISION NOT NULL,
    lng DOUBLE PRECISION NOT NULL,
    tags JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    deleted_at TIMESTAMPTZ
);

CREATE UNIQUE INDEX IF NOT EXISTS landmarks_live_osm_idx
    ON landmarks (osm_type, osm_id)
    WHERE deleted_at IS NULL;

CREATE TABLE IF NOT EXISTS request_landmark (
    request_id UUID NOT NULL REFERENCES requests (id),
    landmark_id UUID NOT NULL REFERENCES landmarks (id),
    PRIMARY KEY (request_id, landmark_id)
);

CREATE INDEX IF NOT EXISTS request_landmark_request_idx
    ON request_landmark (request_id);
"#;

#[derive(Debug, FromRow)]
struct RequestRow {
    id: Uuid,
    key_lat: f64,
    key_lng: f64,
    radius_m: i32,
    status: String,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<RequestRow> for RequestRecord {
    type Error = Error;

    fn try_from(row: RequestRow) -> Result<Self> {
        let status = parse_status(&row.status)?;
        Ok(RequestRecord {
            id: row.id,
            key_lat: row.key_lat,
            key_lng: row.key_lng,
            radius_m: row.radius_m,
            status,
            error_message: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

fn parse_status(raw: &str) -> Result<RequestStatus> {
    match raw {
        "PENDING" => Ok(RequestStatus::Pending),
        "FOUND" => Ok(RequestStatus::Found),
        "EMPTY" => Ok(RequestStatus::Empty),
        "ERROR" => Ok(RequestStatus::Error),
        other => Err(Error::InternalError(format!("unknown request status {other}"))),
    }
}

fn status_str(status: RequestStatus) -> &'static str {
    match status {
        RequestStatus::Pending => "PENDING",
        RequestStatus::Found => "FOUND",
        RequestStatus::Empty => "EMPTY",
        RequestStatus::Error => "ERROR",
    }
}

#[derive(Debug, FromRow)]
struct LandmarkRow {
    id: Uuid,
    osm_type: String,
    osm_id: i64,
    name: Option<String>,
    lat: f64,
    lng: f64,
    tags: serde_json::Value,
    created_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<LandmarkRow> for LandmarkRecord {
    type Error = Error;

    fn try_from(row: LandmarkRow) -> Result<Self> {
        let osm_type: OsmType = row
            .osm_type
            .parse()
            .map_err(|_| Error::InternalError(format!("unknown osm_type {}", row.osm_type)))?;
        let tags = serde_json::from_value(row.tags).unwrap_or_default();
        Ok(LandmarkRecord {
            id: row.id,
            osm_type,
            osm_id: row.osm_id,
            name: row.name,
            lat: row.lat,
            lng: row.lng,
            tags,
            created_at: row.created_at,
            deleted_at: row.deleted_at,
        })
    }
}

/// Postgres-backed implementation of the request/landmark store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        Self::connect_with_pool_size(database_url, 10).await
    }

    pub async fn connect_with_pool_size(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| Error::StoreError(format!("connect failed: {e}")))?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA_SQL.split(';') {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| Error::StoreError(format!("migration failed: {e}")))?;
        }
        Ok(())
    }

    pub async fn queue_depth_hint(&self) -> Result<i64> {
        let row = sqlx::query("SELECT count(*) AS c FROM requests WHERE status = 'PENDING' AND deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::StoreError(format!("query failed: {e}")))?;
        Ok(row.try_get::<i64, _>("c").unwrap_or(0))
    }
}

#[async_trait]
impl Store for PostgresStore {
    /// Inserts a new PENDING request for a canonical key, or returns the
    /// already-live request for that key if one exists (idempotent submit
    /// for the coordinator).
    async fn create_or_get_pending_request(
        &self,
        key_lat: f64,
        key_lng: f64,
        radius_m: i32,
    ) -> Result<(RequestRecord, bool)> {
        let record = RequestRecord::new_pending(key_lat, key_lng, radius_m);
        let inserted = sqlx::query(
            r#"
            INSERT INTO requests (id, key_lat, key_lng, radius_m, status, error_message, created_at, updated_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, NULL, $6, $7, NULL)
            "#,
        )
        .bind(record.id)
        .bind(record.key_lat)
        .bind(record.key_lng)
        .bind(record.radius_m)
        .bind(status_str(record.status))
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok((record, true)),
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
                let existing = self
                    .find_live_request_by_key(key_lat, key_lng, radius_m)
                    .await?
                    .ok_or_else(|| {
                        Error::StoreError("unique violation but no live row found".into())
                    })?;
                Ok((existing, false))
            }
            Err(e) => Err(Error::StoreError(format!("insert request failed: {e}"))),
        }
    }

    async fn find_live_request_by_key(
        &self,
        key_lat: f64,
        key_lng: f64,
        radius_m: i32,
    ) -> Result<Option<RequestRecord>> {
        let row = sqlx::query_as::<_, RequestRow>(
            "SELECT * FROM requests WHERE key_lat = $1 AND key_lng = $2 AND radius_m = $3 AND deleted_at IS NULL",
        )
        .bind(key_lat)
        .bind(key_lng)
        .bind(radius_m)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::StoreError(format!("query failed: {e}")))?;

        row.map(RequestRecord::try_from).transpose()
    }

    /// Soft-deletes `expired`'s live landmarks and the record itself, then
    /// inserts a fresh PENDING request for the same key, all inside one
    /// transaction — the refresh protocol. The partial-unique
    /// index only allows the insert once the old row's `deleted_at` is set.
    async fn refresh_expired_request(
        &self,
        expired: &RequestRecord,
    ) -> Result<RequestRecord> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::StoreError(format!("begin tx failed: {e}")))?;

        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE landmarks SET deleted_at = $1
            WHERE deleted_at IS NULL AND id IN (
                SELECT landmark_id FROM request_landmark WHERE request_id = $2
            )
            "#,
        )
        .bind(now)
        .bind(expired.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::StoreError(format!("soft-delete landmarks failed: {e}")))?;

        sqlx::query("UPDATE requests SET deleted_at = $1 WHERE id = $2")
            .bind(now)
            .bind(expired.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::StoreError(format!("soft-delete request failed: {e}")))?;

        let fresh = RequestRecord::new_pending(expired.key_lat, expired.key_lng, expired.radius_m);
        sqlx::query(
            r#"
            INSERT INTO requests (id, key_lat, key_lng, radius_m, status, error_message, created_at, updated_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, NULL, $6, $7, NULL)
            "#,
        )
        .bind(fresh.id)
        .bind(fresh.key_lat)
        .bind(fresh.key_lng)
        .bind(fresh.radius_m)
        .bind(status_str(fresh.status))
        .bind(fresh.created_at)
        .bind(fresh.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::StoreError(format!("insert refreshed request failed: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| Error::StoreError(format!("commit failed: {e}")))?;

        Ok(fresh)
    }

    async fn get_request(&self, id: Uuid) -> Result<Option<RequestRecord>> {
        let row = sqlx::query_as::<_, RequestRow>("SELECT * FROM requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::StoreError(format!("query failed: {e}")))?;

        row.map(RequestRecord::try_from).transpose()
    }

    async fn mark_request_found(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE requests SET status = $1, error_message = NULL, updated_at = $2 WHERE id = $3")
            .bind(status_str(RequestStatus::Found))
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::StoreError(format!("update failed: {e}")))?;
        Ok(())
    }

    /// Soft-deletes a single request row, freeing its key for reuse. Used
    /// to compensate a PENDING insert when the subsequent queue enqueue
    /// fails (enqueue failure aborts the submission).
    async fn soft_delete_request(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE requests SET deleted_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::StoreError(format!("soft-delete failed: {e}")))?;
        Ok(())
    }

    async fn mark_request_error(&self, id: Uuid, message: &str) -> Result<()> {
        let mut record = self
            .get_request(id)
            .await?
            .ok_or_else(|| Error::StoreError(format!("request {id} not found")))?;
        record.set_error(message);

        sqlx::query("UPDATE requests SET status = $1, error_message = $2, updated_at = $3 WHERE id = $4")
            .bind(status_str(record.status))
            .bind(&record.error_message)
            .bind(record.updated_at)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::StoreError(format!("update failed: {e}")))?;
        Ok(())
    }

    /// Persists the outcome of a processing run: upserts each fetched
    /// landmark, links them to the request, and sets the terminal status
    /// (FOUND if any landmarks were found, EMPTY otherwise), all within a
    /// single transaction.
    async fn complete_request(
        &self,
        request_id: Uuid,
        landmarks: Vec<FetchedLandmark>,
    ) -> Result<Vec<LandmarkRecord>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::StoreError(format!("begin tx failed: {e}")))?;

        let mut persisted = Vec::with_capacity(landmarks.len());
        for landmark in &landmarks {
            let id = Uuid::new_v4();
            let tags = serde_json::to_value(&landmark.tags)?;
            let row = sqlx::query_as::<_, LandmarkRow>(
                r#"
                INSERT INTO landmarks (id, osm_type, osm_id, name, lat, lng, tags, created_at, deleted_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NULL)
                ON CONFLICT (osm_type, osm_id) WHERE deleted_at IS NULL
                DO UPDATE SET name = EXCLUDED.name, lat = EXCLUDED.lat, lng = EXCLUDED.lng, tags = EXCLUDED.tags
                RETURNING *
                "#,
            )
            .bind(id)
            .bind(landmark.osm_type.to_string())
            .bind(landmark.osm_id)
            .bind(&landmark.name)
            .bind(landmark.lat)
            .bind(landmark.lng)
            .bind(tags)
            .bind(Utc::now())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| Error::StoreError(format!("upsert landmark failed: {e}")))?;

            sqlx::query(
                "INSERT INTO request_landmark (request_id, landmark_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(request_id)
            .bind(row.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::StoreError(format!("link landmark failed: {e}")))?;

            persisted.push(LandmarkRecord::try_from(row)?);
        }

        let status = if persisted.is_empty() {
            RequestStatus::Empty
        } else {
            RequestStatus::Found
        };

        sqlx::query("UPDATE requests SET status = $1, error_message = NULL, updated_at = $2 WHERE id = $3")
            .bind(status_str(status))
            .bind(Utc::now())
            .bind(request_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::StoreError(format!("update request failed: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| Error::StoreError(format!("commit failed: {e}")))?;

        Ok(persisted)
    }

    /// Links an already-persisted set of landmarks to `request_id` and
    /// marks the request FOUND, without touching the `landmarks` table —
    /// the "DB shortcut" reuse path.
    async fn adopt_landmarks(&self, request_id: Uuid, landmark_ids: &[Uuid]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::StoreError(format!("begin tx failed: {e}")))?;

        for landmark_id in landmark_ids {
            sqlx::query(
                "INSERT INTO request_landmark (request_id, landmark_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(request_id)
            .bind(landmark_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::StoreError(format!("adopt landmark failed: {e}")))?;
        }

        sqlx::query("UPDATE requests SET status = $1, error_message = NULL, updated_at = $2 WHERE id = $3")
            .bind(status_str(RequestStatus::Found))
            .bind(Utc::now())
            .bind(request_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::StoreError(format!("update request failed: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| Error::StoreError(format!("commit failed: {e}")))?;
        Ok(())
    }

    async fn list_landmarks_for_request(&self, request_id: Uuid) -> Result<Vec<LandmarkRecord>> {
        let rows = sqlx::query_as::<_, LandmarkRow>(
            r#"
            SELECT l.* FROM landmarks l
            JOIN request_landmark rl ON rl.landmark_id = l.id
            WHERE rl.request_id = $1 AND l.deleted_at IS NULL
            ORDER BY l.created_at
            "#,
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::StoreError(format!("query failed: {e}")))?;

        rows.into_iter().map(LandmarkRecord::try_from).collect()
    }

    /// Requests still PENDING older than `threshold`, used by the optional
    /// starvation sweep.
    async fn find_stale_pending_requests(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<RequestRecord>> {
        let rows = sqlx::query_as::<_, RequestRow>(
            "SELECT * FROM requests WHERE status = 'PENDING' AND deleted_at IS NULL AND created_at < $1",
        )
        .bind(older_than)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::StoreError(format!("query failed: {e}")))?;

        rows.into_iter().map(RequestRecord::try_from).collect()
    }
}
