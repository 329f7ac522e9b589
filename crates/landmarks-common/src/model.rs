//! Domain entities: `RequestRecord`, `LandmarkRecord`, and the
//! durable queue payload that connects the Submission Coordinator to
//! the Processing Worker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// The maximum length an `error_message` may occupy on a `RequestRecord`
/// before it is truncated.
pub const ERROR_MESSAGE_MAX_LEN: usize = 1000;

/// Status of a [`RequestRecord`]. Only `Pending` is non-terminal;
/// transitions only ever move PENDING -> {Found, Empty, Error}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestStatus {
    Pending,
    Found,
    Empty,
    Error,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Found => "FOUND",
            RequestStatus::Empty => "EMPTY",
            RequestStatus::Error => "ERROR",
        };
        write!(f, "{s}")
    }
}

/// The primary aggregate: one live row per canonical key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRecord {
    pub id: Uuid,
    pub key_lat: f64,
    pub key_lng: f64,
    pub radius_m: i32,
    pub status: RequestStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl RequestRecord {
    pub fn new_pending(key_lat: f64, key_lng: f64, radius_m: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            key_lat,
            key_lng,
            radius_m,
            status: RequestStatus::Pending,
            error_message: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Truncates `message` to [`ERROR_MESSAGE_MAX_LEN`] and records it,
    /// truncated rather than rejected.
    pub fn set_error(&mut self, message: impl Into<String>) {
        let mut message = message.into();
        if message.len() > ERROR_MESSAGE_MAX_LEN {
            message.truncate(ERROR_MESSAGE_MAX_LEN);
        }
        self.status = RequestStatus::Error;
        self.error_message = Some(message);
        self.updated_at = Utc::now();
    }

    pub fn set_found(&mut self) {
        self.status = RequestStatus::Found;
        self.updated_at = Utc::now();
    }

    pub fn set_empty(&mut self) {
        self.status = RequestStatus::Empty;
        self.updated_at = Utc::now();
    }
}

/// OSM element kind a landmark was sourced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsmType {
    Way,
    Relation,
    Node,
}

impl std::fmt::Display for OsmType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OsmType::Way => "way",
            OsmType::Relation => "relation",
            OsmType::Node => "node",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for OsmType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "way" => Ok(OsmType::Way),
            "relation" => Ok(OsmType::Relation),
            "node" => Ok(OsmType::Node),
            _ => Err(()),
        }
    }
}

/// A landmark identified globally by `(osm_type, osm_id)`, independent
/// of which request first discovered it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandmarkRecord {
    pub id: Uuid,
    pub osm_type: OsmType,
    pub osm_id: i64,
    pub name: Option<String>,
    pub lat: f64,
    pub lng: f64,
    pub tags: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl LandmarkRecord {
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// What the External Landmark Fetcher returns for one OSM element,
/// before it has been persisted as a `LandmarkRecord`.
#[derive(Debug, Clone)]
pub struct FetchedLandmark {
    pub osm_type: OsmType,
    pub osm_id: i64,
    pub name: Option<String>,
    pub lat: f64,
    pub lng: f64,
    pub tags: HashMap<String, String>,
}

/// A landmark as served in API responses — the `LandmarkRecord`
/// projected for the HTTP response shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandmarkProjection {
    pub id: Uuid,
    pub name: Option<String>,
    pub osm_type: OsmType,
    pub osm_id: i64,
    pub lat: f64,
    pub lng: f64,
    pub tags: HashMap<String, String>,
}

impl From<&LandmarkRecord> for LandmarkProjection {
    fn from(record: &LandmarkRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            osm_type: record.osm_type,
            osm_id: record.osm_id,
            lat: record.lat,
            lng: record.lng,
            tags: record.tags.clone(),
        }
    }
}

/// Durable queue payload produced by the coordinator and consumed by the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingMessage {
    pub request_id: Uuid,
    pub key_lat: f64,
    pub key_lng: f64,
    pub radius_m: i32,
}
