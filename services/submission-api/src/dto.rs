//! Wire-format request/response bodies for the HTTP surface.

use landmarks_common::{LandmarkProjection, RequestStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub id: Uuid,
    pub status: RequestStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct CoordinatesQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct WebhookKey {
    pub lat: f64,
    pub lng: f64,
}

/// Response body for `GET /webhook/{id}` once the request has left PENDING.
#[derive(Debug, Serialize)]
pub struct WebhookStatusResponse {
    pub key: WebhookKey,
    pub count: usize,
    #[serde(rename = "radiusMeters")]
    pub radius_meters: u32,
    pub landmarks: Vec<LandmarkProjection>,
}

#[derive(Debug, Serialize)]
pub struct LandmarksKey {
    pub lat: f64,
    pub lng: f64,
    #[serde(rename = "radiusMeters")]
    pub radius_meters: u32,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Cache,
    Db,
    None,
}

/// Response body for `GET /landmarks?lat=&lng=`.
#[derive(Debug, Serialize)]
pub struct LandmarksResponse {
    pub key: LandmarksKey,
    pub source: ResponseSource,
    pub landmarks: Vec<LandmarkProjection>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
