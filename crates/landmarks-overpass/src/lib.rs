//! External Landmark Fetcher — queries an Overpass-compatible
//! geospatial API for tourism-attraction elements around a point.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use landmarks_common::{Error, ExternalErrorKind, FetchedLandmark, LandmarkFetcher, OsmType, Result};
use serde::Deserialize;
use tracing::warn;

/// Thin client over one Overpass endpoint.
#[derive(Clone)]
pub struct OverpassClient {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    retries: u32,
    retry_delay: Duration,
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    #[serde(rename = "type")]
    element_type: String,
    id: i64,
    lat: Option<f64>,
    lon: Option<f64>,
    center: Option<OverpassCenter>,
    #[serde(default)]
    tags: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OverpassCenter {
    lat: f64,
    lon: f64,
}

impl OverpassClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration, retries: u32) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InternalError(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            timeout,
            retries,
            retry_delay: Duration::from_secs(1),
        })
    }

    async fn execute(&self, query: &str) -> std::result::Result<String, RequestFailure> {
        let response = self
            .http
            .post(&self.endpoint)
            .body(query.to_string())
            .send()
            .await
            .map_err(classify_transport_error)?;

        if !response.status().is_success() {
            return Err(RequestFailure::Status(format!(
                "upstream returned {}",
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| RequestFailure::Transient(e.to_string()))
    }
}

#[async_trait]
impl LandmarkFetcher for OverpassClient {
    /// Queries tourism-attraction ways and relations within `radius_m`
    /// meters of `(lat, lng)`, applying the hard timeout and fixed-delay
    /// transient-failure retry policy.
    async fn fetch(&self, lat: f64, lng: f64, radius_m: u32) -> Result<Vec<FetchedLandmark>> {
        let query = build_query(lat, lng, radius_m, self.timeout);

        let mut attempt = 0;
        loop {
            match self.execute(&query).await {
                Ok(body) => return parse_response(&body),
                Err(RequestFailure::Transient(message)) if attempt < self.retries => {
                    attempt += 1;
                    warn!(attempt, %message, "overpass transport error, retrying");
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(RequestFailure::Transient(message)) => {
                    return Err(Error::ExternalError {
                        kind: ExternalErrorKind::Transport,
                        message,
                    })
                }
                Err(RequestFailure::Timeout(message)) => {
                    return Err(Error::ExternalError {
                        kind: ExternalErrorKind::Timeout,
                        message,
                    })
                }
                Err(RequestFailure::Status(message)) => {
                    return Err(Error::ExternalError {
                        kind: ExternalErrorKind::HttpStatus,
                        message,
                    })
                }
            }
        }
    }
}

enum RequestFailure {
    Transient(String),
    Timeout(String),
    Status(String),
}

fn classify_transport_error(err: reqwest::Error) -> RequestFailure {
    if err.is_timeout() {
        RequestFailure::Timeout(err.to_string())
    } else if err.is_connect() || err.is_request() {
        RequestFailure::Transient(err.to_string())
    } else {
        RequestFailure::Transient(err.to_string())
    }
}

/// `[out:json][timeout:N];(way["tourism"](around:r,lat,lon);relation["tourism"](around:r,lat,lon););out center;`
fn build_query(lat: f64, lng: f64, radius_m: u32, timeout: Duration) -> String {
    let timeout_secs = timeout.as_secs().max(1);
    format!(
        "[out:json][timeout:{timeout_secs}];(way[\"tourism\"](around:{radius_m},{lat},{lng});relation[\"tourism\"](around:{radius_m},{lat},{lng}););out center;"
    )
}

fn parse_response(body: &str) -> Result<Vec<FetchedLandmark>> {
    let parsed: OverpassResponse = serde_json::from_str(body).map_err(|e| Error::ExternalError {
        kind: ExternalErrorKind::BadResponse,
        message: format!("failed to parse overpass response: {e}"),
    })?;

    let mut landmarks = Vec::with_capacity(parsed.elements.len());
    for element in parsed.elements {
        let Ok(osm_type) = element.element_type.parse::<OsmType>() else {
            warn!(element_type = %element.element_type, "dropping element with unknown osm type");
            continue;
        };

        let (lat, lon) = match (&element.center, element.lat, element.lon) {
            (Some(center), _, _) => (center.lat, center.lon),
            (None, Some(lat), Some(lon)) => (lat, lon),
            _ => {
                warn!(osm_id = element.id, "dropping element with no coordinates");
                continue;
            }
        };

        let name = element
            .tags
            .get("name")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let tags = element
            .tags
            .into_iter()
            .map(|(k, v)| (k, stringify_tag_value(v)))
            .collect();

        landmarks.push(FetchedLandmark {
            osm_type,
            osm_id: element.id,
            name,
            lat,
            lng: lon,
            tags,
        });
    }

    Ok(landmarks)
}

fn stringify_tag_value(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}
