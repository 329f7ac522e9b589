//! Seam for the External Landmark Fetcher, kept here rather than in
//! `landmarks-overpass` so the Processing Worker can depend on the trait
//! without forcing a concrete `reqwest` client on test code.

use crate::{FetchedLandmark, Result};
use async_trait::async_trait;

#[async_trait]
pub trait LandmarkFetcher: Send + Sync {
    async fn fetch(&self, lat: f64, lng: f64, radius_m: u32) -> Result<Vec<FetchedLandmark>>;
}
