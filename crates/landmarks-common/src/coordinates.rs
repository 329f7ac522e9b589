//! Coordinate canonicalization.
//!
//! Turns a raw, client-supplied (lat, lng) pair into a stable
//! [`CanonicalKey`] used for dedup, caching, and storage.

use crate::error::{Error, Result};

/// Raw inbound coordinates. Immutable, lives only on the call stack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Result<Self> {
        if !lat.is_finite() || !lng.is_finite() {
            return Err(Error::InvalidInput("coordinates must be finite".into()));
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(Error::InvalidInput(format!(
                "latitude {lat} out of range [-90, 90]"
            )));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(Error::InvalidInput(format!(
                "longitude {lng} out of range [-180, 180]"
            )));
        }
        Ok(Self { lat, lng })
    }
}

/// The canonical request key: `(keyLat, keyLng, radius)`.
///
/// `canon(canon(x)) == canon(x)` — rounding to 4 fractional digits is
/// idempotent, so re-canonicalizing an already-canonical key is a no-op.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanonicalKey {
    pub key_lat: f64,
    pub key_lng: f64,
    pub radius_m: u32,
}

impl CanonicalKey {
    /// Canonicalize raw coordinates with the configured query radius.
    pub fn canonicalize(lat: f64, lng: f64, radius_m: u32) -> Result<Self> {
        let coords = Coordinates::new(lat, lng)?;
        Ok(Self {
            key_lat: round_half_up_4(coords.lat),
            key_lng: round_half_up_4(coords.lng),
            radius_m,
        })
    }

    /// The string this key is addressed by in the hot cache: `"lat:lng:radius"`.
    pub fn cache_key(&self) -> String {
        format!("{:.4}:{:.4}:{}", self.key_lat, self.key_lng, self.radius_m)
    }
}

/// Round half-up to exactly 4 fractional digits (~11 m precision).
///
/// `f64::round()` rounds half-away-from-zero, which coincides with
/// half-up for non-negative numbers but rounds *away* from up for
/// negatives (e.g. -0.00005 would round to -0.0001, not -0.0000).
/// Coordinates can be negative (southern/western hemispheres), so the
/// sign is handled explicitly.
fn round_half_up_4(value: f64) -> f64 {
    let scaled = value * 10_000.0;
    let rounded = if scaled >= 0.0 {
        (scaled + 0.5).floor()
    } else {
        -((-scaled + 0.5).floor())
    };
    rounded / 10_000.0
}
