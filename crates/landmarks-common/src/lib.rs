pub mod config;
pub mod coordinates;
pub mod error;
pub mod fetcher;
pub mod model;

pub use config::Config;
pub use coordinates::{CanonicalKey, Coordinates};
pub use error::{Error, ExternalErrorKind, Result};
pub use fetcher::LandmarkFetcher;
pub use model::{
    FetchedLandmark, LandmarkProjection, LandmarkRecord, OsmType, ProcessingMessage,
    RequestRecord, RequestStatus, ERROR_MESSAGE_MAX_LEN,
};
