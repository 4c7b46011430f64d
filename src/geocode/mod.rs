//! Address geocoding: literal coordinate detection, provider lookups and
//! batch processing.

pub mod batch;
pub mod client;
pub mod coords;
pub mod pacing;
pub mod provider;

use thiserror::Error;

use crate::models::{ConfidenceTag, Location};

pub use batch::{BatchGeocoder, BatchRun};
pub use client::{Geocoder, GoogleGeocoder};
pub use coords::parse_coordinates;
pub use pacing::{FixedDelay, Pacer};

/// An accepted provider result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geocode {
    pub lat: f64,
    pub lon: f64,
    pub confidence: ConfidenceTag,
}

impl From<Geocode> for Location {
    fn from(g: Geocode) -> Self {
        Location::new(g.lat, g.lon, g.confidence)
    }
}

/// Outcome of a lookup that reached the provider
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(Geocode),
    /// No candidate, or the candidate failed the region checks
    NotFound,
}

#[derive(Debug, Error)]
pub enum GeocodeError {
    /// No API key configured; fatal for the whole run
    #[error("geocoding API key is not configured (set GOOGLE_MAPS_API_KEY)")]
    MissingCredential,

    #[error("invalid geocoder endpoint {0}")]
    InvalidEndpoint(String),

    /// Network failure, timeout or undecodable response
    #[error("transport error: {0}")]
    Transport(String),

    /// Provider answered with a non-success status
    #[error("provider returned status {status}{}", message.as_deref().map(|m| format!(": {}", m)).unwrap_or_default())]
    Provider {
        status: String,
        message: Option<String>,
    },
}

impl GeocodeError {
    /// Whether the error aborts a batch instead of failing a single record
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GeocodeError::MissingCredential | GeocodeError::InvalidEndpoint(_)
        )
    }
}
