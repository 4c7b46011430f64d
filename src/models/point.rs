//! Geocoded and boundary-attributed points.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::AddressRecord;
use crate::pip::Boundary;

/// How precisely a resolved coordinate locates the address.
///
/// Ordered from highest to lowest trust; the ordering is advisory only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceTag {
    /// The input text already was a coordinate pair; no network lookup happened
    Coordinates,
    Rooftop,
    RangeInterpolated,
    GeometricCenter,
    Approximate,
}

impl ConfidenceTag {
    /// Map a provider `location_type` onto a tag.
    ///
    /// Missing or unrecognized values fall to the lowest tier.
    pub fn from_provider(location_type: Option<&str>) -> Self {
        match location_type {
            Some("ROOFTOP") => ConfidenceTag::Rooftop,
            Some("RANGE_INTERPOLATED") => ConfidenceTag::RangeInterpolated,
            Some("GEOMETRIC_CENTER") => ConfidenceTag::GeometricCenter,
            _ => ConfidenceTag::Approximate,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTag::Coordinates => "COORDINATES",
            ConfidenceTag::Rooftop => "ROOFTOP",
            ConfidenceTag::RangeInterpolated => "RANGE_INTERPOLATED",
            ConfidenceTag::GeometricCenter => "GEOMETRIC_CENTER",
            ConfidenceTag::Approximate => "APPROXIMATE",
        }
    }
}

impl std::fmt::Display for ConfidenceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved coordinate (WGS84 degrees) with its confidence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    pub confidence: ConfidenceTag,
}

impl Location {
    pub fn new(lat: f64, lon: f64, confidence: ConfidenceTag) -> Self {
        Self {
            lat,
            lon,
            confidence,
        }
    }
}

/// What happened to a record during geocoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum GeocodeOutcome {
    /// Literal coordinates found in the text
    Coordinates,
    /// Resolved by the provider
    Geocoded,
    /// Empty query, nothing attempted
    Skipped,
    /// Provider had no acceptable candidate
    NotFound,
    /// Transport or provider failure
    Error(String),
}

impl GeocodeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeocodeOutcome::Coordinates => "coordinates",
            GeocodeOutcome::Geocoded => "geocoded",
            GeocodeOutcome::Skipped => "skipped",
            GeocodeOutcome::NotFound => "not_found",
            GeocodeOutcome::Error(_) => "error",
        }
    }
}

/// One input record after geocoding.
///
/// Latitude and longitude live together in `location`, so a point never
/// carries one without the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodedPoint {
    pub record: AddressRecord,
    pub location: Option<Location>,
    pub outcome: GeocodeOutcome,
}

impl GeocodedPoint {
    pub fn located(record: AddressRecord, location: Location, outcome: GeocodeOutcome) -> Self {
        Self {
            record,
            location: Some(location),
            outcome,
        }
    }

    pub fn unlocated(record: AddressRecord, outcome: GeocodeOutcome) -> Self {
        Self {
            record,
            location: None,
            outcome,
        }
    }

    pub fn lat(&self) -> Option<f64> {
        self.location.map(|l| l.lat)
    }

    pub fn lon(&self) -> Option<f64> {
        self.location.map(|l| l.lon)
    }

    pub fn confidence(&self) -> Option<ConfidenceTag> {
        self.location.map(|l| l.confidence)
    }
}

/// Counters over one batch.
///
/// `successful + failed + skipped == total`, and `not_found + errors == failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub not_found: usize,
    pub errors: usize,
}

impl BatchStats {
    pub fn record(&mut self, outcome: &GeocodeOutcome) {
        self.total += 1;
        match outcome {
            GeocodeOutcome::Coordinates | GeocodeOutcome::Geocoded => self.successful += 1,
            GeocodeOutcome::Skipped => self.skipped += 1,
            GeocodeOutcome::NotFound => {
                self.failed += 1;
                self.not_found += 1;
            }
            GeocodeOutcome::Error(_) => {
                self.failed += 1;
                self.errors += 1;
            }
        }
    }
}

/// How a point was attributed to its boundary
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum MatchMethod {
    /// The boundary polygon contains the point
    Contained,
    /// No polygon contains the point; this is the closest one
    Nearest { distance: f64 },
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMethod::Contained => "contained",
            MatchMethod::Nearest { .. } => "nearest",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BoundaryMatch {
    pub boundary: Arc<Boundary>,
    pub method: MatchMethod,
}

/// A geocoded point with the attributes of its matched boundary, if any
#[derive(Debug, Clone)]
pub struct AttributedPoint {
    pub point: GeocodedPoint,
    pub boundary: Option<BoundaryMatch>,
}

impl AttributedPoint {
    pub fn unmatched(point: GeocodedPoint) -> Self {
        Self {
            point,
            boundary: None,
        }
    }

    /// Attribute value from the matched boundary
    pub fn attribute(&self, column: &str) -> Option<&serde_json::Value> {
        self.boundary
            .as_ref()
            .and_then(|m| m.boundary.attributes.get(column))
    }

    pub fn is_matched(&self) -> bool {
        self.boundary.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_invariant() {
        let mut stats = BatchStats::default();
        for outcome in [
            GeocodeOutcome::Coordinates,
            GeocodeOutcome::Geocoded,
            GeocodeOutcome::Skipped,
            GeocodeOutcome::NotFound,
            GeocodeOutcome::Error("timeout".into()),
        ] {
            stats.record(&outcome);
        }
        assert_eq!(stats.total, 5);
        assert_eq!(stats.successful + stats.failed + stats.skipped, stats.total);
        assert_eq!(stats.not_found + stats.errors, stats.failed);
    }

    #[test]
    fn test_confidence_from_provider() {
        assert_eq!(
            ConfidenceTag::from_provider(Some("ROOFTOP")),
            ConfidenceTag::Rooftop
        );
        assert_eq!(
            ConfidenceTag::from_provider(Some("GEOMETRIC_CENTER")),
            ConfidenceTag::GeometricCenter
        );
        assert_eq!(
            ConfidenceTag::from_provider(None),
            ConfidenceTag::Approximate
        );
        assert_eq!(
            serde_json::to_string(&ConfidenceTag::RangeInterpolated).unwrap(),
            "\"RANGE_INTERPOLATED\""
        );
    }
}
