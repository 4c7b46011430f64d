//! Core data models for the geocoding pipeline.

pub mod point;
pub mod record;
pub mod region;

pub use point::{
    AttributedPoint, BatchStats, BoundaryMatch, ConfidenceTag, GeocodeOutcome, GeocodedPoint,
    Location, MatchMethod,
};
pub use record::{AddressRecord, QueryFields, RecordSet};
pub use region::RegionProfile;
