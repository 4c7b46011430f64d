//! Geomatch - batch geocoding with boundary attribution
//!
//! Resolves address records to coordinates through a geocoding provider,
//! then attributes each located record to the administrative boundary that
//! contains it (or the nearest one). Shared by the `geocode` and `query`
//! binaries.

pub mod config;
pub mod geocode;
pub mod io;
pub mod models;
pub mod pip;
pub mod pipeline;

pub use config::Config;
pub use models::{AddressRecord, AttributedPoint, GeocodedPoint, RecordSet, RegionProfile};
pub use pipeline::{Pipeline, PipelineError, PipelineOutput};
