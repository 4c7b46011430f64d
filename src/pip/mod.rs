//! Point-in-Polygon (PIP) boundary matching.
//!
//! Loads boundary polygons from GeoJSON and attributes points to the
//! containing boundary, or the nearest one, using an R-tree spatial index.

pub mod boundary;
mod index;
mod matcher;
mod service;

pub use boundary::{Boundary, BoundaryError, BoundarySet, Crs};
pub use index::BoundaryIndex;
pub use matcher::{match_location, match_points};
pub use service::BoundaryHandle;
