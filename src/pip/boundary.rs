//! Boundary polygons and their attribute columns, loaded from GeoJSON.

use geo::{BoundingRect, Coord, MapCoords, MultiPolygon};
use geojson::{FeatureCollection, GeoJson, JsonObject};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

const EARTH_RADIUS_M: f64 = 6_378_137.0;

#[derive(Debug, Error)]
pub enum BoundaryError {
    #[error("failed to read boundary file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid GeoJSON: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("boundary file must be a GeoJSON FeatureCollection or Feature")]
    NotFeatures,

    #[error("unsupported coordinate reference system '{0}'")]
    UnsupportedCrs(String),
}

/// Coordinate reference systems boundary files may arrive in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crs {
    /// EPSG:4326, longitude/latitude degrees
    Wgs84,
    /// EPSG:3857, spherical Web Mercator metres
    WebMercator,
}

impl Crs {
    /// Parse a CRS name such as `EPSG:4326` or `urn:ogc:def:crs:EPSG::3857`
    pub fn from_name(name: &str) -> Option<Self> {
        let code = name
            .rsplit(|c: char| c == ':' || c == '/')
            .next()
            .unwrap_or(name)
            .trim();
        match code.to_ascii_uppercase().as_str() {
            "4326" | "CRS84" => Some(Crs::Wgs84),
            "3857" | "900913" | "102100" => Some(Crs::WebMercator),
            _ => None,
        }
    }

    fn unproject(self, c: Coord<f64>) -> Coord<f64> {
        match self {
            Crs::Wgs84 => c,
            Crs::WebMercator => Coord {
                x: (c.x / EARTH_RADIUS_M).to_degrees(),
                y: (2.0 * (c.y / EARTH_RADIUS_M).exp().atan() - std::f64::consts::FRAC_PI_2)
                    .to_degrees(),
            },
        }
    }

    fn project(self, c: Coord<f64>) -> Coord<f64> {
        match self {
            Crs::Wgs84 => c,
            Crs::WebMercator => Coord {
                x: c.x.to_radians() * EARTH_RADIUS_M,
                y: (std::f64::consts::FRAC_PI_4 + c.y.to_radians() / 2.0).tan().ln()
                    * EARTH_RADIUS_M,
            },
        }
    }
}

/// A single boundary polygon with its attributes
#[derive(Debug, Clone)]
pub struct Boundary {
    /// Position in the boundary set; used for deterministic tie-breaks
    pub ordinal: usize,
    pub attributes: JsonObject,
    pub geometry: MultiPolygon<f64>,
}

impl Boundary {
    /// Get the bounding box of this boundary
    pub fn bbox(&self) -> Option<(f64, f64, f64, f64)> {
        self.geometry
            .bounding_rect()
            .map(|rect| (rect.min().x, rect.min().y, rect.max().x, rect.max().y))
    }
}

/// Ordered boundaries sharing one CRS.
///
/// Read-only once built; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct BoundarySet {
    crs: Crs,
    columns: Vec<String>,
    boundaries: Vec<Arc<Boundary>>,
}

impl BoundarySet {
    /// Build a set from (attributes, geometry) pairs in order
    pub fn new(crs: Crs, features: Vec<(JsonObject, MultiPolygon<f64>)>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        let boundaries = features
            .into_iter()
            .enumerate()
            .map(|(ordinal, (attributes, geometry))| {
                for key in attributes.keys() {
                    if !columns.iter().any(|c| c == key) {
                        columns.push(key.clone());
                    }
                }
                Arc::new(Boundary {
                    ordinal,
                    attributes,
                    geometry,
                })
            })
            .collect();

        Self {
            crs,
            columns,
            boundaries,
        }
    }

    pub fn empty() -> Self {
        Self::new(Crs::Wgs84, Vec::new())
    }

    /// Load a GeoJSON boundary file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, BoundaryError> {
        let path = path.as_ref();
        info!("Reading boundaries from {}...", path.display());
        let content = std::fs::read_to_string(path)?;
        let set = Self::from_geojson_str(&content)?;
        info!(
            "Loaded {} boundary features ({:?}), columns: {}",
            set.len(),
            set.crs,
            set.columns.join(", ")
        );
        Ok(set)
    }

    /// Parse boundaries from GeoJSON text.
    ///
    /// Features without polygonal geometry are skipped. A legacy `crs`
    /// member selects the input CRS; without one WGS84 is assumed.
    pub fn from_geojson_str(content: &str) -> Result<Self, BoundaryError> {
        let collection = match content.parse::<GeoJson>()? {
            GeoJson::FeatureCollection(fc) => fc,
            GeoJson::Feature(f) => FeatureCollection {
                bbox: None,
                features: vec![f],
                foreign_members: None,
            },
            GeoJson::Geometry(_) => return Err(BoundaryError::NotFeatures),
        };

        let crs = declared_crs(collection.foreign_members.as_ref())?;

        let mut features = Vec::with_capacity(collection.features.len());
        for (idx, feature) in collection.features.into_iter().enumerate() {
            let attributes = feature.properties.unwrap_or_default();
            let polygons = match feature.geometry {
                Some(geometry) => polygonal(geo_types::Geometry::<f64>::try_from(geometry)?),
                None => None,
            };
            match polygons {
                Some(geometry) => features.push((attributes, geometry)),
                None => warn!("Skipping boundary feature {} without polygon geometry", idx),
            }
        }

        Ok(Self::new(crs, features))
    }

    /// Reproject every boundary into `target`, keeping order and attributes
    pub fn to_crs(&self, target: Crs) -> Self {
        if self.crs == target {
            return self.clone();
        }

        let source = self.crs;
        info!("Reprojecting {} boundaries {:?} -> {:?}", self.len(), source, target);

        let boundaries = self
            .boundaries
            .iter()
            .map(|b| {
                Arc::new(Boundary {
                    ordinal: b.ordinal,
                    attributes: b.attributes.clone(),
                    geometry: b
                        .geometry
                        .map_coords(|c| target.project(source.unproject(c))),
                })
            })
            .collect();

        Self {
            crs: target,
            columns: self.columns.clone(),
            boundaries,
        }
    }

    pub fn crs(&self) -> Crs {
        self.crs
    }

    /// Attribute column names in first-seen order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn get(&self, ordinal: usize) -> Option<&Arc<Boundary>> {
        self.boundaries.get(ordinal)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Boundary>> {
        self.boundaries.iter()
    }

    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }
}

fn declared_crs(foreign: Option<&JsonObject>) -> Result<Crs, BoundaryError> {
    let name = foreign
        .and_then(|m| m.get("crs"))
        .and_then(|crs| crs.get("properties"))
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str);

    match name {
        None => Ok(Crs::Wgs84),
        Some(name) => {
            Crs::from_name(name).ok_or_else(|| BoundaryError::UnsupportedCrs(name.to_string()))
        }
    }
}

fn polygonal(geometry: geo_types::Geometry<f64>) -> Option<MultiPolygon<f64>> {
    use geo_types::Geometry;

    match geometry {
        Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p])),
        Geometry::MultiPolygon(mp) => Some(mp),
        Geometry::Rect(r) => Some(MultiPolygon::new(vec![r.to_polygon()])),
        Geometry::GeometryCollection(gc) => {
            let polygons: Vec<_> = gc
                .into_iter()
                .filter_map(polygonal)
                .flat_map(|mp| mp.0)
                .collect();
            (!polygons.is_empty()).then(|| MultiPolygon::new(polygons))
        }
        _ => None,
    }
}
