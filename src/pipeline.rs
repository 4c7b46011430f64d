//! Geocode-and-match pipeline: the one place batch geocoding output meets
//! boundary matching.

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::geocode::{BatchGeocoder, BatchRun, GeocodeError, Geocoder, Pacer};
use crate::models::{
    AddressRecord, AttributedPoint, BatchStats, ConfidenceTag, GeocodeOutcome, GeocodedPoint,
    Location, MatchMethod, QueryFields, RecordSet,
};
use crate::pip::{match_location, match_points, BoundaryHandle};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("column '{column}' not found; available columns: {}", available.join(", "))]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },

    #[error("latitude/longitude out of range: ({lat}, {lon})")]
    InvalidCoordinate { lat: f64, lon: f64 },

    #[error(transparent)]
    Geocode(#[from] GeocodeError),
}

/// Attributed records for one batch, in input order
#[derive(Debug)]
pub struct PipelineOutput {
    /// Input header names
    pub columns: Vec<String>,
    /// Boundary attribute columns of the set used for matching
    pub boundary_columns: Vec<String>,
    pub points: Vec<AttributedPoint>,
    pub stats: BatchStats,
    /// Interrupted run; `points` covers only the records processed before
    /// the stop
    pub cancelled: bool,
}

impl PipelineOutput {
    /// Number of records attributed to some boundary
    pub fn matched(&self) -> usize {
        self.points.iter().filter(|p| p.is_matched()).count()
    }
}

/// Flat single-record answer for API callers
#[derive(Debug, Serialize)]
pub struct SingleResult {
    pub query: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<ConfidenceTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boundary_match: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl SingleResult {
    pub fn from_attributed(query: String, point: &AttributedPoint) -> Self {
        let error = match &point.point.outcome {
            GeocodeOutcome::Error(e) => Some(e.clone()),
            _ => None,
        };
        let (boundary_match, distance, attributes) = match &point.boundary {
            Some(m) => (
                Some(m.method.as_str()),
                match m.method {
                    MatchMethod::Nearest { distance } => Some(distance),
                    MatchMethod::Contained => None,
                },
                m.boundary.attributes.clone(),
            ),
            None => (None, None, serde_json::Map::new()),
        };

        Self {
            query,
            status: point.point.outcome.as_str(),
            latitude: point.point.lat(),
            longitude: point.point.lon(),
            confidence: point.point.confidence(),
            boundary_match,
            distance,
            error,
            attributes,
        }
    }

    pub fn is_located(&self) -> bool {
        self.latitude.is_some()
    }
}

/// Composes batch geocoding with boundary matching.
pub struct Pipeline<G, P> {
    geocoder: BatchGeocoder<G, P>,
    boundaries: BoundaryHandle,
    fields: QueryFields,
}

impl<G: Geocoder, P: Pacer> Pipeline<G, P> {
    pub fn new(geocoder: BatchGeocoder<G, P>, boundaries: BoundaryHandle, fields: QueryFields) -> Self {
        Self {
            geocoder,
            boundaries,
            fields,
        }
    }

    pub fn boundaries(&self) -> &BoundaryHandle {
        &self.boundaries
    }

    pub fn fields(&self) -> &QueryFields {
        &self.fields
    }

    /// Geocode and attribute a whole record set.
    ///
    /// The address column must exist before any record is processed.
    pub async fn run(&self, records: RecordSet) -> Result<PipelineOutput, PipelineError> {
        if !records.has_column(&self.fields.address) {
            return Err(PipelineError::MissingColumn {
                column: self.fields.address.clone(),
                available: records.headers,
            });
        }

        let RecordSet { headers, records } = records;
        let BatchRun {
            points,
            stats,
            cancelled,
        } = self.geocoder.run(records, &self.fields).await?;

        // One snapshot for the whole batch, even if a reload lands meanwhile
        let index = self.boundaries.snapshot();
        let points = match_points(points, &index);

        info!(
            "Pipeline complete: {} records, {} geocoded, {} matched to boundaries",
            stats.total,
            stats.successful,
            points.iter().filter(|p| p.is_matched()).count()
        );

        Ok(PipelineOutput {
            columns: headers,
            boundary_columns: index.boundaries().columns().to_vec(),
            points,
            stats,
            cancelled,
        })
    }

    /// Geocode one address-or-coordinate text and attribute it.
    ///
    /// Coordinate text never reaches the provider, so it resolves even
    /// without a credential.
    pub async fn geocode_one(&self, text: &str) -> Result<SingleResult, PipelineError> {
        let record = AddressRecord::new(vec![(self.fields.address.clone(), text.to_string())]);
        let point = self.geocoder.geocode_record(record, &self.fields).await?;
        let attributed = self.attribute(point);

        Ok(SingleResult::from_attributed(text.trim().to_string(), &attributed))
    }

    /// Attribute a raw coordinate pair (reverse lookup), no geocoding involved
    pub fn reverse(&self, lat: f64, lon: f64) -> Result<SingleResult, PipelineError> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(PipelineError::InvalidCoordinate { lat, lon });
        }

        let point = GeocodedPoint::located(
            AddressRecord::default(),
            Location::new(lat, lon, ConfidenceTag::Coordinates),
            GeocodeOutcome::Coordinates,
        );
        let attributed = self.attribute(point);

        Ok(SingleResult::from_attributed(
            format!("{}, {}", lat, lon),
            &attributed,
        ))
    }

    fn attribute(&self, point: GeocodedPoint) -> AttributedPoint {
        let boundary = point
            .location
            .and_then(|loc| match_location(&self.boundaries.snapshot(), loc.lat, loc.lon));
        AttributedPoint { point, boundary }
    }
}
