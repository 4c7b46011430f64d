//! Sequential batch geocoding over address records.

use indicatif::ProgressBar;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{parse_coordinates, GeocodeError, Geocoder, Pacer, Resolution};
use crate::models::{
    AddressRecord, BatchStats, ConfidenceTag, GeocodeOutcome, GeocodedPoint, Location,
    QueryFields, RegionProfile,
};

/// Points and counters of one batch run
#[derive(Debug, Default)]
pub struct BatchRun {
    /// One point per processed record, in input order
    pub points: Vec<GeocodedPoint>,
    pub stats: BatchStats,
    /// The cancel flag stopped the run early; `points` then holds only the
    /// records processed before the stop
    pub cancelled: bool,
}

/// Drives coordinate detection and provider lookups over a batch of records.
///
/// Records are processed one at a time in input order. The pacer runs
/// between records that were not skipped, never after the last one.
pub struct BatchGeocoder<G, P> {
    geocoder: G,
    pacer: P,
    region: RegionProfile,
    progress: Option<ProgressBar>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<G: Geocoder, P: Pacer> BatchGeocoder<G, P> {
    pub fn new(geocoder: G, pacer: P, region: RegionProfile) -> Self {
        Self {
            geocoder,
            pacer,
            region,
            progress: None,
            cancel: None,
        }
    }

    /// Report per-record progress on `pb`
    pub fn with_progress(mut self, pb: ProgressBar) -> Self {
        self.progress = Some(pb);
        self
    }

    /// Stop between records once `flag` is set
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn geocoder(&self) -> &G {
        &self.geocoder
    }

    pub fn region(&self) -> &RegionProfile {
        &self.region
    }

    /// Geocode every record, returning one point per record in input order.
    ///
    /// Per-record failures are tallied in the stats and configuration errors
    /// abort the whole batch. Cancellation stops between records and keeps
    /// what was already resolved.
    pub async fn run(
        &self,
        records: Vec<AddressRecord>,
        fields: &QueryFields,
    ) -> Result<BatchRun, GeocodeError> {
        self.geocoder.ensure_configured()?;

        let total = records.len();
        let mut points = Vec::with_capacity(total);
        let mut stats = BatchStats::default();
        let mut cancelled = false;

        info!("Geocoding {} addresses...", total);

        for (idx, record) in records.into_iter().enumerate() {
            if self.is_cancelled() {
                warn!("Batch cancelled after {} of {} records", idx, total);
                cancelled = true;
                break;
            }

            let point = self.geocode_record(record, fields).await?;
            log_point(idx + 1, total, &point);
            stats.record(&point.outcome);

            let paced = point.outcome != GeocodeOutcome::Skipped;
            points.push(point);

            if let Some(pb) = &self.progress {
                pb.inc(1);
            }

            if paced && idx + 1 < total {
                self.pacer.pause().await;
            }
        }

        if let Some(pb) = &self.progress {
            if cancelled {
                pb.abandon_with_message("Geocoding interrupted");
            } else {
                pb.finish_with_message("Geocoding complete");
            }
        }

        info!(
            "Geocoded {} records: {} successful, {} failed ({} not found, {} errors), {} skipped",
            stats.total, stats.successful, stats.failed, stats.not_found, stats.errors, stats.skipped
        );

        Ok(BatchRun {
            points,
            stats,
            cancelled,
        })
    }

    /// Geocode a single record without pacing.
    ///
    /// Only a fatal error is returned as `Err`; every other outcome is
    /// captured on the point.
    pub async fn geocode_record(
        &self,
        record: AddressRecord,
        fields: &QueryFields,
    ) -> Result<GeocodedPoint, GeocodeError> {
        let Some(query) = fields.compose(&record) else {
            return Ok(GeocodedPoint::unlocated(record, GeocodeOutcome::Skipped));
        };

        let literal = record
            .non_empty(&fields.address)
            .and_then(|a| parse_coordinates(a, &self.region))
            .or_else(|| parse_coordinates(&query, &self.region));

        if let Some((lat, lon)) = literal {
            let location = Location::new(lat, lon, ConfidenceTag::Coordinates);
            return Ok(GeocodedPoint::located(
                record,
                location,
                GeocodeOutcome::Coordinates,
            ));
        }

        match self.geocoder.resolve(&query).await {
            Ok(Resolution::Found(geocode)) => Ok(GeocodedPoint::located(
                record,
                geocode.into(),
                GeocodeOutcome::Geocoded,
            )),
            Ok(Resolution::NotFound) => {
                Ok(GeocodedPoint::unlocated(record, GeocodeOutcome::NotFound))
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => Ok(GeocodedPoint::unlocated(
                record,
                GeocodeOutcome::Error(e.to_string()),
            )),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|f| f.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}

fn log_point(row: usize, total: usize, point: &GeocodedPoint) {
    match (&point.location, &point.outcome) {
        (Some(loc), _) => debug!(
            "[{}/{}] → {:.6}, {:.6} ({})",
            row, total, loc.lat, loc.lon, loc.confidence
        ),
        (None, GeocodeOutcome::Skipped) => debug!("[{}/{}] (empty address - skipped)", row, total),
        (None, GeocodeOutcome::Error(e)) => debug!("[{}/{}] → error: {}", row, total, e),
        (None, _) => debug!("[{}/{}] → failed to geocode", row, total),
    }
}
