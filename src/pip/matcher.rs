//! Attribute points to boundaries: containment first, nearest as fallback.

use std::sync::Arc;
use tracing::{debug, info};

use super::BoundaryIndex;
use crate::models::{AttributedPoint, BoundaryMatch, GeocodedPoint, MatchMethod};

/// Match a single (lat, lon) against the index.
///
/// Returns `None` only when the index holds no boundaries; there is no
/// distance ceiling on the nearest fallback.
pub fn match_location(index: &BoundaryIndex, lat: f64, lon: f64) -> Option<BoundaryMatch> {
    if let Some(boundary) = index.containing(lon, lat) {
        return Some(BoundaryMatch {
            boundary: Arc::clone(boundary),
            method: MatchMethod::Contained,
        });
    }

    index.nearest(lon, lat).map(|(boundary, distance)| {
        debug!(
            "({}, {}) outside all boundaries, nearest is #{} at {:.6}",
            lat, lon, boundary.ordinal, distance
        );
        BoundaryMatch {
            boundary: Arc::clone(boundary),
            method: MatchMethod::Nearest { distance },
        }
    })
}

/// Attribute every point, preserving order and count.
///
/// Points without a location skip all geometric work and stay unmatched.
pub fn match_points(points: Vec<GeocodedPoint>, index: &BoundaryIndex) -> Vec<AttributedPoint> {
    info!("Performing spatial join...");

    let mut contained = 0;
    let mut nearest = 0;

    let attributed: Vec<AttributedPoint> = points
        .into_iter()
        .map(|point| {
            let boundary = point
                .location
                .and_then(|loc| match_location(index, loc.lat, loc.lon));
            match boundary.as_ref().map(|m| m.method) {
                Some(MatchMethod::Contained) => contained += 1,
                Some(MatchMethod::Nearest { .. }) => nearest += 1,
                None => {}
            }
            AttributedPoint { point, boundary }
        })
        .collect();

    if nearest > 0 {
        info!("  {} points outside boundaries, matched to nearest", nearest);
    }
    info!(
        "Matched to boundaries: {}/{}",
        contained + nearest,
        attributed.len()
    );

    attributed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AddressRecord, ConfidenceTag, GeocodeOutcome, Location};
    use crate::pip::boundary::tests::{collection, square_feature};
    use crate::pip::BoundarySet;

    fn index() -> BoundaryIndex {
        BoundaryIndex::build(
            BoundarySet::from_geojson_str(&collection(vec![
                square_feature("Kingston", -76.9, 17.9, 0.2),
                square_feature("St. Andrew", -76.9, 18.1, 0.2),
            ]))
            .unwrap(),
        )
    }

    fn located(lat: f64, lon: f64) -> GeocodedPoint {
        GeocodedPoint::located(
            AddressRecord::default(),
            Location::new(lat, lon, ConfidenceTag::Coordinates),
            GeocodeOutcome::Coordinates,
        )
    }

    fn unlocated() -> GeocodedPoint {
        GeocodedPoint::unlocated(AddressRecord::default(), GeocodeOutcome::NotFound)
    }

    fn names(points: &[AttributedPoint]) -> Vec<Option<String>> {
        points
            .iter()
            .map(|p| {
                p.attribute("ADM1_EN")
                    .and_then(|v| v.as_str())
                    .map(String::from)
            })
            .collect()
    }

    #[test]
    fn test_contained_nearest_and_unlocated() {
        let idx = index();
        let points = vec![
            located(18.0, -76.8),
            unlocated(),
            located(18.2, -76.8),
            located(18.0, -76.5),
        ];

        let out = match_points(points, &idx);
        assert_eq!(out.len(), 4);
        assert_eq!(
            names(&out),
            vec![
                Some("Kingston".to_string()),
                None,
                Some("St. Andrew".to_string()),
                Some("Kingston".to_string()),
            ]
        );
        assert_eq!(
            out[0].boundary.as_ref().unwrap().method,
            MatchMethod::Contained
        );
        assert!(!out[1].is_matched());
        assert!(matches!(
            out[3].boundary.as_ref().unwrap().method,
            MatchMethod::Nearest { distance } if (distance - 0.2).abs() < 1e-9
        ));
    }

    #[test]
    fn test_every_located_point_is_matched() {
        let idx = index();
        let points: Vec<GeocodedPoint> = [(10.0, -100.0), (18.0, -76.8), (60.0, 30.0)]
            .iter()
            .map(|(lat, lon)| located(*lat, *lon))
            .collect();
        let out = match_points(points, &idx);
        assert!(out.iter().all(|p| p.is_matched()));
    }

    #[test]
    fn test_empty_boundary_set() {
        let idx = BoundaryIndex::build(BoundarySet::empty());
        let out = match_points(vec![located(18.0, -76.8), unlocated()], &idx);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|p| !p.is_matched()));
    }

    #[test]
    fn test_idempotent() {
        let idx = index();
        let points = vec![located(18.0, -76.8), located(18.0, -76.5), unlocated()];
        let first = names(&match_points(points.clone(), &idx));
        let second = names(&match_points(points, &idx));
        assert_eq!(first, second);
    }
}
