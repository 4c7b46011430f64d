//! Spatial index for boundary lookups.

use geo::{Contains, Distance, Euclidean, Point};
use rstar::{Envelope, PointDistance, RTree, RTreeObject, AABB};
use std::sync::Arc;
use tracing::info;

use super::{Boundary, BoundarySet, Crs};

/// Wrapper for R-tree indexing of boundaries
#[derive(Clone)]
struct IndexedBoundary {
    ordinal: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedBoundary {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl PointDistance for IndexedBoundary {
    /// Squared distance to the envelope, a lower bound for the polygon
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        self.envelope.distance_2(point)
    }
}

/// Boundary set plus an R-tree over the boundary envelopes.
///
/// Coordinates are (lon, lat) in the set's CRS, which is the points' CRS.
pub struct BoundaryIndex {
    set: Arc<BoundarySet>,
    tree: RTree<IndexedBoundary>,
}

impl BoundaryIndex {
    /// Index `set` for WGS84 points, reprojecting the boundaries if needed
    pub fn build(set: BoundarySet) -> Self {
        Self::build_for(set, Crs::Wgs84)
    }

    /// Index `set` for points in `points_crs`.
    ///
    /// The boundaries are reprojected once here; points never are.
    pub fn build_for(set: BoundarySet, points_crs: Crs) -> Self {
        let set = if set.crs() == points_crs {
            set
        } else {
            set.to_crs(points_crs)
        };

        info!("Building spatial index for {} boundaries...", set.len());

        let entries: Vec<IndexedBoundary> = set
            .iter()
            .filter_map(|b| {
                let (min_x, min_y, max_x, max_y) = b.bbox()?;
                Some(IndexedBoundary {
                    ordinal: b.ordinal,
                    envelope: AABB::from_corners([min_x, min_y], [max_x, max_y]),
                })
            })
            .collect();

        let tree = RTree::bulk_load(entries);

        info!("Spatial index built with {} entries", tree.size());

        Self {
            set: Arc::new(set),
            tree,
        }
    }

    pub fn boundaries(&self) -> &BoundarySet {
        &self.set
    }

    /// First boundary (lowest ordinal) whose polygon contains the point
    pub fn containing(&self, lon: f64, lat: f64) -> Option<&Arc<Boundary>> {
        let point = Point::new(lon, lat);
        let query_envelope = AABB::from_point([lon, lat]);

        // R-tree candidates by envelope, then exact containment
        self.tree
            .locate_in_envelope_intersecting(&query_envelope)
            .filter_map(|ib| self.set.get(ib.ordinal))
            .filter(|b| b.geometry.contains(&point))
            .min_by_key(|b| b.ordinal)
    }

    /// Boundary with the smallest planar distance to the point.
    ///
    /// The R-tree yields candidates in increasing envelope distance, which
    /// bounds the true distance from below, so the walk stops once no
    /// remaining envelope can beat the best match. Exact ties go to the
    /// lowest ordinal whatever order the tree yields them in.
    pub fn nearest(&self, lon: f64, lat: f64) -> Option<(&Arc<Boundary>, f64)> {
        let point = Point::new(lon, lat);

        let mut best: Option<(&Arc<Boundary>, f64)> = None;
        for (ib, envelope_distance_2) in self.tree.nearest_neighbor_iter_with_distance_2(&[lon, lat]) {
            if let Some((_, best_distance)) = best {
                if envelope_distance_2.sqrt() > best_distance {
                    break;
                }
            }

            let Some(boundary) = self.set.get(ib.ordinal) else {
                continue;
            };
            let distance = distance_to(&point, boundary);

            let better = match best {
                None => true,
                Some((current, best_distance)) => {
                    distance < best_distance
                        || (distance == best_distance && boundary.ordinal < current.ordinal)
                }
            };
            if better {
                best = Some((boundary, distance));
            }
        }

        best
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

fn distance_to(point: &Point<f64>, boundary: &Boundary) -> f64 {
    boundary
        .geometry
        .iter()
        .map(|polygon| Euclidean.distance(point, polygon))
        .fold(f64::INFINITY, f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pip::boundary::tests::{collection, square_feature};

    fn index(features: Vec<serde_json::Value>) -> BoundaryIndex {
        BoundaryIndex::build(BoundarySet::from_geojson_str(&collection(features)).unwrap())
    }

    fn name(b: &Boundary) -> &str {
        b.attributes["ADM1_EN"].as_str().unwrap()
    }

    #[test]
    fn test_containing() {
        let idx = index(vec![
            square_feature("A", -77.0, 18.0, 0.5),
            square_feature("B", -76.5, 18.0, 0.5),
        ]);
        assert_eq!(idx.len(), 2);
        assert_eq!(name(idx.containing(-76.75, 18.25).unwrap()), "A");
        assert_eq!(name(idx.containing(-76.25, 18.25).unwrap()), "B");
        assert!(idx.containing(-78.0, 18.25).is_none());
    }

    #[test]
    fn test_overlap_first_wins() {
        let idx = index(vec![
            square_feature("Outer", -77.0, 18.0, 1.0),
            square_feature("Inner", -76.8, 18.2, 0.2),
        ]);
        assert_eq!(name(idx.containing(-76.7, 18.3).unwrap()), "Outer");
    }

    #[test]
    fn test_nearest() {
        let idx = index(vec![
            square_feature("A", -77.0, 18.0, 0.5),
            square_feature("B", -76.0, 18.0, 0.5),
        ]);
        // 0.1 west of A
        let (b, d) = idx.nearest(-77.1, 18.25).unwrap();
        assert_eq!(name(b), "A");
        assert!((d - 0.1).abs() < 1e-9);

        // 0.2 east of B
        let (b, d) = idx.nearest(-75.3, 18.25).unwrap();
        assert_eq!(name(b), "B");
        assert!((d - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_nearest_tie_goes_to_lowest_ordinal() {
        // Point exactly halfway between the two squares
        let idx = index(vec![
            square_feature("West", -77.0, 18.0, 0.5),
            square_feature("East", -76.0, 18.0, 0.5),
        ]);
        let (b, _) = idx.nearest(-76.25, 18.25).unwrap();
        assert_eq!(name(b), "West");

        let idx = index(vec![
            square_feature("East", -76.0, 18.0, 0.5),
            square_feature("West", -77.0, 18.0, 0.5),
        ]);
        let (b, _) = idx.nearest(-76.25, 18.25).unwrap();
        assert_eq!(name(b), "East");
    }

    #[test]
    fn test_nearest_prefers_polygon_over_closer_envelope() {
        // L-shaped boundary whose envelope covers the query point but whose
        // polygon is farther away than the small square
        let l_shape = serde_json::json!({
            "type": "Feature",
            "properties": { "ADM1_EN": "L", "ADM1_PCODE": "JM-L" },
            "geometry": {
                "type": "Polygon",
                "coordinates": [[
                    [-78.0, 17.0], [-76.0, 17.0], [-76.0, 17.1], [-77.9, 17.1],
                    [-77.9, 19.0], [-78.0, 19.0], [-78.0, 17.0]
                ]]
            }
        });
        let idx = index(vec![l_shape, square_feature("S", -77.0, 18.6, 0.1)]);
        let (b, d) = idx.nearest(-77.0, 18.5).unwrap();
        assert_eq!(name(b), "S");
        assert!((d - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_nearest_agrees_with_exhaustive_scan() {
        let mut features = Vec::new();
        for i in 0..6 {
            for j in 0..4 {
                let label = format!("{}-{}", i, j);
                features.push(square_feature(
                    &label,
                    -78.5 + 0.45 * i as f64,
                    17.2 + 0.4 * j as f64,
                    0.15,
                ));
            }
        }
        let idx = index(features);

        for (lon, lat) in [(-79.2, 18.0), (-77.31, 17.95), (-75.9, 19.3), (-76.6, 16.5)] {
            let point = Point::new(lon, lat);
            let expected = idx
                .boundaries()
                .iter()
                .map(|b| (b.ordinal, distance_to(&point, b)))
                .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
                .unwrap();

            let (b, d) = idx.nearest(lon, lat).unwrap();
            assert_eq!(b.ordinal, expected.0, "query ({}, {})", lon, lat);
            assert!((d - expected.1).abs() < 1e-12);
        }
    }

    #[test]
    fn test_empty_index() {
        let idx = BoundaryIndex::build(BoundarySet::empty());
        assert!(idx.is_empty());
        assert!(idx.containing(-77.0, 18.0).is_none());
        assert!(idx.nearest(-77.0, 18.0).is_none());
    }
}
