//! Shared, swappable handle to the published boundary index.

use std::sync::{Arc, RwLock};
use tracing::info;

use super::{match_location, BoundaryIndex};
use crate::models::BoundaryMatch;

/// Process-wide handle to the current boundary index.
///
/// Readers take an `Arc` snapshot and keep using it even if a reload swaps
/// in a new index meanwhile. The index itself is never mutated.
#[derive(Clone)]
pub struct BoundaryHandle {
    current: Arc<RwLock<Arc<BoundaryIndex>>>,
}

impl BoundaryHandle {
    pub fn new(index: BoundaryIndex) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(index))),
        }
    }

    /// The index published right now
    pub fn snapshot(&self) -> Arc<BoundaryIndex> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Publish a new index, returning the previous one
    pub fn replace(&self, index: BoundaryIndex) -> Arc<BoundaryIndex> {
        let next = Arc::new(index);
        info!("Publishing boundary index with {} entries", next.len());
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, next)
    }

    /// Match one coordinate against the current index
    pub fn lookup(&self, lat: f64, lon: f64) -> Option<BoundaryMatch> {
        match_location(&self.snapshot(), lat, lon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pip::boundary::tests::{collection, square_feature};
    use crate::pip::BoundarySet;

    fn index(name: &str) -> BoundaryIndex {
        BoundaryIndex::build(
            BoundarySet::from_geojson_str(&collection(vec![square_feature(
                name, -77.0, 18.0, 0.5,
            )]))
            .unwrap(),
        )
    }

    #[test]
    fn test_swap_keeps_old_snapshot() {
        let handle = BoundaryHandle::new(index("Old"));
        let before = handle.snapshot();

        let previous = handle.replace(index("New"));
        assert!(Arc::ptr_eq(&before, &previous));

        let old = match_location(&before, 18.2, -76.8).unwrap();
        assert_eq!(old.boundary.attributes["ADM1_EN"], "Old");

        let new = handle.lookup(18.2, -76.8).unwrap();
        assert_eq!(new.boundary.attributes["ADM1_EN"], "New");
    }

    #[test]
    fn test_empty_handle() {
        let handle = BoundaryHandle::new(BoundaryIndex::build(BoundarySet::empty()));
        assert!(handle.lookup(18.2, -76.8).is_none());
    }
}
