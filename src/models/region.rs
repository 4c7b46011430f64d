//! Target region profile used to bias and validate geocoding results.

use serde::{Deserialize, Serialize};

/// Country/region the pipeline geocodes into.
///
/// The latitude and longitude ranges double as the bounding box that
/// provider results must fall inside, and as the plausibility window for
/// literal coordinate text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionProfile {
    /// Human readable name appended to queries (e.g. "Jamaica")
    pub name: String,
    /// ISO 3166-1 alpha-2 code (e.g. "JM")
    pub country_code: String,
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl RegionProfile {
    pub fn contains_lat(&self, lat: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat)
    }

    pub fn contains_lon(&self, lon: f64) -> bool {
        (self.min_lon..=self.max_lon).contains(&lon)
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        self.contains_lat(lat) && self.contains_lon(lon)
    }

    /// Lowercase code used for the provider's region bias parameter
    pub fn region_bias(&self) -> String {
        self.country_code.to_lowercase()
    }

    /// Append the region name to a query unless it already mentions it
    pub fn qualify(&self, query: &str) -> String {
        let query = query.trim();
        if query.to_lowercase().contains(&self.name.to_lowercase()) {
            query.to_string()
        } else {
            format!("{}, {}", query, self.name)
        }
    }
}

impl Default for RegionProfile {
    /// Jamaica, roughly 17-19°N and 76-79°W
    fn default() -> Self {
        Self {
            name: "Jamaica".to_string(),
            country_code: "JM".to_string(),
            min_lat: 17.0,
            max_lat: 19.0,
            min_lon: -79.0,
            max_lon: -76.0,
        }
    }
}
