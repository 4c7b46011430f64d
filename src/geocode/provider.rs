//! Google Geocoding API response handling.
//!
//! Turns a decoded response body into a [`Resolution`], applying the
//! candidate acceptance checks for the target region.

use serde::Deserialize;
use tracing::debug;

use super::{Geocode, GeocodeError, Resolution};
use crate::models::{ConfidenceTag, RegionProfile};

/// Component types specific enough to trust a candidate
const SPECIFIC_COMPONENT_TYPES: &[&str] = &[
    "locality",
    "administrative_area_level_1",
    "administrative_area_level_2",
    "postal_code",
    "route",
    "street_address",
    "premise",
];

#[derive(Debug, Deserialize)]
pub struct GeocodeResponse {
    pub status: String,
    #[serde(default)]
    pub results: Vec<GeocodeResult>,
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GeocodeResult {
    pub geometry: ResultGeometry,
    #[serde(default)]
    pub address_components: Vec<AddressComponent>,
    pub formatted_address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResultGeometry {
    pub location: LatLng,
    pub location_type: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Deserialize)]
pub struct AddressComponent {
    #[serde(default)]
    pub long_name: String,
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub types: Vec<String>,
}

impl AddressComponent {
    fn has_type(&self, t: &str) -> bool {
        self.types.iter().any(|x| x == t)
    }
}

/// Why a candidate was turned down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Country component missing or not the target country
    OutsideCountry,
    /// Only a country-level match
    NotSpecific,
    /// Coordinates outside the region bounding box
    OutsideBounds,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::OutsideCountry => write!(f, "result outside target country"),
            Rejection::NotSpecific => write!(f, "result lacks specific location details"),
            Rejection::OutsideBounds => write!(f, "coordinates outside region bounds"),
        }
    }
}

/// Check a candidate against the region before accepting it
pub fn validate(candidate: &GeocodeResult, region: &RegionProfile) -> Result<Geocode, Rejection> {
    let components = &candidate.address_components;

    let in_country = components
        .iter()
        .any(|c| c.has_type("country") && c.short_name.eq_ignore_ascii_case(&region.country_code));
    if !in_country {
        return Err(Rejection::OutsideCountry);
    }

    let specific = components
        .iter()
        .any(|c| SPECIFIC_COMPONENT_TYPES.iter().any(|t| c.has_type(t)));
    if !specific {
        return Err(Rejection::NotSpecific);
    }

    let LatLng { lat, lng } = candidate.geometry.location;
    if !region.contains(lat, lng) {
        return Err(Rejection::OutsideBounds);
    }

    Ok(Geocode {
        lat,
        lon: lng,
        confidence: ConfidenceTag::from_provider(candidate.geometry.location_type.as_deref()),
    })
}

/// Interpret a provider response for `query`
pub fn interpret(
    response: GeocodeResponse,
    region: &RegionProfile,
    query: &str,
) -> Result<Resolution, GeocodeError> {
    let GeocodeResponse {
        status,
        results,
        error_message,
    } = response;

    match status.as_str() {
        "OK" => {
            let Some(candidate) = results.first() else {
                return Ok(Resolution::NotFound);
            };
            match validate(candidate, region) {
                Ok(geocode) => Ok(Resolution::Found(geocode)),
                Err(rejection) => {
                    debug!(
                        "Rejected candidate {:?} for '{}': {}",
                        candidate.formatted_address, query, rejection
                    );
                    Ok(Resolution::NotFound)
                }
            }
        }
        "ZERO_RESULTS" => Ok(Resolution::NotFound),
        _ => Err(GeocodeError::Provider {
            status: status.clone(),
            message: error_message,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: serde_json::Value) -> GeocodeResponse {
        serde_json::from_value(json).unwrap()
    }

    fn ok_body(lat: f64, lng: f64, country: &str, extra_type: &str) -> serde_json::Value {
        serde_json::json!({
            "status": "OK",
            "results": [{
                "formatted_address": "Hope Rd, Kingston, Jamaica",
                "geometry": {
                    "location": { "lat": lat, "lng": lng },
                    "location_type": "ROOFTOP"
                },
                "address_components": [
                    { "long_name": "Hope Road", "short_name": "Hope Rd", "types": [extra_type] },
                    { "long_name": "Jamaica", "short_name": country, "types": ["country", "political"] }
                ]
            }]
        })
    }

    #[test]
    fn test_accepts_valid_candidate() {
        let region = RegionProfile::default();
        let res = interpret(response(ok_body(18.02, -76.78, "JM", "route")), &region, "q").unwrap();
        assert_eq!(
            res,
            Resolution::Found(Geocode {
                lat: 18.02,
                lon: -76.78,
                confidence: ConfidenceTag::Rooftop,
            })
        );
    }

    #[test]
    fn test_zero_results_is_not_found() {
        let region = RegionProfile::default();
        let res = interpret(
            response(serde_json::json!({ "status": "ZERO_RESULTS", "results": [] })),
            &region,
            "q",
        )
        .unwrap();
        assert_eq!(res, Resolution::NotFound);
    }

    #[test]
    fn test_ok_without_results_is_not_found() {
        let region = RegionProfile::default();
        let res = interpret(response(serde_json::json!({ "status": "OK" })), &region, "q").unwrap();
        assert_eq!(res, Resolution::NotFound);
    }

    #[test]
    fn test_error_status_is_error() {
        let region = RegionProfile::default();
        let err = interpret(
            response(serde_json::json!({
                "status": "REQUEST_DENIED",
                "error_message": "The provided API key is invalid."
            })),
            &region,
            "q",
        )
        .unwrap_err();
        match err {
            GeocodeError::Provider { status, message } => {
                assert_eq!(status, "REQUEST_DENIED");
                assert!(message.unwrap().contains("invalid"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_other_country() {
        let region = RegionProfile::default();
        let res = interpret(response(ok_body(18.02, -76.78, "CU", "route")), &region, "q").unwrap();
        assert_eq!(res, Resolution::NotFound);
    }

    #[test]
    fn test_rejects_country_only_match() {
        let region = RegionProfile::default();
        let body: GeocodeResponse = response(ok_body(18.1, -77.3, "JM", "political"));
        assert_eq!(
            validate(&body.results[0], &region),
            Err(Rejection::NotSpecific)
        );
    }

    #[test]
    fn test_rejects_out_of_bounds() {
        let region = RegionProfile::default();
        let body = response(ok_body(21.5, -77.8, "JM", "locality"));
        assert_eq!(
            validate(&body.results[0], &region),
            Err(Rejection::OutsideBounds)
        );
    }

    #[test]
    fn test_missing_location_type_is_approximate() {
        let region = RegionProfile::default();
        let mut body = ok_body(18.4, -77.9, "JM", "locality");
        body["results"][0]["geometry"]
            .as_object_mut()
            .unwrap()
            .remove("location_type");
        let res = interpret(response(body), &region, "q").unwrap();
        match res {
            Resolution::Found(g) => assert_eq!(g.confidence, ConfidenceTag::Approximate),
            other => panic!("unexpected resolution: {:?}", other),
        }
    }
}
