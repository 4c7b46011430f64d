//! HTTP client for the Google Geocoding API.

use reqwest::Client;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::provider::{interpret, GeocodeResponse};
use super::{GeocodeError, Resolution};
use crate::config::GeocoderConfig;
use crate::models::RegionProfile;

/// Resolves free-text address queries to coordinates.
///
/// Callers rule out literal coordinate text before calling `resolve`.
pub trait Geocoder {
    /// Fail fast when the geocoder cannot run at all (e.g. no credential)
    fn ensure_configured(&self) -> Result<(), GeocodeError> {
        Ok(())
    }

    fn resolve(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Resolution, GeocodeError>> + Send;
}

/// Google Geocoding API client, restricted to one region
pub struct GoogleGeocoder {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
    region: RegionProfile,
}

impl GoogleGeocoder {
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        region: RegionProfile,
        timeout: Duration,
    ) -> Result<Self, GeocodeError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| GeocodeError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;
        let client = Client::builder()
            .user_agent(concat!("geomatch/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| GeocodeError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            region,
        })
    }

    pub fn from_config(config: &GeocoderConfig, region: RegionProfile) -> Result<Self, GeocodeError> {
        Self::new(
            &config.endpoint,
            config.resolve_api_key(),
            region,
            config.timeout(),
        )
    }

    pub fn region(&self) -> &RegionProfile {
        &self.region
    }

    fn request_url(&self, api_key: &str, query: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("address", &self.region.qualify(query))
            .append_pair("key", api_key)
            .append_pair("region", &self.region.region_bias())
            .append_pair(
                "components",
                &format!("country:{}", self.region.country_code.to_uppercase()),
            );
        url
    }

    async fn fetch(&self, url: Url) -> Result<GeocodeResponse, GeocodeError> {
        let response = self.client.get(url).send().await.map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(GeocodeError::Transport(format!(
                "HTTP {}",
                response.status()
            )));
        }

        response
            .json::<GeocodeResponse>()
            .await
            .map_err(transport_error)
    }
}

impl Geocoder for GoogleGeocoder {
    fn ensure_configured(&self) -> Result<(), GeocodeError> {
        match self.api_key {
            Some(_) => Ok(()),
            None => Err(GeocodeError::MissingCredential),
        }
    }

    async fn resolve(&self, query: &str) -> Result<Resolution, GeocodeError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(GeocodeError::MissingCredential);
        };

        debug!("Geocoding '{}'", query);

        let result = match self.fetch(self.request_url(api_key, query)).await {
            Ok(body) => interpret(body, &self.region, query),
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            warn!("Error geocoding '{}': {}", query, e);
        }

        result
    }
}

fn transport_error(e: reqwest::Error) -> GeocodeError {
    // Keep the URL out of the message, it carries the API key
    let e = e.without_url();
    if e.is_timeout() {
        GeocodeError::Transport("request timed out".to_string())
    } else if e.is_decode() {
        GeocodeError::Transport(format!("malformed response: {}", e))
    } else {
        GeocodeError::Transport(e.to_string())
    }
}
