use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::models::{QueryFields, RegionProfile};

pub const API_KEY_ENV: &str = "GOOGLE_MAPS_API_KEY";
pub const DEFAULT_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub region: RegionProfile,
    pub geocoder: GeocoderConfig,
    pub input: InputConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeocoderConfig {
    pub endpoint: String,
    /// Used only when the environment does not provide a key
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Pause between consecutive records
    pub delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InputConfig {
    pub address_column: String,
    pub name_column: Option<String>,
    pub delimiter: char,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            timeout_secs: 10,
            delay_ms: 100,
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            address_column: "address".to_string(),
            name_column: Some("name".to_string()),
            delimiter: ';',
        }
    }
}

impl GeocoderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Resolve the credential: environment first, then the config file.
    ///
    /// Blank values count as missing.
    pub fn resolve_api_key(&self) -> Option<String> {
        let present = |k: &String| !k.trim().is_empty();
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(present)
            .or_else(|| self.api_key.clone().filter(present))
            .map(|k| k.trim().to_string())
    }
}

impl InputConfig {
    pub fn query_fields(&self) -> QueryFields {
        QueryFields::new(self.address_column.clone(), self.name_column.clone())
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise use defaults
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_file(p),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.region.country_code, "JM");
        assert_eq!(config.geocoder.timeout(), Duration::from_secs(10));
        assert_eq!(config.input.delimiter, ';');
        assert_eq!(config.input.query_fields(), QueryFields::default());
    }

    #[test]
    fn test_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[region]
name = "Trinidad and Tobago"
country_code = "TT"

[geocoder]
delay_ms = 250

[input]
address_column = "location"
delimiter = ","
"#
        )
        .unwrap();

        let config = Config::load_from_file(file.path()).unwrap();
        assert_eq!(config.region.country_code, "TT");
        // Unset bounds fall back to the default profile
        assert_eq!(config.region.min_lat, 17.0);
        assert_eq!(config.geocoder.delay(), Duration::from_millis(250));
        assert_eq!(config.geocoder.timeout_secs, 10);
        assert_eq!(config.input.address_column, "location");
        assert_eq!(config.input.name_column.as_deref(), Some("name"));
        assert_eq!(config.input.delimiter, ',');
    }
}
