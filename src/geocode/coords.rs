//! Detection of literal "lat, lon" pairs in address text.

use regex::Regex;
use std::sync::OnceLock;

use crate::models::RegionProfile;

fn pair_regex() -> &'static Regex {
    static PAIR: OnceLock<Regex> = OnceLock::new();
    PAIR.get_or_init(|| {
        Regex::new(r"^(-?\d+(?:\.\d*)?)\s*[,\s]\s*(-?\d+(?:\.\d*)?)$")
            .expect("coordinate pattern is valid")
    })
}

/// Parse a coordinate pair out of `text`.
///
/// Accepts `"18.1234, -77.5678"`, `"18.1234,-77.5678"`, `"18.1234 -77.5678"`
/// and the parenthesised forms. Longitudes given as a bare positive magnitude
/// are read as west of Greenwich, and a pair written as (lon, lat) is
/// swapped back when only the second number is a plausible latitude for the
/// region. Returns `(lat, lon)`.
pub fn parse_coordinates(text: &str, region: &RegionProfile) -> Option<(f64, f64)> {
    let text = text
        .trim()
        .trim_matches(|c: char| c == '(' || c == ')')
        .trim();

    if text.is_empty() {
        return None;
    }

    let caps = pair_regex().captures(text)?;
    let first: f64 = caps.get(1)?.as_str().parse().ok()?;
    let second: f64 = caps.get(2)?.as_str().parse().ok()?;

    if region.contains_lat(first) {
        if let Some(lon) = normalize_lon(second, region) {
            return Some((first, lon));
        }
    }

    if region.contains_lat(second) {
        if let Some(lon) = normalize_lon(first, region) {
            return Some((second, lon));
        }
    }

    None
}

fn normalize_lon(lon: f64, region: &RegionProfile) -> Option<f64> {
    let lon = if lon > 0.0 { -lon } else { lon };
    region.contains_lon(lon).then_some(lon)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Option<(f64, f64)> {
        parse_coordinates(text, &RegionProfile::default())
    }

    #[test]
    fn test_plain_pair() {
        assert_eq!(parse("18.1234, -77.5678"), Some((18.1234, -77.5678)));
        assert_eq!(parse("18.1234,-77.5678"), Some((18.1234, -77.5678)));
        assert_eq!(parse("18.1234 -77.5678"), Some((18.1234, -77.5678)));
        assert_eq!(parse("  (18.1234, -77.5678) "), Some((18.1234, -77.5678)));
        assert_eq!(parse("18, -77"), Some((18.0, -77.0)));
    }

    #[test]
    fn test_positive_longitude_is_west() {
        for (lat, lon) in [(17.0, 76.0), (18.0, 76.8), (18.5, 77.25), (19.0, 79.0)] {
            let text = format!("{}, {}", lat, lon);
            assert_eq!(parse(&text), Some((lat, -lon)), "{}", text);
        }
    }

    #[test]
    fn test_swapped_pair() {
        assert_eq!(parse("76.8, 18.0"), Some((18.0, -76.8)));
        assert_eq!(parse("-77.5, 18.25"), Some((18.25, -77.5)));
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert_eq!(parse("100, -200"), None);
        assert_eq!(parse("18.0, -80.5"), None);
        assert_eq!(parse("18, 18"), None);
    }

    #[test]
    fn test_rejects_non_coordinates() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("   "), None);
        assert_eq!(parse("not a coordinate"), None);
        assert_eq!(parse("18.0, -76.8, 12"), None);
        assert_eq!(parse("12 Hope Road 18.0 -76.8"), None);
        assert_eq!(parse("18.0;-76.8"), None);
    }

    #[test]
    fn test_idempotent() {
        let text = "(18.00, 76.80)";
        assert_eq!(parse(text), parse(text));
        assert_eq!(parse(text), Some((18.0, -76.8)));
    }
}
