//! Address record loading from delimited text files.

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::path::Path;
use tracing::{info, warn};

use crate::models::{AddressRecord, RecordSet};

/// Options for reading an address file
#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub delimiter: u8,
    pub address_column: String,
    /// Keep only the first N records
    pub limit: Option<usize>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            delimiter: b';',
            address_column: "address".to_string(),
            limit: None,
        }
    }
}

/// Read address records from `path`
pub fn read_records(path: &Path, options: &ReadOptions) -> Result<RecordSet> {
    info!("Reading addresses from {}...", path.display());
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read address file {}", path.display()))?;
    parse_records(&content, options)
}

/// Parse address records from text.
///
/// Delimited text with a header row is preferred. A file with a single
/// column that is not named like the address column is taken to be a bare
/// address list, and text that does not parse as delimited rows (addresses
/// containing the delimiter, ragged rows) falls back to one address per
/// line.
pub fn parse_records(content: &str, options: &ReadOptions) -> Result<RecordSet> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut set = match parse_delimited(content, options.delimiter) {
        Ok(mut set) => {
            info!("Found {} rows (preserved columns)", set.len());
            if !set.has_column(&options.address_column) && set.headers.len() == 1 {
                set = single_column(content, &options.address_column);
            }
            set
        }
        Err(e) => {
            warn!("Could not parse delimited rows ({}), reading one address per line", e);
            let set = single_column(content, &options.address_column);
            info!("Found {} addresses (single-column fallback)", set.len());
            set
        }
    };

    if !set.has_column(&options.address_column) {
        warn!(
            "Column '{}' not found; available columns: {}",
            options.address_column,
            set.headers.join(", ")
        );
    }

    if let Some(limit) = options.limit.filter(|l| *l > 0) {
        set.truncate(limit);
        info!("Limiting to first {} addresses", set.len());
    }

    Ok(set)
}

fn parse_delimited(content: &str, delimiter: u8) -> Result<RecordSet> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        records.push(AddressRecord::from_row(
            headers.iter().map(String::as_str),
            row.iter(),
        ));
    }

    Ok(RecordSet::new(headers, records))
}

/// One address per non-empty line; a first line equal to the column name is
/// treated as the header.
fn single_column(content: &str, address_column: &str) -> RecordSet {
    let mut lines = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .peekable();

    if lines
        .peek()
        .is_some_and(|l| l.eq_ignore_ascii_case(address_column))
    {
        lines.next();
    }

    let records = lines
        .map(|l| AddressRecord::new(vec![(address_column.to_string(), l.to_string())]))
        .collect();

    RecordSet::new(vec![address_column.to_string()], records)
}
