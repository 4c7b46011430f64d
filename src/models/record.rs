//! Input address records as read from a record source.

use serde::{Deserialize, Serialize};

/// One input row: an ordered list of (field name, value) pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressRecord {
    fields: Vec<(String, String)>,
}

impl AddressRecord {
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    /// Build a record from header names zipped with row values.
    ///
    /// Missing trailing values are stored as empty strings so every record
    /// carries the full header set.
    pub fn from_row<'a, H, V>(headers: H, values: V) -> Self
    where
        H: IntoIterator<Item = &'a str>,
        V: IntoIterator<Item = &'a str>,
    {
        let mut values = values.into_iter();
        let fields = headers
            .into_iter()
            .map(|h| (h.to_string(), values.next().unwrap_or("").to_string()))
            .collect();
        Self { fields }
    }

    /// Value of a field, if the record has it
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Trimmed, non-empty value of a field
    pub fn non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Ordered records sharing one header list.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    pub headers: Vec<String>,
    pub records: Vec<AddressRecord>,
}

impl RecordSet {
    pub fn new(headers: Vec<String>, records: Vec<AddressRecord>) -> Self {
        Self { headers, records }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    /// Keep only the first `limit` records
    pub fn truncate(&mut self, limit: usize) {
        self.records.truncate(limit);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Which record fields feed the geocoding query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFields {
    /// Field holding the address text (or a literal coordinate pair)
    pub address: String,
    /// Optional contextual field (e.g. a venue name) prepended to the address
    pub context: Option<String>,
}

impl QueryFields {
    pub fn new(address: impl Into<String>, context: Option<String>) -> Self {
        Self {
            address: address.into(),
            context,
        }
    }

    /// Compose the query text for a record: "{context}, {address}".
    ///
    /// Returns `None` when both parts are empty.
    pub fn compose(&self, record: &AddressRecord) -> Option<String> {
        let parts: Vec<&str> = self
            .context
            .as_deref()
            .and_then(|c| record.non_empty(c))
            .into_iter()
            .chain(record.non_empty(&self.address))
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

impl Default for QueryFields {
    fn default() -> Self {
        Self {
            address: "address".to_string(),
            context: Some("name".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> AddressRecord {
        AddressRecord::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_compose_with_name() {
        let fields = QueryFields::default();
        let r = record(&[("name", " Devon House "), ("address", "26 Hope Road")]);
        assert_eq!(
            fields.compose(&r).as_deref(),
            Some("Devon House, 26 Hope Road")
        );
    }

    #[test]
    fn test_compose_address_only() {
        let fields = QueryFields::default();
        let r = record(&[("address", "26 Hope Road"), ("name", "  ")]);
        assert_eq!(fields.compose(&r).as_deref(), Some("26 Hope Road"));
    }

    #[test]
    fn test_compose_empty() {
        let fields = QueryFields::default();
        let r = record(&[("address", ""), ("name", "")]);
        assert_eq!(fields.compose(&r), None);
    }

    #[test]
    fn test_from_row_pads_missing_values() {
        let r = AddressRecord::from_row(["id", "address", "name"], ["1", "Kingston"]);
        assert_eq!(r.get("address"), Some("Kingston"));
        assert_eq!(r.get("name"), Some(""));
        assert_eq!(r.get("missing"), None);
        assert_eq!(r.len(), 3);
    }
}
