//! File adapters: address input and attributed output.

pub mod export;
pub mod records;

pub use export::{to_geojson, write_csv, write_output};
pub use records::{parse_records, read_records, ReadOptions};
