//! Writers for attributed output: delimited text and GeoJSON.

use anyhow::{Context, Result};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value as GeoJsonValue};
use serde_json::{json, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

use crate::models::{AttributedPoint, MatchMethod};
use crate::pipeline::PipelineOutput;

/// Columns appended after the input columns, before boundary attributes
pub const GEOCODE_COLUMNS: [&str; 5] = [
    "latitude",
    "longitude",
    "geocode_confidence",
    "geocode_status",
    "boundary_match",
];

/// Output names of the boundary attribute columns, aligned with
/// `output.boundary_columns`. A name already taken by an input or geocode
/// column gets a `boundary_` prefix.
fn boundary_headers(output: &PipelineOutput) -> Vec<String> {
    let mut taken: Vec<String> = output
        .columns
        .iter()
        .cloned()
        .chain(GEOCODE_COLUMNS.iter().map(|c| c.to_string()))
        .collect();

    let mut names = Vec::with_capacity(output.boundary_columns.len());
    for column in &output.boundary_columns {
        let name = if taken.contains(column) {
            format!("boundary_{}", column)
        } else {
            column.clone()
        };
        taken.push(name.clone());
        names.push(name);
    }
    names
}

/// Output header layout: input columns, geocode columns, then boundary
/// attribute columns.
pub fn output_headers(output: &PipelineOutput) -> Vec<String> {
    let mut headers: Vec<String> = output.columns.clone();
    headers.extend(GEOCODE_COLUMNS.iter().map(|c| c.to_string()));
    headers.extend(boundary_headers(output));
    headers
}

/// Render an attribute value as a cell
fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn row(output: &PipelineOutput, point: &AttributedPoint) -> Vec<String> {
    let mut row: Vec<String> = output
        .columns
        .iter()
        .map(|c| point.point.record.get(c).unwrap_or_default().to_string())
        .collect();

    let fmt = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
    row.push(fmt(point.point.lat()));
    row.push(fmt(point.point.lon()));
    row.push(
        point
            .point
            .confidence()
            .map(|c| c.as_str().to_string())
            .unwrap_or_default(),
    );
    row.push(point.point.outcome.as_str().to_string());
    row.push(
        point
            .boundary
            .as_ref()
            .map(|m| m.method.as_str().to_string())
            .unwrap_or_default(),
    );

    for column in &output.boundary_columns {
        row.push(cell(point.attribute(column)));
    }
    row
}

/// Write attributed records as delimited text
pub fn write_csv<W: Write>(output: &PipelineOutput, writer: W, delimiter: u8) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);

    wtr.write_record(output_headers(output))?;
    for point in &output.points {
        wtr.write_record(row(output, point))?;
    }
    wtr.flush()?;
    Ok(())
}

fn text_or_null(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |v| Value::String(v.to_string()))
}

/// GeoJSON FeatureCollection with one Point feature per record, in input
/// order. Unlocated records keep their properties with a null geometry.
///
/// Input fields stay text. Boundary attributes keep their JSON types, and
/// nearest matches carry `boundary_distance` in degrees.
pub fn to_geojson(output: &PipelineOutput) -> FeatureCollection {
    let boundary_names = boundary_headers(output);

    let features = output
        .points
        .iter()
        .map(|point| {
            let mut properties = JsonObject::new();
            for column in &output.columns {
                properties.insert(
                    column.clone(),
                    Value::String(point.point.record.get(column).unwrap_or_default().to_string()),
                );
            }

            properties.insert(
                "geocode_confidence".to_string(),
                text_or_null(point.point.confidence().map(|c| c.as_str())),
            );
            properties.insert(
                "geocode_status".to_string(),
                Value::String(point.point.outcome.as_str().to_string()),
            );
            properties.insert(
                "boundary_match".to_string(),
                text_or_null(point.boundary.as_ref().map(|m| m.method.as_str())),
            );
            let distance = match point.boundary.as_ref().map(|m| m.method) {
                Some(MatchMethod::Nearest { distance }) => json!(distance),
                _ => Value::Null,
            };
            properties.insert("boundary_distance".to_string(), distance);

            for (name, column) in boundary_names.iter().zip(&output.boundary_columns) {
                properties.insert(
                    name.clone(),
                    point.attribute(column).cloned().unwrap_or(Value::Null),
                );
            }

            Feature {
                bbox: None,
                geometry: point
                    .point
                    .location
                    .map(|loc| Geometry::new(GeoJsonValue::Point(vec![loc.lon, loc.lat]))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Write output to `path`, as GeoJSON when asked or when the extension says
/// so, otherwise as delimited text.
pub fn write_output(path: &Path, output: &PipelineOutput, geojson: bool, delimiter: u8) -> Result<()> {
    let geojson = geojson
        || path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("geojson") || e.eq_ignore_ascii_case("json"));

    let file = File::create(path)
        .with_context(|| format!("Failed to create output file {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    if geojson {
        serde_json::to_writer_pretty(&mut writer, &to_geojson(output))?;
        writer.flush()?;
    } else {
        write_csv(output, &mut writer, delimiter)?;
    }

    info!("Saved {} records to {}", output.points.len(), path.display());
    Ok(())
}
