//! Batch geocoder.
//!
//! Reads an address file, geocodes each record, attributes the located
//! records to administrative boundaries and writes the enriched table.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use geomatch::config::Config;
use geomatch::geocode::{BatchGeocoder, FixedDelay, Geocoder, GoogleGeocoder};
use geomatch::io::{read_records, write_output, ReadOptions};
use geomatch::models::QueryFields;
use geomatch::pip::{BoundaryHandle, BoundaryIndex, BoundarySet};
use geomatch::Pipeline;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "geocode")]
#[command(about = "Geocode an address file and attribute records to boundaries")]
struct Args {
    /// Address file (delimited, or one address per line)
    addresses: PathBuf,

    /// Boundary polygons (GeoJSON FeatureCollection)
    boundaries: PathBuf,

    /// Output file; defaults to <addresses>_geocoded.csv
    output: Option<PathBuf>,

    /// Process only the first N records
    #[arg(long)]
    limit: Option<usize>,

    /// Pause between provider requests, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// TOML configuration file
    #[arg(short, long, env = "GEOMATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Column holding the address text
    #[arg(long)]
    address_column: Option<String>,

    /// Column holding a place name prepended to the address ("" to disable)
    #[arg(long)]
    name_column: Option<String>,

    /// Write GeoJSON instead of delimited text
    #[arg(long)]
    geojson: bool,
}

impl Args {
    fn default_output(&self) -> PathBuf {
        let stem = self
            .addresses
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("addresses");
        let ext = if self.geojson { "geojson" } else { "csv" };
        self.addresses
            .with_file_name(format!("{}_geocoded.{}", stem, ext))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = Config::load_or_default(args.config.as_ref())?;
    if let Some(delay) = args.delay_ms {
        config.geocoder.delay_ms = delay;
    }
    if let Some(column) = &args.address_column {
        config.input.address_column = column.clone();
    }
    if let Some(column) = &args.name_column {
        config.input.name_column = Some(column.clone()).filter(|c| !c.is_empty());
    }

    info!("Geomatch Batch Geocoder");
    info!("Region: {} ({})", config.region.name, config.region.country_code);

    let geocoder = GoogleGeocoder::from_config(&config.geocoder, config.region.clone())?;
    geocoder
        .ensure_configured()
        .context("Set GOOGLE_MAPS_API_KEY in the environment or a .env file")?;

    let delimiter = u8::try_from(config.input.delimiter)
        .context("Input delimiter must be a single-byte character")?;
    let records = read_records(
        &args.addresses,
        &ReadOptions {
            delimiter,
            address_column: config.input.address_column.clone(),
            limit: args.limit,
        },
    )?;

    info!("Loading boundaries from {}...", args.boundaries.display());
    let set = BoundarySet::load(&args.boundaries)
        .with_context(|| format!("Failed to load boundaries {}", args.boundaries.display()))?;
    info!("Loaded {} boundaries ({:?})", set.len(), set.crs());
    let handle = BoundaryHandle::new(BoundaryIndex::build(set));

    let pb = ProgressBar::new(records.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping after the current record");
                cancel.store(true, Ordering::SeqCst);
            }
        });
    }

    let fields: QueryFields = config.input.query_fields();
    let batch = BatchGeocoder::new(
        geocoder,
        FixedDelay::new(config.geocoder.delay()),
        config.region.clone(),
    )
    .with_progress(pb.clone())
    .with_cancel_flag(cancel);
    let pipeline = Pipeline::new(batch, handle, fields);

    info!(
        "Geocoding {} records (delay {} ms)...",
        records.len(),
        config.geocoder.delay_ms
    );
    let total = records.len();
    let output = pipeline.run(records).await?;
    if output.cancelled {
        warn!(
            "Interrupted: writing the {} of {} records processed so far",
            output.points.len(),
            total
        );
    }

    let stats = &output.stats;
    info!(
        "Geocoded {}/{} ({} not found, {} errors, {} skipped)",
        stats.successful, stats.total, stats.not_found, stats.errors, stats.skipped
    );
    info!("Matched to boundaries: {}/{}", output.matched(), stats.total);

    let path = args.output.clone().unwrap_or_else(|| args.default_output());
    write_output(&path, &output, args.geojson, delimiter)?;

    Ok(())
}
