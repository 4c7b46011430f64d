//! Query server for geocoding and boundary lookups.
//!
//! Provides an HTTP API for single-address geocoding, reverse boundary
//! lookup and hot reload of the boundary set.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use geomatch::config::Config;
use geomatch::geocode::{BatchGeocoder, FixedDelay, GeocodeError, GoogleGeocoder};
use geomatch::pip::{BoundaryHandle, BoundaryIndex, BoundarySet};
use geomatch::pipeline::SingleResult;
use geomatch::{Pipeline, PipelineError};

#[derive(Parser, Debug)]
#[command(name = "query")]
#[command(about = "Geocoding and boundary lookup server")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:5001", env = "LISTEN_ADDR")]
    listen: String,

    /// Boundary polygons (GeoJSON FeatureCollection)
    #[arg(long, default_value = "odpem.geojson", env = "BOUNDARIES_FILE")]
    boundaries: PathBuf,

    /// TOML configuration file
    #[arg(short, long, env = "GEOMATCH_CONFIG")]
    config: Option<PathBuf>,
}

/// Application state shared across handlers
struct AppState {
    pipeline: Pipeline<GoogleGeocoder, FixedDelay>,
    boundaries_path: PathBuf,
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
    let config = Config::load_or_default(args.config.as_ref())?;

    info!("Geomatch Query Server");

    let geocoder = GoogleGeocoder::from_config(&config.geocoder, config.region.clone())?;
    if config.geocoder.resolve_api_key().is_none() {
        warn!("GOOGLE_MAPS_API_KEY is not set; only coordinate lookups will succeed");
    }

    // A missing boundary file is not fatal; the server starts empty and
    // /v1/reload can publish the set later
    let index = match load_index(&args.boundaries) {
        Ok(index) => index,
        Err(e) => {
            warn!("{:#}", e);
            BoundaryIndex::build(BoundarySet::empty())
        }
    };

    let batch = BatchGeocoder::new(
        geocoder,
        FixedDelay::new(config.geocoder.delay()),
        config.region.clone(),
    );
    let pipeline = Pipeline::new(
        batch,
        BoundaryHandle::new(index),
        config.input.query_fields(),
    );

    let state = Arc::new(AppState {
        pipeline,
        boundaries_path: args.boundaries.clone(),
    });

    // Build router
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/v1/geocode", get(geocode_handler))
        .route("/v1/reverse", get(reverse_handler))
        .route("/v1/reload", post(reload_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("Starting server on {}", args.listen);

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn load_index(path: &Path) -> Result<BoundaryIndex> {
    info!("Loading boundaries from {}...", path.display());
    let set = BoundarySet::load(path)
        .with_context(|| format!("Failed to load boundaries {}", path.display()))?;
    info!("Loaded {} boundary features", set.len());
    Ok(BoundaryIndex::build(set))
}

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn pipeline_error(e: PipelineError) -> ApiError {
    let status = match &e {
        PipelineError::MissingColumn { .. } | PipelineError::InvalidCoordinate { .. } => {
            StatusCode::BAD_REQUEST
        }
        PipelineError::Geocode(GeocodeError::MissingCredential)
        | PipelineError::Geocode(GeocodeError::InvalidEndpoint(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        PipelineError::Geocode(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("Request failed: {}", e);
    }
    api_error(status, e.to_string())
}

/// Health check endpoint
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let count = state.pipeline.boundaries().snapshot().len();

    Json(HealthResponse {
        status: "ok",
        boundaries_loaded: count > 0,
        boundary_count: count,
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    boundaries_loaded: bool,
    boundary_count: usize,
}

/// Geocode one address or coordinate text
async fn geocode_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GeocodeQueryParams>,
) -> Result<Json<SingleResult>, ApiError> {
    if params.text.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "text must not be empty"));
    }

    let result = state
        .pipeline
        .geocode_one(&params.text)
        .await
        .map_err(pipeline_error)?;

    Ok(Json(result))
}

/// Boundary attributes for a coordinate
async fn reverse_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReverseQueryParams>,
) -> Result<Json<SingleResult>, ApiError> {
    let result = state
        .pipeline
        .reverse(params.point_lat, params.point_lon)
        .map_err(pipeline_error)?;

    if result.boundary_match.is_none() {
        return Err(api_error(StatusCode::NOT_FOUND, "no boundaries loaded"));
    }
    Ok(Json(result))
}

/// Re-read the boundary file and publish the new index
async fn reload_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReloadResponse>, ApiError> {
    let path = state.boundaries_path.clone();
    let index = tokio::task::spawn_blocking(move || load_index(&path))
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(|e| {
            error!("Boundary reload failed: {:#}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
        })?;

    let count = index.len();
    let previous = state.pipeline.boundaries().replace(index);

    Ok(Json(ReloadResponse {
        boundary_count: count,
        previous_count: previous.len(),
    }))
}

#[derive(Deserialize)]
struct GeocodeQueryParams {
    /// Address or "lat, lon" text
    text: String,
}

#[derive(Deserialize)]
struct ReverseQueryParams {
    /// Point longitude
    #[serde(rename = "point.lon")]
    point_lon: f64,
    /// Point latitude
    #[serde(rename = "point.lat")]
    point_lat: f64,
}

#[derive(Serialize)]
struct ReloadResponse {
    boundary_count: usize,
    previous_count: usize,
}
