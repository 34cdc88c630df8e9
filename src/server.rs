use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::Method;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use chrono_tz::Tz;
use serde_json::{json, Value as JsonValue};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::refine::{refine_all, RefineConfig, RefineInputs};
use crate::session::{PlantInfo, Session, SessionStore};
use crate::table::Table;

/// Upload bodies can carry years of 10-minute SCADA data.
const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

/// File field names accepted by the upload endpoint, in processing order.
const DATASET_FIELDS: &[&str] = &[
    "scada",
    "meter",
    "curtail",
    "asset",
    "reanalysis_era5",
    "reanalysis_merra2",
];

#[derive(Clone)]
struct AppState {
    store: Arc<dyn SessionStore>,
}

/// Health check endpoint
async fn health(State(state): State<AppState>) -> Result<Json<JsonValue>> {
    let active_sessions = state.store.count().await?;
    Ok(Json(json!({
        "status": "ok",
        "service": "windplant-qa",
        "version": env!("CARGO_PKG_VERSION"),
        "active_sessions": active_sessions,
    })))
}

/// Split a multipart body into text form fields and uploaded CSV bytes.
async fn read_multipart(
    mut multipart: Multipart,
) -> Result<(HashMap<String, String>, HashMap<String, Vec<u8>>)> {
    let mut fields = HashMap::new();
    let mut files = HashMap::new();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if DATASET_FIELDS.contains(&name.as_str()) {
            let bytes = field.bytes().await?;
            if !bytes.is_empty() {
                files.insert(name, bytes.to_vec());
            }
        } else {
            fields.insert(name, field.text().await?);
        }
    }
    Ok((fields, files))
}

fn required_text(fields: &HashMap<String, String>, key: &str) -> Result<String> {
    fields
        .get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::InvalidPlant(format!("missing required field '{key}'")))
}

fn required_f64(fields: &HashMap<String, String>, key: &str) -> Result<f64> {
    let raw = required_text(fields, key)?;
    raw.parse()
        .map_err(|_| ApiError::InvalidPlant(format!("field '{key}' must be a number, got '{raw}'")))
}

fn parse_plant(fields: &HashMap<String, String>) -> Result<(PlantInfo, Tz)> {
    let plant = PlantInfo {
        name: required_text(fields, "name")?,
        latitude: required_f64(fields, "latitude")?,
        longitude: required_f64(fields, "longitude")?,
        capacity_mw: required_f64(fields, "capacity_mw")?,
        local_tz: required_text(fields, "local_tz")?,
        analysis_type: fields
            .get("analysis_type")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()),
    };

    if !(-90.0..=90.0).contains(&plant.latitude) {
        return Err(ApiError::InvalidPlant(format!(
            "latitude {} outside [-90, 90]",
            plant.latitude
        )));
    }
    if !(-180.0..=180.0).contains(&plant.longitude) {
        return Err(ApiError::InvalidPlant(format!(
            "longitude {} outside [-180, 180]",
            plant.longitude
        )));
    }
    if plant.capacity_mw <= 0.0 {
        return Err(ApiError::InvalidPlant(format!(
            "capacity_mw must be positive, got {}",
            plant.capacity_mw
        )));
    }

    let tz = Tz::from_str(&plant.local_tz)
        .map_err(|_| ApiError::UnknownTimezone(plant.local_tz.clone()))?;
    Ok((plant, tz))
}

/// Apply column-name override form fields onto the default refine config.
fn apply_column_overrides(cfg: &mut RefineConfig, fields: &HashMap<String, String>) {
    let overrides: [(&str, &mut String); 14] = [
        ("scada_time_col", &mut cfg.scada.time_col),
        ("scada_id_col", &mut cfg.scada.id_col),
        ("scada_power_col", &mut cfg.scada.power_col),
        ("scada_windspeed_col", &mut cfg.scada.windspeed_col),
        ("scada_temp_col", &mut cfg.scada.temp_col),
        ("meter_time_col", &mut cfg.meter.time_col),
        ("meter_energy_col", &mut cfg.meter.energy_col),
        ("curtail_time_col", &mut cfg.curtail.time_col),
        ("curtail_avail_col", &mut cfg.curtail.avail_col),
        ("curtail_curtail_col", &mut cfg.curtail.curtail_col),
        ("reanalysis_time_col", &mut cfg.reanalysis.time_col),
        ("reanalysis_windspeed_col", &mut cfg.reanalysis.windspeed_col),
        ("reanalysis_winddir_col", &mut cfg.reanalysis.winddir_col),
        ("reanalysis_temp_col", &mut cfg.reanalysis.temp_col),
    ];
    for (key, slot) in overrides {
        if let Some(value) = fields.get(key) {
            let value = value.trim();
            if !value.is_empty() {
                *slot = value.to_string();
            }
        }
    }
}

fn parse_dataset(files: &HashMap<String, Vec<u8>>, key: &str) -> Result<Option<Table>> {
    let Some(bytes) = files.get(key) else {
        return Ok(None);
    };
    let table = Table::from_csv_bytes(bytes).map_err(|e| ApiError::CsvParse {
        dataset: key.to_string(),
        message: e.to_string(),
    })?;
    if table.is_empty() {
        return Err(ApiError::EmptyDataset {
            dataset: key.to_string(),
        });
    }
    Ok(Some(table))
}

/// POST /upload-and-refine: parse CSVs, validate plant metadata, run the QA
/// pipeline, create a session, and return the QA report.
async fn upload_and_refine(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<JsonValue>> {
    let (fields, files) = read_multipart(multipart).await?;

    let (plant, tz) = parse_plant(&fields)?;
    let mut cfg = RefineConfig::default();
    apply_column_overrides(&mut cfg, &fields);

    let scada = parse_dataset(&files, "scada")?
        .ok_or_else(|| ApiError::MissingDataset("scada".to_string()))?;
    let meter = parse_dataset(&files, "meter")?;
    let curtail = parse_dataset(&files, "curtail")?;
    let asset = parse_dataset(&files, "asset")?;
    let mut reanalysis = Vec::new();
    for (field, product) in [("reanalysis_era5", "era5"), ("reanalysis_merra2", "merra2")] {
        if let Some(table) = parse_dataset(&files, field)? {
            reanalysis.push((product.to_string(), table));
        }
    }

    let received = json!({
        "scada": true,
        "meter": meter.is_some(),
        "curtail": curtail.is_some(),
        "asset": asset.is_some(),
        "reanalysis_era5": reanalysis.iter().any(|(name, _)| name == "era5"),
        "reanalysis_merra2": reanalysis.iter().any(|(name, _)| name == "merra2"),
    });

    let inputs = RefineInputs {
        scada,
        meter,
        curtail,
        asset,
        reanalysis,
    };
    let output = refine_all(&inputs, tz, &cfg);
    let qa_report = serde_json::to_value(&output.reports)
        .map_err(|e| ApiError::Config(format!("failed to serialize QA report: {e}")))?;

    let session_id = state
        .store
        .create(Session {
            plant: plant.clone(),
            qa_report: qa_report.clone(),
            reanalysis: output.tables.reanalysis,
            created_at: Utc::now(),
        })
        .await?;
    info!(%session_id, plant = %plant.name, "upload refined");

    Ok(Json(json!({
        "status": "success",
        "session_id": session_id,
        "plant": plant,
        "datasets_received": received,
        "qa_report": qa_report,
    })))
}

/// GET /session/{session_id}: stored metadata and QA report for a session.
async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<JsonValue>> {
    let id = Uuid::from_str(&session_id)
        .map_err(|_| ApiError::SessionNotFound(session_id.clone()))?;
    let session = state
        .store
        .get(id)
        .await?
        .ok_or_else(|| ApiError::SessionNotFound(session_id.clone()))?;

    Ok(Json(json!({
        "session_id": session_id,
        "plant_info": session.plant,
        "qa_report": session.qa_report,
        "reanalysis_products": session.reanalysis.keys().collect::<Vec<_>>(),
        "created_at": session.created_at,
    })))
}

/// Create the HTTP router with all routes and middleware.
pub fn create_router(store: Arc<dyn SessionStore>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/upload-and-refine", post(upload_and_refine))
        .route("/session/:session_id", get(get_session))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(AppState { store })
}

/// Start the HTTP server on the specified bind address and port.
pub async fn start_server(store: Arc<dyn SessionStore>, bind: &str, port: u16) -> Result<()> {
    let app = create_router(store);
    let listener = tokio::net::TcpListener::bind((bind, port)).await?;

    info!("HTTP server running on http://{bind}:{port}");
    info!("Health check: http://{bind}:{port}/health");

    axum::serve(listener, app).await?;
    Ok(())
}
