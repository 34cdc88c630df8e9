use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

/// Failures raised by individual QA steps inside a dataset refiner.
///
/// These are always caught at the refiner level and degraded into QA report
/// entries; they never abort the rest of the pipeline.
#[derive(Error, Debug)]
pub enum QaError {
    #[error("datetime conversion failed: {0}")]
    Conversion(String),

    #[error("{0}")]
    Check(String),
}

/// Errors surfaced to HTTP clients or the CLI.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("[{dataset}] cannot parse CSV: {message}")]
    CsvParse { dataset: String, message: String },

    #[error("[{dataset}] uploaded CSV is completely empty (0 rows)")]
    EmptyDataset { dataset: String },

    #[error("missing required dataset: {0}")]
    MissingDataset(String),

    #[error("invalid plant metadata: {0}")]
    InvalidPlant(String),

    #[error("unknown timezone '{0}' (expected an IANA zone name, e.g. Europe/Paris)")]
    UnknownTimezone(String),

    #[error("session '{0}' not found. Run /upload-and-refine first to obtain a valid session id")]
    SessionNotFound(String),

    #[error("multipart form error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::CsvParse { .. } | ApiError::Multipart(_) => StatusCode::BAD_REQUEST,
            ApiError::EmptyDataset { .. }
            | ApiError::MissingDataset(_)
            | ApiError::InvalidPlant(_)
            | ApiError::UnknownTimezone(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
