use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod config;

pub const BARRELS_PATH: &str = "/barrels";
pub const MEASUREMENTS_PATH: &str = "/measurements";

/// Error types shared by the harness crates
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HarnessError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {0}: {1}")]
    HttpError(u16, String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for HarnessError {
    fn from(e: std::io::Error) -> Self {
        HarnessError::Io(e.to_string())
    }
}

/// JSON error envelope returned by the API for error responses
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Payload for `POST /barrels`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBarrel {
    pub qr: String,
    pub rfid: String,
    pub nfc: String,
}

/// A barrel as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Barrel {
    pub id: String,
    pub qr: String,
    pub rfid: String,
    pub nfc: String,
}

/// Payload for `POST /measurements`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMeasurement {
    pub barrel_id: String,
    pub dirt_level: f64,
    pub weight: f64,
}

/// A measurement as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub id: String,
    pub barrel_id: String,
    pub dirt_level: f64,
    pub weight: f64,
}

/// Result type for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;
