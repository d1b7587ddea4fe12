//! Upload batch parsing.
//!
//! Batches are decoded completely before anything reaches the store, so a
//! malformed element rejects the whole upload with no rows written.

use crate::record::TelemetryRecord;
use serde_json::Value;
use thiserror::Error;

/// Reasons an uploaded batch is rejected
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Only JSON files are allowed")]
    UnsupportedFile,

    #[error("No file field in upload")]
    MissingFile,

    #[error("Failed to read upload: {0}")]
    Upload(String),

    #[error("Invalid JSON format: {0}")]
    InvalidJson(String),

    #[error("JSON must be an array of session records")]
    NotAnArray,

    #[error("Invalid record at index {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },
}

impl IngestError {
    /// Stable error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::UnsupportedFile => "UNSUPPORTED_FILE",
            IngestError::MissingFile => "MISSING_FILE",
            IngestError::Upload(_) => "INVALID_UPLOAD",
            IngestError::InvalidJson(_) => "INVALID_JSON",
            IngestError::NotAnArray => "NOT_AN_ARRAY",
            IngestError::InvalidRecord { .. } => "INVALID_RECORD",
        }
    }
}

/// Check an uploaded file name
pub fn check_file_name(file_name: Option<&str>) -> Result<(), IngestError> {
    match file_name {
        Some(name) if name.to_ascii_lowercase().ends_with(".json") => Ok(()),
        _ => Err(IngestError::UnsupportedFile),
    }
}

/// Parse an uploaded document into nested records
pub fn parse_batch(bytes: &[u8]) -> Result<Vec<TelemetryRecord>, IngestError> {
    let document: Value =
        serde_json::from_slice(bytes).map_err(|e| IngestError::InvalidJson(e.to_string()))?;

    let Value::Array(items) = document else {
        return Err(IngestError::NotAnArray);
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            if !item.is_object() {
                return Err(IngestError::InvalidRecord {
                    index,
                    reason: "expected an object".to_string(),
                });
            }
            serde_json::from_value(item).map_err(|e| IngestError::InvalidRecord {
                index,
                reason: e.to_string(),
            })
        })
        .collect()
}
