use std::collections::BTreeMap;

use pdf_reading_order::ColumnBand;
use serde::{Deserialize, Serialize};

pub const SERVICE_NAME: &str = "pdf-parser";
pub const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

impl HealthResponse {
    #[must_use]
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            service: SERVICE_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub description: String,
    pub endpoints: BTreeMap<String, String>,
}

impl ServiceInfo {
    #[must_use]
    pub fn current() -> Self {
        let endpoints = [
            ("parse", "POST /parse-pdf"),
            ("columns", "POST /detect-columns?page=N"),
            ("health", "GET /health"),
        ]
        .into_iter()
        .map(|(name, route)| (name.to_string(), route.to_string()))
        .collect();

        Self {
            service: "PDF Parser Worker".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: "Layout-aware PDF parsing with reading-order reconstruction".to_string(),
            endpoints,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnsResponse {
    pub page: u32,
    pub column_tolerance: f64,
    pub columns: Vec<ColumnBand>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}
