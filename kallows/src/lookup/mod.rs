//! Part Lookup
//!
//! Reads part numbers from a CSV table and queries a part search service
//! once per row, one request at a time.

pub mod client;
pub mod input;
pub mod runner;

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use client::{MouserClient, DEFAULT_ENDPOINT};
pub use input::{read_parts, read_parts_file, PartTable};
pub use runner::{LookupRunner, LookupSummary, OutputFormat};

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Column '{column}' not found in {path} (columns: {available})")]
    MissingColumn {
        column: String,
        path: PathBuf,
        available: String,
    },
    #[error("No API key configured: pass --api-key or set MOUSER_API_KEY")]
    MissingApiKey,
    #[error("Invalid endpoint '{endpoint}': {message}")]
    InvalidEndpoint { endpoint: String, message: String },
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// One part number read from the input table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartRecord {
    /// 1-based data row, not counting the header.
    pub row: usize,
    pub mpn: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The service answered with a non-200 status.
    Status(u16),
    /// No response: connection, DNS, timeout.
    Transport,
    /// 200 with a body that is not valid JSON.
    Parse,
}

/// Result of looking up one part number.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum LookupOutcome {
    Found {
        mpn: String,
        body: serde_json::Value,
    },
    Failed {
        mpn: String,
        kind: FailureKind,
        detail: String,
    },
}

impl LookupOutcome {
    pub fn mpn(&self) -> &str {
        match self {
            LookupOutcome::Found { mpn, .. } | LookupOutcome::Failed { mpn, .. } => mpn,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, LookupOutcome::Found { .. })
    }
}

impl fmt::Display for LookupOutcome {
    /// Found results print as JSON; failures as a one-line notice.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupOutcome::Found { body, .. } => write!(f, "{}", body),
            LookupOutcome::Failed { mpn, kind, detail } => match kind {
                FailureKind::Status(code) => {
                    write!(f, "Failed to fetch part number: {} (HTTP {})", mpn, code)
                }
                FailureKind::Transport | FailureKind::Parse => {
                    write!(f, "Failed to fetch part number: {} ({})", mpn, detail)
                }
            },
        }
    }
}

/// A part search service.
#[async_trait]
pub trait PartSearch: Send + Sync {
    /// Look up one part number. Per-part failures are part of the outcome,
    /// not an error.
    async fn search(&self, mpn: &str) -> LookupOutcome;
}
