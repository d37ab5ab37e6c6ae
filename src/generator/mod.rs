//! Generator module - batch document generation.
//!
//! - `traits` - `RecordSource` / `Renderer` seams
//! - `naming` - filename sanitizing and per-run uniqueness
//! - `engine` - the batch loop
//! - `validation` - placeholder matching and request checks

pub mod engine;
pub mod naming;
pub mod traits;
pub mod validation;

pub use engine::{BatchGenerator, BatchProgress};
pub use naming::{sanitize_filename, FilenameRegistry, FALLBACK_NAME};
pub use traits::{RecordSource, Renderer};
pub use validation::{validate_placeholders, PlaceholderStatus};

pub use crate::template::RenderError;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

/// Errors that stop a batch before any record is processed.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Success { filename: String },
    Failure { filename: String, reason: String },
}

impl GenerationOutcome {
    pub fn filename(&self) -> &str {
        match self {
            Self::Success { filename } | Self::Failure { filename, .. } => filename,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GenerationFailure {
    pub filename: String,
    pub reason: String,
}

/// Aggregated outcome of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GenerationSummary {
    /// Records in the source, processed or not.
    pub total: usize,
    /// Resolved filenames (without extension) written successfully.
    pub successes: Vec<String>,
    pub failures: Vec<GenerationFailure>,
    /// True when the run stopped early on request.
    pub cancelled: bool,
}

impl GenerationSummary {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: GenerationOutcome) {
        match outcome {
            GenerationOutcome::Success { filename } => self.successes.push(filename),
            GenerationOutcome::Failure { filename, reason } => {
                self.failures.push(GenerationFailure { filename, reason })
            }
        }
    }

    /// Records that were attempted.
    pub fn processed(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.processed() == self.total
    }
}
