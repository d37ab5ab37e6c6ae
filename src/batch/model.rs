use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::generator::validation::{
    validate_path_extension, validate_required, ValidationErrors,
};
use crate::generator::{GenerationSummary, PlaceholderStatus};

pub const DATASET_EXTENSIONS: &[&str] = &["shp", "dbf"];
pub const TEMPLATE_EXTENSIONS: &[&str] = &["docx"];

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct BatchRequest {
    pub dataset_path: String,
    pub template_path: String,
    /// Field whose value names each output document.
    pub naming_field: String,
    /// Defaults to the configured output root.
    #[serde(default)]
    pub output_dir: Option<String>,
    /// Dataset encoding; defaults to the `.cpg` sidecar or the configured default.
    #[serde(default)]
    pub encoding: Option<String>,
}

impl BatchRequest {
    /// Check the request shape. Whether the naming field exists is checked
    /// later, once the dataset is open.
    pub fn validate(&self) -> Result<(), String> {
        let mut errors = ValidationErrors::new();

        validate_path_extension(
            &self.dataset_path,
            "dataset_path",
            "Dataset path",
            DATASET_EXTENSIONS,
            &mut errors,
        );
        validate_path_extension(
            &self.template_path,
            "template_path",
            "Template path",
            TEMPLATE_EXTENSIONS,
            &mut errors,
        );
        validate_required(&self.naming_field, "naming_field", "Naming field", &mut errors);
        if let Some(output_dir) = &self.output_dir {
            validate_required(output_dir, "output_dir", "Output directory", &mut errors);
        }

        errors.into_result()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// Snapshot of a batch job.
#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct BatchJob {
    pub id: Uuid,
    pub status: BatchStatus,
    pub dataset_path: String,
    pub template_path: String,
    pub naming_field: String,
    pub output_dir: String,
    pub total: usize,
    pub processed: usize,
    pub last_filename: Option<String>,
    pub summary: Option<GenerationSummary>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct BatchAccepted {
    pub job_id: Uuid,
    pub total: usize,
    pub output_dir: String,
    /// Filenames of the first few documents.
    pub preview: Vec<String>,
    pub placeholders: Vec<PlaceholderStatus>,
}
