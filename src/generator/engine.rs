//! Batch generation engine.
//!
//! Records are processed strictly in source order so that filename suffixes
//! are reproducible across runs. A failed record is logged and counted; it
//! never stops the loop.

use log::{info, warn};
use serde::Serialize;
use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

use super::naming::{base_filename, FilenameRegistry};
use super::traits::{RecordSource, Renderer};
use super::{BatchError, GenerationOutcome, GenerationSummary};
use crate::dataset::Record;

/// Emitted after each processed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct BatchProgress {
    /// 1-based position of the record just processed.
    pub index: usize,
    pub total: usize,
    pub filename: String,
    pub succeeded: bool,
}

/// Drives a record source through a renderer.
pub struct BatchGenerator<'a, S: ?Sized, R: ?Sized> {
    source: &'a S,
    renderer: &'a R,
}

impl<'a, S, R> BatchGenerator<'a, S, R>
where
    S: RecordSource + ?Sized,
    R: Renderer + ?Sized,
{
    pub fn new(source: &'a S, renderer: &'a R) -> Self {
        Self { source, renderer }
    }

    /// Generate one document per record into `output_dir`.
    pub fn generate_all(
        &self,
        output_dir: &Path,
        naming_field: &str,
    ) -> Result<GenerationSummary, BatchError> {
        self.generate_with(output_dir, naming_field, &CancellationToken::new(), |_| {})
    }

    /// Like `generate_all`, checking `cancel` before each record and reporting
    /// progress after each one. A cancelled run returns the partial summary.
    pub fn generate_with<P>(
        &self,
        output_dir: &Path,
        naming_field: &str,
        cancel: &CancellationToken,
        mut on_progress: P,
    ) -> Result<GenerationSummary, BatchError>
    where
        P: FnMut(&BatchProgress),
    {
        fs::create_dir_all(output_dir).map_err(|source| BatchError::OutputDir {
            path: output_dir.to_path_buf(),
            source,
        })?;

        let total = self.source.record_count();
        let mut summary = GenerationSummary::new(total);
        let mut registry = FilenameRegistry::new();

        for (position, record) in self.source.records().enumerate() {
            if cancel.is_cancelled() {
                info!(
                    "Batch cancelled after {} of {} records",
                    summary.processed(),
                    total
                );
                summary.cancelled = true;
                break;
            }

            let filename = registry.resolve(&base_filename(record.get(naming_field)));
            let output = output_dir.join(format!("{}.{}", filename, self.renderer.extension()));

            let outcome = match render_isolated(self.renderer, &record, &output) {
                Ok(()) => GenerationOutcome::Success { filename },
                Err(reason) => {
                    warn!("Failed to generate {}: {}", output.display(), reason);
                    GenerationOutcome::Failure { filename, reason }
                }
            };

            on_progress(&BatchProgress {
                index: position + 1,
                total,
                filename: outcome.filename().to_string(),
                succeeded: outcome.is_success(),
            });
            summary.record(outcome);
        }

        Ok(summary)
    }

    /// Filenames the first `limit` records would receive, without rendering.
    pub fn preview_filenames(&self, naming_field: &str, limit: usize) -> Vec<String> {
        let mut registry = FilenameRegistry::new();
        self.source
            .records()
            .take(limit)
            .map(|record| {
                format!(
                    "{}.{}",
                    registry.resolve(&base_filename(record.get(naming_field))),
                    self.renderer.extension()
                )
            })
            .collect()
    }
}

/// Render one record, turning both errors and panics into a failure reason.
fn render_isolated<R>(renderer: &R, record: &Record, output: &Path) -> Result<(), String>
where
    R: Renderer + ?Sized,
{
    match panic::catch_unwind(AssertUnwindSafe(|| renderer.render(record, output))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err.to_string()),
        Err(payload) => Err(format!("renderer panicked: {}", panic_message(&*payload))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Log a finished run, listing at most `failure_preview` failures.
pub fn log_summary(summary: &GenerationSummary, failure_preview: usize) {
    info!(
        "Generation finished: {} total, {} succeeded, {} failed{}",
        summary.total,
        summary.successes.len(),
        summary.failures.len(),
        if summary.cancelled { " (cancelled)" } else { "" }
    );

    for failure in summary.failures.iter().take(failure_preview) {
        warn!("  {} - {}", failure.filename, failure.reason);
    }
    if summary.failures.len() > failure_preview {
        warn!(
            "  ... and {} more failures",
            summary.failures.len() - failure_preview
        );
    }
}
