//! In-memory registry of batch jobs.

use chrono::Utc;
use log::{debug, info};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::model::{BatchJob, BatchRequest, BatchStatus};
use crate::generator::{BatchProgress, GenerationSummary};

struct JobEntry {
    job: BatchJob,
    cancel: CancellationToken,
    // Position in completion order, set once the job finishes.
    finished_seq: Option<u64>,
}

/// Finished jobs kept for status queries and downloads.
pub const MAX_FINISHED_JOBS: usize = 100;

#[derive(Clone)]
pub struct BatchJobRegistry {
    jobs: Arc<RwLock<HashMap<Uuid, JobEntry>>>,
    finished_count: Arc<AtomicU64>,
    finished_limit: usize,
}

impl Default for BatchJobRegistry {
    fn default() -> Self {
        Self::with_finished_limit(MAX_FINISHED_JOBS)
    }
}

impl BatchJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that forgets the oldest finished jobs beyond `limit`.
    /// Running jobs are never evicted.
    pub fn with_finished_limit(limit: usize) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            finished_count: Arc::new(AtomicU64::new(0)),
            finished_limit: limit,
        }
    }

    /// Register a running job under `id` and return its cancellation token.
    pub fn create(
        &self,
        id: Uuid,
        request: &BatchRequest,
        output_dir: &Path,
        total: usize,
    ) -> CancellationToken {
        let cancel = CancellationToken::new();
        let job = BatchJob {
            id,
            status: BatchStatus::Running,
            dataset_path: request.dataset_path.clone(),
            template_path: request.template_path.clone(),
            naming_field: request.naming_field.clone(),
            output_dir: output_dir.display().to_string(),
            total,
            processed: 0,
            last_filename: None,
            summary: None,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        };

        self.jobs.write().insert(
            id,
            JobEntry {
                job,
                cancel: cancel.clone(),
                finished_seq: None,
            },
        );
        cancel
    }

    pub fn update_progress(&self, id: Uuid, progress: &BatchProgress) {
        if let Some(entry) = self.jobs.write().get_mut(&id) {
            entry.job.processed = progress.index;
            entry.job.last_filename = Some(progress.filename.clone());
        }
    }

    /// Store the final outcome of a job.
    pub fn finish(&self, id: Uuid, result: Result<GenerationSummary, String>) {
        let mut jobs = self.jobs.write();
        let Some(entry) = jobs.get_mut(&id) else {
            return;
        };

        entry.finished_seq = Some(self.finished_count.fetch_add(1, Ordering::Relaxed));
        let job = &mut entry.job;
        job.finished_at = Some(Utc::now());
        match result {
            Ok(summary) => {
                job.status = if summary.cancelled {
                    BatchStatus::Cancelled
                } else {
                    BatchStatus::Completed
                };
                job.processed = summary.processed();
                job.summary = Some(summary);
            }
            Err(error) => {
                job.status = BatchStatus::Failed;
                job.error = Some(error);
            }
        }
        info!("Batch job {} finished with status {:?}", id, job.status);

        self.evict_finished(&mut jobs);
    }

    fn evict_finished(&self, jobs: &mut HashMap<Uuid, JobEntry>) {
        let mut finished: Vec<(Uuid, u64)> = jobs
            .iter()
            .filter_map(|(id, entry)| entry.finished_seq.map(|seq| (*id, seq)))
            .collect();
        if finished.len() <= self.finished_limit {
            return;
        }

        finished.sort_by_key(|(_, seq)| *seq);
        let excess = finished.len() - self.finished_limit;
        for (id, _) in finished.into_iter().take(excess) {
            jobs.remove(&id);
            debug!("Evicted finished batch job {}", id);
        }
    }

    pub fn get(&self, id: Uuid) -> Option<BatchJob> {
        self.jobs.read().get(&id).map(|entry| entry.job.clone())
    }

    /// All jobs, oldest first.
    pub fn list(&self) -> Vec<BatchJob> {
        let mut jobs: Vec<BatchJob> = self
            .jobs
            .read()
            .values()
            .map(|entry| entry.job.clone())
            .collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }

    /// Request cancellation of a running job. Returns `None` for unknown ids
    /// and `Some(false)` when the job is no longer running.
    pub fn cancel(&self, id: Uuid) -> Option<bool> {
        let jobs = self.jobs.read();
        let entry = jobs.get(&id)?;
        if entry.job.status != BatchStatus::Running {
            return Some(false);
        }
        entry.cancel.cancel();
        info!("Cancellation requested for batch job {}", id);
        Some(true)
    }
}
