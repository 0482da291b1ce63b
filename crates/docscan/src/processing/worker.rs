//! Background worker for PDF jobs

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;

use super::job_registry::{Job, JobRegistry};
use crate::config::JobsConfig;
use crate::extract::Extractor;

/// Pulls jobs off the queue and runs them with bounded concurrency
pub struct ProcessingWorker {
    registry: Arc<JobRegistry>,
    extractor: Extractor,
    parallel_jobs: usize,
    job_timeout: Duration,
}

impl ProcessingWorker {
    /// Create a new processing worker
    pub fn new(registry: Arc<JobRegistry>, extractor: Extractor, config: &JobsConfig) -> Self {
        let parallel_jobs = config.workers();
        let job_timeout = Duration::from_secs(config.job_timeout_secs);

        tracing::info!(
            "Worker configured: {} parallel jobs, {}s timeout",
            parallel_jobs,
            config.job_timeout_secs
        );

        Self {
            registry,
            extractor,
            parallel_jobs,
            job_timeout,
        }
    }

    /// Override the per-job timeout
    pub fn with_timeout(mut self, job_timeout: Duration) -> Self {
        self.job_timeout = job_timeout;
        self
    }

    /// Start processing jobs from the queue
    ///
    /// Returns once every sender is dropped and the queue is drained.
    pub async fn run(self, mut receiver: mpsc::Receiver<Job>) {
        let semaphore = Arc::new(Semaphore::new(self.parallel_jobs.max(1)));
        tracing::info!("Processing worker started: {} parallel jobs", self.parallel_jobs);

        while let Some(job) = receiver.recv().await {
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    self.registry.fail(job.id, "Worker pool shut down");
                    break;
                }
            };

            let registry = Arc::clone(&self.registry);
            let extractor = self.extractor.clone();
            let job_timeout = self.job_timeout;
            tokio::spawn(Self::process_job(registry, extractor, job, job_timeout, permit));
        }

        tracing::info!("Processing worker stopped");
    }

    /// Run one job; `permit` is released when the blocking extraction
    /// returns, even if the job was already failed by the timeout
    async fn process_job(
        registry: Arc<JobRegistry>,
        extractor: Extractor,
        job: Job,
        job_timeout: Duration,
        permit: OwnedSemaphorePermit,
    ) {
        let job_id = job.id;
        let filename = job.filename.clone();
        let start_time = Instant::now();
        tracing::info!("Processing job {} ({}, {} bytes)", job_id, filename, job.data.len());

        registry.mark_running(job_id);

        let task_registry = Arc::clone(&registry);
        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            extractor.extract_pdf(&job.data, |page, done, total| {
                task_registry.record_page(job_id, page, done, total)
            })
        });

        match timeout(job_timeout, task).await {
            Ok(Ok(Ok(extraction))) => {
                registry.complete(job_id, extraction.text());
                tracing::info!(
                    "Job {} completed: {} pages ({} failed) in {:.1}s",
                    job_id,
                    extraction.page_count(),
                    extraction.failed_pages(),
                    start_time.elapsed().as_secs_f64()
                );
            }
            Ok(Ok(Err(e))) => {
                tracing::error!("Job {} failed: {}", job_id, e);
                registry.fail(job_id, e.to_string());
            }
            Ok(Err(join_error)) => {
                tracing::error!("Job {} panicked: {}", job_id, join_error);
                registry.fail(job_id, format!("Processing crashed: {}", join_error));
            }
            Err(_) => {
                tracing::error!(
                    "TIMEOUT processing '{}' after {:.1}s (limit: {}s)",
                    filename,
                    start_time.elapsed().as_secs_f64(),
                    job_timeout.as_secs_f64()
                );
                registry.fail(
                    job_id,
                    format!("Processing timed out after {}s", job_timeout.as_secs_f64()),
                );
            }
        }
    }
}
