//! In-memory job registry with a bounded submission queue
//!
//! Records move `queued -> running -> complete` or end in `failed`. Updates
//! that arrive after a record reached a terminal state are ignored, so a
//! timed-out pipeline that keeps running in the background cannot revive it.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::pdf::PageResult;

/// Job status
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }
}

/// Full job record
#[derive(Debug, Clone, Serialize)]
pub struct JobProgress {
    pub job_id: Uuid,
    pub filename: String,
    pub status: JobStatus,
    /// 0-100, stays below 100 until the job completes
    pub progress: u8,
    pub pages_done: usize,
    pub total_pages: usize,
    /// Page sections accumulated so far
    pub text: String,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobProgress {
    fn new(job_id: Uuid, filename: String) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            filename,
            status: JobStatus::Queued,
            progress: 0,
            pages_done: 0,
            total_pages: 0,
            text: String::new(),
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    fn finish(&mut self, status: JobStatus) {
        let now = Utc::now();
        self.status = status;
        self.updated_at = now;
        self.completed_at = Some(now);
    }
}

/// What a client sees when polling a job
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JobPoll {
    pub progress: u8,
    /// Empty until the job is complete
    pub text: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&JobProgress> for JobPoll {
    fn from(job: &JobProgress) -> Self {
        Self {
            progress: job.progress,
            text: if job.status == JobStatus::Complete {
                job.text.clone()
            } else {
                String::new()
            },
            status: job.status,
            error: if job.status == JobStatus::Failed {
                job.error.clone()
            } else {
                None
            },
        }
    }
}

/// Job listing entry, without text
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub job_id: Uuid,
    pub filename: String,
    pub status: JobStatus,
    pub progress: u8,
    pub pages_done: usize,
    pub total_pages: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&JobProgress> for JobSummary {
    fn from(job: &JobProgress) -> Self {
        Self {
            job_id: job.job_id,
            filename: job.filename.clone(),
            status: job.status,
            progress: job.progress,
            pages_done: job.pages_done,
            total_pages: job.total_pages,
            error: job.error.clone(),
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// A PDF waiting for a worker
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub filename: String,
    pub data: Bytes,
}

/// Queue statistics
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct QueueStats {
    pub total_jobs: usize,
    pub queued: usize,
    pub running: usize,
    pub complete: usize,
    pub failed: usize,
    pub worker_count: usize,
    pub queue_capacity: usize,
}

/// Registry of background PDF jobs
pub struct JobRegistry {
    jobs: Arc<DashMap<Uuid, JobProgress>>,
    sender: mpsc::Sender<Job>,
    capacity: usize,
    worker_count: usize,
    result_ttl: Duration,
}

impl JobRegistry {
    /// Create a registry and the receiving end of its queue
    pub fn new(
        capacity: usize,
        worker_count: usize,
        result_ttl: Duration,
    ) -> (Self, mpsc::Receiver<Job>) {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);

        let registry = Self {
            jobs: Arc::new(DashMap::new()),
            sender,
            capacity,
            worker_count,
            result_ttl,
        };

        (registry, receiver)
    }

    /// Register a job and queue it without waiting
    pub fn submit(&self, filename: impl Into<String>, data: Bytes) -> Result<Uuid> {
        let job_id = Uuid::new_v4();
        let filename = filename.into();
        self.jobs
            .insert(job_id, JobProgress::new(job_id, filename.clone()));

        let job = Job {
            id: job_id,
            filename,
            data,
        };

        match self.sender.try_send(job) {
            Ok(()) => {
                tracing::info!("Queued job {}", job_id);
                Ok(job_id)
            }
            Err(TrySendError::Full(job)) => {
                self.jobs.remove(&job.id);
                tracing::warn!("Rejected job for '{}': queue full", job.filename);
                Err(Error::QueueFull(self.capacity))
            }
            Err(TrySendError::Closed(job)) => {
                self.jobs.remove(&job.id);
                Err(Error::internal("Job worker is not running"))
            }
        }
    }

    /// Move a queued job to running
    pub fn mark_running(&self, job_id: Uuid) {
        if let Some(mut job) = self.jobs.get_mut(&job_id) {
            if job.status == JobStatus::Queued {
                job.status = JobStatus::Running;
                job.updated_at = Utc::now();
            }
        }
    }

    /// Append a finished page and advance progress
    pub fn record_page(
        &self,
        job_id: Uuid,
        page: &PageResult,
        pages_done: usize,
        total_pages: usize,
    ) {
        if let Some(mut job) = self.jobs.get_mut(&job_id) {
            if job.status != JobStatus::Running {
                return;
            }
            job.text.push_str(&page.section());
            job.pages_done = pages_done;
            job.total_pages = total_pages;
            job.progress = page_progress(pages_done, total_pages).max(job.progress);
            job.updated_at = Utc::now();
        }
    }

    /// Store the final text and mark the job complete
    pub fn complete(&self, job_id: Uuid, text: String) {
        if let Some(mut job) = self.jobs.get_mut(&job_id) {
            if job.status.is_terminal() {
                return;
            }
            job.text = text;
            job.progress = 100;
            job.finish(JobStatus::Complete);
        }
    }

    /// Mark the job failed, leaving progress where it was
    pub fn fail(&self, job_id: Uuid, error: impl Into<String>) {
        if let Some(mut job) = self.jobs.get_mut(&job_id) {
            if job.status.is_terminal() {
                return;
            }
            job.error = Some(error.into());
            job.finish(JobStatus::Failed);
        }
    }

    /// Snapshot of a full record
    pub fn get(&self, job_id: Uuid) -> Option<JobProgress> {
        self.jobs.get(&job_id).map(|j| j.clone())
    }

    /// Client view of a job
    pub fn poll(&self, job_id: Uuid) -> Option<JobPoll> {
        self.jobs.get(&job_id).map(|j| JobPoll::from(j.value()))
    }

    /// All jobs, newest first
    pub fn list(&self) -> Vec<JobSummary> {
        let mut jobs: Vec<JobSummary> =
            self.jobs.iter().map(|j| JobSummary::from(j.value())).collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Get queue statistics
    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            total_jobs: 0,
            queued: 0,
            running: 0,
            complete: 0,
            failed: 0,
            worker_count: self.worker_count,
            queue_capacity: self.capacity,
        };
        for job in self.jobs.iter() {
            stats.total_jobs += 1;
            match job.status {
                JobStatus::Queued => stats.queued += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Complete => stats.complete += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Drop terminal records older than the result TTL
    pub fn evict_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.jobs.len();
        self.jobs.retain(|_, job| match job.completed_at {
            Some(done) if job.status.is_terminal() => {
                let age = now.signed_duration_since(done).to_std().unwrap_or_default();
                age < self.result_ttl
            }
            _ => true,
        });
        before.saturating_sub(self.jobs.len())
    }

    /// Periodically evict expired records
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = registry.evict_expired();
                if evicted > 0 {
                    tracing::debug!("Evicted {} expired jobs", evicted);
                }
            }
        })
    }
}

/// Progress for a partially processed document, capped at 99
fn page_progress(pages_done: usize, total_pages: usize) -> u8 {
    if total_pages == 0 {
        return 0;
    }
    (pages_done * 100 / total_pages).min(99) as u8
}
