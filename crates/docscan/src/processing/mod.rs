//! Background PDF processing with a job registry and progress tracking

mod job_registry;
mod worker;

pub use job_registry::{Job, JobPoll, JobProgress, JobRegistry, JobStatus, JobSummary, QueueStats};
pub use worker::ProcessingWorker;
