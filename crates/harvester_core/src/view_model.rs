use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Job, JobId, JobProgress, JobStatus};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueueView {
    pub is_processing: bool,
    pub queue_length: usize,
    pub current: Option<JobRowView>,
    pub total_jobs: usize,
    pub jobs: Vec<JobRowView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRowView {
    pub job_id: JobId,
    pub target: String,
    pub status: JobStatus,
    pub progress: JobProgress,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobRowView {
    pub(crate) fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id,
            target: job.target.to_string(),
            status: job.status,
            progress: job.progress.clone(),
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
        }
    }
}
