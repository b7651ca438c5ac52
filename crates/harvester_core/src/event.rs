use serde::{Deserialize, Serialize};

use crate::{CollectionResult, JobError, JobId, JobProgress, JobTarget};

/// Notifications observers receive, in the order the queue produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    JobAdded {
        job_id: JobId,
        target: JobTarget,
    },
    JobStarted {
        job_id: JobId,
    },
    JobProgress {
        job_id: JobId,
        progress: JobProgress,
    },
    JobCompleted {
        job_id: JobId,
        result: Box<CollectionResult>,
    },
    JobFailed {
        job_id: JobId,
        error: JobError,
    },
    JobCancelled {
        job_id: JobId,
    },
    QueueCompleted,
}

impl JobEvent {
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            JobEvent::JobAdded { job_id, .. }
            | JobEvent::JobStarted { job_id }
            | JobEvent::JobProgress { job_id, .. }
            | JobEvent::JobCompleted { job_id, .. }
            | JobEvent::JobFailed { job_id, .. }
            | JobEvent::JobCancelled { job_id } => Some(*job_id),
            JobEvent::QueueCompleted => None,
        }
    }
}
