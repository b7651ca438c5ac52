use chrono::{DateTime, Duration, Utc};

use crate::{CollectionResult, HarvestOptions, JobError, JobId, JobProgress, JobTarget};

/// Inputs to the job table. Every message carries the clock reading it applies at.
#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Caller enqueued a harvest.
    Submit {
        target: JobTarget,
        options: HarvestOptions,
        now: DateTime<Utc>,
    },
    /// Caller asked to cancel a job; only honored while queued.
    Cancel { job_id: JobId, now: DateTime<Utc> },
    /// Cancel every queued job.
    ClearPending { now: DateTime<Utc> },
    /// Drain loop is ready for the next job.
    DispatchNext { now: DateTime<Utc> },
    /// Checkpoint from the running job.
    Progress { job_id: JobId, progress: JobProgress },
    /// Running job returned a collection result.
    Finished {
        job_id: JobId,
        result: CollectionResult,
        now: DateTime<Utc>,
    },
    /// Running job failed as a whole.
    Failed {
        job_id: JobId,
        error: JobError,
        now: DateTime<Utc>,
    },
    /// Drop terminal jobs that finished before `now - retention`.
    Cleanup {
        retention: Duration,
        now: DateTime<Utc>,
    },
}
