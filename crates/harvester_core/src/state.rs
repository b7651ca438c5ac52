use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::view_model::{JobRowView, QueueView};
use crate::{CollectionResult, ErrorKind, HarvestOptions, Priority};

pub type JobId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Checkpoint names reported while a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Queued,
    Fetching,
    BasicProcessing,
    DetailedProcessing,
    Completed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub stage: Stage,
    /// Percentage, 0..=100, strictly increasing over a job's life.
    pub current: u8,
    pub message: String,
}

impl JobProgress {
    pub fn new(stage: Stage, current: u8, message: impl Into<String>) -> Self {
        Self {
            stage,
            current: current.min(100),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobTarget {
    Channel(String),
    Channels(Vec<String>),
    Group(String),
}

impl fmt::Display for JobTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobTarget::Channel(id) => write!(f, "channel {id}"),
            JobTarget::Channels(ids) => write!(f, "{} channels", ids.len()),
            JobTarget::Group(id) => write!(f, "group {id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub kind: ErrorKind,
    pub message: String,
}

impl JobError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub target: JobTarget,
    pub options: HarvestOptions,
    pub status: JobStatus,
    pub progress: JobProgress,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<CollectionResult>,
    pub error: Option<JobError>,
}

impl Job {
    fn new(id: JobId, target: JobTarget, options: HarvestOptions, now: DateTime<Utc>) -> Self {
        Self {
            id,
            target,
            options,
            status: JobStatus::Queued,
            progress: JobProgress::new(Stage::Queued, 0, "waiting in queue"),
            created_at: now,
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    pub fn priority(&self) -> Priority {
        self.options.priority
    }
}

/// The job table plus the pending order and the single dispatched slot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueueState {
    jobs: BTreeMap<JobId, Job>,
    pending: VecDeque<JobId>,
    current: Option<JobId>,
    draining: bool,
    next_job_id: JobId,
}

impl QueueState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job(&self, job_id: JobId) -> Option<&Job> {
        self.jobs.get(&job_id)
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    pub fn pending_ids(&self) -> Vec<JobId> {
        self.pending.iter().copied().collect()
    }

    pub fn current(&self) -> Option<JobId> {
        self.current
    }

    pub fn is_draining(&self) -> bool {
        self.draining
    }

    pub fn view(&self) -> QueueView {
        QueueView {
            is_processing: self.current.is_some(),
            queue_length: self.pending.len(),
            current: self
                .current
                .and_then(|id| self.jobs.get(&id))
                .map(JobRowView::from_job),
            total_jobs: self.jobs.len(),
            jobs: self.jobs.values().map(JobRowView::from_job).collect(),
        }
    }

    pub(crate) fn insert_job(
        &mut self,
        target: JobTarget,
        options: HarvestOptions,
        now: DateTime<Utc>,
    ) -> JobId {
        self.next_job_id += 1;
        let job_id = self.next_job_id;
        let job = Job::new(job_id, target, options, now);
        match job.priority() {
            // Head of the pending queue; the dispatched job is not in it.
            Priority::High => self.pending.push_front(job_id),
            Priority::Normal => self.pending.push_back(job_id),
        }
        self.jobs.insert(job_id, job);
        job_id
    }

    /// Returns true when the caller must spawn the drain loop.
    pub(crate) fn claim_drain(&mut self) -> bool {
        if self.draining {
            return false;
        }
        self.draining = true;
        true
    }

    pub(crate) fn release_drain(&mut self) {
        self.draining = false;
    }

    pub(crate) fn cancel_queued(&mut self, job_id: JobId, now: DateTime<Utc>) -> bool {
        let Some(job) = self.jobs.get_mut(&job_id) else {
            return false;
        };
        if job.status != JobStatus::Queued {
            return false;
        }
        self.pending.retain(|id| *id != job_id);
        job.status = JobStatus::Cancelled;
        job.completed_at = Some(now);
        true
    }

    /// Pops the next pending job into the dispatched slot.
    pub(crate) fn dispatch_next(&mut self, now: DateTime<Utc>) -> Option<&Job> {
        if self.current.is_some() {
            return None;
        }
        let mut dispatched = None;
        while let Some(job_id) = self.pending.pop_front() {
            if let Some(job) = self.jobs.get_mut(&job_id) {
                if job.status == JobStatus::Queued {
                    job.status = JobStatus::Processing;
                    job.started_at = Some(now);
                    dispatched = Some(job_id);
                    break;
                }
            }
        }
        let job_id = dispatched?;
        self.current = Some(job_id);
        self.jobs.get(&job_id)
    }

    /// Applies progress only while processing and only when `current` increases.
    pub(crate) fn apply_progress(&mut self, job_id: JobId, progress: JobProgress) -> bool {
        let Some(job) = self.jobs.get_mut(&job_id) else {
            return false;
        };
        if job.status != JobStatus::Processing || progress.current <= job.progress.current {
            return false;
        }
        job.progress = progress;
        true
    }

    pub(crate) fn finish(
        &mut self,
        job_id: JobId,
        outcome: Result<CollectionResult, JobError>,
        now: DateTime<Utc>,
    ) -> Option<&Job> {
        if self.current != Some(job_id) {
            return None;
        }
        let job = self.jobs.get_mut(&job_id)?;
        if job.status != JobStatus::Processing {
            return None;
        }
        match outcome {
            Ok(result) => {
                job.status = JobStatus::Completed;
                job.progress = JobProgress::new(Stage::Completed, 100, "collection finished");
                job.result = Some(result);
            }
            Err(error) => {
                job.status = JobStatus::Failed;
                job.progress = JobProgress::new(Stage::Error, 100, format!("error: {error}"));
                job.error = Some(error);
            }
        }
        job.completed_at = Some(now);
        self.current = None;
        self.jobs.get(&job_id)
    }

    pub(crate) fn purge_terminal_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|_, job| {
            !(job.status.is_terminal() && job.completed_at.is_some_and(|done| done < cutoff))
        });
        before - self.jobs.len()
    }
}
