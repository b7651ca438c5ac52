use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use futures_util::FutureExt;
use harvest_logging::{harvest_error, harvest_info, harvest_warn};
use harvester_core::{
    update, CollectionResult, CollectionStats, Effect, ErrorKind, HarvestOptions, Job, JobError,
    JobEvent, JobId, JobProgress, JobTarget, Msg, QueueState, QueueView, Stage,
};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::{ChannelProgress, CollectionOrchestrator, ProgressSink};

const FETCHING_PERCENT: u8 = 10;
const BASIC_PERCENT: u8 = 30;
const CHANNELS_DONE_PERCENT: u8 = 85;
const DETAILED_PERCENT: u8 = 90;

#[derive(Debug, Clone)]
pub struct QueueSettings {
    /// Events buffered per subscriber before it starts lagging.
    pub event_capacity: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self { event_capacity: 256 }
    }
}

struct QueueInner {
    state: Mutex<QueueState>,
    orchestrator: Arc<CollectionOrchestrator>,
    events: broadcast::Sender<JobEvent>,
    shutdown: CancellationToken,
}

/// Single-consumer priority queue of harvest jobs.
///
/// Cloning yields another handle to the same queue. The first job added to an
/// idle queue spawns a drain task on the current Tokio runtime; that task runs
/// jobs one at a time until nothing is pending.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<QueueInner>,
}

impl JobQueue {
    pub fn new(orchestrator: Arc<CollectionOrchestrator>, settings: QueueSettings) -> Self {
        let (events, _) = broadcast::channel(settings.event_capacity.max(1));
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState::new()),
                orchestrator,
                events,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Observe job events from now on. Events are delivered in the order the
    /// job table produced them.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.events.subscribe()
    }

    /// Queues a job and starts the drain if the queue was idle.
    /// Must be called from within a Tokio runtime.
    pub fn add_job(&self, target: JobTarget, options: HarvestOptions) -> JobId {
        let effects = self.apply(Msg::Submit {
            target,
            options,
            now: Utc::now(),
        });
        let mut job_id = 0;
        for effect in effects {
            match effect {
                Effect::Publish(JobEvent::JobAdded { job_id: id, target }) => {
                    harvest_info!("job {id} queued: {target}");
                    job_id = id;
                }
                Effect::StartDrain => self.spawn_drain(),
                _ => {}
            }
        }
        job_id
    }

    /// Cancels a job that has not been dispatched yet.
    pub fn cancel_job(&self, job_id: JobId) -> bool {
        let cancelled = self
            .apply(Msg::Cancel {
                job_id,
                now: Utc::now(),
            })
            .iter()
            .any(|effect| matches!(effect, Effect::Publish(JobEvent::JobCancelled { .. })));
        if cancelled {
            harvest_info!("job {job_id} cancelled");
        }
        cancelled
    }

    /// Cancels every queued job and returns how many there were.
    pub fn clear_queue(&self) -> usize {
        let count = self.apply(Msg::ClearPending { now: Utc::now() }).len();
        if count > 0 {
            harvest_info!("cleared {count} queued jobs");
        }
        count
    }

    /// Drops terminal jobs that finished more than `retention_hours` ago.
    pub fn cleanup_completed_jobs(&self, retention_hours: u32) -> usize {
        let effects = self.apply(Msg::Cleanup {
            retention: chrono::Duration::hours(i64::from(retention_hours)),
            now: Utc::now(),
        });
        effects
            .into_iter()
            .map(|effect| match effect {
                Effect::Purged { count } => count,
                _ => 0,
            })
            .sum()
    }

    pub fn job_status(&self, job_id: JobId) -> Option<Job> {
        self.lock().job(job_id).cloned()
    }

    pub fn queue_status(&self) -> QueueView {
        self.lock().view()
    }

    pub fn all_jobs(&self) -> Vec<Job> {
        self.lock().jobs().cloned().collect()
    }

    /// Cancels queued jobs and signals the running job to stop at its next
    /// channel boundary. The drain ends once the table has nothing left to run.
    pub fn shutdown(&self) {
        self.clear_queue();
        self.inner.shutdown.cancel();
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs one message through the job table. Events are broadcast while the
    /// table is still locked so concurrent callers cannot reorder them.
    fn apply(&self, msg: Msg) -> Vec<Effect> {
        let mut guard = self.lock();
        let state = std::mem::take(&mut *guard);
        let (next, effects) = update(state, msg);
        *guard = next;
        for effect in &effects {
            if let Effect::Publish(event) = effect {
                // No subscribers is fine.
                let _ = self.inner.events.send(event.clone());
            }
        }
        effects
    }

    fn spawn_drain(&self) {
        let queue = self.clone();
        tokio::spawn(async move { queue.drain().await });
    }

    async fn drain(&self) {
        harvest_info!("job queue drain started");
        loop {
            let effects = self.apply(Msg::DispatchNext { now: Utc::now() });
            let next = effects.into_iter().find_map(|effect| match effect {
                Effect::RunJob {
                    job_id,
                    target,
                    options,
                } => Some((job_id, target, options)),
                _ => None,
            });
            let Some((job_id, target, options)) = next else {
                break;
            };

            harvest_info!("job {job_id} started: {target}");
            let outcome = AssertUnwindSafe(self.run_job(job_id, &target, &options))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    Err(JobError::new(
                        ErrorKind::Internal,
                        "collection task panicked",
                    ))
                });
            let now = Utc::now();
            match outcome {
                Ok(result) => {
                    harvest_info!(
                        "job {job_id} completed: saved {}, duplicates {}, errors {}",
                        result.saved,
                        result.duplicates,
                        result.errors.len()
                    );
                    self.apply(Msg::Finished {
                        job_id,
                        result,
                        now,
                    });
                }
                Err(error) => {
                    harvest_error!("job {job_id} failed: {error}");
                    self.apply(Msg::Failed { job_id, error, now });
                }
            }
        }
        harvest_info!("job queue drained");
    }

    async fn run_job(
        &self,
        job_id: JobId,
        target: &JobTarget,
        options: &HarvestOptions,
    ) -> Result<CollectionResult, JobError> {
        self.progress(
            job_id,
            JobProgress::new(Stage::Fetching, FETCHING_PERCENT, format!("resolving {target}")),
        );
        let cancel = self.inner.shutdown.child_token();
        let sink = JobProgressSink {
            queue: self.clone(),
            job_id,
        };
        self.progress(
            job_id,
            JobProgress::new(Stage::BasicProcessing, BASIC_PERCENT, "harvesting channels"),
        );

        let orchestrator = &self.inner.orchestrator;
        let outcome = match target {
            JobTarget::Channel(channel_id) => {
                orchestrator
                    .collect_channels(std::slice::from_ref(channel_id), options, &cancel, &sink)
                    .await
            }
            JobTarget::Channels(channel_ids) => {
                orchestrator
                    .collect_channels(channel_ids, options, &cancel, &sink)
                    .await
            }
            JobTarget::Group(group_id) => {
                orchestrator
                    .collect_group(group_id, options, &cancel, &sink)
                    .await
            }
        };
        let mut result = outcome.map_err(|err| JobError::new(err.kind(), err.to_string()))?;
        if result.quota_exhausted {
            harvest_warn!("job {job_id} stopped early: quota exhausted");
        }

        if options.detailed {
            self.progress(
                job_id,
                JobProgress::new(
                    Stage::DetailedProcessing,
                    DETAILED_PERCENT,
                    "computing collection statistics",
                ),
            );
            result.stats = Some(CollectionStats::from_result(&result));
        }
        Ok(result)
    }

    fn progress(&self, job_id: JobId, progress: JobProgress) {
        self.apply(Msg::Progress { job_id, progress });
    }
}

/// Maps channel checkpoints onto the span between basic processing and the
/// detailed checkpoint.
struct JobProgressSink {
    queue: JobQueue,
    job_id: JobId,
}

impl ProgressSink for JobProgressSink {
    fn emit(&self, progress: ChannelProgress) {
        let total = progress.total.max(1);
        let span = usize::from(CHANNELS_DONE_PERCENT - BASIC_PERCENT);
        let step = (span * progress.completed.min(total) / total) as u8;
        self.queue.progress(
            self.job_id,
            JobProgress::new(
                Stage::BasicProcessing,
                BASIC_PERCENT + step,
                format!(
                    "harvested {}/{} channels ({})",
                    progress.completed, progress.total, progress.channel_id
                ),
            ),
        );
    }
}
