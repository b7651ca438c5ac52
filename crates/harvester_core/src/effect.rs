use crate::{HarvestOptions, JobEvent, JobId, JobTarget};

/// Side effects requested by [`crate::update`]; executed by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// No drain loop is running; start one.
    StartDrain,
    /// Hand the dispatched job to the collection orchestrator.
    RunJob {
        job_id: JobId,
        target: JobTarget,
        options: HarvestOptions,
    },
    /// Deliver an event to subscribers.
    Publish(JobEvent),
    /// Result of a retention sweep.
    Purged { count: usize },
}
