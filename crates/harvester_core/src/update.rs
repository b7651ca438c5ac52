use crate::{Effect, JobError, JobEvent, JobStatus, Msg, QueueState};

/// Pure update function: applies a message to the job table and returns any effects.
pub fn update(mut state: QueueState, msg: Msg) -> (QueueState, Vec<Effect>) {
    let effects = match msg {
        Msg::Submit {
            target,
            options,
            now,
        } => {
            let job_id = state.insert_job(target.clone(), options, now);
            let mut effects = vec![Effect::Publish(JobEvent::JobAdded { job_id, target })];
            if state.claim_drain() {
                effects.push(Effect::StartDrain);
            }
            effects
        }
        Msg::Cancel { job_id, now } => {
            if state.cancel_queued(job_id, now) {
                vec![Effect::Publish(JobEvent::JobCancelled { job_id })]
            } else {
                Vec::new()
            }
        }
        Msg::ClearPending { now } => state
            .pending_ids()
            .into_iter()
            .filter(|job_id| state.cancel_queued(*job_id, now))
            .map(|job_id| Effect::Publish(JobEvent::JobCancelled { job_id }))
            .collect(),
        Msg::DispatchNext { now } => {
            if state.current().is_some() {
                // One job at a time; the running job must finish first.
                Vec::new()
            } else {
                match state.dispatch_next(now) {
                    Some(job) => vec![
                        Effect::Publish(JobEvent::JobStarted { job_id: job.id }),
                        Effect::RunJob {
                            job_id: job.id,
                            target: job.target.clone(),
                            options: job.options.clone(),
                        },
                    ],
                    None => {
                        state.release_drain();
                        vec![Effect::Publish(JobEvent::QueueCompleted)]
                    }
                }
            }
        }
        Msg::Progress { job_id, progress } => {
            if state.apply_progress(job_id, progress.clone()) {
                vec![Effect::Publish(JobEvent::JobProgress { job_id, progress })]
            } else {
                Vec::new()
            }
        }
        Msg::Finished {
            job_id,
            result,
            now,
        } => finish(&mut state, job_id, Ok(result), now),
        Msg::Failed { job_id, error, now } => finish(&mut state, job_id, Err(error), now),
        Msg::Cleanup { retention, now } => {
            let count = match now.checked_sub_signed(retention) {
                Some(cutoff) => state.purge_terminal_before(cutoff),
                None => 0,
            };
            vec![Effect::Purged { count }]
        }
    };

    (state, effects)
}

fn finish(
    state: &mut QueueState,
    job_id: crate::JobId,
    outcome: Result<crate::CollectionResult, JobError>,
    now: chrono::DateTime<chrono::Utc>,
) -> Vec<Effect> {
    let Some(job) = state.finish(job_id, outcome, now) else {
        return Vec::new();
    };
    let progress = Effect::Publish(JobEvent::JobProgress {
        job_id,
        progress: job.progress.clone(),
    });
    let terminal = match (job.status, &job.result, &job.error) {
        (JobStatus::Completed, Some(result), _) => JobEvent::JobCompleted {
            job_id,
            result: Box::new(result.clone()),
        },
        (_, _, Some(error)) => JobEvent::JobFailed {
            job_id,
            error: error.clone(),
        },
        _ => return vec![progress],
    };
    vec![progress, Effect::Publish(terminal)]
}
