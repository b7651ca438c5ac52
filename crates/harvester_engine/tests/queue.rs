mod common;

use std::sync::Arc;
use std::time::Duration;

use harvester_core::{
    ErrorKind, HarvestOptions, JobEvent, JobId, JobStatus, JobTarget, Priority, Stage,
};
use harvester_engine::{DedupPolicy, JobQueue, MemoryVideoStore, QueueSettings};
use pretty_assertions::assert_eq;
use tokio::sync::{broadcast, Notify};

use common::{fixture, group, init_logging, permissive_options, quota, video_item, FakeProvider};

fn queue_with(provider: FakeProvider) -> JobQueue {
    let fx = fixture(
        provider,
        Arc::new(MemoryVideoStore::new()),
        quota(10_000, 500),
        vec![group("news", &["UC1", "UC2"])],
        DedupPolicy::Global,
    );
    JobQueue::new(fx.orchestrator, QueueSettings::default())
}

fn provider() -> FakeProvider {
    FakeProvider::new()
        .with_videos("UC1", vec![video_item("a", "UC1", 40_000, "PT30S")])
        .with_videos("UC2", vec![video_item("b", "UC2", 40_000, "PT5M")])
}

/// Collects events until the queue reports it has drained.
async fn drain_events(events: &mut broadcast::Receiver<JobEvent>) -> Vec<JobEvent> {
    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("queue should drain")
            .expect("event stream open");
        let done = event == JobEvent::QueueCompleted;
        seen.push(event);
        if done {
            return seen;
        }
    }
}

async fn wait_until_started(events: &mut broadcast::Receiver<JobEvent>, job_id: JobId) {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("job should start")
            .unwrap();
        if event == (JobEvent::JobStarted { job_id }) {
            return;
        }
    }
}

fn started_order(events: &[JobEvent]) -> Vec<JobId> {
    events
        .iter()
        .filter_map(|event| match event {
            JobEvent::JobStarted { job_id } => Some(*job_id),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn job_runs_through_every_checkpoint() {
    init_logging();
    let queue = queue_with(provider());
    let mut events = queue.subscribe();

    let job_id = queue.add_job(
        JobTarget::Channels(vec!["UC1".to_string(), "UC2".to_string()]),
        permissive_options(),
    );
    let seen = drain_events(&mut events).await;

    assert_eq!(seen.first(), Some(&JobEvent::JobAdded {
        job_id,
        target: JobTarget::Channels(vec!["UC1".to_string(), "UC2".to_string()]),
    }));
    assert_eq!(seen[1], JobEvent::JobStarted { job_id });

    let progress: Vec<(Stage, u8)> = seen
        .iter()
        .filter_map(|event| match event {
            JobEvent::JobProgress { progress, .. } => Some((progress.stage, progress.current)),
            _ => None,
        })
        .collect();
    assert_eq!(
        progress,
        vec![
            (Stage::Fetching, 10),
            (Stage::BasicProcessing, 30),
            (Stage::BasicProcessing, 57),
            (Stage::BasicProcessing, 85),
            (Stage::DetailedProcessing, 90),
            (Stage::Completed, 100),
        ]
    );

    let job = queue.job_status(job_id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    let result = job.result.unwrap();
    assert_eq!(result.saved, 2);
    let stats = result.stats.expect("detailed run computes stats");
    assert_eq!(stats.total_views, 80_000);
    assert!(!queue.queue_status().is_processing);
}

#[tokio::test]
async fn high_priority_job_overtakes_queued_normal_jobs() {
    init_logging();
    let release = Arc::new(Notify::new());
    let queue = queue_with(provider().holding("UC1", release.clone()));
    let mut events = queue.subscribe();

    let running = queue.add_job(JobTarget::Channel("UC1".to_string()), permissive_options());
    wait_until_started(&mut events, running).await;

    let normal = queue.add_job(JobTarget::Channel("UC2".to_string()), permissive_options());
    let high = queue.add_job(
        JobTarget::Channels(vec!["UC2".to_string()]),
        HarvestOptions {
            batch_id: Some("urgent".to_string()),
            ..permissive_options()
        }
        .with_priority(Priority::High),
    );

    let status = queue.queue_status();
    assert_eq!(status.current.map(|row| row.job_id), Some(running));
    assert_eq!(status.queue_length, 2);

    release.notify_one();
    let seen = drain_events(&mut events).await;
    assert_eq!(started_order(&seen), vec![high, normal]);
    assert_eq!(queue.job_status(running).unwrap().status, JobStatus::Completed);
}

#[tokio::test]
async fn cancel_works_only_before_dispatch() {
    init_logging();
    let release = Arc::new(Notify::new());
    let queue = queue_with(provider().holding("UC1", release.clone()));
    let mut events = queue.subscribe();

    let running = queue.add_job(JobTarget::Channel("UC1".to_string()), permissive_options());
    wait_until_started(&mut events, running).await;
    let queued = queue.add_job(JobTarget::Channel("UC2".to_string()), permissive_options());

    assert!(!queue.cancel_job(running));
    assert!(queue.cancel_job(queued));
    assert!(!queue.cancel_job(queued));
    assert!(!queue.cancel_job(999));

    release.notify_one();
    let seen = drain_events(&mut events).await;
    assert!(!started_order(&seen).contains(&queued));
    assert_eq!(queue.job_status(queued).unwrap().status, JobStatus::Cancelled);
    assert_eq!(queue.job_status(running).unwrap().status, JobStatus::Completed);
}

#[tokio::test]
async fn validation_failure_marks_the_job_failed() {
    init_logging();
    let queue = queue_with(provider());
    let mut events = queue.subscribe();

    let job_id = queue.add_job(JobTarget::Channels(Vec::new()), permissive_options());
    let seen = drain_events(&mut events).await;

    let job = queue.job_status(job_id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_ref().map(|e| e.kind), Some(ErrorKind::Validation));
    assert_eq!(job.progress.stage, Stage::Error);
    assert_eq!(job.progress.current, 100);
    assert!(seen
        .iter()
        .any(|event| matches!(event, JobEvent::JobFailed { job_id: id, .. } if *id == job_id)));
}

#[tokio::test]
async fn clear_queue_and_cleanup_maintain_the_table() {
    init_logging();
    let release = Arc::new(Notify::new());
    let queue = queue_with(provider().holding("UC1", release.clone()));
    let mut events = queue.subscribe();

    let running = queue.add_job(JobTarget::Channel("UC1".to_string()), permissive_options());
    wait_until_started(&mut events, running).await;
    queue.add_job(JobTarget::Channel("UC2".to_string()), permissive_options());
    queue.add_job(JobTarget::Group("news".to_string()), permissive_options());

    assert_eq!(queue.clear_queue(), 2);
    assert_eq!(queue.queue_status().queue_length, 0);

    release.notify_one();
    drain_events(&mut events).await;
    assert_eq!(queue.all_jobs().len(), 3);

    // Everything just finished, so a one-hour horizon keeps it all.
    assert_eq!(queue.cleanup_completed_jobs(1), 0);
    assert_eq!(queue.cleanup_completed_jobs(0), 3);
    assert!(queue.all_jobs().is_empty());
}

#[tokio::test]
async fn queue_restarts_after_draining() {
    init_logging();
    let queue = queue_with(provider());
    let mut events = queue.subscribe();

    let first = queue.add_job(JobTarget::Channel("UC1".to_string()), permissive_options());
    drain_events(&mut events).await;
    let second = queue.add_job(JobTarget::Channel("UC2".to_string()), permissive_options());
    let seen = drain_events(&mut events).await;

    assert_eq!(started_order(&seen), vec![second]);
    assert_eq!(queue.job_status(first).unwrap().status, JobStatus::Completed);
    assert_eq!(queue.job_status(second).unwrap().status, JobStatus::Completed);
}
