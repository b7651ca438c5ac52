use std::sync::Arc;

use anyhow::{bail, Context};
use harvest_logging::{harvest_info, harvest_warn};
use harvester_core::{normalize_channel_ids, JobEvent, JobId, JobTarget};
use harvester_engine::{
    spawn_daily_reset, ChannelDirectory, ChannelHarvester, CollectionOrchestrator, FileVideoStore,
    JobQueue, QueueSettings, QuotaLedger, StaticChannelDirectory, YouTubeProvider,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;

use crate::cli::CollectArgs;
use crate::config::HarvesterConfig;
use crate::history::{self, RunSummary};

/// Queues the requested jobs and reports until they have all finished.
pub async fn collect(config: &HarvesterConfig, args: &CollectArgs) -> anyhow::Result<()> {
    let directory = Arc::new(StaticChannelDirectory::new(config.groups.clone()));
    let targets = resolve_targets(args, directory.as_ref()).await?;
    if targets.is_empty() {
        bail!("nothing to collect: pass --channel, --group or --all-groups");
    }

    let provider = Arc::new(YouTubeProvider::new(config.provider_settings(config.api_key()?))?);
    let ledger = Arc::new(QuotaLedger::new(config.quota));
    let store = Arc::new(
        FileVideoStore::open(config.data_dir.clone())
            .with_context(|| format!("opening video store in {}", config.data_dir.display()))?,
    );
    let harvester = ChannelHarvester::new(provider, ledger.clone(), config.harvest_settings());
    let orchestrator = Arc::new(CollectionOrchestrator::new(
        harvester,
        store,
        directory,
        config.collection_settings(),
    ));
    let queue = JobQueue::new(orchestrator, QueueSettings::default());

    let shutdown = CancellationToken::new();
    let reset_task = spawn_daily_reset(ledger.clone(), shutdown.clone());
    let mut events = queue.subscribe();

    let options = args.options();
    let job_ids: Vec<JobId> = targets
        .into_iter()
        .map(|target| queue.add_job(target, options.clone()))
        .collect();

    let follow = follow_events(&mut events, || all_finished(&queue, &job_ids));
    tokio::pin!(follow);
    loop {
        tokio::select! {
            _ = &mut follow => break,
            _ = tokio::signal::ctrl_c() => {
                harvest_warn!("interrupted; stopping after the current channel");
                queue.shutdown();
            }
        }
    }

    let summaries: Vec<RunSummary> = job_ids
        .iter()
        .filter_map(|id| queue.job_status(*id))
        .filter_map(|job| RunSummary::from_job(&job))
        .collect();
    for summary in &summaries {
        print_summary(summary);
    }
    if let Err(err) = history::record(&config.data_dir, &summaries) {
        harvest_warn!("{err:#}");
    }

    let quota = ledger.snapshot();
    println!(
        "quota: {}/{} units used ({:.1}%), {} left before the safety margin",
        quota.used, quota.limit, quota.usage_percent, quota.remaining
    );

    shutdown.cancel();
    let _ = reset_task.await;
    Ok(())
}

/// Prints the newest `limit` runs, newest last.
pub fn show_history(config: &HarvesterConfig, limit: usize) {
    let runs = history::load(&config.data_dir);
    if runs.is_empty() {
        println!("no runs recorded in {}", config.data_dir.display());
        return;
    }
    let skip = runs.len().saturating_sub(limit);
    for run in &runs[skip..] {
        print_summary(run);
    }
}

pub fn show_groups(config: &HarvesterConfig) {
    if config.groups.is_empty() {
        println!("no channel groups configured");
        return;
    }
    let runs = history::load(&config.data_dir);
    for group in &config.groups {
        let last = history::last_collected(&runs, &group.id)
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{:<16} {:<24} {:>3} channels  {:<8} last collected {last}",
            group.id,
            group.name,
            group.channels.len(),
            if group.active { "active" } else { "inactive" },
        );
    }
}

async fn resolve_targets(
    args: &CollectArgs,
    directory: &dyn ChannelDirectory,
) -> anyhow::Result<Vec<JobTarget>> {
    let mut targets = Vec::new();

    if !args.channels.is_empty() {
        let mut channels = normalize_channel_ids(&args.channels);
        match channels.len() {
            0 => bail!("none of the given channels is a channel id or channel URL"),
            1 => targets.push(JobTarget::Channel(channels.remove(0))),
            _ => targets.push(JobTarget::Channels(channels)),
        }
    }

    targets.extend(args.groups.iter().cloned().map(JobTarget::Group));

    if args.all_groups {
        let active = directory
            .active_groups()
            .await
            .context("listing active channel groups")?;
        harvest_info!("queueing {} active groups", active.len());
        targets.extend(active.into_iter().map(|group| JobTarget::Group(group.id)));
    }
    Ok(targets)
}

/// Prints events until `finished` holds. It is checked on every
/// `QueueCompleted` and after a lag, since the lag may have dropped it.
async fn follow_events(
    events: &mut broadcast::Receiver<JobEvent>,
    finished: impl Fn() -> bool,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                print_event(&event);
                if event == JobEvent::QueueCompleted && finished() {
                    return;
                }
            }
            Err(RecvError::Lagged(missed)) => {
                harvest_warn!("missed {missed} job events");
                if finished() {
                    return;
                }
            }
            Err(RecvError::Closed) => return,
        }
    }
}

fn all_finished(queue: &JobQueue, job_ids: &[JobId]) -> bool {
    job_ids.iter().all(|id| {
        queue
            .job_status(*id)
            .is_none_or(|job| job.status.is_terminal())
    })
}

fn print_event(event: &JobEvent) {
    match event {
        JobEvent::JobAdded { job_id, target } => println!("[job {job_id}] queued: {target}"),
        JobEvent::JobStarted { job_id } => println!("[job {job_id}] started"),
        JobEvent::JobProgress { job_id, progress } => {
            println!("[job {job_id}] {:>3}% {}", progress.current, progress.message)
        }
        JobEvent::JobCompleted { job_id, result } => {
            for error in &result.errors {
                println!("[job {job_id}] error: {error}");
            }
            println!("[job {job_id}] completed");
        }
        JobEvent::JobFailed { job_id, error } => println!("[job {job_id}] failed: {error}"),
        JobEvent::JobCancelled { job_id } => println!("[job {job_id}] cancelled"),
        JobEvent::QueueCompleted => {}
    }
}

fn print_summary(run: &RunSummary) {
    let mut line = format!(
        "{} job {} ({}): {}, {}/{} channels, found {}, saved {}, duplicates {}, quota {}",
        run.finished_at.format("%Y-%m-%d %H:%M"),
        run.job_id,
        run.target,
        run.status,
        run.channels_processed,
        run.channels_total,
        run.found,
        run.saved,
        run.duplicates,
        run.quota_used
    );
    if run.quota_exhausted {
        line.push_str(", quota exhausted");
    }
    if run.channel_errors > 0 {
        line.push_str(&format!(", {} channel errors", run.channel_errors));
    }
    if let Some(error) = &run.error {
        line.push_str(&format!(", {error}"));
    }
    println!("{line}");
}
