use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use harvest_logging::{harvest_debug, harvest_info, harvest_warn};
use harvester_core::{
    normalize_channel_ids, CandidateFilter, ChannelError, CollectionResult, ErrorKind,
    HarvestOptions, HarvestWindow, VideoCandidate,
};
use tokio_util::sync::CancellationToken;

use crate::{
    ChannelDirectory, ChannelHarvester, ChannelProgress, DedupGate, DedupPolicy, DedupScope,
    HarvestError, ProgressSink, StoredVideo, VideoStore,
};

#[derive(Debug, Clone)]
pub struct CollectionSettings {
    /// Pause between consecutive channels of one run.
    pub inter_channel_delay: Duration,
    pub dedup_policy: DedupPolicy,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            inter_channel_delay: Duration::from_millis(100),
            dedup_policy: DedupPolicy::Global,
        }
    }
}

/// What a run records alongside each saved video.
#[derive(Debug, Default)]
struct RunContext {
    group_id: Option<String>,
    keywords: Vec<String>,
}

/// Fans the harvester out over a channel set, one channel at a time.
pub struct CollectionOrchestrator {
    harvester: ChannelHarvester,
    gate: DedupGate,
    store: Arc<dyn VideoStore>,
    directory: Arc<dyn ChannelDirectory>,
    settings: CollectionSettings,
}

impl CollectionOrchestrator {
    pub fn new(
        harvester: ChannelHarvester,
        store: Arc<dyn VideoStore>,
        directory: Arc<dyn ChannelDirectory>,
        settings: CollectionSettings,
    ) -> Self {
        Self {
            harvester,
            gate: DedupGate::new(store.clone()),
            store,
            directory,
            settings,
        }
    }

    pub async fn collect_group(
        &self,
        group_id: &str,
        options: &HarvestOptions,
        cancel: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> Result<CollectionResult, HarvestError> {
        let group = self
            .directory
            .group(group_id)
            .await?
            .ok_or_else(|| HarvestError::Validation(format!("unknown channel group {group_id}")))?;
        let channels = normalize_channel_ids(&group.channels);
        harvest_info!(
            "collecting group {} ({}) with {} channels",
            group.id,
            group.name,
            channels.len()
        );
        let context = RunContext {
            group_id: Some(group.id.clone()),
            keywords: group.keywords.clone(),
        };
        let result = self.run(channels, options, context, cancel, sink).await?;

        if let Err(err) = self.directory.mark_collected(&group.id, Utc::now()).await {
            harvest_warn!("could not record collection time for group {}: {err}", group.id);
        }
        Ok(result)
    }

    pub async fn collect_channels(
        &self,
        channel_ids: &[String],
        options: &HarvestOptions,
        cancel: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> Result<CollectionResult, HarvestError> {
        let channels = normalize_channel_ids(channel_ids);
        harvest_info!("collecting {} channels", channels.len());
        self.run(channels, options, RunContext::default(), cancel, sink)
            .await
    }

    async fn run(
        &self,
        channels: Vec<String>,
        options: &HarvestOptions,
        context: RunContext,
        cancel: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> Result<CollectionResult, HarvestError> {
        if channels.is_empty() {
            return Err(HarvestError::Validation("no channels to collect".to_string()));
        }
        let window = options.window.resolve(Utc::now())?;
        let filter = CandidateFilter::from_options(options);
        let batch_id = options
            .batch_id
            .clone()
            .unwrap_or_else(|| format!("batch_{}", Utc::now().timestamp_millis()));
        let scope = self.settings.dedup_policy.scope_for(&batch_id);
        harvest_debug!(
            "batch {batch_id}: window {} .. {}, dedup scope {scope:?}",
            window.start(),
            window.end()
        );

        let mut result = CollectionResult {
            batch_id: Some(batch_id),
            group_id: context.group_id.clone(),
            window: Some(window),
            channels_total: channels.len(),
            ..CollectionResult::default()
        };

        for (index, channel_id) in channels.iter().enumerate() {
            let proceed = if index == 0 {
                !cancel.is_cancelled()
            } else {
                self.pause_between_channels(cancel).await
            };
            if !proceed {
                harvest_info!("collection cancelled before channel {channel_id}");
                result.cancelled = true;
                break;
            }

            let quota_exhausted = self
                .collect_one(channel_id, &window, &filter, &scope, &context, &mut result)
                .await;
            sink.emit(ChannelProgress {
                channel_id: channel_id.clone(),
                completed: index + 1,
                total: channels.len(),
            });
            if quota_exhausted {
                result.quota_exhausted = true;
                let skipped = channels.len() - index - 1;
                harvest_warn!("quota exhausted at channel {channel_id}; {skipped} channels skipped");
                break;
            }
        }

        harvest_info!(
            "batch {}: {}/{} channels, scanned {}, found {}, saved {}, duplicates {}, errors {}, quota {}",
            result.batch_id.as_deref().unwrap_or_default(),
            result.channels_processed,
            result.channels_total,
            result.scanned,
            result.found,
            result.saved,
            result.duplicates,
            result.errors.len(),
            result.quota_used
        );
        self.harvester.ledger().log_usage();
        Ok(result)
    }

    /// Harvests and persists one channel. Returns true when the quota ran out.
    async fn collect_one(
        &self,
        channel_id: &str,
        window: &HarvestWindow,
        filter: &CandidateFilter,
        scope: &DedupScope,
        context: &RunContext,
        result: &mut CollectionResult,
    ) -> bool {
        let ledger = self.harvester.ledger();
        let used_before = ledger.used();
        match self
            .harvester
            .collect_channel_trending(channel_id, window, filter)
            .await
        {
            Ok(harvest) => {
                result.channels_processed += 1;
                result.scanned += harvest.total_found;
                result.found += harvest.videos.len();
                result.quota_used += harvest.quota_used;
                for candidate in harvest.videos {
                    self.persist_candidate(candidate, scope, context, result)
                        .await;
                }
                false
            }
            Err(err) => {
                // Failed calls keep their reservation; count whatever was spent.
                result.quota_used += ledger.used().saturating_sub(used_before);
                harvest_warn!("channel {channel_id} failed: {err}");
                result.errors.push(ChannelError {
                    channel_id: channel_id.to_string(),
                    video_id: None,
                    kind: err.kind(),
                    message: err.to_string(),
                });
                matches!(err, HarvestError::QuotaExceeded { .. })
            }
        }
    }

    async fn persist_candidate(
        &self,
        candidate: VideoCandidate,
        scope: &DedupScope,
        context: &RunContext,
        result: &mut CollectionResult,
    ) {
        let persistence_error = |candidate: &VideoCandidate, message: String| ChannelError {
            channel_id: candidate.channel_id.clone(),
            video_id: Some(candidate.video_id.clone()),
            kind: ErrorKind::Persistence,
            message,
        };

        match self.gate.exists(&candidate.video_id, scope).await {
            Ok(true) => {
                harvest_debug!("skipping duplicate video {}", candidate.video_id);
                result.duplicates += 1;
                return;
            }
            Ok(false) => {}
            Err(err) => {
                harvest_warn!("dedup lookup failed for video {}: {err}", candidate.video_id);
                result.errors.push(persistence_error(&candidate, err.to_string()));
                return;
            }
        }

        let record = StoredVideo {
            candidate,
            batch_id: result.batch_id.clone(),
            group_id: context.group_id.clone(),
            keywords: context.keywords.clone(),
            collected_at: Utc::now(),
        };
        match self.store.save(record.clone()).await {
            Ok(stored) => {
                result.saved += 1;
                result.saved_videos.push(stored.candidate);
            }
            Err(err) => {
                harvest_warn!("saving video {} failed: {err}", record.candidate.video_id);
                result
                    .errors
                    .push(persistence_error(&record.candidate, err.to_string()));
            }
        }
    }

    /// Returns false when `cancel` fired during the pause.
    async fn pause_between_channels(&self, cancel: &CancellationToken) -> bool {
        let delay = self.settings.inter_channel_delay;
        if delay.is_zero() {
            return !cancel.is_cancelled();
        }
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}
