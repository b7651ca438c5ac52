use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use harvest_logging::{harvest_debug, harvest_warn};
use harvester_core::{CandidateFilter, HarvestWindow, VideoCandidate};

use crate::provider::{parse_video_item, SearchQuery, VideoProvider};
use crate::{HarvestError, ProviderError, QuotaLedger};

/// Largest page the provider serves for either call.
pub const MAX_PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone)]
pub struct HarvestSettings {
    pub search_cost: u32,
    pub details_cost: u32,
    pub max_search_results: u32,
    pub details_batch_size: usize,
    /// Upper bound on one provider call, on top of the HTTP client's own timeouts.
    pub call_timeout: Duration,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            search_cost: 100,
            details_cost: 1,
            max_search_results: MAX_PAGE_SIZE,
            details_batch_size: MAX_PAGE_SIZE as usize,
            call_timeout: Duration::from_secs(45),
        }
    }
}

/// Outcome of harvesting one channel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelHarvest {
    pub channel_id: String,
    /// Filter survivors, in provider order.
    pub videos: Vec<VideoCandidate>,
    /// Detail items parsed before filtering.
    pub total_found: usize,
    pub quota_used: u32,
}

/// Searches one channel, fetches details and applies the candidate filter,
/// reserving quota ahead of every provider call.
pub struct ChannelHarvester {
    provider: Arc<dyn VideoProvider>,
    ledger: Arc<QuotaLedger>,
    settings: HarvestSettings,
}

impl ChannelHarvester {
    pub fn new(
        provider: Arc<dyn VideoProvider>,
        ledger: Arc<QuotaLedger>,
        mut settings: HarvestSettings,
    ) -> Self {
        settings.max_search_results = settings.max_search_results.clamp(1, MAX_PAGE_SIZE);
        settings.details_batch_size = settings.details_batch_size.clamp(1, MAX_PAGE_SIZE as usize);
        Self {
            provider,
            ledger,
            settings,
        }
    }

    pub fn ledger(&self) -> &Arc<QuotaLedger> {
        &self.ledger
    }

    pub async fn collect_channel_trending(
        &self,
        channel_id: &str,
        window: &HarvestWindow,
        filter: &CandidateFilter,
    ) -> Result<ChannelHarvest, HarvestError> {
        let mut harvest = ChannelHarvest {
            channel_id: channel_id.to_string(),
            ..ChannelHarvest::default()
        };

        self.reserve(self.settings.search_cost)?;
        harvest.quota_used += self.settings.search_cost;
        let query = SearchQuery {
            channel_id: channel_id.to_string(),
            published_after: window.start(),
            published_before: window.end(),
            max_results: self.settings.max_search_results,
        };
        let hits = self.call(self.provider.search(&query)).await?;

        let mut seen = HashSet::new();
        let ids: Vec<String> = hits
            .into_iter()
            .map(|hit| hit.video_id)
            .filter(|id| seen.insert(id.clone()))
            .collect();
        harvest_debug!("channel {channel_id}: search returned {} videos", ids.len());
        if ids.is_empty() {
            return Ok(harvest);
        }

        let mut details = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(self.settings.details_batch_size) {
            self.reserve(self.settings.details_cost)?;
            harvest.quota_used += self.settings.details_cost;
            details.extend(self.call(self.provider.batch_details(chunk)).await?);
        }

        let candidates: Vec<VideoCandidate> = details.iter().filter_map(parse_video_item).collect();
        if candidates.len() < details.len() {
            harvest_warn!(
                "channel {channel_id}: skipped {} unparseable detail items",
                details.len() - candidates.len()
            );
        }
        harvest.total_found = candidates.len();
        harvest.videos = candidates
            .into_iter()
            .filter(|candidate| window.contains(candidate.published_at) && filter.accepts(candidate))
            .collect();
        harvest_debug!(
            "channel {channel_id}: {} of {} candidates passed filters",
            harvest.videos.len(),
            harvest.total_found
        );
        Ok(harvest)
    }

    fn reserve(&self, cost: u32) -> Result<(), HarvestError> {
        if self.ledger.reserve(cost) {
            Ok(())
        } else {
            Err(HarvestError::QuotaExceeded {
                requested: cost,
                remaining: self.ledger.remaining(),
            })
        }
    }

    async fn call<T>(
        &self,
        request: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, HarvestError> {
        match tokio::time::timeout(self.settings.call_timeout, request).await {
            Ok(outcome) => outcome.map_err(HarvestError::from),
            Err(_) => Err(HarvestError::TransientNetwork(format!(
                "provider call exceeded {}ms",
                self.settings.call_timeout.as_millis()
            ))),
        }
    }
}
