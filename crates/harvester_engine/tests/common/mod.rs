#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use chrono::{DateTime, Utc};
use harvester_core::HarvestOptions;
use harvester_engine::{
    ChannelGroup, ChannelHarvester, ChannelProgress, CollectionOrchestrator, CollectionSettings,
    DedupPolicy, DedupScope, HarvestSettings, MemoryVideoStore, ProgressSink, ProviderError,
    QuotaLedger, QuotaSettings, SearchHit, SearchQuery, StaticChannelDirectory, StoreError,
    StoredVideo, VideoProvider, VideoStore,
};
use serde_json::{json, Value};
use tokio::sync::Notify;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(harvest_logging::initialize_for_tests);
}

pub fn hours_ago(hours: i64) -> DateTime<Utc> {
    Utc::now() - chrono::Duration::hours(hours)
}

/// A `videos` detail item as the provider returns it.
pub fn video_item(id: &str, channel: &str, views: u64, duration: &str) -> Value {
    video_item_at(id, channel, views, duration, hours_ago(6))
}

pub fn video_item_at(
    id: &str,
    channel: &str,
    views: u64,
    duration: &str,
    published_at: DateTime<Utc>,
) -> Value {
    json!({
        "id": id,
        "snippet": {
            "channelId": channel,
            "channelTitle": format!("Channel {channel}"),
            "title": format!("Video {id}"),
            "description": "",
            "publishedAt": published_at.to_rfc3339(),
            "tags": []
        },
        "statistics": {
            "viewCount": views.to_string(),
            "likeCount": "10",
            "commentCount": "2"
        },
        "contentDetails": { "duration": duration }
    })
}

/// Scripted provider. Channels without a script return no videos.
#[derive(Default)]
pub struct FakeProvider {
    videos: HashMap<String, Vec<Value>>,
    failures: HashMap<String, ProviderError>,
    held: HashMap<String, Arc<Notify>>,
    search_delay: Option<Duration>,
    searches: Mutex<Vec<String>>,
    detail_batches: Mutex<Vec<Vec<String>>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_videos(mut self, channel: &str, items: Vec<Value>) -> Self {
        self.videos.insert(channel.to_string(), items);
        self
    }

    pub fn with_failure(mut self, channel: &str, error: ProviderError) -> Self {
        self.failures.insert(channel.to_string(), error);
        self
    }

    /// Searches of `channel` wait until `release` is notified.
    pub fn holding(mut self, channel: &str, release: Arc<Notify>) -> Self {
        self.held.insert(channel.to_string(), release);
        self
    }

    pub fn with_search_delay(mut self, delay: Duration) -> Self {
        self.search_delay = Some(delay);
        self
    }

    pub fn searches(&self) -> Vec<String> {
        self.searches.lock().unwrap().clone()
    }

    pub fn detail_batches(&self) -> Vec<Vec<String>> {
        self.detail_batches.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl VideoProvider for FakeProvider {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, ProviderError> {
        self.searches.lock().unwrap().push(query.channel_id.clone());
        if let Some(release) = self.held.get(&query.channel_id) {
            release.notified().await;
        }
        if let Some(delay) = self.search_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.failures.get(&query.channel_id) {
            return Err(error.clone());
        }
        Ok(self
            .videos
            .get(&query.channel_id)
            .map(|items| {
                items
                    .iter()
                    .map(|item| SearchHit {
                        video_id: item["id"].as_str().unwrap().to_string(),
                        published_at: None,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn batch_details(&self, video_ids: &[String]) -> Result<Vec<Value>, ProviderError> {
        self.detail_batches.lock().unwrap().push(video_ids.to_vec());
        let wanted: HashSet<&String> = video_ids.iter().collect();
        Ok(self
            .videos
            .values()
            .flatten()
            .filter(|item| {
                item["id"]
                    .as_str()
                    .is_some_and(|id| wanted.contains(&id.to_string()))
            })
            .cloned()
            .collect())
    }
}

/// Store whose saves fail for the listed video ids.
pub struct FlakyStore {
    inner: MemoryVideoStore,
    failing: HashSet<String>,
}

impl FlakyStore {
    pub fn new(failing: &[&str]) -> Self {
        Self {
            inner: MemoryVideoStore::new(),
            failing: failing.iter().map(|id| id.to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

#[async_trait::async_trait]
impl VideoStore for FlakyStore {
    async fn find_by_external_id(
        &self,
        video_id: &str,
        scope: &DedupScope,
    ) -> Result<Option<StoredVideo>, StoreError> {
        self.inner.find_by_external_id(video_id, scope).await
    }

    async fn save(&self, record: StoredVideo) -> Result<StoredVideo, StoreError> {
        if self.failing.contains(record.video_id()) {
            return Err(StoreError::Backend("write rejected".to_string()));
        }
        self.inner.save(record).await
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ChannelProgress>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ChannelProgress> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, progress: ChannelProgress) {
        self.events.lock().unwrap().push(progress);
    }
}

/// Options that accept every candidate in the default window.
pub fn permissive_options() -> HarvestOptions {
    HarvestOptions {
        min_views: 0,
        ..HarvestOptions::default()
    }
}

pub fn quota(daily_limit: u32, safety_margin: u32) -> QuotaSettings {
    QuotaSettings {
        daily_limit,
        safety_margin,
    }
}

pub fn group(id: &str, channels: &[&str]) -> ChannelGroup {
    ChannelGroup {
        id: id.to_string(),
        name: format!("Group {id}"),
        channels: channels.iter().map(|c| c.to_string()).collect(),
        keywords: vec!["trending".to_string()],
        active: true,
        last_collected_at: None,
    }
}

pub struct Fixture {
    pub provider: Arc<FakeProvider>,
    pub ledger: Arc<QuotaLedger>,
    pub directory: Arc<StaticChannelDirectory>,
    pub orchestrator: Arc<CollectionOrchestrator>,
}

pub fn fixture(
    provider: FakeProvider,
    store: Arc<dyn VideoStore>,
    quota: QuotaSettings,
    groups: Vec<ChannelGroup>,
    dedup_policy: DedupPolicy,
) -> Fixture {
    let provider = Arc::new(provider);
    let ledger = Arc::new(QuotaLedger::new(quota));
    let directory = Arc::new(StaticChannelDirectory::new(groups));
    let harvester = ChannelHarvester::new(
        provider.clone(),
        ledger.clone(),
        HarvestSettings::default(),
    );
    let orchestrator = Arc::new(CollectionOrchestrator::new(
        harvester,
        store,
        directory.clone(),
        CollectionSettings {
            inter_channel_delay: Duration::ZERO,
            dedup_policy,
        },
    ));
    Fixture {
        provider,
        ledger,
        directory,
        orchestrator,
    }
}
