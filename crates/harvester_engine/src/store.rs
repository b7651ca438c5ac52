use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use harvest_logging::harvest_debug;
use harvester_core::VideoCandidate;
use serde::{Deserialize, Serialize};

use crate::persist::AtomicFileWriter;
use crate::{DedupScope, StoreError};

pub const VIDEO_STORE_FILE: &str = "videos.json";

/// A persisted video record, keyed by the provider's video id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredVideo {
    pub candidate: VideoCandidate,
    pub batch_id: Option<String>,
    pub group_id: Option<String>,
    pub keywords: Vec<String>,
    pub collected_at: DateTime<Utc>,
}

impl StoredVideo {
    pub fn video_id(&self) -> &str {
        &self.candidate.video_id
    }

    pub fn matches(&self, scope: &DedupScope) -> bool {
        match scope {
            DedupScope::Global => true,
            DedupScope::Batch(batch) => self.batch_id.as_deref() == Some(batch.as_str()),
        }
    }
}

#[async_trait::async_trait]
pub trait VideoStore: Send + Sync {
    async fn find_by_external_id(
        &self,
        video_id: &str,
        scope: &DedupScope,
    ) -> Result<Option<StoredVideo>, StoreError>;

    /// Saving an id that is already stored replaces the earlier record.
    async fn save(&self, record: StoredVideo) -> Result<StoredVideo, StoreError>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
pub struct MemoryVideoStore {
    records: Mutex<BTreeMap<String, StoredVideo>>,
}

impl MemoryVideoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = StoredVideo>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.video_id().to_string(), record))
            .collect();
        Self {
            records: Mutex::new(records),
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records(&self) -> Vec<StoredVideo> {
        lock(&self.records).values().cloned().collect()
    }
}

#[async_trait::async_trait]
impl VideoStore for MemoryVideoStore {
    async fn find_by_external_id(
        &self,
        video_id: &str,
        scope: &DedupScope,
    ) -> Result<Option<StoredVideo>, StoreError> {
        Ok(lock(&self.records)
            .get(video_id)
            .filter(|record| record.matches(scope))
            .cloned())
    }

    async fn save(&self, record: StoredVideo) -> Result<StoredVideo, StoreError> {
        lock(&self.records).insert(record.video_id().to_string(), record.clone());
        Ok(record)
    }
}

/// JSON-file store. The whole document is rewritten atomically on each save,
/// on the blocking pool so the runtime thread never waits on disk.
#[derive(Debug)]
pub struct FileVideoStore {
    writer: AtomicFileWriter,
    // Held across the write so saves reach the file in order.
    records: tokio::sync::Mutex<BTreeMap<String, StoredVideo>>,
}

impl FileVideoStore {
    pub fn open(dir: PathBuf) -> Result<Self, StoreError> {
        let writer = AtomicFileWriter::new(dir);
        let records: BTreeMap<String, StoredVideo> =
            writer.read_json(VIDEO_STORE_FILE)?.unwrap_or_default();
        harvest_debug!(
            "opened video store at {} with {} records",
            writer.dir().display(),
            records.len()
        );
        Ok(Self {
            writer,
            records: tokio::sync::Mutex::new(records),
        })
    }

    pub fn path(&self) -> PathBuf {
        self.writer.dir().join(VIDEO_STORE_FILE)
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn write_document(
        &self,
        records: &BTreeMap<String, StoredVideo>,
    ) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(records)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let writer = self.writer.clone();
        tokio::task::spawn_blocking(move || writer.write(VIDEO_STORE_FILE, &body))
            .await
            .map_err(|e| StoreError::Backend(format!("store write task failed: {e}")))??;
        Ok(())
    }
}

#[async_trait::async_trait]
impl VideoStore for FileVideoStore {
    async fn find_by_external_id(
        &self,
        video_id: &str,
        scope: &DedupScope,
    ) -> Result<Option<StoredVideo>, StoreError> {
        Ok(self
            .records
            .lock()
            .await
            .get(video_id)
            .filter(|record| record.matches(scope))
            .cloned())
    }

    async fn save(&self, record: StoredVideo) -> Result<StoredVideo, StoreError> {
        let mut records = self.records.lock().await;
        let id = record.video_id().to_string();
        let previous = records.insert(id.clone(), record.clone());
        if let Err(err) = self.write_document(&records).await {
            // Keep memory in step with the file that is still on disk.
            match previous {
                Some(previous) => records.insert(id, previous),
                None => records.remove(&id),
            };
            return Err(err);
        }
        Ok(record)
    }
}
