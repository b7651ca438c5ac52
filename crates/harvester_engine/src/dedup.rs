use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{StoreError, VideoStore};

/// Where an earlier copy of a video counts as a duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupScope {
    /// Anywhere in the store.
    Global,
    /// Only among records saved under this batch id.
    Batch(String),
}

/// Orchestrator-wide choice of [`DedupScope`], applied to every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    #[default]
    Global,
    PerBatch,
}

impl DedupPolicy {
    pub fn scope_for(self, batch_id: &str) -> DedupScope {
        match self {
            DedupPolicy::Global => DedupScope::Global,
            DedupPolicy::PerBatch => DedupScope::Batch(batch_id.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct DedupGate {
    store: Arc<dyn VideoStore>,
}

impl DedupGate {
    pub fn new(store: Arc<dyn VideoStore>) -> Self {
        Self { store }
    }

    pub async fn exists(&self, video_id: &str, scope: &DedupScope) -> Result<bool, StoreError> {
        Ok(self
            .store
            .find_by_external_id(video_id, scope)
            .await?
            .is_some())
    }
}
