use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// A named set of channels collected together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelGroup {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub channels: Vec<String>,
    /// Copied onto every video saved from this group.
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "active_by_default")]
    pub active: bool,
    #[serde(default)]
    pub last_collected_at: Option<DateTime<Utc>>,
}

fn active_by_default() -> bool {
    true
}

#[async_trait::async_trait]
pub trait ChannelDirectory: Send + Sync {
    async fn group(&self, group_id: &str) -> Result<Option<ChannelGroup>, StoreError>;

    async fn active_groups(&self) -> Result<Vec<ChannelGroup>, StoreError>;

    async fn mark_collected(&self, group_id: &str, at: DateTime<Utc>) -> Result<(), StoreError>;
}

/// In-process directory seeded from configuration.
#[derive(Debug, Default)]
pub struct StaticChannelDirectory {
    groups: Mutex<BTreeMap<String, ChannelGroup>>,
}

impl StaticChannelDirectory {
    pub fn new(groups: impl IntoIterator<Item = ChannelGroup>) -> Self {
        Self {
            groups: Mutex::new(
                groups
                    .into_iter()
                    .map(|group| (group.id.clone(), group))
                    .collect(),
            ),
        }
    }
}

#[async_trait::async_trait]
impl ChannelDirectory for StaticChannelDirectory {
    async fn group(&self, group_id: &str) -> Result<Option<ChannelGroup>, StoreError> {
        let groups = self.groups.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(groups.get(group_id).cloned())
    }

    async fn active_groups(&self) -> Result<Vec<ChannelGroup>, StoreError> {
        let groups = self.groups.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(groups.values().filter(|group| group.active).cloned().collect())
    }

    async fn mark_collected(&self, group_id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut groups = self.groups.lock().unwrap_or_else(PoisonError::into_inner);
        match groups.get_mut(group_id) {
            Some(group) => {
                group.last_collected_at = Some(at);
                Ok(())
            }
            None => Err(StoreError::Backend(format!("unknown channel group {group_id}"))),
        }
    }
}
