use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use harvest_logging::harvest_info;
use harvester_engine::{
    ChannelGroup, CollectionSettings, DedupPolicy, HarvestSettings, ProviderSettings,
    QuotaSettings, DEFAULT_BASE_URL,
};
use serde::{Deserialize, Serialize};

use crate::logging::LogDestination;

pub const DEFAULT_CONFIG_FILE: &str = "harvester.ron";
pub const DEFAULT_API_KEY_ENV: &str = "YOUTUBE_API_KEY";

/// Contents of `harvester.ron`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvesterConfig {
    /// Name of the environment variable holding the provider API key.
    pub api_key_env: String,
    pub base_url: String,
    /// Directory for the video store and run history.
    pub data_dir: PathBuf,
    pub log: LogDestination,
    pub quota: QuotaSettings,
    pub search_cost: u32,
    pub details_cost: u32,
    pub request_timeout_secs: u64,
    pub call_timeout_secs: u64,
    pub inter_channel_delay_ms: u64,
    pub dedup: DedupPolicy,
    pub groups: Vec<ChannelGroup>,
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        let harvest = HarvestSettings::default();
        let provider = ProviderSettings::default();
        Self {
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            data_dir: PathBuf::from("./harvester-data"),
            log: LogDestination::default(),
            quota: QuotaSettings::default(),
            search_cost: harvest.search_cost,
            details_cost: harvest.details_cost,
            request_timeout_secs: provider.request_timeout.as_secs(),
            call_timeout_secs: harvest.call_timeout.as_secs(),
            inter_channel_delay_ms: 100,
            dedup: DedupPolicy::default(),
            groups: Vec::new(),
        }
    }
}

impl HarvesterConfig {
    pub fn provider_settings(&self, api_key: String) -> ProviderSettings {
        ProviderSettings {
            base_url: self.base_url.clone(),
            api_key,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..ProviderSettings::default()
        }
    }

    pub fn harvest_settings(&self) -> HarvestSettings {
        HarvestSettings {
            search_cost: self.search_cost,
            details_cost: self.details_cost,
            call_timeout: Duration::from_secs(self.call_timeout_secs),
            ..HarvestSettings::default()
        }
    }

    pub fn collection_settings(&self) -> CollectionSettings {
        CollectionSettings {
            inter_channel_delay: Duration::from_millis(self.inter_channel_delay_ms),
            dedup_policy: self.dedup,
        }
    }

    pub fn api_key(&self) -> anyhow::Result<String> {
        std::env::var(&self.api_key_env)
            .with_context(|| format!("environment variable {} is not set", self.api_key_env))
    }
}

/// Reads the config file. A missing file yields the defaults.
pub fn load(path: &Path) -> anyhow::Result<HarvesterConfig> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            harvest_info!("no config at {}, using defaults", path.display());
            return Ok(HarvesterConfig::default());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("reading config {}", path.display()));
        }
    };
    ron::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = load(&temp.path().join("absent.ron")).unwrap();
        assert_eq!(config, HarvesterConfig::default());
        assert_eq!(config.quota.ceiling(), 9_500);
        assert_eq!(config.collection_settings().inter_channel_delay, Duration::from_millis(100));
    }

    #[test]
    fn partial_file_overrides_only_given_fields() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("harvester.ron");
        fs::write(
            &path,
            r#"(
                dedup: per_batch,
                quota: (daily_limit: 5000),
                groups: [
                    (id: "cooking", channels: ["UC1", "https://www.youtube.com/channel/UC2"]),
                ],
            )"#,
        )
        .unwrap();

        let config = load(&path).unwrap();
        assert_eq!(config.dedup, DedupPolicy::PerBatch);
        assert_eq!(config.quota.daily_limit, 5_000);
        assert_eq!(config.quota.safety_margin, 500);
        assert_eq!(config.groups.len(), 1);
        assert!(config.groups[0].active);
        assert_eq!(config.api_key_env, DEFAULT_API_KEY_ENV);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("harvester.ron");
        fs::write(&path, "(quota: oops").unwrap();
        assert!(load(&path).is_err());
    }
}
