use serde::{Deserialize, Serialize};

use crate::{DurationClass, WindowSpec};

/// Minimum view count applied when a caller does not set one.
pub const DEFAULT_MIN_VIEWS: u64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    High,
}

/// Which duration classes a collection keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DurationFlags {
    pub include_shorts: bool,
    pub include_mid: bool,
    pub include_long: bool,
}

impl Default for DurationFlags {
    fn default() -> Self {
        Self {
            include_shorts: true,
            include_mid: true,
            include_long: true,
        }
    }
}

impl DurationFlags {
    pub fn allows(&self, class: DurationClass) -> bool {
        match class {
            DurationClass::Short => self.include_shorts,
            DurationClass::Mid => self.include_mid,
            DurationClass::Long => self.include_long,
        }
    }
}

/// Caller-facing knobs for one harvest job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestOptions {
    pub min_views: u64,
    pub max_views: Option<u64>,
    pub window: WindowSpec,
    pub durations: DurationFlags,
    pub keywords: Vec<String>,
    pub exclude_keywords: Vec<String>,
    pub priority: Priority,
    /// Run the detailed-processing checkpoint (collection statistics).
    pub detailed: bool,
    pub batch_id: Option<String>,
}

impl Default for HarvestOptions {
    fn default() -> Self {
        Self {
            min_views: DEFAULT_MIN_VIEWS,
            max_views: None,
            window: WindowSpec::default(),
            durations: DurationFlags::default(),
            keywords: Vec::new(),
            exclude_keywords: Vec::new(),
            priority: Priority::Normal,
            detailed: true,
            batch_id: None,
        }
    }
}

impl HarvestOptions {
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}
