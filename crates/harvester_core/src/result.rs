use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{DurationClass, HarvestWindow, VideoCandidate};

/// Error taxonomy shared by per-channel records and job failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    QuotaExceeded,
    ProviderAuth,
    TransientNetwork,
    Validation,
    Persistence,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::QuotaExceeded => write!(f, "quota exceeded"),
            ErrorKind::ProviderAuth => write!(f, "provider auth"),
            ErrorKind::TransientNetwork => write!(f, "transient network"),
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Persistence => write!(f, "persistence"),
            ErrorKind::Internal => write!(f, "internal"),
        }
    }
}

/// One isolated failure inside a collection run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelError {
    pub channel_id: String,
    /// Set when the failure concerns a single candidate rather than the channel pass.
    pub video_id: Option<String>,
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.video_id {
            Some(video) => write!(
                f,
                "{} [{}] {}: {}",
                self.channel_id, video, self.kind, self.message
            ),
            None => write!(f, "{} {}: {}", self.channel_id, self.kind, self.message),
        }
    }
}

/// Aggregate of one orchestrator run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionResult {
    pub batch_id: Option<String>,
    pub group_id: Option<String>,
    pub window: Option<HarvestWindow>,
    pub channels_total: usize,
    pub channels_processed: usize,
    /// Detail items returned by the provider before filtering.
    pub scanned: usize,
    /// Candidates that passed the filter.
    pub found: usize,
    pub saved: usize,
    pub duplicates: usize,
    pub quota_used: u32,
    pub quota_exhausted: bool,
    pub cancelled: bool,
    pub errors: Vec<ChannelError>,
    pub saved_videos: Vec<VideoCandidate>,
    pub stats: Option<CollectionStats>,
}

impl CollectionResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub by_duration: BTreeMap<DurationClass, usize>,
    pub total_views: u64,
    pub average_views: u64,
    /// Share of scanned videos that passed the filter, in percent.
    pub trending_rate: f64,
    /// Saved videos per quota unit.
    pub quota_efficiency: f64,
}

impl CollectionStats {
    pub fn from_result(result: &CollectionResult) -> Self {
        let mut by_duration = BTreeMap::new();
        let mut total_views: u64 = 0;
        for video in &result.saved_videos {
            *by_duration.entry(video.duration_class).or_insert(0) += 1;
            total_views = total_views.saturating_add(video.view_count);
        }
        let average_views = match result.saved_videos.len() as u64 {
            0 => 0,
            n => total_views / n,
        };
        let trending_rate = if result.scanned > 0 {
            result.found as f64 * 100.0 / result.scanned as f64
        } else {
            0.0
        };
        let quota_efficiency = if result.quota_used > 0 {
            result.saved as f64 / f64::from(result.quota_used)
        } else {
            0.0
        };
        Self {
            by_duration,
            total_views,
            average_views,
            trending_rate,
            quota_efficiency,
        }
    }
}
