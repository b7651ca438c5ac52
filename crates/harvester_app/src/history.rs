use std::fs;
use std::io;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use harvest_logging::{harvest_info, harvest_warn};
use harvester_core::{Job, JobStatus, JobTarget};
use harvester_engine::AtomicFileWriter;
use serde::{Deserialize, Serialize};

pub const HISTORY_FILE: &str = "history.ron";
pub const HISTORY_LIMIT: usize = 30;

/// What is kept of a finished job after the process exits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub job_id: u64,
    pub target: String,
    pub group_id: Option<String>,
    pub status: JobStatus,
    pub finished_at: DateTime<Utc>,
    pub channels_processed: usize,
    pub channels_total: usize,
    pub found: usize,
    pub saved: usize,
    pub duplicates: usize,
    pub quota_used: u32,
    pub quota_exhausted: bool,
    pub channel_errors: usize,
    pub error: Option<String>,
}

impl RunSummary {
    /// `None` while the job is still queued or running.
    pub fn from_job(job: &Job) -> Option<Self> {
        if !job.status.is_terminal() {
            return None;
        }
        let group_id = match &job.target {
            JobTarget::Group(id) => Some(id.clone()),
            _ => None,
        };
        let mut summary = Self {
            job_id: job.id,
            target: job.target.to_string(),
            group_id,
            status: job.status,
            finished_at: job.completed_at.unwrap_or_else(Utc::now),
            channels_processed: 0,
            channels_total: 0,
            found: 0,
            saved: 0,
            duplicates: 0,
            quota_used: 0,
            quota_exhausted: false,
            channel_errors: 0,
            error: job.error.as_ref().map(ToString::to_string),
        };
        if let Some(result) = &job.result {
            summary.channels_processed = result.channels_processed;
            summary.channels_total = result.channels_total;
            summary.found = result.found;
            summary.saved = result.saved;
            summary.duplicates = result.duplicates;
            summary.quota_used = result.quota_used;
            summary.quota_exhausted = result.quota_exhausted;
            summary.channel_errors = result.errors.len();
        }
        Some(summary)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct History {
    runs: Vec<RunSummary>,
}

/// Oldest first. Unreadable history is logged and treated as empty.
pub fn load(data_dir: &Path) -> Vec<RunSummary> {
    let path = data_dir.join(HISTORY_FILE);
    let content = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            harvest_warn!("failed to read run history from {}: {err}", path.display());
            return Vec::new();
        }
    };
    match ron::from_str::<History>(&content) {
        Ok(history) => history.runs,
        Err(err) => {
            harvest_warn!("failed to parse run history from {}: {err}", path.display());
            Vec::new()
        }
    }
}

/// Appends `finished` and keeps the newest [`HISTORY_LIMIT`] entries.
pub fn record(data_dir: &Path, finished: &[RunSummary]) -> anyhow::Result<()> {
    if finished.is_empty() {
        return Ok(());
    }
    let mut runs = load(data_dir);
    runs.extend_from_slice(finished);
    let overflow = runs.len().saturating_sub(HISTORY_LIMIT);
    runs.drain(..overflow);

    let content = ron::ser::to_string_pretty(&History { runs }, ron::ser::PrettyConfig::new())
        .context("serializing run history")?;
    let writer = AtomicFileWriter::new(data_dir.to_path_buf());
    let path = writer
        .write(HISTORY_FILE, content.as_bytes())
        .with_context(|| format!("writing run history to {}", data_dir.display()))?;
    harvest_info!("recorded {} runs in {}", finished.len(), path.display());
    Ok(())
}

/// Most recent finish time of a run over `group_id`.
pub fn last_collected(runs: &[RunSummary], group_id: &str) -> Option<DateTime<Utc>> {
    runs.iter()
        .filter(|run| run.group_id.as_deref() == Some(group_id) && run.status == JobStatus::Completed)
        .map(|run| run.finished_at)
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn summary(job_id: u64, group: Option<&str>, status: JobStatus) -> RunSummary {
        RunSummary {
            job_id,
            target: format!("job {job_id}"),
            group_id: group.map(str::to_string),
            status,
            finished_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
                + chrono::Duration::minutes(job_id as i64),
            channels_processed: 1,
            channels_total: 1,
            found: 3,
            saved: 2,
            duplicates: 1,
            quota_used: 101,
            quota_exhausted: false,
            channel_errors: 0,
            error: None,
        }
    }

    #[test]
    fn history_keeps_only_the_newest_runs() {
        let temp = TempDir::new().unwrap();
        let first: Vec<_> = (1..=25).map(|id| summary(id, None, JobStatus::Completed)).collect();
        let second: Vec<_> = (26..=40).map(|id| summary(id, None, JobStatus::Completed)).collect();

        record(temp.path(), &first).unwrap();
        record(temp.path(), &second).unwrap();

        let runs = load(temp.path());
        assert_eq!(runs.len(), HISTORY_LIMIT);
        assert_eq!(runs.first().map(|r| r.job_id), Some(11));
        assert_eq!(runs.last().map(|r| r.job_id), Some(40));
    }

    #[test]
    fn corrupt_history_reads_as_empty() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(HISTORY_FILE), "(runs: [").unwrap();
        assert!(load(temp.path()).is_empty());
    }

    #[test]
    fn last_collected_ignores_failed_runs_and_other_groups() {
        let runs = vec![
            summary(1, Some("news"), JobStatus::Completed),
            summary(2, Some("news"), JobStatus::Failed),
            summary(3, Some("sports"), JobStatus::Completed),
        ];
        assert_eq!(last_collected(&runs, "news"), Some(runs[0].finished_at));
        assert_eq!(last_collected(&runs, "music"), None);
    }
}
