use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("window start {start} is after end {end}")]
    Inverted {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("days back value {0} is out of range")]
    OutOfRange(u32),
}

/// Half-open publish-time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl HarvestWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, WindowError> {
        if start > end {
            return Err(WindowError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// Window ending at `now` and reaching exactly `days` days back.
    pub fn days_back(now: DateTime<Utc>, days: u32) -> Result<Self, WindowError> {
        let span = Duration::try_days(i64::from(days)).ok_or(WindowError::OutOfRange(days))?;
        let start = now
            .checked_sub_signed(span)
            .ok_or(WindowError::OutOfRange(days))?;
        Ok(Self { start, end: now })
    }

    /// Whole calendar days: from `start` 00:00 UTC up to the midnight after `end`.
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Result<Self, WindowError> {
        let start_at = start.and_time(NaiveTime::MIN).and_utc();
        let end_at = end.and_time(NaiveTime::MIN).and_utc();
        if start_at > end_at {
            return Err(WindowError::Inverted {
                start: start_at,
                end: end_at,
            });
        }
        let end_exclusive = end_at + Duration::days(1);
        Ok(Self {
            start: start_at,
            end: end_exclusive,
        })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn span(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}

/// How a job describes its window before it is resolved against the clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowSpec {
    DaysBack(u32),
    Dates { start: NaiveDate, end: NaiveDate },
}

impl Default for WindowSpec {
    fn default() -> Self {
        WindowSpec::DaysBack(3)
    }
}

impl WindowSpec {
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<HarvestWindow, WindowError> {
        match self {
            WindowSpec::DaysBack(days) => HarvestWindow::days_back(now, *days),
            WindowSpec::Dates { start, end } => HarvestWindow::from_dates(*start, *end),
        }
    }
}
