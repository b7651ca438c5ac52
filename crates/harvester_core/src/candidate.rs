use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Durations strictly below this many seconds are [`DurationClass::Short`].
pub const SHORT_LIMIT_SECS: u64 = 60;
/// Durations up to and including this many seconds are [`DurationClass::Mid`].
pub const MID_LIMIT_SECS: u64 = 180;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationClass {
    Short,
    Mid,
    Long,
}

impl DurationClass {
    pub fn classify(seconds: u64) -> Self {
        if seconds < SHORT_LIMIT_SECS {
            DurationClass::Short
        } else if seconds <= MID_LIMIT_SECS {
            DurationClass::Mid
        } else {
            DurationClass::Long
        }
    }
}

impl fmt::Display for DurationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationClass::Short => write!(f, "short"),
            DurationClass::Mid => write!(f, "mid"),
            DurationClass::Long => write!(f, "long"),
        }
    }
}

/// A video returned by the provider's detail batch. Never mutated after fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoCandidate {
    pub video_id: String,
    pub channel_id: String,
    pub channel_title: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub published_at: DateTime<Utc>,
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
    pub duration_secs: u64,
    pub duration_class: DurationClass,
    /// Provider item exactly as received.
    pub raw: serde_json::Value,
}

/// Parse an ISO 8601 duration (`PT1H2M3S`, `P1DT5M`) to whole seconds.
///
/// Anything that does not start with `P` or carries calendar units
/// (years, months) yields 0.
pub fn parse_iso8601_duration(value: &str) -> u64 {
    let Some(rest) = value.trim().strip_prefix('P') else {
        return 0;
    };

    let mut total = 0.0_f64;
    let mut number = String::new();
    let mut in_time = false;

    for ch in rest.chars() {
        match ch {
            'T' => {
                in_time = true;
                number.clear();
            }
            '0'..='9' | '.' => number.push(ch),
            unit => {
                let amount = number.parse::<f64>().unwrap_or(0.0);
                number.clear();
                let factor = match (unit, in_time) {
                    ('W', false) => 604_800.0,
                    ('D', false) => 86_400.0,
                    ('H', true) => 3_600.0,
                    ('M', true) => 60.0,
                    ('S', true) => 1.0,
                    _ => return 0,
                };
                total += amount * factor;
            }
        }
    }

    total as u64
}
