use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};
use harvest_logging::{harvest_debug, harvest_info};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_DAILY_LIMIT: u32 = 10_000;
pub const DEFAULT_SAFETY_MARGIN: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaSettings {
    pub daily_limit: u32,
    /// Units held back from the daily limit; reservations never dip into them.
    pub safety_margin: u32,
}

impl Default for QuotaSettings {
    fn default() -> Self {
        Self {
            daily_limit: DEFAULT_DAILY_LIMIT,
            safety_margin: DEFAULT_SAFETY_MARGIN,
        }
    }
}

impl QuotaSettings {
    pub fn ceiling(&self) -> u32 {
        self.daily_limit.saturating_sub(self.safety_margin)
    }
}

/// Point-in-time view of the ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuotaState {
    pub used: u32,
    pub limit: u32,
    pub safety_margin: u32,
    pub remaining: u32,
    pub usage_percent: f64,
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug)]
struct LedgerInner {
    used: u32,
    reset_at: DateTime<Utc>,
}

/// Process-wide record of provider cost units spent today.
///
/// Every provider call reserves its cost here first. A reservation is all or
/// nothing: it either fits under `daily_limit - safety_margin` and is recorded,
/// or it is refused and nothing changes. Reserved units are never refunded.
#[derive(Debug)]
pub struct QuotaLedger {
    settings: QuotaSettings,
    inner: Mutex<LedgerInner>,
}

impl QuotaLedger {
    pub fn new(settings: QuotaSettings) -> Self {
        Self {
            settings,
            inner: Mutex::new(LedgerInner {
                used: 0,
                reset_at: next_midnight(&Local::now()).with_timezone(&Utc),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedgerInner> {
        // A panic while holding the lock cannot leave `used` half-written.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn reserve(&self, cost: u32) -> bool {
        let mut inner = self.lock();
        match inner.used.checked_add(cost) {
            Some(total) if total <= self.settings.ceiling() => {
                inner.used = total;
                harvest_debug!("quota reserved {cost} units ({total} used)");
                true
            }
            _ => false,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.settings.ceiling().saturating_sub(self.lock().used)
    }

    pub fn used(&self) -> u32 {
        self.lock().used
    }

    pub fn reset_daily(&self) {
        let mut inner = self.lock();
        let previous = inner.used;
        inner.used = 0;
        inner.reset_at = next_midnight(&Local::now()).with_timezone(&Utc);
        harvest_info!("daily quota reset ({previous} units used since last reset)");
    }

    pub fn snapshot(&self) -> QuotaState {
        let inner = self.lock();
        let limit = self.settings.daily_limit;
        let usage_percent = if limit == 0 {
            100.0
        } else {
            f64::from(inner.used) * 100.0 / f64::from(limit)
        };
        QuotaState {
            used: inner.used,
            limit,
            safety_margin: self.settings.safety_margin,
            remaining: self.settings.ceiling().saturating_sub(inner.used),
            usage_percent,
            reset_at: inner.reset_at,
        }
    }

    pub fn log_usage(&self) {
        let state = self.snapshot();
        harvest_info!(
            "quota usage: {}/{} units ({:.1}%), {} remaining before safety margin",
            state.used,
            state.limit,
            state.usage_percent,
            state.remaining
        );
    }
}

/// First midnight strictly after `now` in `now`'s time zone.
pub fn next_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    now.date_naive()
        .succ_opt()
        .and_then(|tomorrow| {
            tomorrow
                .and_time(NaiveTime::MIN)
                .and_local_timezone(now.timezone())
                .earliest()
        })
        .unwrap_or_else(|| now.clone() + chrono::Duration::days(1))
}

/// Zeroes the ledger at every local midnight until `cancel` fires.
pub fn spawn_daily_reset(ledger: Arc<QuotaLedger>, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Local::now();
            let wait = (next_midnight(&now) - now)
                .to_std()
                .unwrap_or(Duration::from_secs(60));
            harvest_debug!("next quota reset in {}s", wait.as_secs());
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => ledger.reset_daily(),
            }
        }
    })
}
