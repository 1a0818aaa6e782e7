use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use bubble_common::{DateTime, Utc};
use chrono::{Datelike, Duration, NaiveDate};
use tracing::{debug, warn};

use crate::{config::QuotaConfig, task::Task};

/// Decides whether a task may start. A denied task is skipped, not failed.
pub trait QuotaGate: Send + Sync {
    fn admit(&self, task: &Task) -> bool;
}

/// Admits everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl QuotaGate for AllowAll {
    fn admit(&self, _task: &Task) -> bool {
        true
    }
}

/// Remaining allowance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaStatus {
    pub daily_remaining: u32,
    pub monthly_remaining: u32,
    pub daily_reset: DateTime<Utc>,
    pub monthly_reset: DateTime<Utc>,
}

#[derive(Debug)]
struct Usage {
    daily_used: u32,
    monthly_used: u32,
    daily_reset: DateTime<Utc>,
    monthly_reset: DateTime<Utc>,
    /// Treatments per image content hash
    treatments: HashMap<String, u32>,
}

/// In-memory daily and monthly counters plus a per-image retreatment cap
#[derive(Debug)]
pub struct UsageQuota {
    config: QuotaConfig,
    usage: Mutex<Usage>,
}

impl UsageQuota {
    pub fn new(config: QuotaConfig) -> Self {
        Self::starting_at(config, Utc::now())
    }

    pub fn starting_at(config: QuotaConfig, now: DateTime<Utc>) -> Self {
        Self {
            config,
            usage: Mutex::new(Usage {
                daily_used: 0,
                monthly_used: 0,
                daily_reset: next_midnight(now),
                monthly_reset: next_month_start(now),
                treatments: HashMap::new(),
            }),
        }
    }

    pub fn status(&self) -> QuotaStatus {
        self.status_at(Utc::now())
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> QuotaStatus {
        let mut usage = self.usage.lock().unwrap_or_else(PoisonError::into_inner);
        roll_over(&mut usage, now);
        QuotaStatus {
            daily_remaining: self.config.daily_limit.saturating_sub(usage.daily_used),
            monthly_remaining: self.config.monthly_limit.saturating_sub(usage.monthly_used),
            daily_reset: usage.daily_reset,
            monthly_reset: usage.monthly_reset,
        }
    }

    /// Check and consume one treatment of `source` at `now`. Blocking: the
    /// file is read and hashed before the counters are locked.
    pub fn admit_at(&self, source: &Path, now: DateTime<Utc>) -> bool {
        let hash = match content_hash(source) {
            Ok(hash) => Some(hash),
            Err(e) => {
                warn!("Cannot hash {}: {}", source.display(), e);
                None
            }
        };

        let mut usage = self.usage.lock().unwrap_or_else(PoisonError::into_inner);
        roll_over(&mut usage, now);

        if usage.daily_used >= self.config.daily_limit {
            debug!("Daily quota of {} reached", self.config.daily_limit);
            return false;
        }
        if usage.monthly_used >= self.config.monthly_limit {
            debug!("Monthly quota of {} reached", self.config.monthly_limit);
            return false;
        }

        if let Some(hash) = &hash {
            let treated = usage.treatments.get(hash).copied().unwrap_or(0);
            if treated > self.config.max_retreatments {
                debug!(
                    "{} already treated {} times",
                    source.display(),
                    treated
                );
                return false;
            }
        }

        usage.daily_used += 1;
        usage.monthly_used += 1;
        if let Some(hash) = hash {
            *usage.treatments.entry(hash).or_insert(0) += 1;
        }
        true
    }
}

impl QuotaGate for UsageQuota {
    fn admit(&self, task: &Task) -> bool {
        self.admit_at(task.source(), Utc::now())
    }
}

fn roll_over(usage: &mut Usage, now: DateTime<Utc>) {
    if now >= usage.daily_reset {
        usage.daily_used = 0;
        usage.daily_reset = next_midnight(now);
    }
    if now >= usage.monthly_reset {
        usage.monthly_used = 0;
        usage.monthly_reset = next_month_start(now);
    }
}

fn content_hash(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// Start of the next UTC day
pub fn next_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .unwrap_or_else(|| now + Duration::days(1))
}

/// Start of the first day of the next UTC month
pub fn next_month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|start| start.and_utc())
        .unwrap_or_else(|| now + Duration::days(31))
}
