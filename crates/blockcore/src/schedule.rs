use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerType {
    /// Every `interval_minutes`, starting at `start_at`
    Interval,
    /// A single run at `start_at`
    Once,
    /// Every day at the time of day of `start_at`
    Daily,
}

/// When a workflow should be run by the scheduler.
///
/// The calculation is stateless apart from `last_run_at`, which the caller
/// updates after each run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub trigger_type: TriggerType,
    pub start_at: DateTime<Utc>,
    #[serde(default)]
    pub interval_minutes: i64,
    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl Schedule {
    pub fn interval(start_at: DateTime<Utc>, minutes: i64) -> Self {
        Self::new(TriggerType::Interval, start_at, minutes)
    }

    pub fn once(start_at: DateTime<Utc>) -> Self {
        Self::new(TriggerType::Once, start_at, 0)
    }

    pub fn daily(start_at: DateTime<Utc>) -> Self {
        Self::new(TriggerType::Daily, start_at, 0)
    }

    fn new(trigger_type: TriggerType, start_at: DateTime<Utc>, interval_minutes: i64) -> Self {
        Self {
            trigger_type,
            start_at,
            interval_minutes,
            last_run_at: None,
            enabled: true,
        }
    }

    /// Next time the workflow should run, or `None` if it never will again.
    pub fn next_run_at(&self) -> Option<DateTime<Utc>> {
        if !self.enabled {
            return None;
        }

        let Some(last) = self.last_run_at else {
            return match self.trigger_type {
                TriggerType::Interval if self.interval_minutes <= 0 => None,
                _ => Some(self.start_at),
            };
        };

        match self.trigger_type {
            TriggerType::Once => None,
            TriggerType::Interval => {
                if self.interval_minutes <= 0 {
                    return None;
                }
                let next = Duration::try_minutes(self.interval_minutes)
                    .and_then(|interval| last.checked_add_signed(interval))?;
                Some(next.max(self.start_at))
            }
            TriggerType::Daily => {
                if last < self.start_at {
                    return Some(self.start_at);
                }
                // first slot strictly after the last run, on the start's time of day
                let elapsed_days = (last - self.start_at).num_days();
                let mut next = Duration::try_days(elapsed_days)
                    .and_then(|elapsed| self.start_at.checked_add_signed(elapsed))?;
                while next <= last {
                    next = next.checked_add_signed(Duration::try_days(1)?)?;
                }
                Some(next)
            }
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_run_at().is_some_and(|next| next <= now)
    }

    pub fn mark_run(&mut self, at: DateTime<Utc>) {
        self.last_run_at = Some(at);
    }
}
