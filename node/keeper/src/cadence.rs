//! Tick cadence: a fixed interval or a cron expression.

use crate::settings::SettingsError;
use chrono::Utc;
use cron::Schedule;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::{self, Interval, MissedTickBehavior};

#[derive(Debug, Clone)]
pub enum Cadence {
    Every(Duration),
    Cron(Box<Schedule>),
}

impl Cadence {
    pub fn every(interval: Duration) -> Result<Self, SettingsError> {
        if interval.is_zero() {
            return Err(SettingsError::ZeroInterval);
        }
        Ok(Cadence::Every(interval))
    }

    /// Parse a cron expression. Classic five-field expressions get a
    /// leading seconds field of `0`.
    pub fn cron(expr: &str) -> Result<Self, SettingsError> {
        let fields = expr.split_whitespace().count();
        let normalized = if fields == 5 {
            format!("0 {}", expr.trim())
        } else {
            expr.trim().to_string()
        };

        Schedule::from_str(&normalized)
            .map(|schedule| Cadence::Cron(Box::new(schedule)))
            .map_err(|e| SettingsError::Schedule {
                expr: expr.to_string(),
                message: e.to_string(),
            })
    }

    /// The first tick fires immediately, then on the cadence
    pub fn ticker(&self) -> Ticker {
        match self {
            Cadence::Every(period) => {
                let mut interval = time::interval(*period);
                // Fire times that pass while a tick is running are dropped, not queued.
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                Ticker::Interval(interval)
            }
            Cadence::Cron(schedule) => Ticker::Cron {
                schedule: schedule.clone(),
                fired: false,
            },
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cadence::Every(period) => write!(f, "every {:?}", period),
            Cadence::Cron(schedule) => write!(f, "cron `{}`", schedule),
        }
    }
}

pub enum Ticker {
    Interval(Interval),
    Cron { schedule: Box<Schedule>, fired: bool },
}

impl Ticker {
    /// Wait for the next fire time. Returns `false` once the schedule has
    /// no upcoming fire times.
    pub async fn tick(&mut self) -> bool {
        match self {
            Ticker::Interval(interval) => {
                interval.tick().await;
                true
            }
            Ticker::Cron { schedule, fired } => {
                if !*fired {
                    *fired = true;
                    return true;
                }
                let Some(next) = schedule.upcoming(Utc).next() else {
                    return false;
                };
                let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                time::sleep(wait).await;
                true
            }
        }
    }
}
