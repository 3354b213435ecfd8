//! Hours-of-service hints.
//!
//! Stub data only. Nothing here is suitable for compliance decisions; the
//! snapshot carries a disclaimer saying so and callers surface it as is.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

pub const HOS_DISCLAIMER: &str = "BETA: Mock HOS data. Not for compliance use.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HosSnapshot {
    pub hours_remaining: f64,
    pub minutes_remaining: f64,
    pub latest_stop_time: DateTime<Utc>,
    /// `DEFAULT` when no driver-specific value is known, `MANUAL` otherwise.
    pub source: String,
    pub disclaimer: String,
}

impl HosSnapshot {
    fn at(hours_remaining: f64, source: &str, now: DateTime<Utc>) -> Self {
        let minutes = hours_remaining * 60.0;
        Self {
            hours_remaining,
            minutes_remaining: minutes,
            latest_stop_time: now + Duration::seconds((minutes * 60.0).round() as i64),
            source: source.to_string(),
            disclaimer: HOS_DISCLAIMER.to_string(),
        }
    }
}

#[async_trait]
pub trait HosProvider: Send + Sync {
    async fn snapshot(&self, driver_id: &str) -> HosSnapshot;
}

/// Returns a configured default, overridable per driver.
pub struct StaticHosProvider {
    default_hours: f64,
    overrides: RwLock<HashMap<String, f64>>,
}

impl StaticHosProvider {
    pub fn new(default_hours: f64) -> Self {
        Self {
            default_hours,
            overrides: RwLock::new(HashMap::new()),
        }
    }

    pub fn default_hours(&self) -> f64 {
        self.default_hours
    }

    pub async fn set_hours_remaining(&self, driver_id: impl Into<String>, hours: f64) {
        self.overrides.write().await.insert(driver_id.into(), hours.max(0.0));
    }
}

#[async_trait]
impl HosProvider for StaticHosProvider {
    async fn snapshot(&self, driver_id: &str) -> HosSnapshot {
        let now = Utc::now();
        match self.overrides.read().await.get(driver_id) {
            Some(hours) => HosSnapshot::at(*hours, "MANUAL", now),
            None => HosSnapshot::at(self.default_hours, "DEFAULT", now),
        }
    }
}
