//! Downstream analytics records.
//!
//! Records are emitted after a unit of work commits. A failing sink is logged
//! and ignored; it never undoes gameplay.

use crate::model::{AbilityType, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trigger {
    AbilityCast,
    DungeonReward,
    GameFinished,
}

/// One immutable analytics row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsRecord {
    pub at: DateTime<Utc>,
    pub trigger: Trigger,
    pub actor: UserId,
    pub ability_type: Option<AbilityType>,
    /// Resource deltas and trigger-specific details.
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("analytics sink unavailable: {0}")]
pub struct AnalyticsError(pub String);

pub trait AnalyticsSink: Send + Sync {
    fn record(&self, record: &AnalyticsRecord) -> Result<(), AnalyticsError>;
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAnalytics;

impl AnalyticsSink for NoopAnalytics {
    fn record(&self, _record: &AnalyticsRecord) -> Result<(), AnalyticsError> {
        Ok(())
    }
}

/// Keeps records in memory, optionally refusing them.
#[derive(Debug, Default)]
pub struct MemoryAnalytics {
    records: Mutex<Vec<AnalyticsRecord>>,
    unavailable: AtomicBool,
}

impl MemoryAnalytics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<AnalyticsRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn count(&self, trigger: Trigger) -> usize {
        self.records().iter().filter(|r| r.trigger == trigger).count()
    }
}

impl AnalyticsSink for MemoryAnalytics {
    fn record(&self, record: &AnalyticsRecord) -> Result<(), AnalyticsError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AnalyticsError("sink marked unavailable".to_string()));
        }
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }
}

/// Send a record, logging instead of failing.
pub fn emit(sink: &dyn AnalyticsSink, record: AnalyticsRecord) {
    if let Err(e) = sink.record(&record) {
        tracing::warn!(error = %e, trigger = ?record.trigger, "dropping analytics record");
    }
}
