use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::trials::AnalysisResult;

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRecord {
    pub trial_id: String,
    pub event_timestamp: String,
    pub result: AnalysisResult,
    pub recorded_at: DateTime<Utc>,
    /// How many times this event has been analyzed (redeliveries included).
    pub deliveries: u32,
}

/// Completed analyses keyed by (trial id, event timestamp). Writes are
/// upserts so a redelivered event replaces its earlier analysis.
#[derive(Clone, Default)]
pub struct AnalysisRegistry {
    inner: Arc<RwLock<HashMap<(String, String), AnalysisRecord>>>,
}

impl AnalysisRegistry {
    pub async fn upsert(&self, result: AnalysisResult) -> u32 {
        let key = (
            result.trial_id.clone().unwrap_or_else(|| "unknown".to_string()),
            result.timestamp.clone().unwrap_or_default(),
        );

        let mut guard = self.inner.write().await;
        let deliveries = guard.get(&key).map_or(1, |existing| existing.deliveries + 1);
        guard.insert(
            key.clone(),
            AnalysisRecord {
                trial_id: key.0,
                event_timestamp: key.1,
                result,
                recorded_at: Utc::now(),
                deliveries,
            },
        );
        deliveries
    }

    pub async fn get(&self, trial_id: &str, timestamp: &str) -> Option<AnalysisRecord> {
        let guard = self.inner.read().await;
        guard
            .get(&(trial_id.to_string(), timestamp.to_string()))
            .cloned()
    }

    pub async fn for_trial(&self, trial_id: &str) -> Vec<AnalysisRecord> {
        let guard = self.inner.read().await;
        let mut records: Vec<_> = guard
            .values()
            .filter(|r| r.trial_id == trial_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.event_timestamp.cmp(&b.event_timestamp));
        records
    }

    /// Most recently recorded first.
    pub async fn recent(&self, limit: usize) -> Vec<AnalysisRecord> {
        let guard = self.inner.read().await;
        let mut records: Vec<_> = guard.values().cloned().collect();
        records.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        records.truncate(limit);
        records
    }

    /// Distinct trial ids with at least one analysis, sorted. Events that
    /// carried no trial id are left out.
    pub async fn trial_ids(&self) -> Vec<String> {
        let guard = self.inner.read().await;
        let ids: BTreeSet<String> = guard
            .values()
            .filter_map(|r| r.result.trial_id.clone())
            .collect();
        ids.into_iter().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}
