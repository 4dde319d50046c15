//! Analysis ownership ledger.
//!
//! Tracks the single current analysis and a bounded history for the acting
//! user. Ownership is re-checked on every read: a record whose `owner_uid`
//! does not match the active identity is treated as absent and purged, so
//! stale state never survives a user switch.

use chrono::Utc;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{AnalysisRecord, AnalysisSummary, RiskCounts, RiskLevel, SaveAnalysisRequest};
use crate::store::{keys, ScopedStore};

use super::require_user;

/// Maximum number of history records retained per user.
pub const MAX_ANALYSIS_HISTORY: usize = 10;

pub struct AnalysisLedger {
    store: ScopedStore,
}

impl AnalysisLedger {
    pub fn new(store: ScopedStore) -> Self {
        Self { store }
    }

    /// Stamp ownership metadata onto a raw engine result and set it as the
    /// current analysis, prepending it to the bounded history.
    pub async fn save_result(&self, raw: SaveAnalysisRequest) -> Result<AnalysisRecord, AppError> {
        let user = require_user(&self.store)?;
        let record = AnalysisRecord {
            id: raw.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            owner_uid: user.uid.clone(),
            disease: raw.disease,
            gene_count: raw.gene_count,
            risks: raw.risks,
            timestamp: raw.timestamp.unwrap_or_else(|| Utc::now().to_rfc3339()),
            disclaimer: raw.disclaimer,
        };

        if !self.store.set_json(keys::CURRENT_ANALYSIS, &record).await {
            return Err(AppError::Storage("Failed to save analysis".to_string()));
        }

        let mut history: Vec<AnalysisRecord> = self
            .store
            .get_json(keys::ANALYSIS_HISTORY)
            .await
            .unwrap_or_default();
        history.retain(|a| a.id != record.id && a.owner_uid == user.uid);
        history.insert(0, record.clone());
        history.truncate(MAX_ANALYSIS_HISTORY);
        if !self.store.set_json(keys::ANALYSIS_HISTORY, &history).await {
            // Current record is already safe; losing history is recoverable.
            tracing::warn!("Failed to persist analysis history for {}", user.uid);
        }

        Ok(record)
    }

    /// The current analysis, if any. Clears and returns `None` on an
    /// ownership mismatch.
    pub async fn current(&self) -> Option<AnalysisRecord> {
        let uid = self.store.uid()?.to_string();
        let record: AnalysisRecord = self.store.get_json(keys::CURRENT_ANALYSIS).await?;
        if record.owner_uid != uid {
            tracing::warn!(
                "Current analysis {} belongs to {}, not active user {}; clearing",
                record.id,
                record.owner_uid,
                uid
            );
            self.store.remove(keys::CURRENT_ANALYSIS).await;
            return None;
        }
        Some(record)
    }

    /// Look up a history record by id, ownership-filtered.
    pub async fn get_by_id(&self, id: &str) -> Option<AnalysisRecord> {
        let uid = self.store.uid()?.to_string();
        let history: Vec<AnalysisRecord> = self.store.get_json(keys::ANALYSIS_HISTORY).await?;
        let record = history.into_iter().find(|a| a.id == id)?;
        if record.owner_uid != uid {
            tracing::warn!("Requested analysis {} belongs to a different user", id);
            return None;
        }
        Some(record)
    }

    /// The acting user's history, newest first.
    pub async fn history(&self) -> Vec<AnalysisRecord> {
        let Some(uid) = self.store.uid().map(str::to_string) else {
            return Vec::new();
        };
        let history: Vec<AnalysisRecord> = self
            .store
            .get_json(keys::ANALYSIS_HISTORY)
            .await
            .unwrap_or_default();
        history
            .into_iter()
            .filter(|a| a.owner_uid == uid)
            .collect()
    }

    pub async fn clear_current(&self) {
        self.store.remove(keys::CURRENT_ANALYSIS).await;
    }

    pub async fn clear_history(&self) {
        self.store.remove(keys::ANALYSIS_HISTORY).await;
    }

    pub async fn clear_all(&self) {
        self.clear_current().await;
        self.clear_history().await;
    }

    /// Compact summary of the current analysis for navigation badges.
    pub async fn summary(&self) -> Option<AnalysisSummary> {
        let record = self.current().await?;
        Some(AnalysisSummary {
            disease: record.disease.clone(),
            gene_count: record.gene_count,
            timestamp: record.timestamp.clone(),
            risk_counts: tally_risks(&record),
        })
    }
}

/// Tally risk levels into buckets; unrecognized levels land in no bucket.
fn tally_risks(record: &AnalysisRecord) -> RiskCounts {
    let mut counts = RiskCounts::default();
    for risk in &record.risks {
        match RiskLevel::parse(&risk.level) {
            Some(RiskLevel::High) => counts.high += 1,
            Some(RiskLevel::Medium) => counts.medium += 1,
            Some(RiskLevel::Low) => counts.low += 1,
            None => {}
        }
    }
    counts
}
