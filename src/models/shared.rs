//! Shared-analysis models.

use serde::{Deserialize, Serialize};

use super::AnalysisRecord;

/// A snapshot of a member's analysis shared into a group.
///
/// At most one entry exists per (group, sharer) pair; re-sharing overwrites it
/// and leaving the group deletes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedAnalysisEntry {
    pub group_id: String,
    pub sharer_uid: String,
    /// Sharer's display name at share time.
    pub shared_by: String,
    pub shared_at: String,
    pub analysis: AnalysisRecord,
}

/// Request body for sharing an analysis into a group.
#[derive(Debug, Clone, Deserialize)]
pub struct ShareAnalysisRequest {
    pub group_id: String,
    /// Specific history record to share; defaults to the current analysis.
    #[serde(default)]
    pub analysis_id: Option<String>,
}
