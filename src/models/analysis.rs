//! Analysis result models.
//!
//! An `AnalysisRecord` is produced by the external analysis engine and never
//! mutated after creation; a new upload replaces it wholesale.

use serde::{Deserialize, Serialize};

/// Risk buckets recognized by the summary tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Parse a level tag case-insensitively. Unknown tags yield `None` and are
    /// counted in no bucket.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

/// Per-gene risk entry from the analysis engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneRisk {
    pub gene: String,
    /// Score in [0, 1]. The engine also emits this field as `risk`.
    #[serde(alias = "risk")]
    pub risk_score: f64,
    pub level: String,
    #[serde(default)]
    pub tips: Vec<String>,
}

/// A completed analysis result, owned exclusively by `owner_uid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: String,
    pub owner_uid: String,
    pub disease: String,
    pub gene_count: i64,
    pub risks: Vec<GeneRisk>,
    /// RFC 3339 creation time.
    pub timestamp: String,
    #[serde(default)]
    pub disclaimer: String,
}

/// Raw result payload as returned by the analysis engine, before the ledger
/// stamps ownership metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct SaveAnalysisRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub disease: String,
    pub gene_count: i64,
    #[serde(default)]
    pub risks: Vec<GeneRisk>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub disclaimer: String,
}

/// Tallied risk counts for the summary view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskCounts {
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

/// Compact summary of the current analysis, used for navigation badges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub disease: String,
    pub gene_count: i64,
    pub timestamp: String,
    pub risk_counts: RiskCounts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_parse_case_insensitive() {
        assert_eq!(RiskLevel::parse("High"), Some(RiskLevel::High));
        assert_eq!(RiskLevel::parse("MEDIUM"), Some(RiskLevel::Medium));
        assert_eq!(RiskLevel::parse("low"), Some(RiskLevel::Low));
        assert_eq!(RiskLevel::parse("unknown"), None);
        assert_eq!(RiskLevel::parse(""), None);
    }

    #[test]
    fn test_gene_risk_accepts_engine_field_name() {
        let risk: GeneRisk =
            serde_json::from_str(r#"{"gene":"BRCA1","risk":0.91,"level":"high"}"#).unwrap();
        assert_eq!(risk.risk_score, 0.91);
        assert!(risk.tips.is_empty());
    }
}
