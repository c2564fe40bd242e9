//! Normalized comparison output.
//!
//! These types are the strict schema a model response must be validated
//! into before it is persisted or served. Categories and change types are
//! closed enumerations; anything outside them is rejected during
//! normalization, never passed through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schema version stamped on every stored result.
pub const ANALYSIS_VERSION: &str = "1.0";

/// What part of the policy a change touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeCategory {
    CoverageLimit,
    Deductible,
    Exclusion,
    Premium,
    TermsConditions,
    Other,
}

impl ChangeCategory {
    pub const ALL: [ChangeCategory; 6] = [
        Self::CoverageLimit,
        Self::Deductible,
        Self::Exclusion,
        Self::Premium,
        Self::TermsConditions,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CoverageLimit => "coverage_limit",
            Self::Deductible => "deductible",
            Self::Exclusion => "exclusion",
            Self::Premium => "premium",
            Self::TermsConditions => "terms_conditions",
            Self::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "coverage_limit" => Some(Self::CoverageLimit),
            "deductible" => Some(Self::Deductible),
            "exclusion" => Some(Self::Exclusion),
            "premium" => Some(Self::Premium),
            "terms_conditions" => Some(Self::TermsConditions),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Direction of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Increased,
    Decreased,
    Added,
    Removed,
    Modified,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Increased => "increased",
            Self::Decreased => "decreased",
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Modified => "modified",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "increased" => Some(Self::Increased),
            "decreased" => Some(Self::Decreased),
            "added" => Some(Self::Added),
            "removed" => Some(Self::Removed),
            "modified" => Some(Self::Modified),
            _ => None,
        }
    }
}

/// Per-category change counts. Field order matches [`ChangeCategory`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub coverage_limit: u32,
    pub deductible: u32,
    pub exclusion: u32,
    pub premium: u32,
    pub terms_conditions: u32,
    pub other: u32,
}

impl CategoryBreakdown {
    pub fn increment(&mut self, category: ChangeCategory) {
        match category {
            ChangeCategory::CoverageLimit => self.coverage_limit += 1,
            ChangeCategory::Deductible => self.deductible += 1,
            ChangeCategory::Exclusion => self.exclusion += 1,
            ChangeCategory::Premium => self.premium += 1,
            ChangeCategory::TermsConditions => self.terms_conditions += 1,
            ChangeCategory::Other => self.other += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.coverage_limit
            + self.deductible
            + self.exclusion
            + self.premium
            + self.terms_conditions
            + self.other
    }
}

/// Source-page citations into each document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageReferences {
    #[serde(default)]
    pub baseline: Vec<u32>,
    #[serde(default)]
    pub renewal: Vec<u32>,
}

/// One detected difference between the baseline and renewal documents.
///
/// Baseline/renewal values are display strings, not typed numbers, since
/// source values may be non-numeric ("Included" → "Excluded"). The signed
/// amount and percentage are present only when both sides were numeric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub id: String,
    pub category: ChangeCategory,
    pub change_type: ChangeType,
    pub title: String,
    pub description: String,
    pub baseline_value: String,
    pub renewal_value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage_change: Option<f64>,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_references: Option<PageReferences>,
}

/// Premium amounts from both documents. Every field is nullable: when the
/// model could not determine a premium for one side, difference and
/// percentage are absent rather than guessed, and the nulls are serialized
/// explicitly so callers can distinguish "unknown" from "omitted".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PremiumComparison {
    pub baseline_premium: Option<f64>,
    pub renewal_premium: Option<f64>,
    pub difference: Option<f64>,
    pub percentage_change: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionPriority {
    High,
    Medium,
    Low,
}

/// A short factual follow-up item for the policyholder's broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedAction {
    pub category: String,
    pub action: String,
    pub priority: ActionPriority,
}

/// Recomputed totals. Never trusted from the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub total_changes: u32,
    pub change_categories: CategoryBreakdown,
}

/// The validated, structured outcome of a completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub summary: ResultSummary,
    pub changes: Vec<Change>,
    pub premium_comparison: PremiumComparison,
    pub suggested_actions: Vec<SuggestedAction>,
    pub educational_insights: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
}

/// A persisted result with its audit metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResult {
    pub job_id: String,
    pub result: ComparisonResult,
    pub analysis_version: String,
    pub model_version: Option<String>,
    pub processing_time_seconds: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trip() {
        for category in ChangeCategory::ALL {
            assert_eq!(ChangeCategory::parse(category.as_str()), Some(category));
        }
        assert_eq!(ChangeCategory::parse("dental"), None);
    }

    #[test]
    fn test_change_type_round_trip() {
        for ct in [
            ChangeType::Increased,
            ChangeType::Decreased,
            ChangeType::Added,
            ChangeType::Removed,
            ChangeType::Modified,
        ] {
            assert_eq!(ChangeType::parse(ct.as_str()), Some(ct));
        }
        assert_eq!(ChangeType::parse("changed"), None);
    }

    #[test]
    fn test_serde_names_match_parse_names() {
        let json = serde_json::to_string(&ChangeCategory::TermsConditions).unwrap();
        assert_eq!(json, "\"terms_conditions\"");

        let json = serde_json::to_string(&ChangeType::Increased).unwrap();
        assert_eq!(json, "\"increased\"");

        let json = serde_json::to_string(&ActionPriority::High).unwrap();
        assert_eq!(json, "\"high\"");
    }

    #[test]
    fn test_breakdown_increment_and_total() {
        let mut breakdown = CategoryBreakdown::default();
        breakdown.increment(ChangeCategory::Premium);
        breakdown.increment(ChangeCategory::Premium);
        breakdown.increment(ChangeCategory::Exclusion);

        assert_eq!(breakdown.premium, 2);
        assert_eq!(breakdown.exclusion, 1);
        assert_eq!(breakdown.total(), 3);
    }

    #[test]
    fn test_premium_comparison_serializes_explicit_nulls() {
        let premium = PremiumComparison {
            baseline_premium: Some(15000.0),
            renewal_premium: None,
            difference: None,
            percentage_change: None,
        };

        let json = serde_json::to_value(&premium).unwrap();
        assert_eq!(json["baseline_premium"], 15000.0);
        assert!(json["renewal_premium"].is_null());
        assert!(json.as_object().unwrap().contains_key("difference"));
        assert!(json.as_object().unwrap().contains_key("percentage_change"));
    }

    #[test]
    fn test_change_omits_absent_amounts() {
        let change = Change {
            id: "change-1".to_string(),
            category: ChangeCategory::Exclusion,
            change_type: ChangeType::Added,
            title: "Cyber exclusion added".to_string(),
            description: "The renewal adds a cyber liability exclusion.".to_string(),
            baseline_value: "Not present".to_string(),
            renewal_value: "Excluded".to_string(),
            change_amount: None,
            percentage_change: None,
            confidence: 0.9,
            page_references: None,
        };

        let json = serde_json::to_value(&change).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("change_amount"));
        assert!(!obj.contains_key("percentage_change"));
        assert!(!obj.contains_key("page_references"));
    }
}
