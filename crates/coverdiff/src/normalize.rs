//! Result normalization.
//!
//! Parses the model's raw textual output into a [`ComparisonResult`],
//! rejecting anything outside the fixed schema. One bad change rejects
//! the whole result; a partially trusted comparison is worse than an
//! explicit failure. Totals and premium deltas are always recomputed
//! here, never taken from the model.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::comparison::{
    ActionPriority, CategoryBreakdown, Change, ChangeCategory, ChangeType, ComparisonResult,
    PageReferences, PremiumComparison, ResultSummary, SuggestedAction,
};

/// Models often wrap the JSON payload in a markdown code fence.
const FENCE_PATTERN: &str = r"(?s)```(?:json)?\s*\n(.*?)\n```";

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("Failed to parse model output as JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Missing required field '{field}'")]
    MissingField { field: &'static str },

    #[error("Change {index}: missing required field '{field}'")]
    MissingChangeField { index: usize, field: &'static str },

    #[error("Change {index}: unknown category '{value}'")]
    UnknownCategory { index: usize, value: String },

    #[error("Change {index}: unknown change type '{value}'")]
    UnknownChangeType { index: usize, value: String },

    #[error("Change {index}: confidence {value} outside [0, 1]")]
    ConfidenceOutOfRange { index: usize, value: f64 },

    #[error("Change {index}: change type '{change_type}' is not valid for a premium change")]
    InconsistentChangeType {
        index: usize,
        change_type: &'static str,
    },

    #[error("Change {index}: change_amount is neither a string nor a number")]
    InvalidChangeAmount { index: usize },
}

#[derive(Debug, Deserialize)]
struct RawComparison {
    coverage_changes: Option<Vec<RawChange>>,
    premium_comparison: Option<RawPremium>,
    #[serde(default)]
    broker_questions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawChange {
    category: Option<String>,
    change_type: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    baseline_value: String,
    #[serde(default)]
    renewal_value: String,
    #[serde(default)]
    change_amount: Option<Value>,
    #[serde(default)]
    percentage_change: Option<f64>,
    confidence: Option<f64>,
    #[serde(default)]
    page_references: Option<RawPageReferences>,
}

#[derive(Debug, Deserialize)]
struct RawPageReferences {
    #[serde(default)]
    baseline: Vec<u32>,
    #[serde(default)]
    renewal: Vec<u32>,
}

/// Only the two source amounts are read; a model-reported difference or
/// percentage is ignored and recomputed.
#[derive(Debug, Deserialize)]
struct RawPremium {
    #[serde(default)]
    baseline_premium: Option<Value>,
    #[serde(default)]
    renewal_premium: Option<Value>,
}

/// Normalizes raw model output into a validated [`ComparisonResult`].
pub fn normalize(raw: &str) -> Result<ComparisonResult, NormalizeError> {
    let payload = extract_payload(raw);
    let parsed: RawComparison = serde_json::from_str(payload)?;

    let raw_changes = parsed.coverage_changes.ok_or(NormalizeError::MissingField {
        field: "coverage_changes",
    })?;
    let raw_premium = parsed
        .premium_comparison
        .ok_or(NormalizeError::MissingField {
            field: "premium_comparison",
        })?;

    let mut changes = Vec::with_capacity(raw_changes.len());
    let mut categories = CategoryBreakdown::default();
    for (index, raw_change) in raw_changes.into_iter().enumerate() {
        let change = validate_change(index, raw_change)?;
        categories.increment(change.category);
        changes.push(change);
    }

    let confidence_score = if changes.is_empty() {
        None
    } else {
        Some(changes.iter().map(|c| c.confidence).sum::<f64>() / changes.len() as f64)
    };

    let suggested_actions = parsed
        .broker_questions
        .into_iter()
        .enumerate()
        .map(|(i, question)| SuggestedAction {
            category: "broker_review".to_string(),
            action: question,
            priority: if i < 2 {
                ActionPriority::High
            } else {
                ActionPriority::Medium
            },
        })
        .collect();

    Ok(ComparisonResult {
        summary: ResultSummary {
            total_changes: changes.len() as u32,
            change_categories: categories,
        },
        changes,
        premium_comparison: compute_premium(&raw_premium),
        suggested_actions,
        educational_insights: Vec::new(),
        confidence_score,
    })
}

/// Returns the fenced JSON block if present, otherwise the trimmed text.
fn extract_payload(raw: &str) -> &str {
    if let Ok(re) = Regex::new(FENCE_PATTERN) {
        if let Some(m) = re.captures(raw).and_then(|c| c.get(1)) {
            return m.as_str();
        }
    }
    raw.trim()
}

fn validate_change(index: usize, raw: RawChange) -> Result<Change, NormalizeError> {
    let category_str = raw
        .category
        .ok_or(NormalizeError::MissingChangeField {
            index,
            field: "category",
        })?;
    let category =
        ChangeCategory::parse(&category_str).ok_or_else(|| NormalizeError::UnknownCategory {
            index,
            value: category_str.clone(),
        })?;

    let change_type_str = raw
        .change_type
        .ok_or(NormalizeError::MissingChangeField {
            index,
            field: "change_type",
        })?;
    let change_type =
        ChangeType::parse(&change_type_str).ok_or_else(|| NormalizeError::UnknownChangeType {
            index,
            value: change_type_str.clone(),
        })?;

    // A premium is always present on both sides of a renewal; it can move
    // but not appear or vanish.
    if category == ChangeCategory::Premium
        && matches!(change_type, ChangeType::Added | ChangeType::Removed)
    {
        return Err(NormalizeError::InconsistentChangeType {
            index,
            change_type: change_type.as_str(),
        });
    }

    let confidence = raw.confidence.ok_or(NormalizeError::MissingChangeField {
        index,
        field: "confidence",
    })?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(NormalizeError::ConfidenceOutOfRange {
            index,
            value: confidence,
        });
    }

    let change_amount = match raw.change_amount {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(_) => return Err(NormalizeError::InvalidChangeAmount { index }),
    };

    Ok(Change {
        id: format!("change-{}", index + 1),
        category,
        change_type,
        title: raw.title,
        description: raw.description,
        baseline_value: raw.baseline_value,
        renewal_value: raw.renewal_value,
        change_amount,
        percentage_change: raw.percentage_change,
        confidence,
        page_references: raw.page_references.map(|p| PageReferences {
            baseline: p.baseline,
            renewal: p.renewal,
        }),
    })
}

/// Derives difference and percentage from the two source amounts. A side
/// that is missing or non-numeric leaves both derived fields absent, and
/// a zero baseline leaves the percentage absent.
fn compute_premium(raw: &RawPremium) -> PremiumComparison {
    let baseline = raw.baseline_premium.as_ref().and_then(Value::as_f64);
    let renewal = raw.renewal_premium.as_ref().and_then(Value::as_f64);

    let (difference, percentage_change) = match (baseline, renewal) {
        (Some(b), Some(r)) => {
            let diff = r - b;
            let pct = if b != 0.0 { Some(diff / b * 100.0) } else { None };
            (Some(diff), pct)
        }
        _ => (None, None),
    };

    PremiumComparison {
        baseline_premium: baseline,
        renewal_premium: renewal,
        difference,
        percentage_change,
    }
}
