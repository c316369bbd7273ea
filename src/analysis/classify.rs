//! Condition Classifier — the day's overall category.
//!
//! The priority ordering below encodes the clinical escalation policy
//! and must not be reordered: self-reported critical always wins, then
//! multiple crossed alarms, then a single crossed alarm on a
//! cardio-respiratory parameter, then the note-worthy cases.

use crate::models::enums::{ConditionCategory, TriageAnswer};

/// Parameter-name fragments that make a single crossed alarm critical.
const CRITICAL_KEYWORDS: &[&str] = &[
    "chest",
    "heart",
    "cardiac",
    "pulse",
    "bp",
    "blood pressure",
    "breathing",
    "oxygen",
];

pub fn classify(triage: TriageAnswer, crossed: &[String]) -> ConditionCategory {
    if triage == TriageAnswer::Critical {
        return ConditionCategory::Critical;
    }
    if crossed.len() >= 2 {
        return ConditionCategory::Critical;
    }
    if crossed.len() == 1 && is_critical_parameter(&crossed[0]) {
        return ConditionCategory::Critical;
    }
    if triage == TriageAnswer::Moderate || crossed.len() == 1 {
        return ConditionCategory::Note;
    }
    ConditionCategory::Normal
}

fn is_critical_parameter(name: &str) -> bool {
    let lower = name.to_lowercase();
    CRITICAL_KEYWORDS.iter().any(|kw| lower.contains(kw))
}
