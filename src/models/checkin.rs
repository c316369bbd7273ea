use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ConditionCategory, Trend};
use super::parameter::ParamValue;

/// One day's completed check-in. Append-only, immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckinRecord {
    pub id: Uuid,
    pub patient_key: String,
    pub patient_name: String,
    pub day: u32,
    pub raw_reply: String,
    pub values: HashMap<String, ParamValue>,
    pub category: ConditionCategory,
    pub trends: HashMap<String, Trend>,
    pub subjective: String,
    pub alert_triggered: bool,
    pub alerted_parameters: Vec<String>,
    pub clinician_summary: String,
    pub recorded_at: DateTime<Utc>,
}

impl CheckinRecord {
    /// A triage-only record for the day a self-reported critical answer
    /// terminates questioning before parameter collection.
    pub fn triage_only(
        patient_key: &str,
        patient_name: &str,
        day: u32,
        raw_reply: &str,
        category: ConditionCategory,
        summary: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_key: patient_key.into(),
            patient_name: patient_name.into(),
            day,
            raw_reply: raw_reply.into(),
            values: HashMap::new(),
            category,
            trends: HashMap::new(),
            subjective: String::new(),
            alert_triggered: category == ConditionCategory::Critical,
            alerted_parameters: vec![],
            clinician_summary: summary,
            recorded_at: Utc::now(),
        }
    }
}
