use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{ConditionCategory, ConversationState, EnrollmentStatus, TriageAnswer};
use super::parameter::{ParamValue, ParameterDef};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub relation: Option<String>,
}

/// One patient's active follow-up program.
///
/// This is the single record both the inbound-reply path and the
/// timeout path read and write. `conversation_state` is the source of
/// truth for arbitration between them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub patient_key: String,
    pub patient_name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub emergency_contact: Option<EmergencyContact>,
    #[serde(default)]
    pub clinician_name: Option<String>,
    /// Free-text procedure description ("Knee replacement").
    #[serde(default)]
    pub procedure: Option<String>,

    pub followup_days: u32,
    /// 0 before day 1.
    pub current_day: u32,
    pub status: EnrollmentStatus,
    pub parameters: Vec<ParameterDef>,
    pub conversation_state: ConversationState,

    /// Previous day's parsed parameter answers.
    #[serde(default)]
    pub last_values: HashMap<String, ParamValue>,
    #[serde(default)]
    pub last_subjective: String,
    #[serde(default)]
    pub last_category: Option<ConditionCategory>,

    // Escalation bookkeeping for the current cycle.
    #[serde(default)]
    pub triage_sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_triage_answer: Option<TriageAnswer>,
    #[serde(default)]
    pub escalation_fired: bool,

    #[serde(default)]
    pub checkins_completed: u32,
    pub enrolled_at: DateTime<Utc>,
}

impl Enrollment {
    pub fn new(
        patient_key: &str,
        patient_name: &str,
        phone: &str,
        followup_days: u32,
        parameters: Vec<ParameterDef>,
    ) -> Self {
        Self {
            patient_key: patient_key.into(),
            patient_name: patient_name.into(),
            phone: phone.into(),
            email: None,
            emergency_contact: None,
            clinician_name: None,
            procedure: None,
            followup_days,
            current_day: 0,
            status: EnrollmentStatus::Active,
            parameters,
            conversation_state: ConversationState::Idle,
            last_values: HashMap::new(),
            last_subjective: String::new(),
            last_category: None,
            triage_sent_at: None,
            last_triage_answer: None,
            escalation_fired: false,
            checkins_completed: 0,
            enrolled_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == EnrollmentStatus::Active
    }

    pub fn clinician_display(&self) -> String {
        match &self.clinician_name {
            Some(name) => format!("Dr. {name}"),
            None => "your doctor".to_string(),
        }
    }

    /// Apply a field-level patch. Store implementations call this under
    /// their single-record write lock so a patch is atomic.
    pub fn apply(&mut self, patch: EnrollmentPatch) {
        if let Some(v) = patch.conversation_state {
            self.conversation_state = v;
        }
        if let Some(v) = patch.status {
            self.status = v;
        }
        if let Some(v) = patch.current_day {
            self.current_day = v;
        }
        if let Some(v) = patch.triage_sent_at {
            self.triage_sent_at = Some(v);
        }
        if let Some(v) = patch.last_triage_answer {
            self.last_triage_answer = Some(v);
        }
        if let Some(v) = patch.escalation_fired {
            self.escalation_fired = v;
        }
        if let Some(v) = patch.last_values {
            self.last_values = v;
        }
        if let Some(v) = patch.last_subjective {
            self.last_subjective = v;
        }
        if let Some(v) = patch.last_category {
            self.last_category = Some(v);
        }
        if let Some(v) = patch.checkins_completed {
            self.checkins_completed = v;
        }
    }
}

/// Field changes for a single-record update.
///
/// Mirrors the record store's "update these fields" contract: only the
/// populated fields are written, everything else is left untouched.
#[derive(Debug, Clone, Default)]
pub struct EnrollmentPatch {
    pub conversation_state: Option<ConversationState>,
    pub status: Option<EnrollmentStatus>,
    pub current_day: Option<u32>,
    pub triage_sent_at: Option<DateTime<Utc>>,
    pub last_triage_answer: Option<TriageAnswer>,
    pub escalation_fired: Option<bool>,
    pub last_values: Option<HashMap<String, ParamValue>>,
    pub last_subjective: Option<String>,
    pub last_category: Option<ConditionCategory>,
    pub checkins_completed: Option<u32>,
}

impl EnrollmentPatch {
    /// Shorthand for the most common patch: a bare state transition.
    pub fn state(state: ConversationState) -> Self {
        Self {
            conversation_state: Some(state),
            ..Default::default()
        }
    }
}
