use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AlertCategory, AlertSeverity};

/// A clinician-facing escalation record. Append-only; `resolved` is
/// flipped by the dashboard, never by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationAlert {
    pub id: Uuid,
    pub patient_key: String,
    pub patient_name: String,
    pub category: AlertCategory,
    pub severity: AlertSeverity,
    pub day: u32,
    pub reason: String,
    pub resolved: bool,
    /// Channels the alert went out on ("message", "email").
    pub notified_via: Vec<String>,
    /// The check-in that triggered this alert, if any. None for the
    /// no-response path, where there is no check-in to reference.
    pub checkin_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl EscalationAlert {
    pub fn new(
        patient_key: &str,
        patient_name: &str,
        category: AlertCategory,
        severity: AlertSeverity,
        day: u32,
        reason: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_key: patient_key.into(),
            patient_name: patient_name.into(),
            category,
            severity,
            day,
            reason,
            resolved: false,
            notified_via: vec![],
            checkin_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn via(mut self, channels: &[&str]) -> Self {
        self.notified_via = channels.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn for_checkin(mut self, checkin_id: Uuid) -> Self {
        self.checkin_id = Some(checkin_id);
        self
    }
}
