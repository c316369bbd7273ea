//! Shared types for the webhook API layer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{APP_NAME, APP_VERSION};
use crate::engine::FollowupEngine;
use crate::models::{EmergencyContact, Enrollment, ParameterDef};

/// Shared context for all webhook routes.
#[derive(Clone)]
pub struct ApiContext {
    pub engine: Arc<FollowupEngine>,
}

impl ApiContext {
    pub fn new(engine: Arc<FollowupEngine>) -> Self {
        Self { engine }
    }
}

// ── Request bodies ──────────────────────────────────────────

/// Inbound patient message, as forwarded by the messaging gateway.
#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    /// Sender number, in whatever format the gateway uses
    /// ("whatsapp:+919876543210", "+91 98765 43210", ...).
    pub from: String,
    #[serde(default)]
    pub body: String,
}

/// New enrollment webhook body.
#[derive(Debug, Deserialize)]
pub struct EnrollmentRequest {
    pub patient_key: String,
    pub patient_name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub emergency_contact: Option<EmergencyContact>,
    #[serde(default)]
    pub clinician_name: Option<String>,
    #[serde(default)]
    pub procedure: Option<String>,
    pub followup_days: u32,
    /// Monitoring parameters. An empty list falls back to the standard
    /// post-operative set.
    #[serde(default)]
    pub parameters: Vec<ParameterDef>,
}

impl EnrollmentRequest {
    pub fn into_enrollment(self) -> Enrollment {
        let parameters = if self.parameters.is_empty() {
            ParameterDef::standard_set()
        } else {
            self.parameters
        };
        let mut e = Enrollment::new(
            &self.patient_key,
            &self.patient_name,
            &self.phone,
            self.followup_days,
            parameters,
        );
        e.email = self.email;
        e.emergency_contact = self.emergency_contact;
        e.clinician_name = self.clinician_name;
        e.procedure = self.procedure;
        e
    }
}

/// Daily advance trigger body.
#[derive(Debug, Deserialize)]
pub struct AdvanceDayRequest {
    pub patient_key: String,
}

// ── Response bodies ─────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub name: &'static str,
    pub version: &'static str,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok",
            name: APP_NAME,
            version: APP_VERSION,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EnrollmentResponse {
    pub status: &'static str,
    pub patient_key: String,
    pub followup_days: u32,
}
