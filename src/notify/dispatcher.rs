//! Formats patient/clinician/emergency-contact notifications and hands
//! them to the delivery collaborators. Stateless; every send is
//! best-effort and failures only log.

use std::sync::Arc;

use crate::models::enums::AlertSeverity;
use crate::models::Enrollment;

use super::{EmailSender, MessageSender};

pub struct NotificationDispatcher {
    messages: Arc<dyn MessageSender>,
    email: Arc<dyn EmailSender>,
    clinician_phone: Option<String>,
    clinician_email: Option<String>,
}

impl NotificationDispatcher {
    pub fn new(
        messages: Arc<dyn MessageSender>,
        email: Arc<dyn EmailSender>,
        clinician_phone: Option<String>,
        clinician_email: Option<String>,
    ) -> Self {
        Self {
            messages,
            email,
            clinician_phone,
            clinician_email,
        }
    }

    /// Send a text to the patient. Never fails; delivery problems log.
    pub async fn send_text(&self, phone: &str, text: &str) {
        if let Err(e) = self.messages.send(phone, text).await {
            tracing::warn!(phone, error = %e, "Patient message delivery failed");
        }
    }

    async fn send_email(&self, address: &str, subject: &str, body: &str) {
        if let Err(e) = self.email.send(address, subject, body).await {
            tracing::warn!(address, error = %e, "Email delivery failed");
        }
    }

    // ── Enrollment ──────────────────────────────────────────

    pub async fn enrollment_confirmation(&self, e: &Enrollment) {
        let text = format!(
            "Hello {}, your recovery follow-up with {} has started. \
             You will receive a short daily check-in for the next {} days. \
             Your first check-in arrives shortly.",
            e.patient_name,
            e.clinician_display(),
            e.followup_days,
        );
        self.send_text(&e.phone, &text).await;

        if let Some(address) = &e.email {
            let body = format!(
                "<h2>Careline Follow-up</h2>\
                 <p>Dear {},</p>\
                 <p>You are now under follow-up care with <b>{}</b> for \
                 <b>{} days</b>. We will check in with you daily by message.</p>",
                e.patient_name,
                e.clinician_display(),
                e.followup_days,
            );
            self.send_email(address, "Careline follow-up started", &body).await;
        }
    }

    pub async fn program_complete(&self, e: &Enrollment) {
        let text = format!(
            "{}, your {}-day follow-up program is complete. Thank you for \
             checking in each day — {} has your full recovery record.",
            e.patient_name,
            e.followup_days,
            e.clinician_display(),
        );
        self.send_text(&e.phone, &text).await;
    }

    // ── Triage acknowledgments ──────────────────────────────

    pub async fn critical_ack(&self, e: &Enrollment) {
        let text = format!(
            "URGENT: we have immediately alerted {}. Please stay calm and \
             avoid physical activity. If this is an emergency, call your \
             hospital now.",
            e.clinician_display(),
        );
        self.send_text(&e.phone, &text).await;
    }

    pub async fn moderate_ack(&self, e: &Enrollment) {
        let text = format!(
            "Thank you {}. {} has been notified and will prioritize your \
             case. A few quick questions to complete today's check-in:",
            e.patient_name,
            e.clinician_display(),
        );
        self.send_text(&e.phone, &text).await;
    }

    pub async fn normal_ack(&self, e: &Enrollment) {
        let text = format!(
            "Glad to hear you are doing okay, {}. Please answer a few \
             quick questions:",
            e.patient_name,
        );
        self.send_text(&e.phone, &text).await;
    }

    /// After CompletedToday, further inbound messages only get this.
    pub async fn recorded_ack(&self, e: &Enrollment) {
        let text = format!(
            "Thank you {}. Your responses for today have been recorded and \
             will be reviewed by {}.",
            e.patient_name,
            e.clinician_display(),
        );
        self.send_text(&e.phone, &text).await;
    }

    // ── No-response escalation ──────────────────────────────

    /// The no-response trio: patient reminder, emergency contact
    /// (message + email), clinician. Returns the channels that were
    /// attempted, for the alert record.
    pub async fn no_response_escalation(&self, e: &Enrollment, day: u32) -> Vec<String> {
        let mut channels = vec!["message".to_string()];

        let text = format!(
            "Urgent reminder: we sent your Day {} check-in but received no \
             reply. We have notified your emergency contact and {}. If you \
             are in an emergency please call your hospital now. If you are \
             fine, please reply A, B, or C to continue.",
            day,
            e.clinician_display(),
        );
        self.send_text(&e.phone, &text).await;

        if let Some(contact) = &e.emergency_contact {
            let relation = contact.relation.as_deref().unwrap_or("contact");
            if let Some(phone) = &contact.phone {
                let text = format!(
                    "Careline alert: hello {}, your {} {} has not responded \
                     to their recovery check-in today. Please check on them \
                     and contact {} if needed.",
                    contact.name,
                    relation,
                    e.patient_name,
                    e.clinician_display(),
                );
                self.send_text(phone, &text).await;
            }
            if let Some(address) = &contact.email {
                let body = format!(
                    "<h2>Careline Emergency Alert</h2>\
                     <p>Dear <b>{}</b>,</p>\
                     <p><b>{}</b> has not responded to their recovery \
                     check-in.</p>\
                     <p><b>Please check on them immediately</b> and contact \
                     {} if needed.</p>",
                    contact.name,
                    e.patient_name,
                    e.clinician_display(),
                );
                self.send_email(
                    address,
                    &format!("EMERGENCY - {} not responding", e.patient_name),
                    &body,
                )
                .await;
                channels.push("email".to_string());
            }
        }

        let reason = format!("{} did not respond to the Day {} check-in.", e.patient_name, day);
        self.clinician_alert(&e.patient_name, &reason, AlertSeverity::Critical)
            .await;

        channels
    }

    // ── Clinician alerts ────────────────────────────────────

    /// Alert the assigned clinician on every configured channel.
    pub async fn clinician_alert(&self, patient_name: &str, reason: &str, severity: AlertSeverity) {
        if let Some(phone) = &self.clinician_phone {
            let text = format!(
                "Careline alert ({}): {} — {}",
                severity.as_str().to_uppercase(),
                patient_name,
                reason,
            );
            self.send_text(phone, &text).await;
        }
        if let Some(address) = &self.clinician_email {
            let subject = format!(
                "Careline alert - {} - {}",
                severity.as_str().to_uppercase(),
                patient_name,
            );
            let body = format!(
                "<h2>Patient Alert</h2>\
                 <p><b>Patient:</b> {patient_name}</p>\
                 <p><b>Severity:</b> {}</p>\
                 <p><b>Reason:</b> {reason}</p>\
                 <p>Please check the Careline dashboard.</p>",
                severity.as_str(),
            );
            self.send_email(address, &subject, &body).await;
        }
        if self.clinician_phone.is_none() && self.clinician_email.is_none() {
            tracing::warn!(patient_name, reason, "No clinician contact configured for alert");
        }
    }
}
