//! Conversation state machine — the core orchestrator.
//!
//! Owns state transitions for the daily check-in cycle and arbitrates
//! between the two paths that mutate the same patient record:
//!
//! - the **event path**: an inbound reply arrives and, before any
//!   analysis or external call, writes the successor transient state —
//!   that write is the cancellation signal for the timeout path;
//! - the **timeout path**: after the full reply window plus a
//!   propagation buffer, re-reads the record and escalates only if the
//!   state is still `AwaitingTriage`.
//!
//! The store offers atomic single-record updates but no transactions
//! across the two paths, so arbitration is best-effort by design: the
//! trailing buffer makes the event path the usual winner, it does not
//! make it a guaranteed one.

pub mod timer;

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::analysis::{self, parse_triage, ParameterInterpreter};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::models::enums::{
    AlertCategory, AlertSeverity, ConditionCategory, ConversationState, EnrollmentStatus,
    TriageAnswer,
};
use crate::models::{CheckinRecord, Enrollment, EnrollmentPatch, EscalationAlert};
use crate::notify::NotificationDispatcher;
use crate::questions;
use crate::store::RecordStore;

pub use timer::EscalationTimer;

/// What the engine did with an inbound reply. Returned to the webhook
/// layer for its response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReplyOutcome {
    /// No active enrollment matches the sender.
    PatientNotFound,
    /// Triage answer recorded; the parameter phase (or the day's close,
    /// on self-reported critical) follows.
    TriageRecorded { answer: TriageAnswer },
    /// Parameter reply analyzed and the day closed.
    ParametersRecorded { category: ConditionCategory },
    /// Day already complete — acknowledged, nothing changed.
    AlreadyCompleted,
    /// Reply landed in a transient or pre-cycle state — acknowledged,
    /// no transition.
    Acknowledged,
}

/// Result of an external `advance_day` trigger.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DayOutcome {
    /// All follow-up days done; enrollment flipped to Completed.
    ProgramCompleted,
    /// Next cycle started.
    CycleStarted { day: u32 },
    /// Enrollment is not active; nothing to do.
    Inactive,
}

pub struct FollowupEngine {
    store: Arc<dyn RecordStore>,
    dispatcher: NotificationDispatcher,
    interpreter: ParameterInterpreter,
    timer: EscalationTimer,
    config: EngineConfig,
}

impl FollowupEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        dispatcher: NotificationDispatcher,
        interpreter: ParameterInterpreter,
        config: EngineConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            dispatcher,
            interpreter,
            timer: EscalationTimer::new(),
            config,
        })
    }

    pub fn timer(&self) -> &EscalationTimer {
        &self.timer
    }

    // ── Entry point: enrollment ─────────────────────────────

    /// Begin a follow-up program. Persists the enrollment (superseding
    /// any prior one under the same key), confirms to the patient, and
    /// schedules the first triage question after the configured delay.
    /// Returns without waiting for the question to go out.
    pub async fn on_enrollment_started(
        self: &Arc<Self>,
        mut enrollment: Enrollment,
    ) -> Result<(), EngineError> {
        enrollment.status = EnrollmentStatus::Active;
        enrollment.conversation_state = ConversationState::Idle;
        enrollment.current_day = 0;

        tracing::info!(
            patient = %enrollment.patient_key,
            days = enrollment.followup_days,
            parameters = enrollment.parameters.len(),
            "Enrollment started"
        );

        self.store.put(enrollment.clone()).await?;
        self.dispatcher.enrollment_confirmation(&enrollment).await;

        let engine = Arc::clone(self);
        let key = enrollment.patient_key.clone();
        let delay = self.config.question_send_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = engine.begin_cycle(&key, 1).await {
                tracing::warn!(patient = %key, error = %e, "First cycle did not start");
            }
        });

        Ok(())
    }

    // ── Entry point: daily trigger ──────────────────────────

    /// External daily trigger: close the program if all days are done,
    /// otherwise start the next cycle.
    pub async fn advance_day(self: &Arc<Self>, patient_key: &str) -> Result<DayOutcome, EngineError> {
        let enrollment = self
            .store
            .get(patient_key)
            .await?
            .ok_or_else(|| EngineError::PatientNotFound(patient_key.to_string()))?;

        if !enrollment.is_active() {
            return Ok(DayOutcome::Inactive);
        }

        if enrollment.current_day >= enrollment.followup_days {
            self.store
                .update(
                    patient_key,
                    EnrollmentPatch {
                        status: Some(EnrollmentStatus::Completed),
                        ..Default::default()
                    },
                )
                .await?;
            self.dispatcher.program_complete(&enrollment).await;
            tracing::info!(patient = %patient_key, "Follow-up program completed");
            return Ok(DayOutcome::ProgramCompleted);
        }

        let day = enrollment.current_day + 1;
        self.begin_cycle(patient_key, day).await?;
        Ok(DayOutcome::CycleStarted { day })
    }

    /// Start one day's cycle: move to AwaitingTriage, send the triage
    /// question, and arm the escalation check.
    ///
    /// The state patch lands before the send so a delivery failure still
    /// leaves an armed escalation — the patient then gets the urgent
    /// reminder instead of silence.
    async fn begin_cycle(self: &Arc<Self>, patient_key: &str, day: u32) -> Result<(), EngineError> {
        let Some(enrollment) = self.store.get(patient_key).await? else {
            return Err(EngineError::PatientNotFound(patient_key.to_string()));
        };
        if !enrollment.is_active() {
            tracing::debug!(patient = %patient_key, "Skipping cycle for inactive enrollment");
            return Ok(());
        }

        let from = enrollment.conversation_state;
        if !from.can_transition(ConversationState::AwaitingTriage) {
            return Err(EngineError::InvalidTransition {
                from,
                to: ConversationState::AwaitingTriage,
            });
        }

        self.store
            .update(
                patient_key,
                EnrollmentPatch {
                    conversation_state: Some(ConversationState::AwaitingTriage),
                    current_day: Some(day),
                    triage_sent_at: Some(Utc::now()),
                    escalation_fired: Some(false),
                    ..Default::default()
                },
            )
            .await?;

        let question = questions::triage_question(&enrollment, day);
        self.dispatcher.send_text(&enrollment.phone, &question).await;
        tracing::info!(patient = %patient_key, day, "Triage question sent");

        self.timer.schedule(
            Arc::clone(self),
            patient_key.to_string(),
            day,
            self.config.escalation_delay(),
        );
        Ok(())
    }

    // ── Entry point: inbound reply (event path) ─────────────

    pub async fn handle_inbound_reply(
        &self,
        from: &str,
        text: &str,
    ) -> Result<ReplyOutcome, EngineError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(ReplyOutcome::Acknowledged);
        }

        let Some(enrollment) = self.store.find_active_by_phone(from).await? else {
            tracing::warn!(from, "Reply from unknown or inactive number");
            return Ok(ReplyOutcome::PatientNotFound);
        };

        let state = enrollment.conversation_state;
        tracing::info!(
            patient = %enrollment.patient_key,
            %state,
            day = enrollment.current_day,
            "Inbound reply"
        );

        match state {
            ConversationState::AwaitingTriage => {
                self.handle_triage_reply(&enrollment, text, false).await
            }
            ConversationState::NoResponseEscalated => {
                self.handle_triage_reply(&enrollment, text, true).await
            }
            ConversationState::AwaitingParameters => {
                self.handle_parameter_reply(&enrollment, text).await
            }
            ConversationState::CompletedToday => {
                self.dispatcher.recorded_ack(&enrollment).await;
                Ok(ReplyOutcome::AlreadyCompleted)
            }
            // Pre-cycle or mid-processing: acknowledge, never drop into
            // silence, but no transition either.
            ConversationState::Idle
            | ConversationState::TriageAnswered
            | ConversationState::ParametersAnswered => {
                self.dispatcher.recorded_ack(&enrollment).await;
                Ok(ReplyOutcome::Acknowledged)
            }
        }
    }

    /// Triage-phase reply. `late` marks a reply arriving after the
    /// escalation fired; it re-engages the same flow.
    async fn handle_triage_reply(
        &self,
        enrollment: &Enrollment,
        text: &str,
        late: bool,
    ) -> Result<ReplyOutcome, EngineError> {
        // Cancellation signal: this write must precede all analysis and
        // external calls. The timeout path's re-read keys off it.
        self.transition(enrollment, ConversationState::TriageAnswered)
            .await?;
        if late {
            tracing::info!(patient = %enrollment.patient_key, "Late reply after escalation — re-engaging");
        }

        let answer = parse_triage(text, self.config.triage_fallback);
        self.store
            .update(
                &enrollment.patient_key,
                EnrollmentPatch {
                    last_triage_answer: Some(answer),
                    ..Default::default()
                },
            )
            .await?;
        tracing::info!(patient = %enrollment.patient_key, %answer, "Triage answer parsed");

        let day = enrollment.current_day;
        match answer {
            TriageAnswer::Critical => {
                let summary = format!(
                    "{} self-reported a critical condition on day {day}.",
                    enrollment.patient_name
                );
                let record = CheckinRecord::triage_only(
                    &enrollment.patient_key,
                    &enrollment.patient_name,
                    day,
                    text,
                    ConditionCategory::Critical,
                    summary.clone(),
                );
                let alert = EscalationAlert::new(
                    &enrollment.patient_key,
                    &enrollment.patient_name,
                    AlertCategory::Critical,
                    AlertSeverity::Critical,
                    day,
                    summary.clone(),
                )
                .via(&["message", "email"])
                .for_checkin(record.id);

                self.store.append_checkin(record).await?;
                self.store.append_alert(alert).await?;

                self.dispatcher.critical_ack(enrollment).await;
                self.dispatcher
                    .clinician_alert(&enrollment.patient_name, &summary, AlertSeverity::Critical)
                    .await;

                self.close_day(enrollment, ConditionCategory::Critical).await?;
                Ok(ReplyOutcome::TriageRecorded { answer })
            }
            TriageAnswer::Moderate => {
                let reason = format!(
                    "{} reported moderate discomfort in the day {day} check-in.",
                    enrollment.patient_name
                );
                let alert = EscalationAlert::new(
                    &enrollment.patient_key,
                    &enrollment.patient_name,
                    AlertCategory::Moderate,
                    AlertSeverity::Notice,
                    day,
                    reason.clone(),
                )
                .via(&["message", "email"]);
                self.store.append_alert(alert).await?;

                self.dispatcher.moderate_ack(enrollment).await;
                self.dispatcher
                    .clinician_alert(&enrollment.patient_name, &reason, AlertSeverity::Notice)
                    .await;

                self.begin_parameter_phase(enrollment).await?;
                Ok(ReplyOutcome::TriageRecorded { answer })
            }
            TriageAnswer::Normal => {
                self.dispatcher.normal_ack(enrollment).await;
                self.begin_parameter_phase(enrollment).await?;
                Ok(ReplyOutcome::TriageRecorded { answer })
            }
        }
    }

    async fn begin_parameter_phase(&self, enrollment: &Enrollment) -> Result<(), EngineError> {
        self.store
            .update(
                &enrollment.patient_key,
                EnrollmentPatch::state(ConversationState::AwaitingParameters),
            )
            .await?;
        let question = questions::parameter_questions(enrollment);
        self.dispatcher.send_text(&enrollment.phone, &question).await;
        tracing::info!(patient = %enrollment.patient_key, "Parameter questions sent");
        Ok(())
    }

    /// Parameter-phase reply: run the analysis pipeline and close the day.
    async fn handle_parameter_reply(
        &self,
        enrollment: &Enrollment,
        text: &str,
    ) -> Result<ReplyOutcome, EngineError> {
        // Same contract as triage: state first, lengthy work after.
        self.transition(enrollment, ConversationState::ParametersAnswered)
            .await?;

        let triage = enrollment
            .last_triage_answer
            .unwrap_or(self.config.triage_fallback);
        let day = enrollment.current_day;

        let analysis =
            analysis::analyze_reply(&self.interpreter, enrollment, triage, text, day).await;

        let record = CheckinRecord {
            id: uuid::Uuid::new_v4(),
            patient_key: enrollment.patient_key.clone(),
            patient_name: enrollment.patient_name.clone(),
            day,
            raw_reply: text.to_string(),
            values: analysis.values.clone(),
            category: analysis.category,
            trends: analysis.trends.clone(),
            subjective: analysis.subjective.clone(),
            alert_triggered: analysis.alert_triggered,
            alerted_parameters: analysis.crossed.clone(),
            clinician_summary: analysis.summary.clone(),
            recorded_at: Utc::now(),
        };
        let record_id = record.id;
        self.store.append_checkin(record).await?;

        if analysis.alert_triggered {
            let (category, severity) = if !analysis.crossed.is_empty() {
                (
                    AlertCategory::ThresholdCrossed,
                    if analysis.category == ConditionCategory::Critical {
                        AlertSeverity::Critical
                    } else {
                        AlertSeverity::Notice
                    },
                )
            } else if analysis.category == ConditionCategory::Critical {
                (AlertCategory::Critical, AlertSeverity::Critical)
            } else {
                (AlertCategory::Moderate, AlertSeverity::Notice)
            };

            let alert = EscalationAlert::new(
                &enrollment.patient_key,
                &enrollment.patient_name,
                category,
                severity,
                day,
                analysis.summary.clone(),
            )
            .via(&["message", "email"])
            .for_checkin(record_id);
            self.store.append_alert(alert).await?;

            self.dispatcher
                .clinician_alert(&enrollment.patient_name, &analysis.summary, severity)
                .await;
        }

        self.store
            .update(
                &enrollment.patient_key,
                EnrollmentPatch {
                    last_values: Some(analysis.values),
                    last_subjective: Some(analysis.subjective),
                    ..Default::default()
                },
            )
            .await?;
        self.close_day(enrollment, analysis.category).await?;
        self.dispatcher.recorded_ack(enrollment).await;

        Ok(ReplyOutcome::ParametersRecorded {
            category: analysis.category,
        })
    }

    /// Seal the cycle: CompletedToday, last category, counter bump.
    async fn close_day(
        &self,
        enrollment: &Enrollment,
        category: ConditionCategory,
    ) -> Result<(), EngineError> {
        self.store
            .update(
                &enrollment.patient_key,
                EnrollmentPatch {
                    conversation_state: Some(ConversationState::CompletedToday),
                    last_category: Some(category),
                    checkins_completed: Some(enrollment.checkins_completed + 1),
                    ..Default::default()
                },
            )
            .await?;
        tracing::info!(
            patient = %enrollment.patient_key,
            day = enrollment.current_day,
            category = %category,
            "Day complete"
        );
        Ok(())
    }

    // ── Timeout path ────────────────────────────────────────

    /// The timeout check, invoked by the escalation timer after the
    /// reply window plus the propagation buffer. Re-reads state and
    /// escalates exactly once if no reply has landed. Returns whether an
    /// escalation fired. Never errors: a failing store read means we
    /// cannot tell, and guessing "escalate" on a transient fault would
    /// violate exactly-once far more often than it would save a patient.
    pub async fn escalation_check(&self, patient_key: &str, day: u32) -> bool {
        let enrollment = match self.store.get(patient_key).await {
            Ok(Some(e)) => e,
            Ok(None) => {
                tracing::warn!(patient = %patient_key, "Escalation check: record gone");
                return false;
            }
            Err(e) => {
                tracing::warn!(patient = %patient_key, error = %e, "Escalation check: store read failed");
                return false;
            }
        };

        if !enrollment.is_active() {
            tracing::debug!(patient = %patient_key, "Escalation check: enrollment no longer active");
            return false;
        }
        if enrollment.current_day != day {
            tracing::debug!(patient = %patient_key, day, "Escalation check: stale timer for an earlier day");
            return false;
        }
        if enrollment.escalation_fired
            || enrollment.conversation_state != ConversationState::AwaitingTriage
        {
            tracing::info!(
                patient = %patient_key,
                state = %enrollment.conversation_state,
                "Reply already landed — timeout path is a no-op"
            );
            return false;
        }

        // Claim the escalation first; the state write is what makes a
        // duplicate firing a no-op.
        let claim = self
            .store
            .update(
                patient_key,
                EnrollmentPatch {
                    conversation_state: Some(ConversationState::NoResponseEscalated),
                    escalation_fired: Some(true),
                    ..Default::default()
                },
            )
            .await;
        if let Err(e) = claim {
            tracing::warn!(patient = %patient_key, error = %e, "Escalation claim failed");
            return false;
        }

        tracing::warn!(patient = %patient_key, day, "No response — escalating");
        let channels = self.dispatcher.no_response_escalation(&enrollment, day).await;

        let reason = format!(
            "{} did not respond to the day {day} check-in.",
            enrollment.patient_name
        );
        let alert = EscalationAlert::new(
            patient_key,
            &enrollment.patient_name,
            AlertCategory::NoResponse,
            AlertSeverity::Critical,
            day,
            reason,
        )
        .via(&channels.iter().map(String::as_str).collect::<Vec<_>>());
        if let Err(e) = self.store.append_alert(alert).await {
            tracing::warn!(patient = %patient_key, error = %e, "Escalation alert append failed");
        }
        true
    }

    // ── Internal ────────────────────────────────────────────

    /// Validated state transition. Invalid moves are a typed error, not
    /// a silent skip.
    async fn transition(
        &self,
        enrollment: &Enrollment,
        to: ConversationState,
    ) -> Result<(), EngineError> {
        let from = enrollment.conversation_state;
        if !from.can_transition(to) {
            return Err(EngineError::InvalidTransition { from, to });
        }
        self.store
            .update(&enrollment.patient_key, EnrollmentPatch::state(to))
            .await?;
        tracing::debug!(patient = %enrollment.patient_key, %from, %to, "State transition");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::*;
    use crate::completion::{CompletionError, CompletionService};
    use crate::models::{EmergencyContact, ParameterDef};
    use crate::notify::{DeliveryError, EmailSender, MessageSender};
    use crate::store::MemoryStore;

    // ── Mocks ───────────────────────────────────────────────

    struct RecordingSender(Mutex<Vec<(String, String)>>);

    impl RecordingSender {
        fn shared() -> Arc<Self> {
            Arc::new(Self(Mutex::new(vec![])))
        }

        async fn sent(&self) -> Vec<(String, String)> {
            self.0.lock().await.clone()
        }
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
        async fn send(&self, phone: &str, text: &str) -> Result<(), DeliveryError> {
            self.0.lock().await.push((phone.into(), text.into()));
            Ok(())
        }
    }

    struct NullEmail;

    #[async_trait]
    impl EmailSender for NullEmail {
        async fn send(&self, _: &str, _: &str, _: &str) -> Result<(), DeliveryError> {
            Ok(())
        }
    }

    struct Scripted(String);

    #[async_trait]
    impl CompletionService for Scripted {
        async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
            Ok(self.0.clone())
        }
    }

    struct Down;

    #[async_trait]
    impl CompletionService for Down {
        async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
            Err(CompletionError::Transport("connection refused".into()))
        }
    }

    // ── Fixture ─────────────────────────────────────────────

    struct Fixture {
        engine: Arc<FollowupEngine>,
        store: Arc<MemoryStore>,
        messages: Arc<RecordingSender>,
    }

    fn fixture(completion: Arc<dyn CompletionService>) -> Fixture {
        let store = MemoryStore::shared();
        let messages = RecordingSender::shared();
        let dispatcher = NotificationDispatcher::new(
            messages.clone(),
            Arc::new(NullEmail),
            Some("919800000000".into()),
            Some("clinic@example.com".into()),
        );
        let engine = FollowupEngine::new(
            store.clone(),
            dispatcher,
            ParameterInterpreter::new(completion),
            EngineConfig::default(),
        );
        Fixture {
            engine,
            store,
            messages,
        }
    }

    fn scripted_fixture(json: &str) -> Fixture {
        fixture(Arc::new(Scripted(json.into())))
    }

    fn enrollment() -> Enrollment {
        let mut e = Enrollment::new(
            "p1",
            "Asha",
            "919876543210",
            7,
            ParameterDef::standard_set(),
        );
        e.clinician_name = Some("Mehta".into());
        e.emergency_contact = Some(EmergencyContact {
            name: "Ravi".into(),
            phone: Some("919812345678".into()),
            email: Some("ravi@example.com".into()),
            relation: Some("brother".into()),
        });
        e
    }

    async fn state_of(store: &MemoryStore, key: &str) -> ConversationState {
        store.get(key).await.unwrap().unwrap().conversation_state
    }

    /// Enroll and advance to day 1 AwaitingTriage without waiting out
    /// the enrollment delay.
    async fn start_day_one(f: &Fixture) {
        f.store.put(enrollment()).await.unwrap();
        let outcome = f.engine.advance_day("p1").await.unwrap();
        assert_eq!(outcome, DayOutcome::CycleStarted { day: 1 });
        assert_eq!(state_of(&f.store, "p1").await, ConversationState::AwaitingTriage);
    }

    // ── Race arbitration ────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn reply_before_timeout_suppresses_escalation() {
        let f = scripted_fixture("{}");
        start_day_one(&f).await;

        let outcome = f.engine.handle_inbound_reply("919876543210", "A").await.unwrap();
        assert_eq!(
            outcome,
            ReplyOutcome::TriageRecorded {
                answer: TriageAnswer::Normal
            }
        );
        assert_eq!(state_of(&f.store, "p1").await, ConversationState::AwaitingParameters);

        // Let the armed timeout check fire. It must find the reply and
        // stand down.
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(state_of(&f.store, "p1").await, ConversationState::AwaitingParameters);
        assert!(f.store.alerts().await.is_empty(), "no escalation alert");
        let e = f.store.get("p1").await.unwrap().unwrap();
        assert!(!e.escalation_fired);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_without_reply_escalates_exactly_once() {
        let f = scripted_fixture("{}");
        start_day_one(&f).await;

        tokio::time::sleep(Duration::from_secs(60)).await;

        let e = f.store.get("p1").await.unwrap().unwrap();
        assert_eq!(e.conversation_state, ConversationState::NoResponseEscalated);
        assert!(e.escalation_fired);

        let alerts = f.store.alerts().await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].category, AlertCategory::NoResponse);
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
        assert!(alerts[0].checkin_id.is_none());

        // Patient reminder, emergency contact, clinician.
        let phones: Vec<String> = f
            .messages
            .sent()
            .await
            .into_iter()
            .map(|(p, _)| p)
            .collect();
        assert!(phones.contains(&"919812345678".to_string()), "emergency contact");
        assert!(phones.contains(&"919800000000".to_string()), "clinician");

        // A duplicate firing is a no-op.
        assert!(!f.engine.escalation_check("p1", 1).await);
        assert_eq!(f.store.alerts().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn late_reply_after_escalation_reengages() {
        let f = scripted_fixture("{}");
        start_day_one(&f).await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(state_of(&f.store, "p1").await, ConversationState::NoResponseEscalated);

        let outcome = f.engine.handle_inbound_reply("919876543210", "B").await.unwrap();
        assert_eq!(
            outcome,
            ReplyOutcome::TriageRecorded {
                answer: TriageAnswer::Moderate
            }
        );
        assert_eq!(state_of(&f.store, "p1").await, ConversationState::AwaitingParameters);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_timer_for_earlier_day_is_ignored() {
        let f = scripted_fixture("{}");
        start_day_one(&f).await;
        // The record has moved on to a later day.
        f.store
            .update(
                "p1",
                EnrollmentPatch {
                    current_day: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!f.engine.escalation_check("p1", 1).await);
        assert!(f.store.alerts().await.is_empty());
    }

    // ── Triage answers ──────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn critical_self_report_closes_day_with_alert() {
        let f = scripted_fixture("{}");
        start_day_one(&f).await;

        let outcome = f.engine.handle_inbound_reply("919876543210", "C").await.unwrap();
        assert_eq!(
            outcome,
            ReplyOutcome::TriageRecorded {
                answer: TriageAnswer::Critical
            }
        );

        let e = f.store.get("p1").await.unwrap().unwrap();
        assert_eq!(e.conversation_state, ConversationState::CompletedToday);
        assert_eq!(e.last_category, Some(ConditionCategory::Critical));
        assert_eq!(e.checkins_completed, 1);

        let checkins = f.store.checkins().await;
        assert_eq!(checkins.len(), 1);
        assert!(checkins[0].alert_triggered);
        assert!(checkins[0].values.is_empty(), "no parameter phase");

        let alerts = f.store.alerts().await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].category, AlertCategory::Critical);
        assert_eq!(alerts[0].checkin_id, Some(checkins[0].id));

        // No parameter questions were sent after the urgent ack.
        let texts: Vec<String> = f
            .messages
            .sent()
            .await
            .into_iter()
            .map(|(_, t)| t)
            .collect();
        assert!(!texts.iter().any(|t| t.contains("Please answer:")));
    }

    #[tokio::test(start_paused = true)]
    async fn moderate_answer_alerts_clinician_and_continues() {
        let f = scripted_fixture("{}");
        start_day_one(&f).await;

        f.engine.handle_inbound_reply("919876543210", "B").await.unwrap();

        assert_eq!(state_of(&f.store, "p1").await, ConversationState::AwaitingParameters);
        let alerts = f.store.alerts().await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].category, AlertCategory::Moderate);
        assert_eq!(alerts[0].severity, AlertSeverity::Notice);
    }

    // ── Parameter phase ─────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn parameter_reply_with_crossed_alarm_closes_day() {
        let f = scripted_fixture(
            "{\"parsed\": {\"Pain Level\": 5, \"Any Fever?\": \"no\"}, \
             \"subjective\": \"sore around the incision\"}",
        );
        start_day_one(&f).await;
        f.engine.handle_inbound_reply("919876543210", "A").await.unwrap();

        let outcome = f
            .engine
            .handle_inbound_reply("919876543210", "pain is 5, no fever, sore")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReplyOutcome::ParametersRecorded {
                category: ConditionCategory::Note
            }
        );

        let e = f.store.get("p1").await.unwrap().unwrap();
        assert_eq!(e.conversation_state, ConversationState::CompletedToday);
        assert_eq!(e.last_category, Some(ConditionCategory::Note));
        assert_eq!(e.last_values["Pain Level"], crate::models::ParamValue::Number(5.0));
        assert_eq!(e.last_subjective, "sore around the incision");
        assert_eq!(e.checkins_completed, 1);

        let checkins = f.store.checkins().await;
        assert_eq!(checkins.len(), 1);
        assert_eq!(checkins[0].alerted_parameters, vec!["Pain Level"]);
        assert!(checkins[0].alert_triggered);

        let alerts = f.store.alerts().await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].category, AlertCategory::ThresholdCrossed);
        assert_eq!(alerts[0].severity, AlertSeverity::Notice);
        assert_eq!(alerts[0].checkin_id, Some(checkins[0].id));
    }

    #[tokio::test(start_paused = true)]
    async fn clean_parameter_reply_closes_day_without_alert() {
        let f = scripted_fixture(
            "{\"parsed\": {\"Pain Level\": 1, \"Any Fever?\": \"no\"}, \
             \"subjective\": \"feeling good\"}",
        );
        start_day_one(&f).await;
        f.engine.handle_inbound_reply("919876543210", "A").await.unwrap();
        let outcome = f
            .engine
            .handle_inbound_reply("919876543210", "pain 1, no fever, good")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReplyOutcome::ParametersRecorded {
                category: ConditionCategory::Normal
            }
        );
        assert!(f.store.alerts().await.is_empty());
        assert!(!f.store.checkins().await[0].alert_triggered);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_failure_still_closes_day() {
        let f = fixture(Arc::new(Down));
        start_day_one(&f).await;
        f.engine.handle_inbound_reply("919876543210", "A").await.unwrap();

        let outcome = f
            .engine
            .handle_inbound_reply("919876543210", "rambling reply")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReplyOutcome::ParametersRecorded {
                category: ConditionCategory::Normal
            }
        );

        assert_eq!(state_of(&f.store, "p1").await, ConversationState::CompletedToday);
        let checkins = f.store.checkins().await;
        assert!(checkins[0].values.is_empty());
        assert!(checkins[0].clinician_summary.contains("please review"));
    }

    // ── After the day is closed ─────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn extra_reply_after_completion_is_acknowledged_only() {
        let f = scripted_fixture("{}");
        start_day_one(&f).await;
        f.engine.handle_inbound_reply("919876543210", "C").await.unwrap();

        let before = f.store.checkins().await.len();
        let outcome = f
            .engine
            .handle_inbound_reply("919876543210", "anything else?")
            .await
            .unwrap();
        assert_eq!(outcome, ReplyOutcome::AlreadyCompleted);
        assert_eq!(f.store.checkins().await.len(), before);
        assert_eq!(state_of(&f.store, "p1").await, ConversationState::CompletedToday);
    }

    #[tokio::test(start_paused = true)]
    async fn reply_before_any_cycle_is_acknowledged() {
        let f = scripted_fixture("{}");
        f.store.put(enrollment()).await.unwrap();
        let outcome = f.engine.handle_inbound_reply("919876543210", "hello").await.unwrap();
        assert_eq!(outcome, ReplyOutcome::Acknowledged);
        assert_eq!(state_of(&f.store, "p1").await, ConversationState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_phone_is_reported_not_errored() {
        let f = scripted_fixture("{}");
        let outcome = f.engine.handle_inbound_reply("15550001111", "A").await.unwrap();
        assert_eq!(outcome, ReplyOutcome::PatientNotFound);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_reply_is_ignored() {
        let f = scripted_fixture("{}");
        start_day_one(&f).await;
        let outcome = f.engine.handle_inbound_reply("919876543210", "   ").await.unwrap();
        assert_eq!(outcome, ReplyOutcome::Acknowledged);
        assert_eq!(state_of(&f.store, "p1").await, ConversationState::AwaitingTriage);
    }

    // ── Day lifecycle ───────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn enrollment_sends_confirmation_then_first_triage() {
        let f = scripted_fixture("{}");
        f.engine.on_enrollment_started(enrollment()).await.unwrap();

        let sent = f.messages.sent().await;
        assert_eq!(sent.len(), 1, "only the confirmation so far");
        assert!(sent[0].1.contains("follow-up"));

        tokio::time::sleep(Duration::from_secs(30)).await;
        let sent = f.messages.sent().await;
        assert!(sent.iter().any(|(_, t)| t.contains("Day 1 Check-in")));
        assert_eq!(state_of(&f.store, "p1").await, ConversationState::AwaitingTriage);
    }

    #[tokio::test(start_paused = true)]
    async fn advance_day_starts_next_cycle_after_completion() {
        let f = scripted_fixture("{}");
        start_day_one(&f).await;
        f.engine.handle_inbound_reply("919876543210", "C").await.unwrap();

        let outcome = f.engine.advance_day("p1").await.unwrap();
        assert_eq!(outcome, DayOutcome::CycleStarted { day: 2 });
        let texts: Vec<String> = f
            .messages
            .sent()
            .await
            .into_iter()
            .map(|(_, t)| t)
            .collect();
        assert!(texts.iter().any(|t| t.contains("Day 2 Check-in")));
    }

    #[tokio::test(start_paused = true)]
    async fn advance_day_after_escalated_day_starts_next_cycle() {
        let f = scripted_fixture("{}");
        start_day_one(&f).await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(state_of(&f.store, "p1").await, ConversationState::NoResponseEscalated);

        let outcome = f.engine.advance_day("p1").await.unwrap();
        assert_eq!(outcome, DayOutcome::CycleStarted { day: 2 });
        assert_eq!(state_of(&f.store, "p1").await, ConversationState::AwaitingTriage);
    }

    #[tokio::test(start_paused = true)]
    async fn advance_day_completes_program_after_last_day() {
        let f = scripted_fixture("{}");
        let mut e = enrollment();
        e.followup_days = 1;
        f.store.put(e).await.unwrap();

        assert_eq!(
            f.engine.advance_day("p1").await.unwrap(),
            DayOutcome::CycleStarted { day: 1 }
        );
        f.engine.handle_inbound_reply("919876543210", "C").await.unwrap();

        let outcome = f.engine.advance_day("p1").await.unwrap();
        assert_eq!(outcome, DayOutcome::ProgramCompleted);

        let e = f.store.get("p1").await.unwrap().unwrap();
        assert_eq!(e.status, EnrollmentStatus::Completed);
        let texts: Vec<String> = f
            .messages
            .sent()
            .await
            .into_iter()
            .map(|(_, t)| t)
            .collect();
        assert!(texts.iter().any(|t| t.contains("complete")));

        // A later trigger is a no-op.
        assert_eq!(f.engine.advance_day("p1").await.unwrap(), DayOutcome::Inactive);
    }

    #[tokio::test(start_paused = true)]
    async fn advance_day_for_unknown_patient_errors() {
        let f = scripted_fixture("{}");
        let err = f.engine.advance_day("ghost").await.unwrap_err();
        assert!(matches!(err, EngineError::PatientNotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn advance_day_rearms_an_unanswered_cycle() {
        // A lost escalation check leaves the record at AwaitingTriage;
        // the next day advance must re-send and re-arm, not wedge.
        let f = scripted_fixture("{}");
        start_day_one(&f).await;

        let outcome = f.engine.advance_day("p1").await.unwrap();
        assert_eq!(outcome, DayOutcome::CycleStarted { day: 2 });
        let e = f.store.get("p1").await.unwrap().unwrap();
        assert_eq!(e.conversation_state, ConversationState::AwaitingTriage);
        assert_eq!(e.current_day, 2);

        let texts: Vec<String> = f
            .messages
            .sent()
            .await
            .into_iter()
            .map(|(_, t)| t)
            .collect();
        assert!(texts.iter().any(|t| t.contains("Day 2 Check-in")));

        // The fresh escalation check is armed for day 2.
        tokio::time::sleep(Duration::from_secs(60)).await;
        let alerts = f.store.alerts().await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].day, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn advance_day_mid_parameter_phase_is_rejected() {
        let f = scripted_fixture("{}");
        start_day_one(&f).await;
        f.engine.handle_inbound_reply("919876543210", "A").await.unwrap();
        assert_eq!(state_of(&f.store, "p1").await, ConversationState::AwaitingParameters);

        let err = f.engine.advance_day("p1").await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }
}
