use std::time::Duration;

use crate::models::enums::TriageAnswer;

/// Application-level constants
pub const APP_NAME: &str = "Careline";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    format!("info,{}=debug", env!("CARGO_PKG_NAME"))
}

/// Engine timing and policy knobs.
///
/// The three durations drive the question/escalation cycle:
/// `question_send_delay` before the triage question goes out,
/// `reply_wait` for the patient to answer, then `propagation_buffer`
/// before the timeout path re-reads state. The buffer is a mitigation
/// for store write propagation, not a lock — see `engine::timer`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Delay between enrollment confirmation and the first triage question.
    pub question_send_delay: Duration,
    /// How long the patient has to answer the triage question.
    pub reply_wait: Duration,
    /// Trailing margin so a concurrent reply's state write is observable
    /// before the timeout path checks.
    pub propagation_buffer: Duration,
    /// What an unrecognized triage reply maps to. The shipped default is
    /// fail-open (`Normal`); deployments that prefer to fail closed can
    /// set `CARELINE_TRIAGE_FALLBACK=critical`.
    pub triage_fallback: TriageAnswer,
    /// Country code prepended to bare 10-digit national numbers.
    pub default_country_code: Option<String>,
    /// Assigned clinician contact for escalation alerts.
    pub clinician_phone: Option<String>,
    pub clinician_email: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            question_send_delay: Duration::from_secs(25),
            reply_wait: Duration::from_secs(15),
            propagation_buffer: Duration::from_secs(3),
            triage_fallback: TriageAnswer::Normal,
            default_country_code: None,
            clinician_phone: None,
            clinician_email: None,
        }
    }
}

impl EngineConfig {
    /// Build from CARELINE_* environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(secs) = env_u64("CARELINE_QUESTION_SEND_DELAY_SECS") {
            cfg.question_send_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("CARELINE_REPLY_WAIT_SECS") {
            cfg.reply_wait = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("CARELINE_PROPAGATION_BUFFER_SECS") {
            cfg.propagation_buffer = Duration::from_secs(secs);
        }
        if let Ok(v) = std::env::var("CARELINE_TRIAGE_FALLBACK") {
            match v.parse::<TriageAnswer>() {
                Ok(answer) => cfg.triage_fallback = answer,
                Err(_) => {
                    tracing::warn!(value = %v, "Unrecognized triage fallback, keeping default")
                }
            }
        }
        cfg.default_country_code = std::env::var("CARELINE_DEFAULT_COUNTRY_CODE").ok();
        cfg.clinician_phone = std::env::var("CARELINE_CLINICIAN_PHONE").ok();
        cfg.clinician_email = std::env::var("CARELINE_CLINICIAN_EMAIL").ok();
        cfg
    }

    /// Total wait before the timeout path re-reads state.
    pub fn escalation_delay(&self) -> Duration {
        self.reply_wait + self.propagation_buffer
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok()?.parse().ok()
}
