//! Reply Interpreter.
//!
//! Two independent jobs:
//! - the triage parser, fully deterministic and total over all input
//!   strings (the A/B/C question never goes near a model);
//! - parameter extraction, which asks the completion service to pull
//!   structured answers out of free text and MUST fail soft — a dead or
//!   rambling model yields an empty extraction, never an error.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::completion::{strip_fences, CompletionService};
use crate::models::enums::{ParameterKind, TriageAnswer};
use crate::models::{ParamValue, ParameterDef};

// ── Triage parser ───────────────────────────────────────────

const NORMAL_TOKENS: &[&str] = &["a", "a)", "1", "normal", "option a"];
const MODERATE_TOKENS: &[&str] = &["b", "b)", "2", "moderate", "option b"];
const CRITICAL_TOKENS: &[&str] = &["c", "c)", "3", "critical", "option c"];

/// Map a triage reply to one of the three answers.
///
/// Exact-token match first, then keyword scan, then the configured
/// fallback. The fallback is a policy decision (see
/// `EngineConfig::triage_fallback`), not a parsing detail.
pub fn parse_triage(text: &str, fallback: TriageAnswer) -> TriageAnswer {
    let token = text.trim().to_lowercase();

    if NORMAL_TOKENS.contains(&token.as_str()) {
        return TriageAnswer::Normal;
    }
    if MODERATE_TOKENS.contains(&token.as_str()) {
        return TriageAnswer::Moderate;
    }
    if CRITICAL_TOKENS.contains(&token.as_str()) {
        return TriageAnswer::Critical;
    }

    // Keyword fallback for longer replies ("I think it's critical").
    if token.contains("critical") || token.contains("emergency") {
        return TriageAnswer::Critical;
    }
    if token.contains("moderate") {
        return TriageAnswer::Moderate;
    }
    if token.contains("normal") {
        return TriageAnswer::Normal;
    }

    fallback
}

// ── Parameter extraction ────────────────────────────────────

/// Structured result of interpreting a free-text parameter reply.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Parameter name → reported value. Only known parameter names
    /// appear here; nothing else from the model is trusted downstream.
    pub values: HashMap<String, ParamValue>,
    /// The patient's subjective note, or an explanation of why there is
    /// no data.
    pub subjective: String,
}

impl Extraction {
    /// Empty extraction with an explanatory note. Callers treat this as
    /// "no data extracted", not as an error.
    pub fn empty(note: &str) -> Self {
        Self {
            values: HashMap::new(),
            subjective: note.to_string(),
        }
    }
}

/// What we ask the model to return. Anything that doesn't decode into
/// this shape is discarded wholesale.
#[derive(Debug, Deserialize)]
struct RawExtraction {
    #[serde(default)]
    parsed: HashMap<String, serde_json::Value>,
    #[serde(default)]
    subjective: String,
}

pub struct ParameterInterpreter {
    completion: Arc<dyn CompletionService>,
}

impl ParameterInterpreter {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }

    /// Extract structured answers from a free-text reply. Never errors.
    pub async fn extract(&self, parameters: &[ParameterDef], raw_reply: &str) -> Extraction {
        let prompt = extraction_prompt(parameters, raw_reply);

        let response = match self.completion.complete(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "Completion service failed, returning empty extraction");
                return Extraction::empty("Automatic extraction unavailable; raw reply needs manual review.");
            }
        };

        let cleaned = strip_fences(&response);
        let raw: RawExtraction = match serde_json::from_str(cleaned) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "Completion output was not valid extraction JSON");
                return Extraction::empty("Reply could not be parsed automatically; needs manual review.");
            }
        };

        // Only keep values for parameters we actually asked about, with
        // JSON types coerced to ParamValue. Untyped model output never
        // flows into alarm logic.
        let mut values = HashMap::new();
        for param in parameters {
            let Some(v) = raw.parsed.get(&param.name) else {
                continue;
            };
            if let Some(typed) = coerce(v) {
                values.insert(param.name.clone(), typed);
            }
        }

        Extraction {
            values,
            subjective: raw.subjective,
        }
    }
}

fn coerce(v: &serde_json::Value) -> Option<ParamValue> {
    match v {
        serde_json::Value::Number(n) => n.as_f64().map(ParamValue::Number),
        serde_json::Value::String(s) if !s.trim().is_empty() => {
            Some(ParamValue::Text(s.trim().to_string()))
        }
        serde_json::Value::Bool(b) => {
            Some(ParamValue::Text(if *b { "yes" } else { "no" }.to_string()))
        }
        _ => None,
    }
}

fn extraction_prompt(parameters: &[ParameterDef], raw_reply: &str) -> String {
    let mut lines = Vec::new();
    for p in parameters {
        let hint = match p.kind {
            ParameterKind::Rated => " (scale 0-5, answer as a number)".to_string(),
            ParameterKind::YesNo => " (answer \"yes\" or \"no\")".to_string(),
            ParameterKind::Measured => match &p.unit {
                Some(unit) => format!(" (numeric value in {unit})"),
                None => " (numeric value)".to_string(),
            },
        };
        lines.push(format!("- {}{hint}", p.name));
    }

    format!(
        "Extract health data from this patient message.\n\n\
         Message: \"{raw_reply}\"\n\n\
         Parameters to extract:\n{}\n\n\
         Return ONLY a JSON object, no markdown:\n\
         {{\n\
           \"parsed\": {{ \"ParameterName\": value, ... }},\n\
           \"subjective\": \"brief summary of the patient's own words, \
         mood, or specific complaints\"\n\
         }}\n\n\
         Omit parameters the message does not answer. For yes/no \
         parameters use \"yes\" or \"no\".",
        lines.join("\n"),
    )
}
