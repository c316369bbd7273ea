//! The daily analysis pipeline.
//!
//! Interpret the free-text reply, evaluate alarms, classify the day,
//! compute trends against yesterday, and produce the clinician summary.
//! Everything after interpretation is pure and deterministic so every
//! escalation decision is explainable from the record alone.

pub mod alarms;
pub mod classify;
pub mod interpret;
pub mod trend;

use std::collections::HashMap;

use crate::models::enums::{ConditionCategory, Trend, TriageAnswer};
use crate::models::{Enrollment, ParamValue};

pub use alarms::evaluate_alarms;
pub use classify::classify;
pub use interpret::{parse_triage, Extraction, ParameterInterpreter};
pub use trend::compute_trends;

/// The day's verdict for one patient.
#[derive(Debug, Clone)]
pub struct DayAnalysis {
    pub values: HashMap<String, ParamValue>,
    pub subjective: String,
    pub crossed: Vec<String>,
    pub category: ConditionCategory,
    pub trends: HashMap<String, Trend>,
    pub alert_triggered: bool,
    pub summary: String,
}

/// Run the full pipeline over a parameter-phase reply.
pub async fn analyze_reply(
    interpreter: &ParameterInterpreter,
    enrollment: &Enrollment,
    triage: TriageAnswer,
    raw_reply: &str,
    day: u32,
) -> DayAnalysis {
    let extraction = interpreter.extract(&enrollment.parameters, raw_reply).await;

    let crossed = evaluate_alarms(&enrollment.parameters, &extraction.values);
    let category = classify(triage, &crossed);
    let trends = compute_trends(&enrollment.parameters, &extraction.values, &enrollment.last_values);
    let alert_triggered = category != ConditionCategory::Normal;

    let summary = clinician_summary(
        &enrollment.patient_name,
        day,
        category,
        &crossed,
        &extraction,
    );

    DayAnalysis {
        values: extraction.values,
        subjective: extraction.subjective,
        crossed,
        category,
        trends,
        alert_triggered,
        summary,
    }
}

/// One-line, deterministic clinician summary.
fn clinician_summary(
    patient_name: &str,
    day: u32,
    category: ConditionCategory,
    crossed: &[String],
    extraction: &Extraction,
) -> String {
    if extraction.values.is_empty() {
        return format!(
            "{patient_name}, day {day}: no data extracted from reply, please review. ({})",
            extraction.subjective,
        );
    }
    if crossed.is_empty() {
        return format!(
            "{patient_name}, day {day}: {} — no thresholds crossed.",
            category.as_str()
        );
    }
    format!(
        "{patient_name}, day {day}: {} — crossed: {}.",
        category.as_str(),
        crossed.join(", "),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::completion::{CompletionError, CompletionService};
    use crate::models::ParameterDef;

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
            Err(CompletionError::Transport("boom".into()))
        }
    }

    fn enrollment() -> Enrollment {
        Enrollment::new(
            "p1",
            "Asha",
            "919876543210",
            7,
            vec![
                ParameterDef::rated("Pain Level", 4),
                ParameterDef::yes_no("Any Fever?", "yes"),
            ],
        )
    }

    #[tokio::test]
    async fn single_crossed_alarm_yields_note_with_alert() {
        let interpreter = ParameterInterpreter::new(Arc::new(Scripted(
            "{\"parsed\": {\"Pain Level\": 5, \"Any Fever?\": \"no\"}, \
             \"subjective\": \"sore\"}"
                .into(),
        )));
        let analysis =
            analyze_reply(&interpreter, &enrollment(), TriageAnswer::Normal, "pain 5 no fever", 1)
                .await;

        assert_eq!(analysis.crossed, vec!["Pain Level"]);
        assert_eq!(analysis.category, ConditionCategory::Note);
        assert!(analysis.alert_triggered);
        assert!(analysis.summary.contains("Pain Level"));
    }

    #[tokio::test]
    async fn clean_reply_yields_normal_without_alert() {
        let interpreter = ParameterInterpreter::new(Arc::new(Scripted(
            "{\"parsed\": {\"Pain Level\": 1, \"Any Fever?\": \"no\"}, \
             \"subjective\": \"good day\"}"
                .into(),
        )));
        let analysis =
            analyze_reply(&interpreter, &enrollment(), TriageAnswer::Normal, "all good", 2).await;

        assert!(analysis.crossed.is_empty());
        assert_eq!(analysis.category, ConditionCategory::Normal);
        assert!(!analysis.alert_triggered);
    }

    #[tokio::test]
    async fn completion_failure_completes_pipeline_with_review_summary() {
        let interpreter = ParameterInterpreter::new(Arc::new(Down));
        let analysis =
            analyze_reply(&interpreter, &enrollment(), TriageAnswer::Normal, "whatever", 3).await;

        assert!(analysis.values.is_empty());
        assert!(!analysis.subjective.is_empty());
        assert_eq!(analysis.category, ConditionCategory::Normal);
        assert!(analysis.summary.contains("please review"));
    }

    #[tokio::test]
    async fn trends_compare_against_last_values() {
        let mut e = enrollment();
        e.last_values
            .insert("Pain Level".into(), ParamValue::Number(4.0));
        let interpreter = ParameterInterpreter::new(Arc::new(Scripted(
            "{\"parsed\": {\"Pain Level\": 2}, \"subjective\": \"\"}".into(),
        )));
        let analysis =
            analyze_reply(&interpreter, &e, TriageAnswer::Normal, "pain down to 2", 2).await;
        assert_eq!(analysis.trends["Pain Level"], Trend::Improving);
    }

    #[tokio::test]
    async fn moderate_triage_with_clean_parameters_is_note() {
        let interpreter = ParameterInterpreter::new(Arc::new(Scripted(
            "{\"parsed\": {\"Pain Level\": 1, \"Any Fever?\": \"no\"}, \"subjective\": \"\"}"
                .into(),
        )));
        let analysis =
            analyze_reply(&interpreter, &enrollment(), TriageAnswer::Moderate, "ok-ish", 1).await;
        assert_eq!(analysis.category, ConditionCategory::Note);
        assert!(analysis.alert_triggered);
    }
}
