//! Daily question templates.
//!
//! The triage question is fixed — the reply interpreter depends on its
//! A/B/C shape. Parameter questions are templated from the enrollment's
//! parameter definitions, grouped by kind, with yesterday's value shown
//! where one exists.

use crate::models::enums::ParameterKind;
use crate::models::Enrollment;

/// The fixed first daily question. Always A/B/C.
pub fn triage_question(e: &Enrollment, day: u32) -> String {
    format!(
        "Careline - Day {day} Check-in\n\n\
         Hello {name},\n\n\
         This is your daily check-in from {clinician}.\n\n\
         Q1. How is your condition right now?\n\n\
         A) Normal - recovering well\n\
         B) Moderate - some discomfort\n\
         C) Critical - need help urgently\n\n\
         Please reply with A, B, or C.",
        name = e.patient_name,
        clinician = e.clinician_display(),
    )
}

/// Numbered parameter questions, grouped by kind, starting at Q2.
pub fn parameter_questions(e: &Enrollment) -> String {
    if e.parameters.is_empty() {
        return "Please answer:\n\n\
                2. Rate your pain from 0 to 5 (0=no pain, 5=severe)\n\
                3. Do you have fever? (Yes/No)\n\
                4. How are you feeling overall?"
            .to_string();
    }

    let mut lines: Vec<String> = Vec::new();
    let mut num = 2;

    let rated: Vec<_> = e
        .parameters
        .iter()
        .filter(|p| p.kind == ParameterKind::Rated)
        .collect();
    let yesno: Vec<_> = e
        .parameters
        .iter()
        .filter(|p| p.kind == ParameterKind::YesNo)
        .collect();
    let measured: Vec<_> = e
        .parameters
        .iter()
        .filter(|p| p.kind == ParameterKind::Measured)
        .collect();

    if !rated.is_empty() {
        lines.push("Rate 0 to 5 (0=best, 5=worst):".to_string());
        for p in &rated {
            let low = p.scale_low.as_deref().unwrap_or("no issue");
            let high = p.scale_high.as_deref().unwrap_or("very severe");
            let yesterday = e
                .last_values
                .get(&p.name)
                .map(|v| format!(" (Yesterday: {})", v.text()))
                .unwrap_or_default();
            lines.push(format!(
                "{num}. {}:{}{yesterday}\n   (0={low}, 5={high})",
                p.name,
                p.description
                    .as_deref()
                    .map(|d| format!(" {d}"))
                    .unwrap_or_default(),
            ));
            num += 1;
        }
    }

    if !yesno.is_empty() {
        lines.push("\nYes or No:".to_string());
        for p in &yesno {
            lines.push(format!(
                "{num}. {}{}? (Yes / No)",
                p.name,
                p.description
                    .as_deref()
                    .map(|d| format!(": {d}"))
                    .unwrap_or_default(),
            ));
            num += 1;
        }
    }

    if !measured.is_empty() {
        lines.push("\nProvide the value:".to_string());
        for p in &measured {
            let unit = p.unit.as_deref().unwrap_or("");
            lines.push(format!(
                "{num}. {}: what is your {}? (e.g. 98.6 {unit})",
                p.name, p.name,
            ));
            num += 1;
        }
    }

    lines.push(format!(
        "\nIn your own words:\n{num}. How are you feeling overall today? Anything unusual?"
    ));

    format!(
        "Thank you {}! Please answer:\n\n{}\n\n{} reviews all responses.",
        e.patient_name,
        lines.join("\n\n"),
        e.clinician_display(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ParamValue, ParameterDef};

    fn enrollment() -> Enrollment {
        let mut params = ParameterDef::standard_set();
        params.push(ParameterDef::measured("Temperature", Some(97.0), Some(99.5), "F"));
        let mut e = Enrollment::new("p1", "Asha", "919876543210", 7, params);
        e.clinician_name = Some("Mehta".into());
        e
    }

    #[test]
    fn triage_question_has_abc_options() {
        let q = triage_question(&enrollment(), 3);
        assert!(q.contains("Day 3"));
        assert!(q.contains("A) Normal"));
        assert!(q.contains("B) Moderate"));
        assert!(q.contains("C) Critical"));
        assert!(q.contains("Dr. Mehta"));
    }

    #[test]
    fn parameter_questions_numbered_from_two() {
        let q = parameter_questions(&enrollment());
        assert!(q.contains("2. Pain Level"));
        assert!(q.contains("3. Any Fever?"));
        assert!(q.contains("4. Temperature"));
        assert!(q.contains("5. How are you feeling overall today?"));
    }

    #[test]
    fn shows_yesterday_value_when_known() {
        let mut e = enrollment();
        e.last_values
            .insert("Pain Level".into(), ParamValue::Number(3.0));
        let q = parameter_questions(&e);
        assert!(q.contains("(Yesterday: 3)"));
    }

    #[test]
    fn empty_parameter_list_falls_back_to_generic_questions() {
        let e = Enrollment::new("p1", "Asha", "919876543210", 7, vec![]);
        let q = parameter_questions(&e);
        assert!(q.contains("Rate your pain"));
    }
}
