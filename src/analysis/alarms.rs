//! Alarm Evaluator — which parameters crossed their thresholds today.
//!
//! Pure: parameter definitions + reported values in, crossed names out.
//! Absent or unparseable values are silently skipped; a value that
//! cannot be read never raises and never counts as crossed.

use std::collections::HashMap;

use crate::models::enums::ParameterKind;
use crate::models::{ParamValue, ParameterDef};

/// Crossed parameter names, in definition order.
pub fn evaluate_alarms(
    parameters: &[ParameterDef],
    values: &HashMap<String, ParamValue>,
) -> Vec<String> {
    parameters
        .iter()
        .filter(|p| values.get(&p.name).is_some_and(|v| crosses(p, v)))
        .map(|p| p.name.clone())
        .collect()
}

fn crosses(param: &ParameterDef, value: &ParamValue) -> bool {
    match param.kind {
        ParameterKind::Rated => match (value.numeric(), param.alarm_at) {
            (Some(v), Some(threshold)) => v >= threshold as f64,
            _ => false,
        },
        ParameterKind::YesNo => param
            .alarming_answer
            .as_deref()
            .is_some_and(|alarming| value.text().eq_ignore_ascii_case(alarming)),
        ParameterKind::Measured => {
            let Some(v) = value.numeric() else {
                return false;
            };
            let below = param.min.is_some_and(|min| v < min);
            let above = param.max.is_some_and(|max| v > max);
            below || above
        }
    }
}
