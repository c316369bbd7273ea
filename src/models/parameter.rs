use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::enums::{ParameterKind, TrendDirection};

/// A clinician-configured daily monitoring parameter.
///
/// Threshold fields are kind-specific: `alarm_at` for rated scales,
/// `alarming_answer` for yes/no questions, `min`/`max` for measured
/// values. Definitions are immutable for the duration of an enrollment;
/// the engine only reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDef {
    pub name: String,
    pub kind: ParameterKind,
    #[serde(default)]
    pub description: Option<String>,
    /// Rated: value >= alarm_at crosses the alarm.
    #[serde(default)]
    pub alarm_at: Option<i64>,
    /// Rated: label at the bottom of the 0-5 scale ("None").
    #[serde(default)]
    pub scale_low: Option<String>,
    /// Rated: label at the top of the 0-5 scale ("Severe").
    #[serde(default)]
    pub scale_high: Option<String>,
    /// Yes/no: the answer that crosses the alarm (case-insensitive).
    #[serde(default)]
    pub alarming_answer: Option<String>,
    /// Measured: lower bound of the allowed range.
    #[serde(default)]
    pub min: Option<f64>,
    /// Measured: upper bound of the allowed range.
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    /// Trend fallback for measured values without bounds. Domain
    /// convention, not physiology — SpO2 would need HigherIsBetter.
    #[serde(default)]
    pub trend_direction: TrendDirection,
}

impl ParameterDef {
    pub fn rated(name: &str, alarm_at: i64) -> Self {
        Self {
            name: name.into(),
            kind: ParameterKind::Rated,
            description: None,
            alarm_at: Some(alarm_at),
            scale_low: None,
            scale_high: None,
            alarming_answer: None,
            min: None,
            max: None,
            unit: None,
            trend_direction: TrendDirection::LowerIsBetter,
        }
    }

    pub fn yes_no(name: &str, alarming_answer: &str) -> Self {
        Self {
            name: name.into(),
            kind: ParameterKind::YesNo,
            description: None,
            alarm_at: None,
            scale_low: None,
            scale_high: None,
            alarming_answer: Some(alarming_answer.into()),
            min: None,
            max: None,
            unit: None,
            trend_direction: TrendDirection::LowerIsBetter,
        }
    }

    pub fn measured(name: &str, min: Option<f64>, max: Option<f64>, unit: &str) -> Self {
        Self {
            name: name.into(),
            kind: ParameterKind::Measured,
            description: None,
            alarm_at: None,
            scale_low: None,
            scale_high: None,
            alarming_answer: None,
            min,
            max,
            unit: Some(unit.into()),
            trend_direction: TrendDirection::LowerIsBetter,
        }
    }

    /// The default parameter set used when an enrollment arrives without
    /// custom parameters.
    pub fn standard_set() -> Vec<Self> {
        let mut pain = Self::rated("Pain Level", 4);
        pain.scale_low = Some("None".into());
        pain.scale_high = Some("Severe".into());
        vec![pain, Self::yes_no("Any Fever?", "yes")]
    }
}

/// A reported parameter value, as extracted from free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

impl ParamValue {
    /// The numeric reading, if one can be taken.
    ///
    /// Compound readings like blood pressure ("120/80") yield the first
    /// component. Unparseable text yields None — callers must skip it,
    /// never error.
    pub fn numeric(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => first_number(s.split('/').next().unwrap_or(s)),
        }
    }

    /// Text form for answer comparison (yes/no parameters).
    pub fn text(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.trim().to_string(),
        }
    }
}

fn first_number(s: &str) -> Option<f64> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"-?\d+(\.\d+)?").expect("valid literal regex"));
    re.find(s).and_then(|m| m.as_str().parse().ok())
}
