//! Trend Computer — per-parameter direction versus yesterday.
//!
//! Pure. Missing a value on either side means Stable: a single day of
//! silence is not evidence of change.

use std::collections::HashMap;

use crate::models::enums::{ParameterKind, Trend, TrendDirection};
use crate::models::{ParamValue, ParameterDef};

pub fn compute_trends(
    parameters: &[ParameterDef],
    today: &HashMap<String, ParamValue>,
    yesterday: &HashMap<String, ParamValue>,
) -> HashMap<String, Trend> {
    parameters
        .iter()
        .map(|p| {
            let trend = match (today.get(&p.name), yesterday.get(&p.name)) {
                (Some(t), Some(y)) => trend_for(p, t, y),
                _ => Trend::Stable,
            };
            (p.name.clone(), trend)
        })
        .collect()
}

fn trend_for(param: &ParameterDef, today: &ParamValue, yesterday: &ParamValue) -> Trend {
    match param.kind {
        ParameterKind::Rated => match (today.numeric(), yesterday.numeric()) {
            // Rated scales are 0=best by construction: lower improves.
            (Some(t), Some(y)) if t < y => Trend::Improving,
            (Some(t), Some(y)) if t > y => Trend::Deteriorating,
            _ => Trend::Stable,
        },
        ParameterKind::YesNo => {
            let Some(alarming) = param.alarming_answer.as_deref() else {
                return Trend::Stable;
            };
            let t_alarming = today.text().eq_ignore_ascii_case(alarming);
            let y_alarming = yesterday.text().eq_ignore_ascii_case(alarming);
            match (t_alarming, y_alarming) {
                (false, true) => Trend::Improving,
                (true, false) => Trend::Deteriorating,
                _ => Trend::Stable,
            }
        }
        ParameterKind::Measured => {
            let (Some(t), Some(y)) = (today.numeric(), yesterday.numeric()) else {
                return Trend::Stable;
            };
            match (param.min, param.max) {
                (Some(min), Some(max)) => {
                    // Both bounds known: moving toward the midpoint of the
                    // allowed range is improvement.
                    let mid = (min + max) / 2.0;
                    let t_dist = (t - mid).abs();
                    let y_dist = (y - mid).abs();
                    if t_dist < y_dist {
                        Trend::Improving
                    } else if t_dist > y_dist {
                        Trend::Deteriorating
                    } else {
                        Trend::Stable
                    }
                }
                // No usable range: fall back to the parameter's configured
                // direction.
                _ => directional(t, y, param.trend_direction),
            }
        }
    }
}

fn directional(today: f64, yesterday: f64, direction: TrendDirection) -> Trend {
    if today == yesterday {
        return Trend::Stable;
    }
    let lower_today = today < yesterday;
    let improving = match direction {
        TrendDirection::LowerIsBetter => lower_today,
        TrendDirection::HigherIsBetter => !lower_today,
    };
    if improving {
        Trend::Improving
    } else {
        Trend::Deteriorating
    }
}
