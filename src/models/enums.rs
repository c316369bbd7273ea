use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = EngineError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(EngineError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(EnrollmentStatus {
    Active => "active",
    Completed => "completed",
    Cancelled => "cancelled",
});

str_enum!(TriageAnswer {
    Normal => "normal",
    Moderate => "moderate",
    Critical => "critical",
});

str_enum!(ConditionCategory {
    Normal => "normal",
    Note => "note",
    Critical => "critical",
});

str_enum!(Trend {
    Improving => "improving",
    Stable => "stable",
    Deteriorating => "deteriorating",
});

str_enum!(ParameterKind {
    Rated => "rated",
    YesNo => "yes_no",
    Measured => "measured",
});

str_enum!(TrendDirection {
    LowerIsBetter => "lower_is_better",
    HigherIsBetter => "higher_is_better",
});

str_enum!(AlertCategory {
    NoResponse => "no_response",
    Critical => "critical",
    Moderate => "moderate",
    ThresholdCrossed => "threshold_crossed",
});

str_enum!(AlertSeverity {
    Notice => "notice",
    Critical => "critical",
});

str_enum!(ConversationState {
    Idle => "idle",
    AwaitingTriage => "awaiting_triage",
    TriageAnswered => "triage_answered",
    AwaitingParameters => "awaiting_parameters",
    ParametersAnswered => "parameters_answered",
    CompletedToday => "completed_today",
    NoResponseEscalated => "no_response_escalated",
});

impl Default for TrendDirection {
    fn default() -> Self {
        Self::LowerIsBetter
    }
}

impl ConversationState {
    /// The closed transition table for one day-cycle.
    ///
    /// The event path moves Awaiting* → *Answered; the timeout path is the
    /// only entry into NoResponseEscalated. A late reply after escalation
    /// re-enters via TriageAnswered. Day advance re-arms from
    /// CompletedToday (or from NoResponseEscalated when no late reply
    /// ever came). AwaitingTriage → AwaitingTriage is the recovery edge:
    /// a scheduled escalation check does not survive a restart, so the
    /// next day advance must be able to re-send and re-arm rather than
    /// leave the enrollment stuck.
    pub fn can_transition(self, to: ConversationState) -> bool {
        use ConversationState::*;
        matches!(
            (self, to),
            (Idle, AwaitingTriage)
                | (AwaitingTriage, AwaitingTriage)
                | (AwaitingTriage, TriageAnswered)
                | (AwaitingTriage, NoResponseEscalated)
                | (TriageAnswered, AwaitingParameters)
                | (TriageAnswered, CompletedToday)
                | (AwaitingParameters, ParametersAnswered)
                | (ParametersAnswered, CompletedToday)
                | (CompletedToday, AwaitingTriage)
                | (NoResponseEscalated, TriageAnswered)
                | (NoResponseEscalated, AwaitingTriage)
        )
    }
}
