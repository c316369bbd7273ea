use crate::models::enums::ConversationState;
use crate::store::StoreError;

/// Engine-level errors.
///
/// Collaborator failures (message/email delivery, completion service) are
/// deliberately NOT represented here — they are absorbed at the call site
/// and logged, because a failed notification must never block a state
/// transition.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("patient not found: {0}")]
    PatientNotFound(String),

    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition {
        from: ConversationState,
        to: ConversationState,
    },

    #[error("invalid {field} value: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
