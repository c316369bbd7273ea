//! Webhook API surface.
//!
//! Thin HTTP shell over the engine: inbound patient messages, new
//! enrollments, and the daily advance trigger all arrive here as JSON
//! webhooks. All decisions live in `engine`; handlers validate, call
//! through, and map results to responses.

pub mod error;
pub mod router;
pub mod types;

pub use error::ApiError;
pub use router::webhook_router;
pub use types::ApiContext;
