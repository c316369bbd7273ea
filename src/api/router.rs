//! Webhook router and handlers.
//!
//! Three POST webhooks plus a health probe. Handlers validate the
//! payload and call straight into the engine; every body in and out is
//! JSON.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::error::ApiError;
use crate::api::types::{
    AdvanceDayRequest, ApiContext, EnrollmentRequest, EnrollmentResponse, HealthResponse,
    InboundMessage,
};
use crate::engine::{DayOutcome, ReplyOutcome};

/// Build the webhook router.
pub fn webhook_router(ctx: ApiContext) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhook/message", post(inbound_message))
        .route("/webhook/enrollment", post(enrollment))
        .route("/webhook/advance-day", post(advance_day))
        .with_state(ctx)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

async fn inbound_message(
    State(ctx): State<ApiContext>,
    Json(msg): Json<InboundMessage>,
) -> Result<Json<ReplyOutcome>, ApiError> {
    if msg.from.trim().is_empty() {
        return Err(ApiError::BadRequest("missing sender number".into()));
    }
    let outcome = ctx.engine.handle_inbound_reply(&msg.from, &msg.body).await?;
    Ok(Json(outcome))
}

async fn enrollment(
    State(ctx): State<ApiContext>,
    Json(req): Json<EnrollmentRequest>,
) -> Result<Json<EnrollmentResponse>, ApiError> {
    if req.patient_key.trim().is_empty() {
        return Err(ApiError::BadRequest("missing patient_key".into()));
    }
    if req.phone.trim().is_empty() {
        return Err(ApiError::BadRequest("missing phone".into()));
    }
    if req.followup_days == 0 {
        return Err(ApiError::BadRequest("followup_days must be at least 1".into()));
    }

    let enrollment = req.into_enrollment();
    let patient_key = enrollment.patient_key.clone();
    let followup_days = enrollment.followup_days;
    ctx.engine.on_enrollment_started(enrollment).await?;

    Ok(Json(EnrollmentResponse {
        status: "enrolled",
        patient_key,
        followup_days,
    }))
}

async fn advance_day(
    State(ctx): State<ApiContext>,
    Json(req): Json<AdvanceDayRequest>,
) -> Result<Json<DayOutcome>, ApiError> {
    let outcome = ctx.engine.advance_day(&req.patient_key).await?;
    Ok(Json(outcome))
}
