use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use super::domain::{Actor, BookingId};
use super::lifecycle::{BookingLifecycleService, LifecycleError};
use super::policy::CancellationPolicy;
use super::repository::{BookingRepository, PolicyRepository, RefundPublisher, RepositoryError};

#[derive(Debug, Clone, Deserialize)]
pub struct CancelRequest {
    pub actor: Actor,
    #[serde(default)]
    pub reason_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NoShowRequest {
    pub actor: Actor,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RescheduleRequest {
    pub actor: Actor,
    pub new_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuoteRequest {
    #[serde(default)]
    pub reason_code: Option<String>,
}

/// Router builder exposing the booking lifecycle and policy validation endpoints.
pub fn booking_router<B, P, R>(service: Arc<BookingLifecycleService<B, P, R>>) -> Router
where
    B: BookingRepository + 'static,
    P: PolicyRepository + 'static,
    R: RefundPublisher + 'static,
{
    Router::new()
        .route(
            "/api/v1/bookings/:booking_id",
            get(status_handler::<B, P, R>),
        )
        .route(
            "/api/v1/bookings/:booking_id/cancel",
            post(cancel_handler::<B, P, R>),
        )
        .route(
            "/api/v1/bookings/:booking_id/no-show",
            post(no_show_handler::<B, P, R>),
        )
        .route(
            "/api/v1/bookings/:booking_id/reschedule",
            post(reschedule_handler::<B, P, R>),
        )
        .route(
            "/api/v1/bookings/:booking_id/cancellation-quote",
            post(quote_handler::<B, P, R>),
        )
        .route(
            "/api/v1/bookings/:booking_id/reschedule-eligibility",
            get(eligibility_handler::<B, P, R>),
        )
        .route("/api/v1/policies/validate", post(validate_policy_handler))
        .with_state(service)
}

pub(crate) async fn status_handler<B, P, R>(
    State(service): State<Arc<BookingLifecycleService<B, P, R>>>,
    Path(booking_id): Path<String>,
) -> Response
where
    B: BookingRepository + 'static,
    P: PolicyRepository + 'static,
    R: RefundPublisher + 'static,
{
    match service.get(&BookingId(booking_id)) {
        Ok(booking) => (StatusCode::OK, axum::Json(booking.status_view())).into_response(),
        Err(error) => lifecycle_error_response(error),
    }
}

pub(crate) async fn cancel_handler<B, P, R>(
    State(service): State<Arc<BookingLifecycleService<B, P, R>>>,
    Path(booking_id): Path<String>,
    axum::Json(request): axum::Json<CancelRequest>,
) -> Response
where
    B: BookingRepository + 'static,
    P: PolicyRepository + 'static,
    R: RefundPublisher + 'static,
{
    let id = BookingId(booking_id);
    match service.cancel(&id, &request.actor, request.reason_code.as_deref()) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome.view())).into_response(),
        Err(error) => lifecycle_error_response(error),
    }
}

pub(crate) async fn no_show_handler<B, P, R>(
    State(service): State<Arc<BookingLifecycleService<B, P, R>>>,
    Path(booking_id): Path<String>,
    axum::Json(request): axum::Json<NoShowRequest>,
) -> Response
where
    B: BookingRepository + 'static,
    P: PolicyRepository + 'static,
    R: RefundPublisher + 'static,
{
    match service.mark_no_show(&BookingId(booking_id), &request.actor) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome.view())).into_response(),
        Err(error) => lifecycle_error_response(error),
    }
}

pub(crate) async fn reschedule_handler<B, P, R>(
    State(service): State<Arc<BookingLifecycleService<B, P, R>>>,
    Path(booking_id): Path<String>,
    axum::Json(request): axum::Json<RescheduleRequest>,
) -> Response
where
    B: BookingRepository + 'static,
    P: PolicyRepository + 'static,
    R: RefundPublisher + 'static,
{
    match service.reschedule(&BookingId(booking_id), &request.actor, request.new_time) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome.view())).into_response(),
        Err(error) => lifecycle_error_response(error),
    }
}

pub(crate) async fn quote_handler<B, P, R>(
    State(service): State<Arc<BookingLifecycleService<B, P, R>>>,
    Path(booking_id): Path<String>,
    axum::Json(request): axum::Json<QuoteRequest>,
) -> Response
where
    B: BookingRepository + 'static,
    P: PolicyRepository + 'static,
    R: RefundPublisher + 'static,
{
    match service.quote_cancellation(&BookingId(booking_id), request.reason_code.as_deref()) {
        Ok(quote) => (StatusCode::OK, axum::Json(quote)).into_response(),
        Err(error) => lifecycle_error_response(error),
    }
}

pub(crate) async fn eligibility_handler<B, P, R>(
    State(service): State<Arc<BookingLifecycleService<B, P, R>>>,
    Path(booking_id): Path<String>,
) -> Response
where
    B: BookingRepository + 'static,
    P: PolicyRepository + 'static,
    R: RefundPublisher + 'static,
{
    match service.reschedule_eligibility(&BookingId(booking_id)) {
        Ok(eligibility) => (StatusCode::OK, axum::Json(eligibility.view())).into_response(),
        Err(error) => lifecycle_error_response(error),
    }
}

pub(crate) async fn validate_policy_handler(
    axum::Json(policy): axum::Json<CancellationPolicy>,
) -> Response {
    match policy.validate() {
        Ok(()) => {
            let payload = json!({
                "policy_id": policy.policy_id.0,
                "valid": true,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(rejected) => {
            let violations: Vec<String> = rejected
                .violations
                .iter()
                .map(ToString::to_string)
                .collect();
            let payload = json!({
                "policy_id": rejected.policy_id.0,
                "valid": false,
                "violations": violations,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
    }
}

fn lifecycle_error_response(error: LifecycleError) -> Response {
    let status = match &error {
        LifecycleError::BookingNotFound(_) | LifecycleError::PolicyNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        LifecycleError::InvalidBookingState { .. }
        | LifecycleError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        LifecycleError::UnauthorizedActor { .. } => StatusCode::FORBIDDEN,
        LifecycleError::MalformedPolicy(_)
        | LifecycleError::RescheduleDenied(_)
        | LifecycleError::InvalidRescheduleTime { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        LifecycleError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
