use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::{
    amount, booking, harness, read_json_body, standard_policy, Harness, CLIENT, PROVIDER,
};
use crate::workflows::bookings::domain::BookingStatus;
use crate::workflows::bookings::router::booking_router;

fn router_for(harness: &Harness) -> Router {
    booking_router(harness.service.clone())
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

#[tokio::test]
async fn cancel_endpoint_returns_the_split() {
    let h = harness(vec![booking("bk-1", 30)]);
    let router = router_for(&h);

    let response = router
        .oneshot(post_json(
            "/api/v1/bookings/bk-1/cancel",
            json!({ "actor": { "id": CLIENT, "role": "client" } }),
        ))
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], "cancelled");
    assert_eq!(amount(&payload["penalty"]), dec!(25));
    assert_eq!(amount(&payload["refund"]), dec!(75));
    assert_eq!(payload["reason"], "standard policy (24h notice tier)");
    assert_eq!(payload["refund_dispatched"], true);
    assert_eq!(h.bookings.stored("bk-1").status, BookingStatus::Cancelled);
}

#[tokio::test]
async fn cancel_with_exception_reports_proof_requirement() {
    let h = harness(vec![booking("bk-1", 2)]);
    let router = router_for(&h);

    let response = router
        .oneshot(post_json(
            "/api/v1/bookings/bk-1/cancel",
            json!({
                "actor": { "id": CLIENT, "role": "client" },
                "reason_code": "emergency"
            }),
        ))
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(amount(&payload["refund"]), dec!(100));
    assert_eq!(payload["requires_proof"], true);
    assert_eq!(payload["notes"], "Upload documentation within 7 days");
}

#[tokio::test]
async fn cancel_by_stranger_is_forbidden() {
    let h = harness(vec![booking("bk-1", 30)]);
    let router = router_for(&h);

    let response = router
        .oneshot(post_json(
            "/api/v1/bookings/bk-1/cancel",
            json!({ "actor": { "id": "prov-2", "role": "provider" } }),
        ))
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(h.bookings.stored("bk-1").status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn cancel_of_cancelled_booking_conflicts() {
    let mut cancelled = booking("bk-1", 30);
    cancelled.status = BookingStatus::Cancelled;
    let h = harness(vec![cancelled]);
    let router = router_for(&h);

    let response = router
        .oneshot(post_json(
            "/api/v1/bookings/bk-1/cancel",
            json!({ "actor": { "id": CLIENT, "role": "client" } }),
        ))
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], "cannot cancel booking bk-1 while it is cancelled");
}

#[tokio::test]
async fn unknown_booking_is_not_found() {
    let h = harness(Vec::new());
    let router = router_for(&h);

    let response = router
        .oneshot(get("/api/v1/bookings/bk-missing"))
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn status_endpoint_returns_the_booking_view() {
    let h = harness(vec![booking("bk-1", 30)]);
    let router = router_for(&h);

    let response = router
        .oneshot(get("/api/v1/bookings/bk-1"))
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], "confirmed");
    assert_eq!(payload["reschedule_count"], 0);
    assert!(payload.get("refund_amount").is_none());
}

#[tokio::test]
async fn no_show_endpoint_charges_in_full() {
    let h = harness(vec![booking("bk-1", -1)]);
    let router = router_for(&h);

    let response = router
        .oneshot(post_json(
            "/api/v1/bookings/bk-1/no-show",
            json!({ "actor": { "id": PROVIDER, "role": "provider" } }),
        ))
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], "no-show");
    assert_eq!(amount(&payload["refund"]), dec!(0));
    assert_eq!(h.refunds.events().len(), 1);
}

#[tokio::test]
async fn reschedule_endpoint_rejects_short_notice() {
    let h = harness(vec![booking("bk-1", 6)]);
    let router = router_for(&h);

    let response = router
        .oneshot(post_json(
            "/api/v1/bookings/bk-1/reschedule",
            json!({
                "actor": { "id": CLIENT, "role": "client" },
                "new_time": "2025-06-20T09:00:00Z"
            }),
        ))
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    let message = payload["error"].as_str().expect("error message");
    assert!(message.starts_with("reschedule denied: requires 24h notice"), "{message}");
}

#[tokio::test]
async fn reschedule_endpoint_returns_fee_and_new_time() {
    let h = harness(vec![booking("bk-1", 30)]);
    let router = router_for(&h);

    let response = router
        .oneshot(post_json(
            "/api/v1/bookings/bk-1/reschedule",
            json!({
                "actor": { "id": CLIENT, "role": "client" },
                "new_time": "2025-06-20T09:00:00Z"
            }),
        ))
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(amount(&payload["fee"]), dec!(10));
    assert_eq!(payload["fee_kind"], "fixed_amount");
    assert_eq!(payload["booking"]["reschedule_count"], 1);
    assert_eq!(h.bookings.stored("bk-1").reschedule_count, 1);
}

#[tokio::test]
async fn quote_endpoint_previews_without_committing() {
    let h = harness(vec![booking("bk-1", 30)]);
    let router = router_for(&h);

    let response = router
        .oneshot(post_json(
            "/api/v1/bookings/bk-1/cancellation-quote",
            json!({ "reason_code": "lost_keys" }),
        ))
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(amount(&payload["refund"]), dec!(75));
    assert_eq!(payload["unrecognized_reason"], "lost_keys");
    assert_eq!(h.bookings.stored("bk-1").status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn eligibility_endpoint_reports_denial_reason() {
    let mut exhausted = booking("bk-1", 100);
    exhausted.reschedule_count = 2;
    let h = harness(vec![exhausted]);
    let router = router_for(&h);

    let response = router
        .oneshot(get("/api/v1/bookings/bk-1/reschedule-eligibility"))
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["allowed"], false);
    assert_eq!(payload["reason"], "reschedule limit reached (2 of 2 used)");
}

#[tokio::test]
async fn validate_endpoint_accepts_well_formed_policy() {
    let h = harness(Vec::new());
    let router = router_for(&h);
    let policy = serde_json::to_value(standard_policy()).expect("policy serializes");

    let response = router
        .oneshot(post_json("/api/v1/policies/validate", policy))
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["valid"], true);
    assert_eq!(payload["policy_id"], "pol-standard");
}

#[tokio::test]
async fn validate_endpoint_lists_violations() {
    let h = harness(Vec::new());
    let router = router_for(&h);
    let mut policy = standard_policy();
    policy.rules[0].threshold_hours = policy.rules[1].threshold_hours;
    let body = serde_json::to_value(policy).expect("policy serializes");

    let response = router
        .oneshot(post_json("/api/v1/policies/validate", body))
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert_eq!(payload["valid"], false);
    assert_eq!(
        payload["violations"][0],
        "rules[0] and rules[1] share threshold 24h"
    );
}
