//! Mold master data and revision endpoints on the in-memory backend.

mod common;

use axum::http::{Method, StatusCode};
use common::{expect, get_request, in_memory_app, json_request, send, TestActor};
use serde_json::json;

#[tokio::test]
async fn test_duplicate_code_conflicts() {
    let app = in_memory_app();
    let actor = TestActor::inspector();
    let body = json!({ "code": "MD-7781", "name": "Console lid" });

    expect(
        &app,
        json_request(Method::POST, "/api/v1/molds", body.clone(), Some(actor)),
        StatusCode::CREATED,
    )
    .await;
    let (status, conflict) = send(
        &app,
        json_request(Method::POST, "/api/v1/molds", body, Some(actor)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(conflict["details"]["key"], "molds_code_key");
}

#[tokio::test]
async fn test_half_reference_point_rejected() {
    let app = in_memory_app();
    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/molds",
            json!({ "code": "MD-1", "name": "Grille", "referenceLatitude": 35.0 }),
            Some(TestActor::inspector()),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_update_records_revision_with_diff() {
    let app = in_memory_app();
    let actor = TestActor::admin();
    let mold = expect(
        &app,
        json_request(
            Method::POST,
            "/api/v1/molds",
            json!({ "code": "MD-2040", "name": "Door trim" }),
            Some(actor),
        ),
        StatusCode::CREATED,
    )
    .await;
    let mold_id = mold["id"].as_str().unwrap();

    let update = expect(
        &app,
        json_request(
            Method::PATCH,
            &format!("/api/v1/molds/{}", mold_id),
            json!({
                "name": "Door trim LH",
                "driftThresholdM": 250.0,
                "reason": "Relocated to press 12"
            }),
            Some(actor),
        ),
        StatusCode::OK,
    )
    .await;
    assert_eq!(update["mold"]["name"], "Door trim LH");
    let revision = &update["revision"];
    assert_eq!(revision["revisionNumber"], 1);
    assert_eq!(revision["changedFields"], json!(["drift_threshold_m", "name"]));
    assert_eq!(revision["before"]["name"], "Door trim");
    assert_eq!(revision["after"]["drift_threshold_m"], 250.0);
    assert_eq!(revision["reason"], "Relocated to press 12");
    assert!(revision["previousHash"].is_null());

    let noop = expect(
        &app,
        json_request(
            Method::PATCH,
            &format!("/api/v1/molds/{}", mold_id),
            json!({ "name": "Door trim LH" }),
            Some(actor),
        ),
        StatusCode::OK,
    )
    .await;
    assert!(noop.get("revision").is_none());

    let chain = expect(
        &app,
        get_request(&format!("/api/v1/revisions/mold/{}/verify", mold_id)),
        StatusCode::OK,
    )
    .await;
    assert_eq!(chain["intact"], true);
    assert_eq!(chain["revisions"], 1);
}

#[tokio::test]
async fn test_unknown_entity_type_rejected() {
    let app = in_memory_app();
    let (status, _) = send(&app, get_request("/api/v1/revisions/supplier/abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_reports_in_memory_backend() {
    let app = in_memory_app();
    let body = expect(&app, get_request("/api/health"), StatusCode::OK).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"]["backend"], "in_memory");
}
