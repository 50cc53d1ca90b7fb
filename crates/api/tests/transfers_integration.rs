//! Transfer workflow endpoints on the in-memory backend.

mod common;

use axum::http::{Method, StatusCode};
use common::{
    answer, create_daily_version, create_item, create_mold, create_transfer, decide, expect,
    get_request, in_memory_app, in_memory_app_with, json_request, send, TestActor,
};
use moldtrack_api::config::Config;
use serde_json::json;

#[tokio::test]
async fn test_two_step_approval_promotes_mold() {
    let app = in_memory_app();
    let admin = TestActor::admin();
    let inspector = TestActor::inspector();

    let mold = create_mold(&app, inspector, None).await;
    let mold_id = mold["id"].as_str().unwrap();
    assert_eq!(mold["stage"], "development");

    let a = create_item(&app, admin, "Parting line flash").await;
    let b = create_item(&app, admin, "Ejector pin marks").await;
    let c = create_item(&app, admin, "Cooling channel flow").await;
    let version_id = create_daily_version(&app, admin, &[a, b, c]).await;

    let request_id = create_transfer(&app, inspector, mold_id, version_id).await;
    for item in [a, b, c] {
        answer(&app, inspector, &request_id, item, "pass").await;
    }

    let submitted = expect(
        &app,
        json_request(
            Method::POST,
            &format!("/api/v1/transfers/{}/submit", request_id),
            json!({ "comment": "Trial shots complete" }),
            Some(inspector),
        ),
        StatusCode::OK,
    )
    .await;
    assert_eq!(submitted["request"]["state"], "submitted");

    let (status, first) = decide(&app, TestActor::admin(), &request_id, "approve").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["request"]["state"], "under_review");

    let (status, second) = decide(&app, TestActor::admin(), &request_id, "approve").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["request"]["state"], "approved");

    let steps: Vec<i64> = second["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["stepNumber"].as_i64().unwrap())
        .collect();
    assert_eq!(steps, vec![1, 2, 3]);

    let mold = expect(
        &app,
        get_request(&format!("/api/v1/molds/{}", mold_id)),
        StatusCode::OK,
    )
    .await;
    assert_eq!(mold["stage"], "mass_production");

    let history = expect(
        &app,
        get_request(&format!("/api/v1/revisions/mold/{}", mold_id)),
        StatusCode::OK,
    )
    .await;
    let revisions = history["revisions"].as_array().unwrap();
    assert_eq!(revisions.len(), 1);
    assert_eq!(revisions[0]["changedFields"], json!(["stage"]));

    let report = expect(
        &app,
        get_request(&format!("/api/v1/transfers/{}/verify", request_id)),
        StatusCode::OK,
    )
    .await;
    assert_eq!(report["consistent"], true);
    assert_eq!(report["replayed"], "approved");
}

#[tokio::test]
async fn test_submit_incomplete_lists_missing_items() {
    let app = in_memory_app();
    let admin = TestActor::admin();
    let inspector = TestActor::inspector();

    let mold = create_mold(&app, inspector, None).await;
    let a = create_item(&app, admin, "Gate vestige").await;
    let b = create_item(&app, admin, "Slide movement").await;
    let version_id = create_daily_version(&app, admin, &[a, b]).await;
    let request_id = create_transfer(&app, inspector, mold["id"].as_str().unwrap(), version_id).await;

    answer(&app, inspector, &request_id, a, "pass").await;

    let body = expect(
        &app,
        json_request(
            Method::POST,
            &format!("/api/v1/transfers/{}/submit", request_id),
            json!({}),
            Some(inspector),
        ),
        StatusCode::UNPROCESSABLE_ENTITY,
    )
    .await;
    assert_eq!(body["error"], "incomplete_checklist");
    assert_eq!(body["details"]["missing"], json!([b]));

    let view = expect(
        &app,
        get_request(&format!("/api/v1/transfers/{}", request_id)),
        StatusCode::OK,
    )
    .await;
    assert_eq!(view["request"]["state"], "draft");
    assert!(view["events"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_reject_then_reopen() {
    let app = in_memory_app();
    let admin = TestActor::admin();
    let inspector = TestActor::inspector();

    let mold = create_mold(&app, inspector, None).await;
    let a = create_item(&app, admin, "Texture uniformity").await;
    let version_id = create_daily_version(&app, admin, &[a]).await;
    let request_id = create_transfer(&app, inspector, mold["id"].as_str().unwrap(), version_id).await;
    answer(&app, inspector, &request_id, a, "fail").await;

    expect(
        &app,
        json_request(
            Method::POST,
            &format!("/api/v1/transfers/{}/submit", request_id),
            json!({}),
            Some(inspector),
        ),
        StatusCode::OK,
    )
    .await;

    let (status, rejected) = decide(&app, admin, &request_id, "reject").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["request"]["state"], "rejected");

    // A rejected request takes no further decisions
    let (status, body) = decide(&app, admin, &request_id, "approve").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_transition");
    assert_eq!(body["details"]["from"], "rejected");
    assert_eq!(body["details"]["operation"], "approve");

    // Answers unlock again after rejection
    answer(&app, inspector, &request_id, a, "pass").await;

    let reopened = expect(
        &app,
        json_request(
            Method::POST,
            &format!("/api/v1/transfers/{}/reopen", request_id),
            json!({ "comment": "Texture reworked" }),
            Some(inspector),
        ),
        StatusCode::OK,
    )
    .await;
    assert_eq!(reopened["request"]["state"], "submitted");
    assert_eq!(reopened["events"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_cancel_requires_reason_and_blocks_answers() {
    let app = in_memory_app();
    let admin = TestActor::admin();
    let inspector = TestActor::inspector();

    let mold = create_mold(&app, inspector, None).await;
    let a = create_item(&app, admin, "Runner balance").await;
    let version_id = create_daily_version(&app, admin, &[a]).await;
    let request_id = create_transfer(&app, inspector, mold["id"].as_str().unwrap(), version_id).await;

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            &format!("/api/v1/transfers/{}/cancel", request_id),
            json!({ "reason": "" }),
            Some(inspector),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let cancelled = expect(
        &app,
        json_request(
            Method::POST,
            &format!("/api/v1/transfers/{}/cancel", request_id),
            json!({ "reason": "Mold scrapped" }),
            Some(inspector),
        ),
        StatusCode::OK,
    )
    .await;
    assert_eq!(cancelled["request"]["state"], "cancelled");

    let (status, body) = send(
        &app,
        json_request(
            Method::PUT,
            &format!("/api/v1/transfers/{}/answers/{}", request_id, a),
            json!({ "result": "pass" }),
            Some(inspector),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["details"]["operation"], "record_answer");
}

#[tokio::test]
async fn test_answer_for_item_outside_checklist_is_not_found() {
    let app = in_memory_app();
    let admin = TestActor::admin();
    let inspector = TestActor::inspector();

    let mold = create_mold(&app, inspector, None).await;
    let a = create_item(&app, admin, "Venting").await;
    let stray = create_item(&app, admin, "Unmapped item").await;
    let version_id = create_daily_version(&app, admin, &[a]).await;
    let request_id = create_transfer(&app, inspector, mold["id"].as_str().unwrap(), version_id).await;

    let (status, _) = send(
        &app,
        json_request(
            Method::PUT,
            &format!("/api/v1/transfers/{}/answers/{}", request_id, stray),
            json!({ "result": "pass" }),
            Some(inspector),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_single_step_configuration_approves_at_once() {
    let config = Config::load_for_test(&[
        ("database.url", "postgres://unused"),
        ("workflow.approval_steps", "1"),
    ])
    .unwrap();
    let app = in_memory_app_with(config);
    let admin = TestActor::admin();
    let inspector = TestActor::inspector();

    let mold = create_mold(&app, inspector, None).await;
    let a = create_item(&app, admin, "Surface finish").await;
    let version_id = create_daily_version(&app, admin, &[a]).await;
    let request_id = create_transfer(&app, inspector, mold["id"].as_str().unwrap(), version_id).await;
    answer(&app, inspector, &request_id, a, "pass").await;
    expect(
        &app,
        json_request(
            Method::POST,
            &format!("/api/v1/transfers/{}/submit", request_id),
            json!({}),
            Some(inspector),
        ),
        StatusCode::OK,
    )
    .await;

    let (status, body) = decide(&app, admin, &request_id, "approve").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["request"]["state"], "approved");
    assert_eq!(body["request"]["requiredApprovals"], 1);
}

#[tokio::test]
async fn test_requests_listed_per_mold() {
    let app = in_memory_app();
    let admin = TestActor::admin();
    let inspector = TestActor::inspector();

    let mold = create_mold(&app, inspector, None).await;
    let mold_id = mold["id"].as_str().unwrap();
    let a = create_item(&app, admin, "Date stamp").await;
    let version_id = create_daily_version(&app, admin, &[a]).await;
    create_transfer(&app, inspector, mold_id, version_id).await;
    create_transfer(&app, inspector, mold_id, version_id).await;

    let body = expect(
        &app,
        get_request(&format!("/api/v1/molds/{}/transfers", mold_id)),
        StatusCode::OK,
    )
    .await;
    assert_eq!(body["requests"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_missing_actor_is_unauthorized() {
    let app = in_memory_app();
    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/transfers",
            json!({ "moldId": uuid::Uuid::new_v4(), "cycle": "daily" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}
