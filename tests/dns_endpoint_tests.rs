//! DNS endpoint integration tests
//!
//! Covers the write pipeline (token, protected-zone guard, Cloudflare, audit):
//! - protected zones are refused before anything reaches Cloudflare
//! - a failed zone lookup refuses the write when a deny-list is configured
//! - successful writes are audited with before/after snapshots
//! - a broken audit table never fails a write that already happened
//! - batch delete counts partial failures
//! - VIEWER access is limited to bound accounts and read-only routes

use axum::http::StatusCode;
use sea_orm::{ConnectionTrait, EntityTrait};
use serde_json::{json, Value};

mod common;
use common::*;

use cf_admin::models::prelude::*;
use cf_admin::models::user::Role;
use cf_admin::state::AppState;

async fn state_with_protected(mock: &MockServer, zones: &[&str]) -> AppState {
    let mut config = test_config(&mock.base_url);
    config.cloudflare.protected_zones = zones.iter().map(|z| z.to_string()).collect();
    build_state(create_test_db().await, config)
}

async fn audit_rows(state: &AppState) -> Vec<cf_admin::models::audit_log::Model> {
    AuditLog::find().all(&state.db).await.unwrap()
}

fn record_body() -> Value {
    json!({ "type": "A", "name": "www.example.com", "content": "192.0.2.10", "ttl": 1 })
}

// ============================================================================
// Protected zones
// ============================================================================

#[tokio::test]
async fn test_protected_zone_rejects_every_write() {
    let mock = start_mock_cloudflare(MockCloudflare::default()).await;
    let state = state_with_protected(&mock, &["example.com"]).await;
    let admin = create_test_user(&state.db, "admin@example.com", Role::Admin).await;
    let token = session_token(&state, &admin);
    let app = test_app(state.clone());

    let attempts = [
        ("POST", format!("/api/cloudflare/dns?zoneId={}", ZONE_ID), Some(record_body())),
        ("PUT", format!("/api/cloudflare/dns/rec-1?zoneId={}", ZONE_ID), Some(record_body())),
        ("DELETE", format!("/api/cloudflare/dns/rec-1?zoneId={}", ZONE_ID), None),
        (
            "POST",
            "/api/cloudflare/dns/batch".to_string(),
            Some(json!({ "zoneId": ZONE_ID, "recordIds": ["rec-1"] })),
        ),
        (
            "POST",
            "/api/cloudflare/dns/import".to_string(),
            Some(json!({ "zoneId": ZONE_ID, "content": "www 1 IN A 192.0.2.1" })),
        ),
    ];

    for (method, uri, body) in attempts {
        let (status, response) = send(&app, method, &uri, Some(&token), body).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{} {}", method, uri);
        assert_eq!(response["error"], "Zone example.com is protected and cannot be modified");
    }

    // Only zone lookups went upstream
    let requests = mock.requests();
    assert!(requests.iter().all(|r| r == "GET /zones/zone-1"), "{:?}", requests);
    assert!(audit_rows(&state).await.is_empty());
}

#[tokio::test]
async fn test_protected_match_is_exact() {
    let mock = start_mock_cloudflare(MockCloudflare {
        zone_name: "Example.com".to_string(),
        ..Default::default()
    })
    .await;
    let state = state_with_protected(&mock, &["example.com"]).await;
    let admin = create_test_user(&state.db, "admin@example.com", Role::Admin).await;
    let token = session_token(&state, &admin);
    let app = test_app(state);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/cloudflare/dns/rec-1?zoneId={}", ZONE_ID),
        Some(&token),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(mock.count("DELETE", "/zones/zone-1/dns_records/rec-1"), 1);
}

#[tokio::test]
async fn test_zone_lookup_failure_fails_closed() {
    let mock = start_mock_cloudflare(MockCloudflare {
        zone_lookup_fails: true,
        ..Default::default()
    })
    .await;
    let state = state_with_protected(&mock, &["other.example.org"]).await;
    let admin = create_test_user(&state.db, "admin@example.com", Role::Admin).await;
    let token = session_token(&state, &admin);
    let app = test_app(state);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/cloudflare/dns/rec-1?zoneId={}", ZONE_ID),
        Some(&token),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(mock.count("DELETE", "/zones"), 0);
}

#[tokio::test]
async fn test_zone_lookup_failure_without_deny_list_still_writes() {
    let mock = start_mock_cloudflare(MockCloudflare {
        zone_lookup_fails: true,
        ..Default::default()
    })
    .await;
    let state = state_with_protected(&mock, &[]).await;
    let admin = create_test_user(&state.db, "admin@example.com", Role::Admin).await;
    let token = session_token(&state, &admin);
    let app = test_app(state.clone());

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/cloudflare/dns/rec-1?zoneId={}", ZONE_ID),
        Some(&token),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let rows = audit_rows(&state).await;
    assert_eq!(rows.len(), 1);
    assert!(rows[0].zone_name.is_none());
}

// ============================================================================
// Auditing
// ============================================================================

#[tokio::test]
async fn test_create_record_is_audited() {
    let mock = start_mock_cloudflare(MockCloudflare::default()).await;
    let state = state_with_protected(&mock, &[]).await;
    let admin = create_test_user(&state.db, "admin@example.com", Role::Admin).await;
    let token = session_token(&state, &admin);
    let app = test_app(state.clone());

    let mut body = record_body();
    body["zoneId"] = json!(ZONE_ID);
    let (status, response) = send(&app, "POST", "/api/cloudflare/dns", Some(&token), Some(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["result"]["id"], "rec-new");
    // zoneId is routing information, not part of the record
    assert!(response["result"].get("zoneId").is_none());

    let rows = audit_rows(&state).await;
    assert_eq!(rows.len(), 1);
    let entry = &rows[0];
    assert_eq!(entry.action, "dns.create");
    assert_eq!(entry.user_id, admin.id);
    assert_eq!(entry.user_email, "admin@example.com");
    assert_eq!(entry.zone_id.as_deref(), Some(ZONE_ID));
    assert_eq!(entry.zone_name.as_deref(), Some("example.com"));
    assert_eq!(entry.target.as_deref(), Some("A www.example.com"));
    assert!(entry.before.is_none());
    let after: Value = serde_json::from_str(entry.after.as_deref().unwrap()).unwrap();
    assert_eq!(after["content"], "192.0.2.10");
}

#[tokio::test]
async fn test_update_and_delete_capture_before() {
    let mock = start_mock_cloudflare(MockCloudflare::default()).await;
    let state = state_with_protected(&mock, &[]).await;
    let admin = create_test_user(&state.db, "admin@example.com", Role::Admin).await;
    let token = session_token(&state, &admin);
    let app = test_app(state.clone());

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/cloudflare/dns/rec-1?zoneId={}", ZONE_ID),
        Some(&token),
        Some(record_body()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/cloudflare/dns/rec-2?zoneId={}", ZONE_ID),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let rows = audit_rows(&state).await;
    let update = rows.iter().find(|r| r.action == "dns.update").unwrap();
    let before: Value = serde_json::from_str(update.before.as_deref().unwrap()).unwrap();
    assert_eq!(before["id"], "rec-1");
    assert!(update.after.is_some());

    let delete = rows.iter().find(|r| r.action == "dns.delete").unwrap();
    assert_eq!(delete.target.as_deref(), Some("A www.example.com"));
    assert!(delete.before.is_some());
    assert!(delete.after.is_none());
}

#[tokio::test]
async fn test_failed_upstream_write_is_not_audited() {
    let mock = start_mock_cloudflare(MockCloudflare {
        failing_records: vec!["rec-1".to_string()],
        ..Default::default()
    })
    .await;
    let state = state_with_protected(&mock, &[]).await;
    let admin = create_test_user(&state.db, "admin@example.com", Role::Admin).await;
    let token = session_token(&state, &admin);
    let app = test_app(state.clone());

    let (status, response) = send(
        &app,
        "DELETE",
        &format!("/api/cloudflare/dns/rec-1?zoneId={}", ZONE_ID),
        Some(&token),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(response["error"], "Record does not exist");
    assert!(audit_rows(&state).await.is_empty());
}

#[tokio::test]
async fn test_audit_failure_does_not_fail_the_write() {
    let mock = start_mock_cloudflare(MockCloudflare::default()).await;
    let state = state_with_protected(&mock, &[]).await;
    let admin = create_test_user(&state.db, "admin@example.com", Role::Admin).await;
    let token = session_token(&state, &admin);
    state
        .db
        .execute_unprepared("DROP TABLE audit_logs")
        .await
        .unwrap();
    let app = test_app(state);

    let (status, response) = send(
        &app,
        "DELETE",
        &format!("/api/cloudflare/dns/rec-1?zoneId={}", ZONE_ID),
        Some(&token),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["success"], true);
    assert_eq!(mock.count("DELETE", "/zones/zone-1/dns_records/rec-1"), 1);
}

#[tokio::test]
async fn test_batch_delete_counts_failures() {
    let mock = start_mock_cloudflare(MockCloudflare {
        failing_records: vec!["rec-bad".to_string()],
        ..Default::default()
    })
    .await;
    let state = state_with_protected(&mock, &[]).await;
    let admin = create_test_user(&state.db, "admin@example.com", Role::Admin).await;
    let token = session_token(&state, &admin);
    let app = test_app(state.clone());

    let (status, response) = send(
        &app,
        "POST",
        "/api/cloudflare/dns/batch",
        Some(&token),
        Some(json!({ "zoneId": ZONE_ID, "recordIds": ["rec-1", "rec-bad", "rec-2"] })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response, json!({ "success": true, "deleted": 2, "failed": 1, "total": 3 }));

    let rows = audit_rows(&state).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].action, "dns.batch_delete");
    let before: Value = serde_json::from_str(rows[0].before.as_deref().unwrap()).unwrap();
    let mut ids: Vec<String> = serde_json::from_value(before["recordIds"].clone()).unwrap();
    ids.sort();
    assert_eq!(ids, vec!["rec-1", "rec-2"]);
}

#[tokio::test]
async fn test_batch_delete_all_failed_is_not_audited() {
    let mock = start_mock_cloudflare(MockCloudflare {
        failing_records: vec!["rec-bad".to_string()],
        ..Default::default()
    })
    .await;
    let state = state_with_protected(&mock, &[]).await;
    let admin = create_test_user(&state.db, "admin@example.com", Role::Admin).await;
    let token = session_token(&state, &admin);
    let app = test_app(state.clone());

    let (status, response) = send(
        &app,
        "POST",
        "/api/cloudflare/dns/batch",
        Some(&token),
        Some(json!({ "zoneId": ZONE_ID, "recordIds": ["rec-bad"] })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["deleted"], 0);
    assert!(audit_rows(&state).await.is_empty());
}

#[tokio::test]
async fn test_import_is_audited() {
    let mock = start_mock_cloudflare(MockCloudflare::default()).await;
    let state = state_with_protected(&mock, &[]).await;
    let admin = create_test_user(&state.db, "admin@example.com", Role::Admin).await;
    let token = session_token(&state, &admin);
    let app = test_app(state.clone());

    let (status, response) = send(
        &app,
        "POST",
        "/api/cloudflare/dns/import",
        Some(&token),
        Some(json!({ "zoneId": ZONE_ID, "content": "www 1 IN A 192.0.2.1" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["result"]["recs_added"], 1);
    let rows = audit_rows(&state).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].action, "dns.import");
}

// ============================================================================
// Reads and viewer access
// ============================================================================

#[tokio::test]
async fn test_list_and_export_records() {
    let mock = start_mock_cloudflare(MockCloudflare::default()).await;
    let state = state_with_protected(&mock, &[]).await;
    let admin = create_test_user(&state.db, "admin@example.com", Role::Admin).await;
    let token = session_token(&state, &admin);
    let app = test_app(state);

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/cloudflare/dns?zoneId={}&type=A", ZONE_ID),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["records"].as_array().unwrap().len(), 2);
    assert_eq!(body["total"], 2);

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/cloudflare/dns/export?zoneId={}", ZONE_ID),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_str().unwrap().contains("IN\tA"));
}

#[tokio::test]
async fn test_missing_zone_id_is_bad_request() {
    let mock = start_mock_cloudflare(MockCloudflare::default()).await;
    let state = state_with_protected(&mock, &[]).await;
    let admin = create_test_user(&state.db, "admin@example.com", Role::Admin).await;
    let token = session_token(&state, &admin);
    let app = test_app(state);

    let (status, body) = send(&app, "GET", "/api/cloudflare/dns", Some(&token), None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "zoneId is required");
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn test_viewer_reads_bound_account_only() {
    let mock = start_mock_cloudflare(MockCloudflare::default()).await;
    let state = state_with_protected(&mock, &[]).await;
    let viewer = create_test_user(&state.db, "viewer@example.com", Role::Viewer).await;
    let bound = create_test_account(&state, "Bound", "bound-token").await;
    let other = create_test_account(&state, "Other", "other-token").await;
    bind_account(&state.db, &viewer.id, &bound.id).await;
    let token = session_token(&state, &viewer);
    let app = test_app(state);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/cloudflare/dns?accountId={}&zoneId={}", bound.id, ZONE_ID),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/cloudflare/dns?accountId={}&zoneId={}", other.id, ZONE_ID),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "You do not have access to this Cloudflare account");

    // No account means the fallback token, which viewers never get
    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/cloudflare/dns?zoneId={}", ZONE_ID),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    assert_eq!(mock.count("GET", "/zones/zone-1/dns_records"), 1);
}

#[tokio::test]
async fn test_viewer_cannot_write_even_to_bound_account() {
    let mock = start_mock_cloudflare(MockCloudflare::default()).await;
    let state = state_with_protected(&mock, &[]).await;
    let viewer = create_test_user(&state.db, "viewer@example.com", Role::Viewer).await;
    let bound = create_test_account(&state, "Bound", "bound-token").await;
    bind_account(&state.db, &viewer.id, &bound.id).await;
    let token = session_token(&state, &viewer);
    let app = test_app(state.clone());

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/cloudflare/dns/rec-1?accountId={}&zoneId={}", bound.id, ZONE_ID),
        Some(&token),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(mock.requests().is_empty());
    assert!(audit_rows(&state).await.is_empty());
}

// ============================================================================
// Identifier validation
// ============================================================================

#[tokio::test]
async fn test_zone_id_with_path_characters_is_rejected() {
    let mock = start_mock_cloudflare(MockCloudflare::default()).await;
    let state = state_with_protected(&mock, &[]).await;
    let admin = create_test_user(&state.db, "admin@example.com", Role::Admin).await;
    let token = session_token(&state, &admin);
    let app = test_app(state.clone());

    // "zone-1?" would otherwise cut the record path down to a zone delete
    let (status, body) = send(
        &app,
        "DELETE",
        "/api/cloudflare/dns/rec-1?zoneId=zone-1%3F",
        Some(&token),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "zoneId is not a valid Cloudflare id");
    assert!(mock.requests().is_empty());
    assert!(audit_rows(&state).await.is_empty());
}

#[tokio::test]
async fn test_record_id_with_path_characters_is_rejected() {
    let mock = start_mock_cloudflare(MockCloudflare::default()).await;
    let state = state_with_protected(&mock, &[]).await;
    let admin = create_test_user(&state.db, "admin@example.com", Role::Admin).await;
    let token = session_token(&state, &admin);
    let app = test_app(state.clone());

    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/api/cloudflare/dns/..%2F..%2Fzones%2F{}?zoneId={}", ZONE_ID, ZONE_ID),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "recordId is not a valid Cloudflare id");

    let (status, _) = send(
        &app,
        "POST",
        "/api/cloudflare/dns/batch",
        Some(&token),
        Some(json!({ "zoneId": ZONE_ID, "recordIds": ["rec-1", "../settings"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(mock.requests().is_empty());
    assert!(audit_rows(&state).await.is_empty());
}
