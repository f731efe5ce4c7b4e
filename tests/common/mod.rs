//! Test helpers shared by the integration tests.
//!
//! Provides an in-memory database, user and account fixtures, a mock
//! Cloudflare API served by axum on an ephemeral port, and request helpers
//! that drive the real router with `oneshot`.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{Method, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use http_body_util::BodyExt;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use sea_orm_migration::MigratorTrait;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use cf_admin::config::auth::AuthConfig;
use cf_admin::config::cloudflare::CloudflareConfig;
use cf_admin::config::database::DatabaseConfig;
use cf_admin::config::server::ServerConfig;
use cf_admin::config::{Config, LogFormat};
use cf_admin::migrations::Migrator;
use cf_admin::models::{cf_account, user, user_cf_account};
use cf_admin::state::AppState;

pub const TEST_SECRET: &str = "integration-test-secret";
pub const TEST_PASSWORD: &str = "correct-horse-battery";
pub const FALLBACK_TOKEN: &str = "fallback-token";
pub const ZONE_ID: &str = "zone-1";
pub const CF_ACCOUNT_ID: &str = "acct-1";

// ============================================================================
// Database
// ============================================================================

/// Create an in-memory SQLite database for testing
pub async fn create_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to create test database");

    Migrator::up(&db, None)
        .await
        .expect("Failed to run test migrations");

    db
}

/// Create a user directly, with a cheap bcrypt cost to keep tests fast
pub async fn create_test_user(
    db: &DatabaseConnection,
    email: &str,
    role: user::Role,
) -> user::Model {
    user::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        email: Set(email.to_lowercase()),
        password_hash: Set(bcrypt::hash(TEST_PASSWORD, 4).unwrap()),
        name: Set(None),
        role: Set(role),
        created_at: Set(chrono::Utc::now()),
    }
    .insert(db)
    .await
    .unwrap()
}

/// Store a Cloudflare account whose token is sealed with the state's cipher
pub async fn create_test_account(state: &AppState, name: &str, token: &str) -> cf_account::Model {
    cf_account::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        name: Set(name.to_string()),
        encrypted_token: Set(state.tokens.cipher().encrypt(token).unwrap()),
        created_at: Set(chrono::Utc::now()),
        last_test_at: Set(None),
        last_test_status: Set(None),
    }
    .insert(&state.db)
    .await
    .unwrap()
}

pub async fn bind_account(db: &DatabaseConnection, user_id: &str, account_id: &str) {
    user_cf_account::ActiveModel {
        user_id: Set(user_id.to_string()),
        cf_account_id: Set(account_id.to_string()),
    }
    .insert(db)
    .await
    .unwrap();
}

// ============================================================================
// Configuration and state
// ============================================================================

pub fn test_config(api_base: &str) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            allowed_origins: Vec::new(),
        },
        database: DatabaseConfig {
            database_url: "sqlite::memory:".to_string(),
        },
        auth: AuthConfig {
            secret: Some(TEST_SECRET.to_string()),
            session_ttl_secs: 3600,
            secure_cookies: false,
            protected_admin_email: None,
            seed_admin_email: None,
            seed_admin_password: None,
        },
        cloudflare: CloudflareConfig {
            api_base: api_base.to_string(),
            fallback_token: Some(FALLBACK_TOKEN.to_string()),
            protected_zones: Vec::new(),
            request_timeout: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(2),
        },
        commit_hash: "test".to_string(),
        build_time: "test".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        log_level: "debug".to_string(),
        log_format: LogFormat::Text,
    }
}

pub fn build_state(db: DatabaseConnection, config: Config) -> AppState {
    AppState::new(db, config).expect("Failed to build app state")
}

/// Fresh database plus state pointed at `api_base`
pub async fn build_test_state(api_base: &str) -> AppState {
    build_state(create_test_db().await, test_config(api_base))
}

pub fn test_app(state: AppState) -> Router {
    cf_admin::bootstrapper::create_app(state)
}

pub fn session_token(state: &AppState, user: &user::Model) -> String {
    state.sessions.issue(user).unwrap()
}

// ============================================================================
// Requests
// ============================================================================

/// Send a request through the router; returns status and the decoded body
/// (JSON when possible, otherwise a JSON string)
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().uri(uri).method(method);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };
    (status, body)
}

// ============================================================================
// Mock Cloudflare API
// ============================================================================

/// Behaviour knobs for the mock Cloudflare API
#[derive(Clone, Debug)]
pub struct MockCloudflare {
    pub zone_name: String,
    /// `GET /zones` returns an empty list
    pub no_zones: bool,
    /// `GET /zones` answers `success: false` with "Invalid API Token"
    pub reject_token: bool,
    /// `GET /zones/{id}` fails with a 500
    pub zone_lookup_fails: bool,
    /// Path fragments that answer 403
    pub forbidden: Vec<&'static str>,
    /// Record ids whose deletion fails
    pub failing_records: Vec<String>,
}

impl Default for MockCloudflare {
    fn default() -> Self {
        Self {
            zone_name: "example.com".to_string(),
            no_zones: false,
            reject_token: false,
            zone_lookup_fails: false,
            forbidden: Vec::new(),
            failing_records: Vec::new(),
        }
    }
}

struct MockInner {
    config: MockCloudflare,
    requests: Arc<Mutex<Vec<String>>>,
}

pub struct MockServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockServer {
    /// Every request seen so far as `METHOD /path` (without the API prefix)
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str, path_prefix: &str) -> usize {
        let needle = format!("{} {}", method, path_prefix);
        self.requests()
            .iter()
            .filter(|r| r.starts_with(&needle))
            .count()
    }
}

pub async fn start_mock_cloudflare(config: MockCloudflare) -> MockServer {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let inner = Arc::new(MockInner {
        config,
        requests: requests.clone(),
    });
    let app = Router::new().fallback(mock_handler).with_state(inner);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockServer {
        base_url: format!("http://{}/client/v4", addr),
        requests,
    }
}

fn cf_ok(result: Value) -> Response {
    Json(json!({ "success": true, "errors": [], "result": result })).into_response()
}

fn cf_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "success": false, "errors": [{ "code": 1000, "message": message }], "result": null })),
    )
        .into_response()
}

fn record(id: &str, zone_name: &str) -> Value {
    json!({ "id": id, "type": "A", "name": format!("www.{}", zone_name), "content": "192.0.2.1", "ttl": 1 })
}

async fn mock_handler(
    State(mock): State<Arc<MockInner>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    let path = uri.path().trim_start_matches("/client/v4").to_string();
    mock.requests
        .lock()
        .unwrap()
        .push(format!("{} {}", method, path));

    let config = &mock.config;
    if config.forbidden.iter().any(|f| path.contains(f)) {
        return cf_error(StatusCode::FORBIDDEN, "Authentication error");
    }

    let json_body = || serde_json::from_slice::<Value>(&body).unwrap_or(Value::Null);
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

    match (method.as_str(), segments.as_slice()) {
        ("GET", ["zones"]) => {
            if config.reject_token {
                return cf_error(StatusCode::BAD_REQUEST, "Invalid API Token");
            }
            if config.no_zones {
                return cf_ok(json!([]));
            }
            cf_ok(json!([{
                "id": ZONE_ID,
                "name": config.zone_name,
                "status": "active",
                "account": { "id": CF_ACCOUNT_ID, "name": "Acme" }
            }]))
        }
        ("GET", ["zones", zone_id]) => {
            if config.zone_lookup_fails {
                return cf_error(StatusCode::INTERNAL_SERVER_ERROR, "zone lookup unavailable");
            }
            cf_ok(json!({ "id": zone_id, "name": config.zone_name, "status": "active" }))
        }
        ("GET", ["zones", _, "dns_records"]) => Json(json!({
            "success": true,
            "errors": [],
            "result": [record("rec-1", &config.zone_name), record("rec-2", &config.zone_name)],
            "result_info": { "page": 1, "per_page": 100, "count": 2, "total_count": 2 }
        }))
        .into_response(),
        ("POST", ["zones", _, "dns_records"]) => {
            let mut created = json_body();
            created["id"] = json!("rec-new");
            cf_ok(created)
        }
        ("GET", ["zones", _, "dns_records", "export"]) => {
            format!("www.{}.\t1\tIN\tA\t192.0.2.1\n", config.zone_name).into_response()
        }
        ("POST", ["zones", _, "dns_records", "import"]) => {
            cf_ok(json!({ "recs_added": 1, "total_records_parsed": 1 }))
        }
        ("GET", ["zones", _, "dns_records", record_id]) => cf_ok(record(record_id, &config.zone_name)),
        ("PUT", ["zones", _, "dns_records", record_id]) => {
            let mut updated = json_body();
            updated["id"] = json!(record_id);
            cf_ok(updated)
        }
        ("DELETE", ["zones", _, "dns_records", record_id]) => {
            if config.failing_records.iter().any(|r| r == record_id) {
                return cf_error(StatusCode::NOT_FOUND, "Record does not exist");
            }
            cf_ok(json!({ "id": record_id }))
        }
        ("GET", ["accounts", _, "rules", "lists"]) => cf_ok(json!([
            { "id": "list-1", "name": "marketing", "kind": "redirect" },
            { "id": "list-2", "name": "blocked", "kind": "ip" }
        ])),
        ("POST", ["graphql"]) => Json(json!({
            "data": { "viewer": { "zones": [{ "httpRequests1dGroups": [
                { "dimensions": { "date": "2026-03-01" }, "sum": { "requests": 42 } }
            ] }] } },
            "errors": null
        }))
        .into_response(),
        ("POST", ["zones", _, "purge_cache"]) => cf_ok(json!({ "id": "purge-1", "request": json_body() })),
        _ => cf_ok(json!([])),
    }
}
