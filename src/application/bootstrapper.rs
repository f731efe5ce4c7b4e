//! Application bootstrapper
//!
//! Handles all initialization and setup for the cf-admin backend.

use std::net::SocketAddr;

use axum::{http::HeaderValue, middleware, Router};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{server::ServerConfig, Config, LogFormat};
use crate::db;
use crate::endpoints;
use crate::middleware::security_headers;
use crate::services::bootstrap::seed_admin;
use crate::state::AppState;

/// Bootstrap and run the application
pub async fn run() -> anyhow::Result<()> {
    let config = Config::from_env();
    init_tracing(&config);

    tracing::info!(
        "Starting cf-admin backend v{} ({})",
        config.version,
        config.commit_hash
    );

    let state = init_services(config).await?;
    let addr = bind_address(&state.config.server)?;
    let app = create_app(state);

    serve(app, addr).await
}

/// Initialize tracing/logging
fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("cf_admin={},tower_http=info", config.log_level).into()
    });
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_ansi(false))
            .init(),
    }
}

/// Connect the database, seed the first admin and build shared state
async fn init_services(config: Config) -> anyhow::Result<AppState> {
    let conn = db::connect(&config.database).await?;
    tracing::info!("Database connection established");

    seed_admin(&conn, &config.auth).await?;

    if !config.cloudflare.protected_zones.is_empty() {
        tracing::info!(
            "DNS writes blocked for protected zones: {}",
            config.cloudflare.protected_zones.join(", ")
        );
    }

    Ok(AppState::new(conn, config)?)
}

/// CORS policy: the configured origins, or any origin when none are set
fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect();

    if origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Create the main application router
pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server);

    endpoints::create_router(state)
        .layer(middleware::from_fn(security_headers))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn bind_address(server: &ServerConfig) -> anyhow::Result<SocketAddr> {
    Ok(format!("{}:{}", server.host, server.port).parse()?)
}

/// Start the HTTP server
async fn serve(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
