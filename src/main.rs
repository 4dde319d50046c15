//! GeneGuard Backend
//!
//! REST backend for group sharing and analysis-ownership bookkeeping, with
//! SQLite-backed key-value persistence.

mod api;
mod auth;
mod config;
mod errors;
mod ledger;
mod models;
mod store;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use store::{KeyValueStore, SqliteStore};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn KeyValueStore>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting GeneGuard Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Warn if PSK is not configured
    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (GENEGUARD_API_PSK). Authentication is disabled!");
    }

    // Initialize storage
    let store = SqliteStore::connect(&config.db_path).await?;

    // Create application state
    let state = AppState {
        store: Arc::new(store),
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.api_psk.clone();

    // API routes
    let api_routes = Router::new()
        // Users
        .route("/users/sync", post(api::sync_user))
        .route("/users/{uid}", get(api::get_user))
        .route("/users/{uid}/profile", put(api::update_profile))
        .route("/users/{uid}/analyses", get(api::user_analyses))
        // Groups
        .route("/groups", post(api::create_group))
        .route("/groups/join", post(api::join_group))
        .route("/groups/{id}", get(api::list_user_groups))
        .route("/groups/{id}/members", get(api::group_members))
        .route("/groups/{id}/leave", delete(api::leave_group))
        .route("/groups/{id}/analyses", get(api::group_analyses))
        .route(
            "/groups/{id}/analyses/{member_uid}",
            get(api::view_shared_analysis),
        )
        // Analyses
        .route("/analyses", post(api::save_analysis))
        .route("/analyses", delete(api::clear_analyses))
        .route("/analyses/current", get(api::current_analysis))
        .route("/analyses/summary", get(api::analysis_summary))
        .route("/analyses/share", post(api::share_analysis))
        .route("/analyses/{id}", get(api::get_analysis))
        .route(
            "/analyses/{id}/unshare/{group_id}",
            delete(api::unshare_analysis),
        )
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
