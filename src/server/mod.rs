//! Backend for the Airmeet calling dashboard
//!
//! This module contains all server functionality:
//! - Database access (PostgreSQL via sqlx)
//! - Retell API integration (AI voice calls)
//! - Redis-backed list cache and delayed-call queue
//! - Authentication (JWT)
//! - API routes

pub mod auth;
pub mod cache;
pub mod calls_api;
pub mod db;
pub mod error;
pub mod queue;
pub mod retell;
pub mod webhook;
pub mod worker;

use axum::{
    routing::{get, post},
    Json, Router,
    extract::State,
};
use axum::http::Method;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::models::AllLeadsResponse;
use auth::AuthUser;
use error::ApiError;

/// Application state shared across all routes.
///
/// Every connection (store, cache, queue, provider client) is constructed at
/// startup and injected here; nothing reaches for ambient globals.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub retell: retell::RetellClient,
    pub cache: cache::ListCache,
    pub queue: queue::CallQueue,
    pub jwt_secret: String,
    /// Outbound voice-agent id passed to the provider.
    pub agent_id: String,
    /// Caller id for outbound calls.
    pub from_number: String,
}

/// Create the Axum router with all API routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health_check))

        // Auth routes
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/user/me", get(auth::me))

        // Call orchestration routes
        .route("/call/createCall", post(calls_api::create_call))
        .route("/call/scheduleCall", post(calls_api::schedule_call))
        .route("/call/getCalls/{leadId}", get(calls_api::get_calls))
        .route("/call/batchCall", post(calls_api::batch_call))

        // Lead routes
        .route("/lead/allLeads", get(all_leads))

        // Retell webhooks
        .route("/webhook/", post(webhook::handle_retell_webhook))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

// Health check
async fn health_check() -> &'static str {
    "OK"
}

/// `GET /lead/allLeads`: read-through on the user's cached lead list.
async fn all_leads(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<AllLeadsResponse>, ApiError> {
    if let Some(leads) = state.cache.get_user_leads(user.id).await {
        return Ok(Json(AllLeadsResponse {
            message: "All Leads".to_string(),
            leads,
        }));
    }

    let leads = db::leads::get_by_user(&state.db, user.id).await?;
    state.cache.put_user_leads(user.id, &leads).await;

    Ok(Json(AllLeadsResponse {
        message: "All Leads".to_string(),
        leads,
    }))
}

/// Environment configuration shared by server and worker.
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub retell_api_key: String,
    pub agent_id: String,
    pub from_number: String,
    pub jwt_secret: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            retell_api_key: std::env::var("RETELL_API_KEY")
                .map_err(|_| anyhow::anyhow!("RETELL_API_KEY must be set"))?,
            agent_id: std::env::var("RETELL_AGENT_ID")
                .map_err(|_| anyhow::anyhow!("RETELL_AGENT_ID must be set"))?,
            from_number: std::env::var("RETELL_FROM_NUMBER")
                .map_err(|_| anyhow::anyhow!("RETELL_FROM_NUMBER must be set"))?,
            jwt_secret: std::env::var("JWT_SECRET")
                .unwrap_or_else(|_| "your-secret-key".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
        })
    }
}

async fn connect_redis(redis_url: &str) -> anyhow::Result<redis::aio::ConnectionManager> {
    let client = redis::Client::open(redis_url)?;
    let manager = client.get_connection_manager().await?;
    tracing::info!("Redis connected");
    Ok(manager)
}

/// Initialize and start the API server
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let pool = db::init_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    let redis = connect_redis(&config.redis_url).await?;

    let state = AppState {
        db: pool,
        retell: retell::RetellClient::new(config.retell_api_key),
        cache: cache::ListCache::new(redis.clone()),
        queue: queue::CallQueue::new(redis),
        jwt_secret: config.jwt_secret,
        agent_id: config.agent_id,
        from_number: config.from_number,
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!("Server running on http://0.0.0.0:{}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Initialize and start the delayed-call worker
pub async fn run_worker(config: Config) -> anyhow::Result<()> {
    let redis = connect_redis(&config.redis_url).await?;

    let consumer = worker::JobConsumer::new(
        queue::CallQueue::new(redis),
        retell::RetellClient::new(config.retell_api_key),
    );
    consumer.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::Path;
    use axum::http::{Request, StatusCode};
    use axum_extra::extract::WithRejection;
    use tower::ServiceExt;

    #[tokio::test]
    async fn malformed_lead_id_gets_the_json_error_shape() {
        let app = Router::new().route(
            "/call/getCalls/{leadId}",
            get(
                |WithRejection(Path(_lead_id), _): WithRejection<Path<i64>, ApiError>| async {
                    "ok"
                },
            ),
        );

        let response = app
            .oneshot(
                Request::get("/call/getCalls/not-a-number")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "Invalid lead id");
    }
}
