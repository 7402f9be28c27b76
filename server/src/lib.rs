//! Telehealth REST backend: doctor and patient portals, prescriptions,
//! follow-ups, health data, chat, dashboard statistics and an AI chat proxy.

pub mod access;
pub mod ai;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod notify;
pub mod validation;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::ai::{AiClient, AiError};
use crate::auth::JwtKeys;
use crate::config::AppConfig;
use crate::db::Database;
use crate::notify::PushNotifier;

/// Shared, cheaply cloned state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<AppConfig>,
    pub jwt: Arc<JwtKeys>,
    pub ai: Arc<AiClient>,
    pub notifier: PushNotifier,
}

impl AppState {
    pub fn new(config: AppConfig, db: Database) -> Result<Self, AiError> {
        let jwt = JwtKeys::new(&config.jwt_secret, config.jwt_expiry_hours);
        let ai = AiClient::new(&config.ai)?;
        let notifier = PushNotifier::new(&config.fcm);
        Ok(Self {
            db,
            config: Arc::new(config),
            jwt: Arc::new(jwt),
            ai: Arc::new(ai),
            notifier,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    use handlers::{ai, auth, chat, dashboard, followups, health_data, patients, prescriptions};

    let public = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let protected = Router::new()
        // Account
        .route("/auth/me", get(auth::me))
        .route("/auth/profile", put(auth::update_profile))
        .route("/auth/fcm-token", put(auth::update_fcm_token))
        .route("/auth/change-password", post(auth::change_password))
        // Doctor portal
        .route("/patients", get(patients::list).post(patients::create))
        .route(
            "/patients/:id",
            get(patients::get).put(patients::update).delete(patients::delete),
        )
        .route(
            "/prescriptions",
            get(prescriptions::list).post(prescriptions::create),
        )
        .route(
            "/prescriptions/:id",
            get(prescriptions::get)
                .put(prescriptions::update)
                .delete(prescriptions::delete),
        )
        .route("/prescriptions/:id/status", patch(prescriptions::update_status))
        .route("/followups", get(followups::list).post(followups::create))
        .route(
            "/followups/:id",
            get(followups::get).put(followups::update).delete(followups::delete),
        )
        .route("/followups/:id/status", patch(followups::update_status))
        .route("/health-data/:patient_id", get(health_data::get))
        .route(
            "/health-data/:patient_id/:metric",
            put(health_data::record_metric).delete(health_data::delete_metric),
        )
        // Chat
        .route("/chat/messages", post(chat::send))
        .route("/chat/messages/:id/read", patch(chat::mark_read))
        .route("/chat/rooms/:other_id/messages", get(chat::room_messages))
        .route("/chat/rooms/:other_id/read", post(chat::mark_room_read))
        .route("/chat/unread", get(chat::unread))
        .route("/chat/contacts", get(chat::contacts))
        .route("/dashboard/stats", get(dashboard::stats))
        .route("/ai/chat", post(ai::chat))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_auth,
        ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", public.merge(protected))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            error::expose_internal_errors,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
