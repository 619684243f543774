//! HTTP API
//!
//! Router assembly and shared application state. Handlers live in one module
//! per area; authentication runs as middleware layers.

use std::sync::Arc;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, patch, post};
use axum::Router;
use sqlx::PgPool;

use crate::config::Config;
use crate::email::Mailer;

pub mod auth;
pub mod bills;
pub mod dashboard;
pub mod guest;
pub mod middleware;
pub mod password;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub mailer: Arc<dyn Mailer>,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/guest/access", post(guest::request_access))
        .route("/guest/session", post(guest::create_session))
        .route("/password/request-reset", post(password::request_reset))
        .route("/password/validate-token", post(password::validate_token))
        .route("/password/reset", post(password::reset_password));

    let user_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/bills", post(bills::create_bill).get(bills::list_bills))
        .route("/bills/:bill_id", get(bills::get_bill).delete(bills::delete_bill))
        .route("/bills/:bill_id/summary", get(bills::get_summary))
        .route("/bills/:bill_id/settlements", get(bills::get_settlements))
        .route("/bills/:bill_id/participants", post(bills::add_participant))
        .route(
            "/participants/:participant_id",
            patch(bills::update_participant).delete(bills::remove_participant),
        )
        .route("/dashboard", get(dashboard::get_dashboard))
        .route(
            "/profile",
            get(dashboard::get_profile).patch(dashboard::update_profile),
        )
        .route("/password/change", post(password::change_password))
        .layer(from_fn_with_state(state.clone(), middleware::session_auth));

    let guest_routes = Router::new()
        .route("/guest/bill", get(guest::get_bill))
        .route("/guest/participant", patch(guest::update_share))
        .layer(from_fn_with_state(state.clone(), middleware::guest_auth));

    Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .merge(guest_routes)
        .layer(from_fn(middleware::logging_middleware))
        .with_state(state)
}
