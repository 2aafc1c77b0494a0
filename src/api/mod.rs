pub mod auth;
pub mod error;
mod estimates;
mod pricing;
pub mod rate_limit;
mod team;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Credential-bearing endpoints get the stricter limit
    let throttled_auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/setup", post(auth::setup))
        .route(
            "/password-reset/request",
            post(auth::request_password_reset),
        )
        .route(
            "/password-reset/confirm",
            post(auth::confirm_password_reset),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_auth,
        ));

    let auth_routes = Router::new()
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout))
        .route("/change-password", post(auth::change_password))
        .route("/setup-status", get(auth::setup_status))
        .merge(throttled_auth_routes);

    // Invite acceptance is public; the token is the credential
    let public_team_routes = Router::new()
        .route("/team/invites/accept", post(team::accept_invite))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_auth,
        ));

    let api_routes = Router::new()
        // Team
        .route("/team", get(team::list_team))
        .route("/team/invites", post(team::create_invite))
        // Pricing
        .route("/pricing/preview", post(pricing::preview))
        // Estimates
        .route("/estimates", post(estimates::create_estimate))
        .route("/estimates/:id", get(estimates::get_estimate))
        .route(
            "/estimates/:id/status",
            post(estimates::update_estimate_status),
        )
        .route(
            "/estimates/:id/approve",
            post(estimates::approve_estimate),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_api,
        ))
        .merge(public_team_routes);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
