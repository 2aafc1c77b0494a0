pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod engine;
pub mod notifications;
pub mod validation;

pub use db::DbPool;

use chrono::Duration;
use std::sync::Arc;

use crate::api::rate_limit::RateLimiter;
use crate::auth::{Argon2Credential, Credential, InviteService, PasswordResetService, SessionService};
use crate::config::Config;
use crate::engine::pricing::PricingSettings;
use crate::engine::EstimateService;
use crate::notifications::SystemEmailService;

/// Shared application state handed to every handler
pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub sessions: SessionService,
    pub resets: PasswordResetService,
    pub invites: InviteService,
    pub estimates: EstimateService,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let credential: Arc<dyn Credential> = Arc::new(Argon2Credential);
        let email = Arc::new(SystemEmailService::new(config.email.clone()));

        let sessions = SessionService::new(
            db.clone(),
            credential.clone(),
            Duration::days(config.auth.session_ttl_days),
        );
        let resets = PasswordResetService::new(
            db.clone(),
            credential.clone(),
            email.clone(),
            config.server.clone(),
            Duration::minutes(config.auth.reset_token_ttl_minutes),
        );
        let invites = InviteService::new(
            db.clone(),
            credential,
            email.clone(),
            config.server.clone(),
            Duration::days(config.auth.invite_ttl_days),
        );
        let estimates = EstimateService::new(
            db.clone(),
            email,
            PricingSettings::from(&config.pricing),
        );
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));

        Self {
            config,
            db,
            sessions,
            resets,
            invites,
            estimates,
            rate_limiter,
        }
    }
}
