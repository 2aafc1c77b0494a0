use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header, request::Parts},
    response::IntoResponse,
    Json,
};
use std::convert::Infallible;
use std::sync::Arc;

use super::error::ApiError;
use crate::auth::{AuthError, SessionReader};
use crate::db::{
    ChangePasswordRequest, LoginRequest, LoginResponse, MeResponse, ResetConfirmRequest,
    ResetRequest, Role, SetupRequest, SetupStatusResponse, SuccessResponse, UserResponse,
};
use crate::AppState;

/// The session token on the request (cookie or bearer), if any
pub struct SessionToken(pub Option<String>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for SessionToken {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(SessionToken(SessionReader::token(&parts.headers)))
    }
}

impl SessionToken {
    /// Pass the token through the role gate
    pub async fn require(&self, state: &AppState, role: Role) -> Result<UserResponse, ApiError> {
        let user = state
            .sessions
            .authorize(self.0.as_deref(), role)
            .await?
            .into_result()?;
        Ok(user)
    }
}

/// Extractor for the authenticated user; rejects with 401
pub struct CurrentUser(pub UserResponse);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = SessionReader::token(&parts.headers).ok_or(AuthError::Unauthenticated)?;
        let user = state.sessions.validate(&token).await?;
        Ok(CurrentUser(user))
    }
}

fn session_cookie(state: &AppState, token: &str) -> String {
    SessionReader::session_cookie(
        token,
        state.sessions.session_ttl(),
        state.config.server.is_https(),
    )
}

/// Login endpoint
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let issued = state
        .sessions
        .login(&request.username, &request.password)
        .await?;

    let cookie = session_cookie(&state, &issued.token);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            success: true,
            user: issued.user,
            token: issued.token,
        }),
    ))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<MeResponse> {
    Json(MeResponse {
        success: true,
        user,
    })
}

/// Revoke the session (if any) and clear the cookie
pub async fn logout(
    State(state): State<Arc<AppState>>,
    SessionToken(token): SessionToken,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = token {
        state.sessions.logout(&token).await?;
    }

    let cookie = SessionReader::clear_cookie(state.config.server.is_https());
    Ok(([(header::SET_COOKIE, cookie)], Json(SuccessResponse::ok())))
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    SessionToken(token): SessionToken,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let token = token.ok_or(AuthError::Unauthenticated)?;
    state
        .sessions
        .change_password(&token, &request.current_password, &request.new_password)
        .await?;
    Ok(Json(SuccessResponse::ok()))
}

/// Always answers success so responses do not reveal which accounts exist
pub async fn request_password_reset(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResetRequest>,
) -> Json<SuccessResponse> {
    if let Err(e) = state.resets.request(&request.email_or_username).await {
        tracing::error!(error = %e, "Password reset request failed");
    }
    Json(SuccessResponse::ok())
}

pub async fn confirm_password_reset(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResetConfirmRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state
        .resets
        .confirm(&request.token, &request.new_password)
        .await?;
    Ok(Json(SuccessResponse::ok()))
}

/// Check if initial setup is needed (no users exist)
pub async fn setup_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SetupStatusResponse>, ApiError> {
    Ok(Json(SetupStatusResponse {
        needs_setup: state.sessions.needs_setup().await?,
    }))
}

/// Initial setup endpoint - creates the first owner and logs them in
pub async fn setup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SetupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let issued = state
        .sessions
        .setup(&request.username, &request.password)
        .await?;

    let cookie = session_cookie(&state, &issued.token);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            success: true,
            user: issued.user,
            token: issued.token,
        }),
    ))
}
