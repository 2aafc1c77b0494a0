//! Team roster and invitation endpoints.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use super::auth::SessionToken;
use super::error::ApiError;
use crate::db::{
    AcceptInviteRequest, CreateInviteRequest, CreateInviteResponse, Role, SuccessResponse,
    TeamInvite, TeamMember,
};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct TeamResponse {
    pub success: bool,
    pub members: Vec<TeamMember>,
    pub pending_invites: Vec<TeamInvite>,
}

/// Roster plus pending invites, for managers and up
pub async fn list_team(
    State(state): State<Arc<AppState>>,
    token: SessionToken,
) -> Result<Json<TeamResponse>, ApiError> {
    token.require(&state, Role::Manager).await?;

    let members = TeamMember::list_all(&state.db).await?;
    let pending_invites = TeamInvite::list_pending(&state.db).await?;

    Ok(Json(TeamResponse {
        success: true,
        members,
        pending_invites,
    }))
}

/// Owner-only: invite someone by email
pub async fn create_invite(
    State(state): State<Arc<AppState>>,
    token: SessionToken,
    Json(request): Json<CreateInviteRequest>,
) -> Result<Json<CreateInviteResponse>, ApiError> {
    let owner = token.require(&state, Role::Owner).await?;

    let created = state
        .invites
        .create(&owner, &request.email, &request.role)
        .await?;

    Ok(Json(CreateInviteResponse {
        success: true,
        invite: created.invite,
        accept_url: created.accept_url,
        email_sent: created.email_sent,
    }))
}

/// Public: the invite token is the credential
pub async fn accept_invite(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AcceptInviteRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state
        .invites
        .accept(&request.token, &request.name, &request.password)
        .await?;
    Ok(Json(SuccessResponse::ok()))
}
