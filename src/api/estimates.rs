use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use super::auth::SessionToken;
use super::error::ApiError;
use crate::db::{
    ApproveEstimateResponse, CreateEstimateRequest, EstimateResponse, Role,
    UpdateEstimateStatusRequest,
};
use crate::validation::validate_uuid;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct EstimateEnvelope {
    pub success: bool,
    pub estimate: EstimateResponse,
}

fn check_id(id: &str) -> Result<(), ApiError> {
    validate_uuid(id, "estimate id").map_err(|_| ApiError::not_found("Estimate not found"))
}

pub async fn create_estimate(
    State(state): State<Arc<AppState>>,
    token: SessionToken,
    Json(request): Json<CreateEstimateRequest>,
) -> Result<(StatusCode, Json<EstimateEnvelope>), ApiError> {
    let user = token.require(&state, Role::Estimator).await?;
    let estimate = state.estimates.create(&user.id, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(EstimateEnvelope {
            success: true,
            estimate: estimate.into(),
        }),
    ))
}

pub async fn get_estimate(
    State(state): State<Arc<AppState>>,
    token: SessionToken,
    Path(id): Path<String>,
) -> Result<Json<EstimateEnvelope>, ApiError> {
    token.require(&state, Role::Painter).await?;
    check_id(&id)?;

    let estimate = state.estimates.get(&id).await?;
    Ok(Json(EstimateEnvelope {
        success: true,
        estimate: estimate.into(),
    }))
}

pub async fn update_estimate_status(
    State(state): State<Arc<AppState>>,
    token: SessionToken,
    Path(id): Path<String>,
    Json(request): Json<UpdateEstimateStatusRequest>,
) -> Result<Json<EstimateEnvelope>, ApiError> {
    token.require(&state, Role::Estimator).await?;
    check_id(&id)?;

    let estimate = state.estimates.update_status(&id, &request.status).await?;
    Ok(Json(EstimateEnvelope {
        success: true,
        estimate: estimate.into(),
    }))
}

/// Owner-only. Accepts the session cookie or a bearer token.
pub async fn approve_estimate(
    State(state): State<Arc<AppState>>,
    token: SessionToken,
    Path(id): Path<String>,
) -> Result<Json<ApproveEstimateResponse>, ApiError> {
    let owner = token.require(&state, Role::Owner).await?;
    check_id(&id)?;

    let project = state.estimates.approve(&id).await?;
    tracing::info!(estimate_id = %id, approved_by = %owner.id, "Approval recorded");

    Ok(Json(ApproveEstimateResponse {
        success: true,
        project: project.into(),
    }))
}
