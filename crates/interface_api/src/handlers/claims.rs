//! Claims handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use validator::Validate;

use core_kernel::ClaimId;
use domain_claims::{Claim, ClaimPage, ClaimView, Note};

use crate::auth::Claims;
use crate::dto::claims::*;
use crate::{error::ApiError, AppState};

fn claim_id(raw: i64) -> Result<ClaimId, ApiError> {
    ClaimId::new(raw).map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// Lists claims
pub async fn list_claims(
    State(state): State<AppState>,
    Query(params): Query<ListClaimsParams>,
) -> Result<Json<ClaimPage>, ApiError> {
    let query = params.into_query()?;
    let page = state.store.list_claims(&query).await?;
    Ok(Json(page))
}

/// Gets a claim by ID
pub async fn get_claim(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<Json<ClaimView>, ApiError> {
    let view = state.store.get_claim(claim_id(id)?, Some(&user.sub)).await?;
    Ok(Json(view))
}

/// Updates claim status
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Claim>, ApiError> {
    let status = request.status()?;
    let claim = state.store.update_status(claim_id(id)?, status).await?;
    Ok(Json(claim))
}

/// Flags a claim for review
///
/// Returns 201 for a new flag and 200 when the user had already flagged it.
pub async fn flag_claim(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<i64>,
    Json(request): Json<FlagRequest>,
) -> Result<(StatusCode, Json<FlagResponse>), ApiError> {
    request.validate()?;
    let (flag, created) = state
        .store
        .flag_claim(claim_id(id)?, &user.sub, request.reason.as_deref())
        .await?;

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(FlagResponse { flag, created })))
}

/// Adds a note
pub async fn add_note(
    State(state): State<AppState>,
    Extension(user): Extension<Claims>,
    Path(id): Path<i64>,
    Json(request): Json<NoteRequest>,
) -> Result<(StatusCode, Json<Note>), ApiError> {
    request.validate()?;
    let note = state
        .store
        .add_note(claim_id(id)?, &user.sub, &request.note)
        .await?;
    Ok((StatusCode::CREATED, Json(note)))
}
