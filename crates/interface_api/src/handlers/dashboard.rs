//! Dashboard handler

use axum::{extract::State, Json};

use domain_claims::DashboardStats;

use crate::{error::ApiError, AppState};

/// Aggregate statistics over all claims
pub async fn dashboard(State(state): State<AppState>) -> Result<Json<DashboardStats>, ApiError> {
    Ok(Json(state.store.dashboard().await?))
}
