//! User API endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use super::{acting_user, scoped, AnalysisHistoryResponse};
use crate::errors::AppError;
use crate::ledger::{AnalysisLedger, GroupRegistry, UserDirectory};
use crate::models::{UpdateProfileRequest, User};
use crate::AppState;

/// POST /api/users/sync - Upsert a profile from the auth provider.
pub async fn sync_user(
    State(state): State<AppState>,
    Json(user): Json<User>,
) -> Result<Json<User>, AppError> {
    let directory = UserDirectory::new(Arc::clone(&state.store));
    let user = directory.sync(user).await?;
    Ok(Json(user))
}

/// GET /api/users/:uid - Fetch a synced profile.
pub async fn get_user(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<Json<User>, AppError> {
    let directory = UserDirectory::new(Arc::clone(&state.store));
    let user = directory
        .get(&uid)
        .await
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", uid)))?;
    Ok(Json(user))
}

/// PUT /api/users/:uid/profile - Update display name/phone and fan the change
/// out to every group member list where the user appears.
pub async fn update_profile(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    let directory = UserDirectory::new(Arc::clone(&state.store));
    let updated = directory.update_profile(&uid, &request).await?;

    let registry = GroupRegistry::new(scoped(&state, updated.clone()));
    registry.propagate_profile(&updated).await?;

    Ok(Json(updated))
}

/// GET /api/users/:uid/analyses - The user's analysis history, newest first.
pub async fn user_analyses(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<Json<AnalysisHistoryResponse>, AppError> {
    let user = acting_user(&state, &uid).await?;
    let ledger = AnalysisLedger::new(scoped(&state, user));
    Ok(Json(AnalysisHistoryResponse {
        analyses: ledger.history().await,
    }))
}
