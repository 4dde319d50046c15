//! Analysis API endpoints: ownership ledger plus group sharing.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{acting_user, scoped, IdentityQuery, MessageResponse, SharedAnalysesResponse};
use crate::errors::AppError;
use crate::ledger::{AnalysisLedger, SharingLedger};
use crate::models::{
    AnalysisRecord, AnalysisSummary, SaveAnalysisRequest, ShareAnalysisRequest,
    SharedAnalysisEntry,
};
use crate::AppState;

/// POST /api/analyses?firebase_uid= - Record an engine result for the identity.
pub async fn save_analysis(
    State(state): State<AppState>,
    Query(identity): Query<IdentityQuery>,
    Json(request): Json<SaveAnalysisRequest>,
) -> Result<Json<AnalysisRecord>, AppError> {
    let user = acting_user(&state, &identity.firebase_uid).await?;
    let ledger = AnalysisLedger::new(scoped(&state, user));
    let record = ledger.save_result(request).await?;
    Ok(Json(record))
}

/// GET /api/analyses/current?firebase_uid= - The current analysis.
pub async fn current_analysis(
    State(state): State<AppState>,
    Query(identity): Query<IdentityQuery>,
) -> Result<Json<AnalysisRecord>, AppError> {
    let user = acting_user(&state, &identity.firebase_uid).await?;
    let ledger = AnalysisLedger::new(scoped(&state, user));
    let record = ledger
        .current()
        .await
        .ok_or_else(|| AppError::NotFound("No analysis results".to_string()))?;
    Ok(Json(record))
}

/// GET /api/analyses/summary?firebase_uid= - Risk-count summary.
pub async fn analysis_summary(
    State(state): State<AppState>,
    Query(identity): Query<IdentityQuery>,
) -> Result<Json<AnalysisSummary>, AppError> {
    let user = acting_user(&state, &identity.firebase_uid).await?;
    let ledger = AnalysisLedger::new(scoped(&state, user));
    let summary = ledger
        .summary()
        .await
        .ok_or_else(|| AppError::NotFound("No analysis results".to_string()))?;
    Ok(Json(summary))
}

/// GET /api/analyses/:id?firebase_uid= - History lookup by record id.
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(identity): Query<IdentityQuery>,
) -> Result<Json<AnalysisRecord>, AppError> {
    let user = acting_user(&state, &identity.firebase_uid).await?;
    let ledger = AnalysisLedger::new(scoped(&state, user));
    let record = ledger
        .get_by_id(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Analysis {} not found", id)))?;
    Ok(Json(record))
}

/// DELETE /api/analyses?firebase_uid= - Clear the identity's analysis state.
pub async fn clear_analyses(
    State(state): State<AppState>,
    Query(identity): Query<IdentityQuery>,
) -> Result<Json<MessageResponse>, AppError> {
    let user = acting_user(&state, &identity.firebase_uid).await?;
    let ledger = AnalysisLedger::new(scoped(&state, user));
    ledger.clear_all().await;
    Ok(Json(MessageResponse::new("Analysis data cleared")))
}

/// POST /api/analyses/share?firebase_uid= - Share into a group.
pub async fn share_analysis(
    State(state): State<AppState>,
    Query(identity): Query<IdentityQuery>,
    Json(request): Json<ShareAnalysisRequest>,
) -> Result<Json<SharedAnalysisEntry>, AppError> {
    let user = acting_user(&state, &identity.firebase_uid).await?;
    let sharing = SharingLedger::new(scoped(&state, user));
    let entry = sharing
        .share(&request.group_id, request.analysis_id.as_deref())
        .await?;
    Ok(Json(entry))
}

/// DELETE /api/analyses/:id/unshare/:group_id?firebase_uid= - Withdraw a share.
///
/// The analysis id is part of the frontend contract but the entry is keyed by
/// (group, user); there is at most one entry to remove.
pub async fn unshare_analysis(
    State(state): State<AppState>,
    Path((_analysis_id, group_id)): Path<(String, String)>,
    Query(identity): Query<IdentityQuery>,
) -> Result<Json<MessageResponse>, AppError> {
    let user = acting_user(&state, &identity.firebase_uid).await?;
    let sharing = SharingLedger::new(scoped(&state, user));
    sharing.unshare(&group_id).await?;
    Ok(Json(MessageResponse::new("Analysis unshared successfully")))
}

/// GET /api/groups/:id/analyses?firebase_uid= - All shares in a group.
pub async fn group_analyses(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Query(identity): Query<IdentityQuery>,
) -> Result<Json<SharedAnalysesResponse>, AppError> {
    let user = acting_user(&state, &identity.firebase_uid).await?;
    let sharing = SharingLedger::new(scoped(&state, user));
    Ok(Json(SharedAnalysesResponse {
        analyses: sharing.list_for_group(&group_id).await,
    }))
}

/// GET /api/groups/:id/analyses/:member_uid?firebase_uid= - One member's share.
pub async fn view_shared_analysis(
    State(state): State<AppState>,
    Path((group_id, member_uid)): Path<(String, String)>,
    Query(identity): Query<IdentityQuery>,
) -> Result<Json<SharedAnalysisEntry>, AppError> {
    let user = acting_user(&state, &identity.firebase_uid).await?;
    let sharing = SharingLedger::new(scoped(&state, user));
    let entry = sharing.view(&group_id, &member_uid).await?;
    Ok(Json(entry))
}
