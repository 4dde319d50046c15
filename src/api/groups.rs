//! Group API endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{acting_user, scoped, GroupsResponse, IdentityQuery, MembersResponse, MessageResponse};
use crate::errors::AppError;
use crate::ledger::GroupRegistry;
use crate::models::{CreateGroupRequest, Group, JoinGroupRequest};
use crate::AppState;

/// POST /api/groups?firebase_uid= - Create a group.
pub async fn create_group(
    State(state): State<AppState>,
    Query(identity): Query<IdentityQuery>,
    Json(request): Json<CreateGroupRequest>,
) -> Result<Json<Group>, AppError> {
    let user = acting_user(&state, &identity.firebase_uid).await?;
    let registry = GroupRegistry::new(scoped(&state, user));
    let group = registry.create(&request.name).await?;
    Ok(Json(group))
}

/// POST /api/groups/join?firebase_uid= - Redeem an invite code.
pub async fn join_group(
    State(state): State<AppState>,
    Query(identity): Query<IdentityQuery>,
    Json(request): Json<JoinGroupRequest>,
) -> Result<Json<Group>, AppError> {
    let user = acting_user(&state, &identity.firebase_uid).await?;
    let registry = GroupRegistry::new(scoped(&state, user));
    let group = registry.join(&request.invite_code).await?;
    Ok(Json(group))
}

/// GET /api/groups/:uid?firebase_uid= - A user's personal group list. The
/// path uid must match the acting identity; group lists are private.
pub async fn list_user_groups(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Query(identity): Query<IdentityQuery>,
) -> Result<Json<GroupsResponse>, AppError> {
    if identity.firebase_uid != uid {
        return Err(AppError::Unauthorized(
            "Group lists are only visible to their owner".to_string(),
        ));
    }
    let user = acting_user(&state, &uid).await?;
    let registry = GroupRegistry::new(scoped(&state, user));
    Ok(Json(GroupsResponse {
        groups: registry.list().await,
    }))
}

/// GET /api/groups/:id/members?firebase_uid= - Membership with sharing status.
pub async fn group_members(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Query(identity): Query<IdentityQuery>,
) -> Result<Json<MembersResponse>, AppError> {
    let user = acting_user(&state, &identity.firebase_uid).await?;
    let registry = GroupRegistry::new(scoped(&state, user));
    Ok(Json(MembersResponse {
        members: registry.members(&group_id).await?,
    }))
}

/// DELETE /api/groups/:id/leave?firebase_uid= - Leave a group.
pub async fn leave_group(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Query(identity): Query<IdentityQuery>,
) -> Result<Json<MessageResponse>, AppError> {
    let user = acting_user(&state, &identity.firebase_uid).await?;
    let registry = GroupRegistry::new(scoped(&state, user));
    registry.leave(&group_id).await?;
    Ok(Json(MessageResponse::new("Left group successfully")))
}
