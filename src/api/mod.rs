//! REST API module.
//!
//! Routes and handlers following the frontend database-service contract:
//! success bodies are plain JSON shapes, errors are an `{ "error": ... }`
//! envelope, and the acting identity arrives as a `firebase_uid` query
//! parameter.

mod analyses;
mod groups;
mod users;

pub use analyses::*;
pub use groups::*;
pub use users::*;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::ledger::UserDirectory;
use crate::models::{AnalysisRecord, Group, MemberView, SharedAnalysisEntry, User};
use crate::store::ScopedStore;
use crate::AppState;

/// Identity conveyed by the frontend on every authenticated call.
#[derive(Debug, Deserialize)]
pub struct IdentityQuery {
    pub firebase_uid: String,
}

/// Message-only response for mutations with no natural body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GroupsResponse {
    pub groups: Vec<Group>,
}

#[derive(Debug, Serialize)]
pub struct MembersResponse {
    pub members: Vec<MemberView>,
}

#[derive(Debug, Serialize)]
pub struct SharedAnalysesResponse {
    pub analyses: Vec<SharedAnalysisEntry>,
}

#[derive(Debug, Serialize)]
pub struct AnalysisHistoryResponse {
    pub analyses: Vec<AnalysisRecord>,
}

/// Resolve the acting user's synced profile; identity without a profile is
/// rejected (the frontend syncs on login before anything else).
pub(crate) async fn acting_user(state: &AppState, uid: &str) -> Result<User, AppError> {
    UserDirectory::new(Arc::clone(&state.store))
        .get(uid)
        .await
        .ok_or_else(|| AppError::Unauthorized("Unknown user; sync profile first".to_string()))
}

/// Build the identity-scoped store for a resolved user.
pub(crate) fn scoped(state: &AppState, user: User) -> ScopedStore {
    ScopedStore::new(Arc::clone(&state.store), Some(user))
}
