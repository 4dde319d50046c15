//! Bookkeeping ledgers over the scoped store.
//!
//! Each ledger is a cheap per-request handle: it captures the acting identity
//! via a [`ScopedStore`](crate::store::ScopedStore) and performs
//! read-modify-write cycles against the shared key-value backend.

mod analysis;
mod groups;
mod sharing;
mod users;

pub use analysis::{AnalysisLedger, MAX_ANALYSIS_HISTORY};
pub use groups::{GroupRegistry, INVITE_CODE_LEN};
pub use sharing::{share_key, SharingLedger};
pub use users::UserDirectory;

use crate::errors::AppError;
use crate::models::User;
use crate::store::ScopedStore;

/// Resolve the acting user or fail; ledger operations that write require one.
pub(crate) fn require_user(store: &ScopedStore) -> Result<&User, AppError> {
    store
        .user()
        .ok_or_else(|| AppError::Unauthorized("No active user".to_string()))
}
