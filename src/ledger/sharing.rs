//! Analysis sharing ledger.
//!
//! Shared entries are snapshots, not live references: re-running an analysis
//! does not change what a group sees until the owner re-shares.

use std::collections::HashMap;

use chrono::Utc;

use crate::errors::AppError;
use crate::models::SharedAnalysisEntry;
use crate::store::{keys, ScopedStore};

use super::analysis::AnalysisLedger;
use super::groups::GroupRegistry;
use super::require_user;

/// Map key for a (group, sharer) pair.
pub fn share_key(group_id: &str, uid: &str) -> String {
    format!("{}_{}", group_id, uid)
}

pub struct SharingLedger {
    store: ScopedStore,
}

impl SharingLedger {
    pub fn new(store: ScopedStore) -> Self {
        Self { store }
    }

    /// Share the acting user's analysis into a group they belong to.
    /// Overwrites any previous entry for the same (group, user) pair.
    pub async fn share(
        &self,
        group_id: &str,
        analysis_id: Option<&str>,
    ) -> Result<SharedAnalysisEntry, AppError> {
        let user = require_user(&self.store)?;

        let registry = GroupRegistry::new(self.store.clone());
        let group = registry
            .find_by_id(group_id)
            .await
            .ok_or_else(|| AppError::NotFound("Group not found".to_string()))?;
        if !group.is_member(&user.uid) {
            return Err(AppError::NotFound(
                "You are not a member of this group".to_string(),
            ));
        }

        let ledger = AnalysisLedger::new(self.store.clone());
        let analysis = match analysis_id {
            Some(id) => ledger
                .get_by_id(id)
                .await
                .ok_or_else(|| AppError::NotFound("Analysis not found".to_string()))?,
            None => ledger
                .current()
                .await
                .ok_or_else(|| AppError::Validation("No analysis to share".to_string()))?,
        };

        let entry = SharedAnalysisEntry {
            group_id: group.id.clone(),
            sharer_uid: user.uid.clone(),
            shared_by: user.display_name.clone(),
            shared_at: Utc::now().to_rfc3339(),
            analysis,
        };

        let mut shared = self.shared_map().await;
        shared.insert(share_key(&group.id, &user.uid), entry.clone());
        self.write_shared_map(&shared).await?;

        tracing::info!("User {} shared analysis into group {}", user.uid, group.id);
        Ok(entry)
    }

    /// Remove the acting user's entry for a group. No-op when absent.
    pub async fn unshare(&self, group_id: &str) -> Result<(), AppError> {
        let user = require_user(&self.store)?;
        let mut shared = self.shared_map().await;
        if shared.remove(&share_key(group_id, &user.uid)).is_some() {
            self.write_shared_map(&shared).await?;
            tracing::info!("User {} unshared analysis from group {}", user.uid, group_id);
        }
        Ok(())
    }

    /// A member's shared entry, or `NOT_FOUND` if they haven't shared.
    pub async fn view(
        &self,
        group_id: &str,
        member_uid: &str,
    ) -> Result<SharedAnalysisEntry, AppError> {
        self.shared_map()
            .await
            .remove(&share_key(group_id, member_uid))
            .ok_or_else(|| {
                AppError::NotFound("No shared analysis found for this member".to_string())
            })
    }

    /// Whether a member currently has a shared entry in a group.
    pub async fn is_shared(&self, group_id: &str, uid: &str) -> bool {
        self.shared_map()
            .await
            .contains_key(&share_key(group_id, uid))
    }

    /// All entries shared into a group, newest first.
    pub async fn list_for_group(&self, group_id: &str) -> Vec<SharedAnalysisEntry> {
        let mut entries: Vec<SharedAnalysisEntry> = self
            .shared_map()
            .await
            .into_values()
            .filter(|entry| entry.group_id == group_id)
            .collect();
        entries.sort_by(|a, b| b.shared_at.cmp(&a.shared_at));
        entries
    }

    async fn shared_map(&self) -> HashMap<String, SharedAnalysisEntry> {
        self.store
            .get_key_json(keys::SHARED_ANALYSES)
            .await
            .unwrap_or_default()
    }

    async fn write_shared_map(
        &self,
        shared: &HashMap<String, SharedAnalysisEntry>,
    ) -> Result<(), AppError> {
        if !self.store.set_key_json(keys::SHARED_ANALYSES, shared).await {
            return Err(AppError::Storage(
                "Failed to update shared analyses".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::{SaveAnalysisRequest, User};
    use crate::store::{KeyValueStore, MemoryStore};

    fn test_user(uid: &str, name: &str) -> User {
        User {
            uid: uid.to_string(),
            display_name: name.to_string(),
            email: format!("{}@example.com", uid),
            phone: None,
        }
    }

    fn scoped_for(store: &Arc<dyn KeyValueStore>, user: User) -> ScopedStore {
        ScopedStore::new(Arc::clone(store), Some(user))
    }

    fn raw_result() -> SaveAnalysisRequest {
        SaveAnalysisRequest {
            id: None,
            disease: "alzheimers".to_string(),
            gene_count: 0,
            risks: vec![],
            timestamp: None,
            disclaimer: String::new(),
        }
    }

    async fn group_with_analysis(
        store: &Arc<dyn KeyValueStore>,
    ) -> (crate::models::Group, ScopedStore) {
        let scoped = scoped_for(store, test_user("u1", "Ada"));
        let group = GroupRegistry::new(scoped.clone())
            .create("Family")
            .await
            .unwrap();
        AnalysisLedger::new(scoped.clone())
            .save_result(raw_result())
            .await
            .unwrap();
        (group, scoped)
    }

    #[tokio::test]
    async fn test_share_requires_current_analysis() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let scoped = scoped_for(&store, test_user("u1", "Ada"));
        let group = GroupRegistry::new(scoped.clone())
            .create("Family")
            .await
            .unwrap();

        let err = SharingLedger::new(scoped)
            .share(&group.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_share_requires_membership() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let (group, _) = group_with_analysis(&store).await;

        let outsider = scoped_for(&store, test_user("u2", "Ben"));
        AnalysisLedger::new(outsider.clone())
            .save_result(raw_result())
            .await
            .unwrap();
        let err = SharingLedger::new(outsider)
            .share(&group.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_share_snapshot_is_independent_of_later_analyses() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let (group, scoped) = group_with_analysis(&store).await;
        let sharing = SharingLedger::new(scoped.clone());

        let entry = sharing.share(&group.id, None).await.unwrap();
        assert_eq!(entry.shared_by, "Ada");

        // A new analysis does not rewrite the shared snapshot.
        let mut newer = raw_result();
        newer.disease = "parkinsons".to_string();
        AnalysisLedger::new(scoped.clone())
            .save_result(newer)
            .await
            .unwrap();
        let viewed = sharing.view(&group.id, "u1").await.unwrap();
        assert_eq!(viewed.analysis.disease, "alzheimers");
    }

    #[tokio::test]
    async fn test_reshare_overwrites_single_entry() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let (group, scoped) = group_with_analysis(&store).await;
        let sharing = SharingLedger::new(scoped.clone());

        sharing.share(&group.id, None).await.unwrap();
        let mut newer = raw_result();
        newer.disease = "parkinsons".to_string();
        AnalysisLedger::new(scoped.clone())
            .save_result(newer)
            .await
            .unwrap();
        sharing.share(&group.id, None).await.unwrap();

        let entries = sharing.list_for_group(&group.id).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].analysis.disease, "parkinsons");
    }

    #[tokio::test]
    async fn test_share_unshare_view_round_trip() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let (group, scoped) = group_with_analysis(&store).await;
        let sharing = SharingLedger::new(scoped);

        sharing.share(&group.id, None).await.unwrap();
        assert!(sharing.is_shared(&group.id, "u1").await);

        sharing.unshare(&group.id).await.unwrap();
        assert!(!sharing.is_shared(&group.id, "u1").await);
        assert!(matches!(
            sharing.view(&group.id, "u1").await.unwrap_err(),
            AppError::NotFound(_)
        ));
        // Unshare is idempotent.
        sharing.unshare(&group.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_leave_deletes_shared_entry() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let (group, creator_scoped) = group_with_analysis(&store).await;

        let joiner = scoped_for(&store, test_user("u2", "Ben"));
        GroupRegistry::new(joiner.clone())
            .join(&group.invite_code)
            .await
            .unwrap();
        AnalysisLedger::new(joiner.clone())
            .save_result(raw_result())
            .await
            .unwrap();
        SharingLedger::new(joiner.clone())
            .share(&group.id, None)
            .await
            .unwrap();

        GroupRegistry::new(joiner.clone())
            .leave(&group.id)
            .await
            .unwrap();

        let viewer = SharingLedger::new(creator_scoped);
        assert!(!viewer.is_shared(&group.id, "u2").await);
        assert!(viewer.list_for_group(&group.id).await.is_empty());
    }
}
