//! Group registry: create, join, leave, and profile fan-out.
//!
//! Groups live in two places: a global invite-code registry (the lookup used
//! by `join`) and each member's personal group list. Both are keys in the same
//! backend, so this process is the single writer; the cross-key writes are
//! still applied one at a time and are not transactional.

use std::collections::HashMap;

use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Group, Member, MemberView, SharedAnalysisEntry};
use crate::store::{keys, user_key, ScopedStore};

use super::sharing::share_key;
use super::require_user;

/// Invite codes are six uppercase alphanumeric characters.
pub const INVITE_CODE_LEN: usize = 6;

/// Collisions are astronomically unlikely at this registry size; the cap only
/// guards against a broken RNG looping forever.
const MAX_CODE_ATTEMPTS: usize = 32;

pub struct GroupRegistry {
    store: ScopedStore,
}

impl GroupRegistry {
    pub fn new(store: ScopedStore) -> Self {
        Self { store }
    }

    /// Create a group with the acting user as sole member.
    pub async fn create(&self, name: &str) -> Result<Group, AppError> {
        let user = require_user(&self.store)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Group name is required".to_string()));
        }

        let mut registry = self.code_registry().await;
        let invite_code = generate_invite_code(|code| !registry.contains_key(code))?;
        let now = Utc::now().to_rfc3339();
        let group = Group {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            creator_uid: user.uid.clone(),
            creator_name: user.display_name.clone(),
            invite_code: invite_code.clone(),
            members: vec![Member::from_user(user, now.clone())],
            created_at: now,
        };

        registry.insert(invite_code, group.clone());
        self.write_code_registry(&registry).await?;

        let mut personal = self.personal_list_of(&user.uid).await;
        personal.push(group.clone());
        self.write_personal_list_of(&user.uid, &personal).await?;

        tracing::info!("User {} created group {} ({})", user.uid, group.name, group.id);
        Ok(group)
    }

    /// Redeem an invite code for the acting user.
    pub async fn join(&self, code: &str) -> Result<Group, AppError> {
        let user = require_user(&self.store)?;
        let code = code.trim().to_uppercase();
        if code.is_empty() {
            return Err(AppError::Validation("Join code is required".to_string()));
        }

        let mut registry = self.code_registry().await;
        let group = registry
            .get_mut(&code)
            .ok_or_else(|| AppError::NotFound("Invalid join code".to_string()))?;
        if group.is_member(&user.uid) {
            return Err(AppError::AlreadyMember(
                "You are already a member of this group".to_string(),
            ));
        }

        group
            .members
            .push(Member::from_user(user, Utc::now().to_rfc3339()));
        let updated = group.clone();
        self.write_code_registry(&registry).await?;

        // Keep the creator's personal copy in step with the registry.
        if updated.creator_uid != user.uid {
            self.replace_in_personal_list(&updated.creator_uid, &updated)
                .await?;
        }

        let mut mine = self.personal_list_of(&user.uid).await;
        mine.push(updated.clone());
        self.write_personal_list_of(&user.uid, &mine).await?;

        tracing::info!("User {} joined group {} ({})", user.uid, updated.name, updated.id);
        Ok(updated)
    }

    /// Remove the acting user from a group, cleaning up their shared analysis.
    pub async fn leave(&self, group_id: &str) -> Result<(), AppError> {
        let user = require_user(&self.store)?;

        let mut mine = self.personal_list_of(&user.uid).await;
        let before = mine.len();
        mine.retain(|g| g.id != group_id);
        if mine.len() == before {
            return Err(AppError::NotFound("Group not found".to_string()));
        }
        self.write_personal_list_of(&user.uid, &mine).await?;

        let mut registry = self.code_registry().await;
        let mut updated = None;
        if let Some(group) = registry.values_mut().find(|g| g.id == group_id) {
            group.members.retain(|m| m.uid != user.uid);
            updated = Some(group.clone());
        }
        if let Some(updated) = updated {
            self.write_code_registry(&registry).await?;
            if updated.creator_uid != user.uid {
                self.replace_in_personal_list(&updated.creator_uid, &updated)
                    .await?;
            }
        }

        // A shared entry must not outlive the membership that justified it.
        self.remove_shared_entry(group_id, &user.uid).await?;

        tracing::info!("User {} left group {}", user.uid, group_id);
        Ok(())
    }

    /// The acting user's personal group list.
    pub async fn list(&self) -> Vec<Group> {
        match self.store.uid() {
            Some(uid) => {
                let uid = uid.to_string();
                self.personal_list_of(&uid).await
            }
            None => Vec::new(),
        }
    }

    /// Find a group by id in the global registry.
    pub async fn find_by_id(&self, group_id: &str) -> Option<Group> {
        let registry = self.code_registry().await;
        registry.into_values().find(|g| g.id == group_id)
    }

    /// Membership with derived sharing status.
    pub async fn members(&self, group_id: &str) -> Result<Vec<MemberView>, AppError> {
        let group = self
            .find_by_id(group_id)
            .await
            .ok_or_else(|| AppError::NotFound("Group not found".to_string()))?;
        let shared: HashMap<String, SharedAnalysisEntry> = self
            .store
            .get_key_json(keys::SHARED_ANALYSES)
            .await
            .unwrap_or_default();

        Ok(group
            .members
            .iter()
            .map(|member| MemberView {
                has_shared_analysis: shared.contains_key(&share_key(&group.id, &member.uid)),
                member: member.clone(),
            })
            .collect())
    }

    /// Fan out a profile change to every member list where the user appears,
    /// including the creator display name on groups they created: the global
    /// registry copy plus each member's personal copy. The new state is
    /// computed up front, then persisted key by key.
    pub async fn propagate_profile(&self, user: &crate::models::User) -> Result<(), AppError> {
        let mut registry = self.code_registry().await;
        let mut affected = Vec::new();
        for group in registry.values_mut() {
            let mut touched = false;
            if group.creator_uid == user.uid {
                group.creator_name = user.display_name.clone();
                touched = true;
            }
            if let Some(member) = group.members.iter_mut().find(|m| m.uid == user.uid) {
                member.name = user.display_name.clone();
                member.email = user.email.clone();
                member.phone = user.phone.clone();
                touched = true;
            }
            if touched {
                affected.push(group.clone());
            }
        }
        if affected.is_empty() {
            return Ok(());
        }

        self.write_code_registry(&registry).await?;
        for group in &affected {
            for member in &group.members {
                self.replace_in_personal_list(&member.uid, group).await?;
            }
        }
        Ok(())
    }

    async fn code_registry(&self) -> HashMap<String, Group> {
        self.store
            .get_key_json(keys::GROUP_CODES)
            .await
            .unwrap_or_default()
    }

    async fn write_code_registry(&self, registry: &HashMap<String, Group>) -> Result<(), AppError> {
        if !self.store.set_key_json(keys::GROUP_CODES, registry).await {
            return Err(AppError::Storage(
                "Failed to save group registry".to_string(),
            ));
        }
        Ok(())
    }

    async fn personal_list_of(&self, uid: &str) -> Vec<Group> {
        self.store
            .get_key_json(&user_key(keys::GROUPS, uid))
            .await
            .unwrap_or_default()
    }

    async fn write_personal_list_of(&self, uid: &str, groups: &[Group]) -> Result<(), AppError> {
        if !self
            .store
            .set_key_json(&user_key(keys::GROUPS, uid), &groups)
            .await
        {
            return Err(AppError::Storage("Failed to save groups".to_string()));
        }
        Ok(())
    }

    /// Overwrite a group in a user's personal list if it is present there.
    async fn replace_in_personal_list(&self, uid: &str, group: &Group) -> Result<(), AppError> {
        let mut list = self.personal_list_of(uid).await;
        let mut changed = false;
        for slot in list.iter_mut() {
            if slot.id == group.id {
                *slot = group.clone();
                changed = true;
            }
        }
        if changed {
            self.write_personal_list_of(uid, &list).await?;
        }
        Ok(())
    }

    async fn remove_shared_entry(&self, group_id: &str, uid: &str) -> Result<(), AppError> {
        let mut shared: HashMap<String, SharedAnalysisEntry> = self
            .store
            .get_key_json(keys::SHARED_ANALYSES)
            .await
            .unwrap_or_default();
        if shared.remove(&share_key(group_id, uid)).is_some()
            && !self.store.set_key_json(keys::SHARED_ANALYSES, &shared).await
        {
            return Err(AppError::Storage(
                "Failed to update shared analyses".to_string(),
            ));
        }
        Ok(())
    }
}

/// Generate a fresh invite code, regenerating on registry collision.
fn generate_invite_code<F: Fn(&str) -> bool>(is_free: F) -> Result<String, AppError> {
    let mut rng = rand::thread_rng();
    for _ in 0..MAX_CODE_ATTEMPTS {
        let code: String = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(INVITE_CODE_LEN)
            .map(|b| (b as char).to_ascii_uppercase())
            .collect();
        if is_free(&code) {
            return Ok(code);
        }
    }
    Err(AppError::Internal(
        "Could not allocate a unique invite code".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::User;
    use crate::store::{KeyValueStore, MemoryStore};

    fn test_user(uid: &str, name: &str) -> User {
        User {
            uid: uid.to_string(),
            display_name: name.to_string(),
            email: format!("{}@example.com", uid),
            phone: None,
        }
    }

    fn registry_for(store: &Arc<dyn KeyValueStore>, user: User) -> GroupRegistry {
        GroupRegistry::new(ScopedStore::new(Arc::clone(store), Some(user)))
    }

    #[tokio::test]
    async fn test_create_generates_valid_invite_code() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let registry = registry_for(&store, test_user("u1", "Ada Smith"));

        let group = registry.create("Smith Family").await.unwrap();
        assert_eq!(group.invite_code.len(), INVITE_CODE_LEN);
        assert!(group
            .invite_code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        assert_eq!(group.members.len(), 1);
        assert_eq!(group.members[0].uid, "u1");
        assert_eq!(registry.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_name() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let registry = registry_for(&store, test_user("u1", "Ada"));

        let err = registry.create("   ").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_join_adds_exactly_one_member() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let creator = registry_for(&store, test_user("u1", "Ada"));
        let joiner = registry_for(&store, test_user("u2", "Ben"));

        let group = creator.create("Smith Family").await.unwrap();
        let joined = joiner.join(&group.invite_code).await.unwrap();

        assert_eq!(joined.members.len(), 2);
        assert_eq!(joined.members[0].uid, "u1", "creator record untouched");
        assert_eq!(joined.members[1].uid, "u2");
        // Both personal lists and the global registry agree.
        assert_eq!(creator.list().await[0].members.len(), 2);
        assert_eq!(joiner.list().await[0].members.len(), 2);
        assert_eq!(
            creator.find_by_id(&group.id).await.unwrap().members.len(),
            2
        );
    }

    #[tokio::test]
    async fn test_join_is_case_insensitive_on_code() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let creator = registry_for(&store, test_user("u1", "Ada"));
        let joiner = registry_for(&store, test_user("u2", "Ben"));

        let group = creator.create("Family").await.unwrap();
        let joined = joiner.join(&group.invite_code.to_lowercase()).await.unwrap();
        assert_eq!(joined.id, group.id);
    }

    #[tokio::test]
    async fn test_join_unknown_code_and_duplicate_join() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let creator = registry_for(&store, test_user("u1", "Ada"));
        let joiner = registry_for(&store, test_user("u2", "Ben"));

        assert!(matches!(
            joiner.join("ZZZZZZ").await.unwrap_err(),
            AppError::NotFound(_)
        ));

        let group = creator.create("Family").await.unwrap();
        joiner.join(&group.invite_code).await.unwrap();
        assert!(matches!(
            joiner.join(&group.invite_code).await.unwrap_err(),
            AppError::AlreadyMember(_)
        ));
        // Creator re-joining their own group is also a duplicate.
        assert!(matches!(
            creator.join(&group.invite_code).await.unwrap_err(),
            AppError::AlreadyMember(_)
        ));
    }

    #[tokio::test]
    async fn test_join_then_leave_restores_pre_join_state() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let creator = registry_for(&store, test_user("u1", "Ada"));
        let joiner = registry_for(&store, test_user("u2", "Ben"));

        let group = creator.create("Family").await.unwrap();
        joiner.join(&group.invite_code).await.unwrap();
        joiner.leave(&group.id).await.unwrap();

        assert!(joiner.list().await.is_empty());
        let global = creator.find_by_id(&group.id).await.unwrap();
        assert_eq!(global.members.len(), 1);
        assert_eq!(global.members[0].uid, "u1");
        assert_eq!(creator.list().await[0].members.len(), 1);
    }

    #[tokio::test]
    async fn test_leave_unknown_group_fails() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let registry = registry_for(&store, test_user("u1", "Ada"));
        assert!(matches!(
            registry.leave("no-such-group").await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_invite_code_regenerated_on_collision() {
        // Force the acceptance predicate to reject the first few candidates.
        let rejected = std::cell::Cell::new(0);
        let code = generate_invite_code(|_| {
            if rejected.get() < 3 {
                rejected.set(rejected.get() + 1);
                false
            } else {
                true
            }
        })
        .unwrap();
        assert_eq!(code.len(), INVITE_CODE_LEN);
        assert_eq!(rejected.get(), 3);
    }

    #[tokio::test]
    async fn test_profile_update_fans_out_to_all_copies() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let creator = registry_for(&store, test_user("u1", "Ada"));
        let joiner = registry_for(&store, test_user("u2", "Ben"));

        let g1 = creator.create("Family").await.unwrap();
        let g2 = creator.create("Research").await.unwrap();
        joiner.join(&g1.invite_code).await.unwrap();
        joiner.join(&g2.invite_code).await.unwrap();

        let renamed = User {
            display_name: "Benjamin".to_string(),
            phone: Some("555-0100".to_string()),
            ..test_user("u2", "Ben")
        };
        joiner.propagate_profile(&renamed).await.unwrap();

        for registry in [&creator, &joiner] {
            for group in registry.list().await {
                let member = group.member("u2").expect("u2 is a member");
                assert_eq!(member.name, "Benjamin");
                assert_eq!(member.phone.as_deref(), Some("555-0100"));
            }
        }
        let global = creator.find_by_id(&g1.id).await.unwrap();
        assert_eq!(global.member("u2").unwrap().name, "Benjamin");
    }

    #[tokio::test]
    async fn test_creator_rename_updates_creator_name_everywhere() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let creator = registry_for(&store, test_user("u1", "Ada"));
        let joiner = registry_for(&store, test_user("u2", "Ben"));

        let group = creator.create("Family").await.unwrap();
        joiner.join(&group.invite_code).await.unwrap();

        let renamed = test_user("u1", "Ada Lovelace");
        creator.propagate_profile(&renamed).await.unwrap();

        let global = creator.find_by_id(&group.id).await.unwrap();
        assert_eq!(global.creator_name, "Ada Lovelace");
        assert_eq!(global.member("u1").unwrap().name, "Ada Lovelace");
        assert_eq!(creator.list().await[0].creator_name, "Ada Lovelace");
        assert_eq!(joiner.list().await[0].creator_name, "Ada Lovelace");
    }
}
