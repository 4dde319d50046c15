//! User directory: profiles synced from the auth provider.

use std::sync::Arc;

use crate::errors::AppError;
use crate::models::{UpdateProfileRequest, User};
use crate::store::{keys, user_key, KeyValueStore, ScopedStore};

/// Profile storage keyed by uid. Login/logout lifecycle lives with the auth
/// provider; this only mirrors the profile fields the ledgers need.
pub struct UserDirectory {
    store: ScopedStore,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        // Profiles are addressed by explicit uid, not by an ambient identity.
        Self {
            store: ScopedStore::new(store, None),
        }
    }

    pub async fn get(&self, uid: &str) -> Option<User> {
        self.store.get_key_json(&user_key(keys::PROFILE, uid)).await
    }

    /// Upsert a profile from the auth provider's payload.
    pub async fn sync(&self, user: User) -> Result<User, AppError> {
        if user.uid.trim().is_empty() {
            return Err(AppError::Validation("User id is required".to_string()));
        }
        if !self
            .store
            .set_key_json(&user_key(keys::PROFILE, &user.uid), &user)
            .await
        {
            return Err(AppError::Storage("Failed to save profile".to_string()));
        }
        Ok(user)
    }

    /// Apply a profile edit. The caller is responsible for fanning the change
    /// out to group member lists.
    pub async fn update_profile(
        &self,
        uid: &str,
        request: &UpdateProfileRequest,
    ) -> Result<User, AppError> {
        let mut user = self
            .get(uid)
            .await
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", uid)))?;

        if let Some(display_name) = &request.display_name {
            let display_name = display_name.trim();
            if display_name.is_empty() {
                return Err(AppError::Validation(
                    "Display name cannot be empty".to_string(),
                ));
            }
            user.display_name = display_name.to_string();
        }
        if let Some(phone) = &request.phone {
            user.phone = Some(phone.clone());
        }

        self.sync(user).await
    }
}
