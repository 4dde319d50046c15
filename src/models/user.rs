//! User profile model matching the frontend's synced auth payload.

use serde::{Deserialize, Serialize};

/// A GeneGuard user. The `uid` is the opaque identifier minted by the external
/// auth provider; everything else is display profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    pub display_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Request body for updating a user's display profile.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}
