//! Group and membership models.

use serde::{Deserialize, Serialize};

use super::User;

/// A sharing group, identified to users by its invite code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub creator_uid: String,
    pub creator_name: String,
    /// Six uppercase alphanumeric characters, unique across the registry.
    pub invite_code: String,
    pub members: Vec<Member>,
    pub created_at: String,
}

impl Group {
    pub fn member(&self, uid: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.uid == uid)
    }

    pub fn is_member(&self, uid: &str) -> bool {
        self.member(uid).is_some()
    }
}

/// A group member, copied from the user's display profile at join time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub uid: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub joined_at: String,
}

impl Member {
    /// Build a member entry from a user profile.
    pub fn from_user(user: &User, joined_at: String) -> Self {
        Self {
            uid: user.uid.clone(),
            name: user.display_name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            joined_at,
        }
    }
}

/// Member plus sharing status, derived per request for the members view.
#[derive(Debug, Clone, Serialize)]
pub struct MemberView {
    #[serde(flatten)]
    pub member: Member,
    pub has_shared_analysis: bool,
}

/// Request body for creating a group.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
}

/// Request body for joining a group by invite code.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinGroupRequest {
    pub invite_code: String,
}
