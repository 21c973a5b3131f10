//! User model for storage and API.

use crate::db::{collections, Document};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// User account stored in Firestore at `users/{firebase_uid}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Firebase subject ID (also used as document ID)
    pub firebase_uid: String,
    /// Email address
    #[serde(default)]
    pub email: String,
    /// Display name from the identity provider
    #[serde(default)]
    pub display_name: Option<String>,
    /// Profile picture URL
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// When the user first signed in (RFC 3339)
    pub created_at: String,
    /// Last sign-in refresh (RFC 3339)
    pub updated_at: String,
}

impl Document for User {
    const COLLECTION: &'static str = collections::USERS;

    fn id(&self) -> &str {
        &self.firebase_uid
    }
}

/// Public user profile returned by the auth routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "apps/desktop/src/lib/generated/")
)]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            uid: user.firebase_uid,
            email: user.email,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
        }
    }
}

/// Session token pair plus profile, returned by every sign-in route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "apps/desktop/src/lib/generated/")
)]
pub struct AuthTokens {
    pub id_token: String,
    pub refresh_token: String,
    pub user: UserProfile,
}
