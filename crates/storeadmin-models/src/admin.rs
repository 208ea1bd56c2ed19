//! Admin accounts and authentication payloads.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use crate::normalize::{not_blank, string_field, timestamp_field};

/// Firestore collection holding admin profiles, keyed by auth uid.
pub const ADMIN_COLLECTION: &str = "admin";

/// Admin profile stored at `admin/{uid}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminProfile {
    pub uid: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl AdminProfile {
    /// Build a fresh profile for a newly registered account.
    pub fn new(uid: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            uid: uid.into(),
            name: name.into(),
            email: email.into(),
            avatar_url: None,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    pub fn with_avatar_url(mut self, avatar_url: Option<String>) -> Self {
        self.avatar_url = avatar_url;
        self
    }

    /// Read a profile from loosely shaped document fields.
    ///
    /// Older profiles use `displayName`/`photoURL` (the Firebase Auth names).
    pub fn from_fields(
        uid: &str,
        fields: &Map<String, Value>,
        create_time: Option<DateTime<Utc>>,
        update_time: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            uid: string_field(fields, &["uid"]).unwrap_or_else(|| uid.to_string()),
            name: string_field(fields, &["name", "displayName", "fullName"]).unwrap_or_default(),
            email: string_field(fields, &["email"]).unwrap_or_default(),
            avatar_url: string_field(fields, &["avatarUrl", "photoURL", "photoUrl", "avatar"]),
            created_at: timestamp_field(fields, &["createdAt"]).or(create_time),
            updated_at: timestamp_field(fields, &["updatedAt"]).or(update_time),
        }
    }
}

/// Registration form.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(
        length(min = 1, max = 100, message = "Name is required"),
        custom(function = "not_blank")
    )]
    pub name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 6, max = 128, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[serde(default)]
    #[validate(url(message = "Avatar URL must be a valid URL"))]
    pub avatar_url: Option<String>,
}

/// Login form.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Token refresh request.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

/// Partial profile update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default)]
    #[validate(
        length(min = 1, max = 100, message = "Name cannot be empty"),
        custom(function = "not_blank")
    )]
    pub name: Option<String>,
    /// An empty string clears the avatar.
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.avatar_url.is_none()
    }
}

/// Session issued after register, login, or refresh.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub uid: String,
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub id_token: String,
    pub refresh_token: String,
    /// Seconds until `id_token` expires.
    pub expires_in: u64,
}
