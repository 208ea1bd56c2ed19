//! Admin account lifecycle: registration, login, and token refresh.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use storeadmin_firestore::AdminRepository;
use storeadmin_models::{AdminProfile, AuthSession, LoginRequest, RegisterRequest};

use crate::error::{ApiError, ApiResult};
use crate::identity::{IdentityProvider, IdentitySession};

/// Fresh tokens returned by the refresh endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedSession {
    pub uid: String,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
}

fn session_for(profile: &AdminProfile, identity: IdentitySession) -> AuthSession {
    AuthSession {
        uid: profile.uid.clone(),
        email: profile.email.clone(),
        name: profile.name.clone(),
        avatar_url: profile.avatar_url.clone(),
        id_token: identity.id_token,
        refresh_token: identity.refresh_token,
        expires_in: identity.expires_in,
    }
}

/// Coordinates the identity backend with the `admin` collection.
#[derive(Clone)]
pub struct AccountService {
    identity: Arc<dyn IdentityProvider>,
    admins: AdminRepository,
}

impl AccountService {
    pub fn new(identity: Arc<dyn IdentityProvider>, admins: AdminRepository) -> Self {
        Self { identity, admins }
    }

    /// Create the auth account, then its admin profile.
    ///
    /// When the profile cannot be written the auth account is deleted again,
    /// so a failed registration leaves nothing behind.
    pub async fn register(&self, request: &RegisterRequest) -> ApiResult<AuthSession> {
        let email = request.email.trim().to_lowercase();
        let identity = self.identity.sign_up(&email, &request.password).await?;

        let avatar_url = request
            .avatar_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string);
        let profile = AdminProfile::new(&identity.uid, request.name.trim(), &email)
            .with_avatar_url(avatar_url);

        if let Err(e) = self.admins.create(&profile).await {
            warn!(uid = %identity.uid, error = %e, "Admin profile write failed, removing auth account");
            if let Err(cleanup) = self.identity.delete_account(&identity.id_token).await {
                error!(uid = %identity.uid, error = %cleanup, "Failed to remove orphaned auth account");
            }
            return Err(e.into());
        }

        info!(uid = %profile.uid, "Registered admin");
        Ok(session_for(&profile, identity))
    }

    /// Sign in; only accounts with an admin profile are let through.
    pub async fn login(&self, request: &LoginRequest) -> ApiResult<AuthSession> {
        let email = request.email.trim().to_lowercase();
        let identity = self.identity.sign_in(&email, &request.password).await?;

        let profile = self.admins.get(&identity.uid).await?.ok_or_else(|| {
            warn!(uid = %identity.uid, "Sign-in without admin profile");
            ApiError::forbidden("This account does not have admin access")
        })?;

        info!(uid = %profile.uid, "Admin signed in");
        Ok(session_for(&profile, identity))
    }

    pub async fn refresh(&self, refresh_token: &str) -> ApiResult<RefreshedSession> {
        let identity = self.identity.refresh(refresh_token.trim()).await?;
        Ok(RefreshedSession {
            uid: identity.uid,
            id_token: identity.id_token,
            refresh_token: identity.refresh_token,
            expires_in: identity.expires_in,
        })
    }
}
