//! Firebase Authentication (Identity Toolkit) client.
//!
//! Accounts are created and signed in through the public REST API using the
//! project's web API key; refresh tokens are exchanged at the Secure Token
//! endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};

/// Tokens issued by Firebase Auth for one account.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentitySession {
    pub uid: String,
    pub email: Option<String>,
    pub id_token: String,
    pub refresh_token: String,
    /// Seconds until `id_token` expires.
    pub expires_in: u64,
}

/// Account operations against the identity backend.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> ApiResult<IdentitySession>;
    async fn sign_in(&self, email: &str, password: &str) -> ApiResult<IdentitySession>;
    async fn refresh(&self, refresh_token: &str) -> ApiResult<IdentitySession>;
    /// Delete the account that owns `id_token`.
    async fn delete_account(&self, id_token: &str) -> ApiResult<()>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest<'a> {
    id_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

/// Secure Token responses use snake_case.
#[derive(Deserialize)]
struct RefreshResponse {
    user_id: String,
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

fn parse_expires_in(raw: &str) -> u64 {
    raw.trim().parse().unwrap_or(3600)
}

/// Map a Firebase Auth error message onto an API error.
///
/// Messages look like `WEAK_PASSWORD : Password should be at least 6 characters`;
/// only the code before ` : ` is significant.
pub fn map_identity_error(status: u16, message: &str) -> ApiError {
    let code = message.split(" : ").next().unwrap_or_default().trim();
    match code {
        "EMAIL_EXISTS" => ApiError::conflict("An account with this email already exists"),
        "WEAK_PASSWORD" => ApiError::bad_request("Password must be at least 6 characters"),
        "INVALID_EMAIL" => ApiError::bad_request("Invalid email address"),
        "MISSING_PASSWORD" => ApiError::bad_request("Password is required"),
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            ApiError::unauthorized("Invalid email or password")
        }
        "USER_DISABLED" => ApiError::unauthorized("This account has been disabled"),
        "INVALID_REFRESH_TOKEN" | "TOKEN_EXPIRED" | "INVALID_ID_TOKEN" | "USER_NOT_FOUND" => {
            ApiError::unauthorized("Session expired, please sign in again")
        }
        "TOO_MANY_ATTEMPTS_TRY_LATER" => {
            ApiError::RateLimited("Too many attempts, try again later".to_string())
        }
        _ => ApiError::internal(format!("Identity request failed ({}): {}", status, message)),
    }
}

/// Identity Toolkit REST client.
#[derive(Clone)]
pub struct IdentityClient {
    http: Client,
    api_key: String,
    identity_endpoint: String,
    secure_token_endpoint: String,
}

impl IdentityClient {
    pub fn new(
        api_key: impl Into<String>,
        identity_endpoint: impl Into<String>,
        secure_token_endpoint: impl Into<String>,
    ) -> ApiResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ApiError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            identity_endpoint: identity_endpoint.into().trim_end_matches('/').to_string(),
            secure_token_endpoint: secure_token_endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    /// Client configured from the API settings; `None` without a web API key.
    pub fn from_config(config: &ApiConfig) -> ApiResult<Option<Self>> {
        config
            .firebase_api_key
            .as_ref()
            .map(|key| Self::new(key, &config.identity_endpoint, &config.secure_token_endpoint))
            .transpose()
    }

    fn accounts_url(&self, action: &str) -> String {
        format!("{}/v1/accounts:{}", self.identity_endpoint, action)
    }

    async fn read<T: DeserializeOwned>(&self, response: reqwest::Response) -> ApiResult<T> {
        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| ApiError::internal(format!("Invalid identity response: {}", e)));
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        debug!(status = status.as_u16(), message = %message, "Identity request rejected");
        Err(map_identity_error(status.as_u16(), &message))
    }

    async fn password_call(&self, action: &str, email: &str, password: &str) -> ApiResult<IdentitySession> {
        let response = self
            .http
            .post(self.accounts_url(action))
            .query(&[("key", &self.api_key)])
            .json(&PasswordRequest {
                email,
                password,
                return_secure_token: true,
            })
            .send()
            .await
            .map_err(|e| ApiError::internal(format!("Identity request failed: {}", e)))?;

        let body: PasswordResponse = self.read(response).await?;
        Ok(IdentitySession {
            uid: body.local_id,
            email: body.email,
            id_token: body.id_token,
            refresh_token: body.refresh_token,
            expires_in: parse_expires_in(&body.expires_in),
        })
    }
}

#[async_trait]
impl IdentityProvider for IdentityClient {
    async fn sign_up(&self, email: &str, password: &str) -> ApiResult<IdentitySession> {
        let session = self.password_call("signUp", email, password).await?;
        info!(uid = %session.uid, "Created auth account");
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &str) -> ApiResult<IdentitySession> {
        self.password_call("signInWithPassword", email, password).await
    }

    async fn refresh(&self, refresh_token: &str) -> ApiResult<IdentitySession> {
        let response = self
            .http
            .post(format!("{}/v1/token", self.secure_token_endpoint))
            .query(&[("key", &self.api_key)])
            .form(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)])
            .send()
            .await
            .map_err(|e| ApiError::internal(format!("Token refresh failed: {}", e)))?;

        let body: RefreshResponse = self.read(response).await?;
        Ok(IdentitySession {
            uid: body.user_id,
            email: None,
            id_token: body.id_token,
            refresh_token: body.refresh_token,
            expires_in: parse_expires_in(&body.expires_in),
        })
    }

    async fn delete_account(&self, id_token: &str) -> ApiResult<()> {
        let response = self
            .http
            .post(self.accounts_url("delete"))
            .query(&[("key", &self.api_key)])
            .json(&DeleteRequest { id_token })
            .send()
            .await
            .map_err(|e| ApiError::internal(format!("Account deletion failed: {}", e)))?;

        let _: serde_json::Value = self.read(response).await?;
        Ok(())
    }
}

/// Provider used when no web API key is configured.
pub struct UnconfiguredIdentity;

#[async_trait]
impl IdentityProvider for UnconfiguredIdentity {
    async fn sign_up(&self, _email: &str, _password: &str) -> ApiResult<IdentitySession> {
        Err(unconfigured())
    }

    async fn sign_in(&self, _email: &str, _password: &str) -> ApiResult<IdentitySession> {
        Err(unconfigured())
    }

    async fn refresh(&self, _refresh_token: &str) -> ApiResult<IdentitySession> {
        Err(unconfigured())
    }

    async fn delete_account(&self, _id_token: &str) -> ApiResult<()> {
        Err(unconfigured())
    }
}

fn unconfigured() -> ApiError {
    warn!("Identity request received but FIREBASE_API_KEY is not set");
    ApiError::Unavailable("Authentication is not configured".to_string())
}
