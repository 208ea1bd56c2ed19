//! Registration, login, and session handlers (`/api/auth`).

use axum::extract::State;
use tracing::info;
use validator::Validate;

use storeadmin_models::{AdminProfile, AuthSession, LoginRequest, RefreshRequest, RegisterRequest};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::JsonBody;
use crate::metrics::record_auth_event;
use crate::response::ApiResponse;
use crate::security::validate_optional_image_url;
use crate::services::RefreshedSession;
use crate::state::AppState;

fn recorded<T>(event: &'static str, result: ApiResult<T>) -> ApiResult<T> {
    record_auth_event(event, result.is_ok());
    result
}

/// Create an auth account and its admin profile.
pub async fn register(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> ApiResult<ApiResponse<AuthSession>> {
    request.validate()?;
    validate_optional_image_url(request.avatar_url.as_deref()).map_err(ApiError::bad_request)?;

    let session = recorded("register", state.accounts.register(&request).await)?;
    Ok(ApiResponse::created("Admin registered successfully", session))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> ApiResult<ApiResponse<AuthSession>> {
    request.validate()?;

    let session = recorded("login", state.accounts.login(&request).await)?;
    Ok(ApiResponse::ok("Login successful", session))
}

pub async fn refresh(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RefreshRequest>,
) -> ApiResult<ApiResponse<RefreshedSession>> {
    request.validate()?;

    let session = recorded("refresh", state.accounts.refresh(&request.refresh_token).await)?;
    Ok(ApiResponse::ok("Token refreshed", session))
}

/// Tokens are held by the client; nothing is revoked server-side.
pub async fn logout(user: AuthUser) -> ApiResponse<()> {
    info!(uid = %user.uid, "Admin signed out");
    ApiResponse::message("Logged out successfully")
}

/// Profile of the signed-in admin.
pub async fn me(State(state): State<AppState>, user: AuthUser) -> ApiResult<ApiResponse<AdminProfile>> {
    let profile = state
        .admins
        .get(&user.uid)
        .await?
        .ok_or_else(|| ApiError::not_found("Admin profile not found"))?;

    Ok(ApiResponse::ok("Profile retrieved", profile))
}
