//! Admin profile and dashboard handlers (`/api/admin`).

use axum::extract::State;
use serde::Serialize;
use validator::Validate;

use storeadmin_firestore::ProductFilter;
use storeadmin_models::{AdminProfile, Order, OrderStats, ProductStatus, ProfileUpdate};

use crate::auth::{AdminUser, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::handlers::auth::me;
use crate::handlers::JsonBody;
use crate::response::ApiResponse;
use crate::security::validate_optional_image_url;
use crate::state::AppState;

/// Orders shown on the dashboard.
const RECENT_ORDERS: usize = 5;

pub async fn get_profile(
    state: State<AppState>,
    user: AuthUser,
) -> ApiResult<ApiResponse<AdminProfile>> {
    me(state, user).await
}

/// Update name and/or avatar of the signed-in admin.
pub async fn update_profile(
    State(state): State<AppState>,
    admin: AdminUser,
    JsonBody(update): JsonBody<ProfileUpdate>,
) -> ApiResult<ApiResponse<AdminProfile>> {
    if update.is_empty() {
        return Err(ApiError::bad_request("Nothing to update"));
    }
    update.validate()?;
    validate_optional_image_url(update.avatar_url.as_deref()).map_err(ApiError::bad_request)?;

    let profile = state.admins.update(&admin.user.uid, &update).await?;
    Ok(ApiResponse::ok("Profile updated successfully", profile))
}

#[derive(Debug, Serialize)]
pub struct ProductSummary {
    pub total: usize,
    pub active: usize,
    pub popular: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub products: ProductSummary,
    pub orders: OrderStats,
    pub recent_orders: Vec<Order>,
}

/// Product counts, order statistics, and the latest orders.
pub async fn dashboard(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<ApiResponse<DashboardData>> {
    let products = state.products.list(&ProductFilter::default()).await?;
    let stats = state.orders.stats().await?;
    let recent_orders = state.orders.recent(RECENT_ORDERS).await?;

    let summary = ProductSummary {
        total: products.len(),
        active: products
            .iter()
            .filter(|p| p.status == ProductStatus::Active)
            .count(),
        popular: products.iter().filter(|p| p.popular).count(),
    };

    Ok(ApiResponse::ok(
        "Dashboard data retrieved",
        DashboardData {
            products: summary,
            orders: stats,
            recent_orders,
        },
    ))
}
