//! Order management handlers (`/api/orders`).

use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};

use storeadmin_firestore::OrderFilter;
use storeadmin_models::{Order, OrderStats, OrderStatus, StatusUpdate};

use crate::auth::AdminUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::{ensure_document_id, JsonBody};
use crate::response::ApiResponse;
use crate::security::sanitize_string;
use crate::state::AppState;

/// Upper bound for `limit`.
const MAX_LIST_LIMIT: usize = 500;

#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub status: Option<String>,
    pub search: Option<String>,
    pub limit: Option<String>,
}

fn parse_status(raw: &str) -> ApiResult<OrderStatus> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("Unknown order status '{}'", raw.trim())))
}

impl OrderQuery {
    fn into_filter(self) -> ApiResult<OrderFilter> {
        let non_empty = |v: Option<String>| v.map(|s| sanitize_string(&s)).filter(|s| !s.is_empty());

        let status = match non_empty(self.status) {
            Some(s) if s.eq_ignore_ascii_case("all") => None,
            Some(s) => Some(parse_status(&s)?),
            None => None,
        };

        let limit = match non_empty(self.limit) {
            Some(l) => Some(
                l.parse::<usize>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| ApiError::bad_request("limit must be a positive integer"))?
                    .min(MAX_LIST_LIMIT),
            ),
            None => None,
        };

        Ok(OrderFilter {
            status,
            search: non_empty(self.search),
            limit,
        })
    }
}

pub async fn list_orders(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<OrderQuery>,
) -> ApiResult<ApiResponse<Vec<Order>>> {
    let filter = query.into_filter()?;
    let orders = state.orders.list(&filter).await?;
    Ok(ApiResponse::ok("Orders retrieved", orders))
}

pub async fn order_stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<ApiResponse<OrderStats>> {
    let stats = state.orders.stats().await?;
    Ok(ApiResponse::ok("Order statistics retrieved", stats))
}

pub async fn get_order(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Order>> {
    ensure_document_id(&id)?;
    let order = state
        .orders
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found"))?;
    Ok(ApiResponse::ok("Order retrieved", order))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    JsonBody(update): JsonBody<StatusUpdate>,
) -> ApiResult<ApiResponse<Order>> {
    ensure_document_id(&id)?;
    let status = parse_status(&update.status)?;

    let order = state.orders.update_status(&id, status).await?;
    Ok(ApiResponse::ok("Order status updated", order))
}

#[derive(Debug, Serialize)]
pub struct DeletedOrder {
    pub id: String,
    /// Statistics recalculated after the deletion
    pub stats: OrderStats,
}

pub async fn delete_order(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<DeletedOrder>> {
    ensure_document_id(&id)?;
    state.orders.delete(&id).await?;
    let stats = state.orders.stats().await?;
    Ok(ApiResponse::ok("Order deleted successfully", DeletedOrder { id, stats }))
}
