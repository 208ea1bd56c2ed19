//! Product catalog handlers (`/api/products`).

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use validator::Validate;

use storeadmin_firestore::ProductFilter;
use storeadmin_models::normalize::parse_bool;
use storeadmin_models::{NewProduct, PopularToggle, Product, ProductStatus, ProductUpdate};

use crate::auth::AdminUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::{ensure_document_id, JsonBody};
use crate::response::ApiResponse;
use crate::security::{sanitize_string, validate_optional_image_url};
use crate::state::AppState;

/// Listing query parameters. All optional.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub status: Option<String>,
    pub popular: Option<String>,
    pub search: Option<String>,
}

impl ProductQuery {
    fn into_filter(self) -> ApiResult<ProductFilter> {
        let non_empty = |v: Option<String>| v.map(|s| sanitize_string(&s)).filter(|s| !s.is_empty());

        let status = match non_empty(self.status) {
            Some(s) if s.eq_ignore_ascii_case("all") => None,
            Some(s) => Some(
                s.parse::<ProductStatus>()
                    .map_err(|_| ApiError::bad_request(format!("Unknown product status '{}'", s)))?,
            ),
            None => None,
        };

        let popular = match non_empty(self.popular) {
            Some(p) => Some(
                parse_bool(&serde_json::Value::String(p))
                    .ok_or_else(|| ApiError::bad_request("popular must be true or false"))?,
            ),
            None => None,
        };

        Ok(ProductFilter {
            category: non_empty(self.category),
            status,
            popular,
            search: non_empty(self.search),
        })
    }
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> ApiResult<ApiResponse<Vec<Product>>> {
    let filter = query.into_filter()?;
    let products = state.products.list(&filter).await?;
    Ok(ApiResponse::ok("Products retrieved", products))
}

pub async fn popular_products(State(state): State<AppState>) -> ApiResult<ApiResponse<Vec<Product>>> {
    let products = state.products.popular().await?;
    Ok(ApiResponse::ok("Popular products retrieved", products))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<Product>> {
    ensure_document_id(&id)?;
    let product = state
        .products
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    Ok(ApiResponse::ok("Product retrieved", product))
}

pub async fn create_product(
    State(state): State<AppState>,
    admin: AdminUser,
    JsonBody(new_product): JsonBody<NewProduct>,
) -> ApiResult<ApiResponse<Product>> {
    new_product.validate()?;
    validate_optional_image_url(new_product.image_url.as_deref()).map_err(ApiError::bad_request)?;

    let product = state.products.create(new_product, Some(admin.user.uid)).await?;
    Ok(ApiResponse::created("Product created successfully", product))
}

/// Persist only the submitted fields that differ from the stored product.
pub async fn update_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    JsonBody(update): JsonBody<ProductUpdate>,
) -> ApiResult<ApiResponse<Product>> {
    ensure_document_id(&id)?;
    update.validate()?;
    validate_optional_image_url(update.image_url.as_deref()).map_err(ApiError::bad_request)?;

    let outcome = state.products.update(&id, &update).await?;
    if outcome.is_unchanged() {
        debug!(product_id = %id, "Update carried no changes");
        return Ok(ApiResponse::ok("No changes detected", outcome.product));
    }
    Ok(ApiResponse::ok("Product updated successfully", outcome.product))
}

/// Flip the popular flag, or set it when the body carries `{"popular": bool}`.
pub async fn set_popular(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<ApiResponse<Product>> {
    ensure_document_id(&id)?;

    let toggle = if body.iter().all(u8::is_ascii_whitespace) {
        PopularToggle::default()
    } else {
        serde_json::from_slice::<PopularToggle>(&body)
            .map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))?
    };

    let product = match toggle.popular {
        Some(popular) => state.products.set_popular(&id, popular).await?,
        None => state.products.toggle_popular(&id).await?,
    };

    let message = if product.popular {
        "Product marked as popular"
    } else {
        "Product removed from popular"
    };
    Ok(ApiResponse::ok(message, product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<serde_json::Value>> {
    ensure_document_id(&id)?;
    state.products.delete(&id).await?;
    Ok(ApiResponse::ok("Product deleted successfully", json!({ "id": id })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_into_filter() {
        let filter = ProductQuery {
            category: Some(" kitchen ".into()),
            status: Some("Active".into()),
            popular: Some("1".into()),
            search: Some(String::new()),
        }
        .into_filter()
        .unwrap();

        assert_eq!(filter.category.as_deref(), Some("kitchen"));
        assert_eq!(filter.status, Some(ProductStatus::Active));
        assert_eq!(filter.popular, Some(true));
        assert_eq!(filter.search, None);
    }

    #[test]
    fn test_query_rejects_unknown_values() {
        let bad_status = ProductQuery {
            status: Some("sparkly".into()),
            ..Default::default()
        };
        assert!(matches!(bad_status.into_filter(), Err(ApiError::BadRequest(_))));

        let bad_popular = ProductQuery {
            popular: Some("maybe".into()),
            ..Default::default()
        };
        assert!(matches!(bad_popular.into_filter(), Err(ApiError::BadRequest(_))));

        let all = ProductQuery {
            status: Some("all".into()),
            ..Default::default()
        };
        assert_eq!(all.into_filter().unwrap().status, None);
    }
}
