//! Request handlers.

pub mod admin;
pub mod auth;
pub mod health;
pub mod orders;
pub mod products;

pub use health::*;

use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;

use crate::error::{ApiError, ApiResult};
use crate::security::is_valid_document_id;

/// JSON body whose parse errors are reported in the API envelope.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::bad_request("Expected a JSON body with Content-Type: application/json")
        }
        other => ApiError::bad_request(format!("Invalid request body: {}", other.body_text())),
    }
}

/// Reject ids that cannot name a document.
pub(crate) fn ensure_document_id(id: &str) -> ApiResult<()> {
    if is_valid_document_id(id) {
        Ok(())
    } else {
        Err(ApiError::bad_request("Invalid id"))
    }
}
