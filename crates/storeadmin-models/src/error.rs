//! Model-level error types.

use thiserror::Error;

/// Errors raised while interpreting model values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Invalid order status: {0}")]
    InvalidOrderStatus(String),

    #[error("Invalid product status: {0}")]
    InvalidProductStatus(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
