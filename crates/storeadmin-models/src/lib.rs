//! Shared data models for the store admin backend.
//!
//! This crate provides Serde-serializable types for:
//! - Admin profiles and authentication payloads
//! - Products, with partial-update diffing
//! - Orders and order statistics
//! - Lenient readers for documents with inconsistent historical shapes

pub mod admin;
pub mod error;
pub mod normalize;
pub mod order;
pub mod product;

// Re-export common types
pub use admin::{
    AdminProfile, AuthSession, LoginRequest, ProfileUpdate, RefreshRequest, RegisterRequest,
    ADMIN_COLLECTION,
};
pub use error::{ModelError, ModelResult};
pub use order::{
    Customer, Order, OrderItem, OrderStats, OrderStatus, ShippingAddress, StatusUpdate,
    ORDERS_COLLECTION,
};
pub use product::{
    NewProduct, PopularToggle, Product, ProductChange, ProductStatus, ProductUpdate,
    MAX_POPULAR_PRODUCTS, PRODUCTS_COLLECTION,
};
