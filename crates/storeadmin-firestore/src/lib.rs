//! Firestore access for the store admin backend.
//!
//! This crate provides:
//! - A Firestore REST client with service-account or API-key auth
//! - The `DocumentStore` abstraction with a primary/fallback combinator
//! - An in-memory store for development and tests
//! - Typed repositories for admin profiles, products, and orders

pub mod admin_repo;
pub mod client;
pub mod convert;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod order_repo;
pub mod product_repo;
pub mod retry;
pub mod store;
pub mod token_cache;
pub mod types;


pub use admin_repo::AdminRepository;
pub use client::{ClientAuth, FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use memory::MemoryStore;
pub use order_repo::{OrderFilter, OrderRepository};
pub use product_repo::{ProductFilter, ProductRepository, ProductUpdateOutcome};
pub use retry::RetryConfig;
pub use store::{DocumentRecord, DocumentStore, FallbackStore, UnavailableStore};
pub use types::{Document, Fields, ToFirestoreValue, Value};
