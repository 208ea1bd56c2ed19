//! Application state.

use std::sync::Arc;

use tracing::{info, warn};

use storeadmin_firestore::{
    AdminRepository, DocumentStore, FallbackStore, FirestoreClient, FirestoreConfig, MemoryStore,
    OrderRepository, ProductRepository, UnavailableStore,
};

use crate::auth::{JwksCache, TokenVerifier};
use crate::config::{ApiConfig, StoreBackend};
use crate::identity::{IdentityClient, IdentityProvider, UnconfiguredIdentity};
use crate::services::AccountService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: Arc<dyn DocumentStore>,
    pub admins: AdminRepository,
    pub products: ProductRepository,
    pub orders: OrderRepository,
    pub verifier: Arc<dyn TokenVerifier>,
    pub accounts: AccountService,
}

/// Build the document store for `config`.
///
/// The service-account client is primary when credentials are available; the
/// REST client with the web API key is the fallback. Without an API key the
/// fallback reports the store as unavailable.
fn build_store(config: &ApiConfig) -> Result<Arc<dyn DocumentStore>, Box<dyn std::error::Error>> {
    if config.store_backend == StoreBackend::Memory {
        warn!("Using in-memory document store; data is not persisted");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let firestore_config = FirestoreConfig::from_env()?;

    let primary: Option<Arc<dyn DocumentStore>> =
        match FirestoreClient::with_service_account(firestore_config.clone())? {
            Some(client) => {
                info!(project = %client.project_id(), "Service account Firestore client ready");
                Some(Arc::new(client) as Arc<dyn DocumentStore>)
            }
            None => {
                warn!("GOOGLE_APPLICATION_CREDENTIALS not set; using REST access only");
                None
            }
        };

    let fallback: Arc<dyn DocumentStore> = match &config.firebase_api_key {
        Some(key) => Arc::new(FirestoreClient::with_api_key(firestore_config, key)?),
        None => {
            warn!("FIREBASE_API_KEY not set; REST fallback disabled");
            Arc::new(UnavailableStore::new("FIREBASE_API_KEY is not configured"))
        }
    };

    Ok(Arc::new(FallbackStore::new(primary, fallback)))
}

impl AppState {
    /// Create application state from configuration.
    pub fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let project_id = config
            .project_id
            .clone()
            .ok_or("FIREBASE_PROJECT_ID or GCP_PROJECT_ID must be set")?;

        let store = build_store(&config)?;
        let verifier: Arc<dyn TokenVerifier> = Arc::new(JwksCache::for_project(project_id)?);

        let identity: Arc<dyn IdentityProvider> = match IdentityClient::from_config(&config)? {
            Some(client) => Arc::new(client),
            None => {
                warn!("FIREBASE_API_KEY not set; register/login/refresh are disabled");
                Arc::new(UnconfiguredIdentity)
            }
        };

        Ok(Self::with_parts(config, store, verifier, identity))
    }

    /// Assemble state from already built components.
    pub fn with_parts(
        config: ApiConfig,
        store: Arc<dyn DocumentStore>,
        verifier: Arc<dyn TokenVerifier>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let admins = AdminRepository::new(Arc::clone(&store));
        let products = ProductRepository::new(Arc::clone(&store));
        let orders = OrderRepository::new(Arc::clone(&store));
        let accounts = AccountService::new(identity, admins.clone());

        Self {
            config,
            store,
            admins,
            products,
            orders,
            verifier,
            accounts,
        }
    }
}
