//! API configuration.

use std::str::FromStr;

use tracing::warn;

/// Default Identity Toolkit endpoint.
pub const DEFAULT_IDENTITY_ENDPOINT: &str = "https://identitytoolkit.googleapis.com";

/// Default Secure Token endpoint (refresh tokens).
pub const DEFAULT_SECURE_TOKEN_ENDPOINT: &str = "https://securetoken.googleapis.com";

/// Where documents are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// Service-account Firestore with REST fallback.
    #[default]
    Firestore,
    /// In-process store; nothing survives a restart.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "firestore" | "" => Ok(Self::Firestore),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(format!("unknown STORE_BACKEND '{}'", other)),
        }
    }
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    /// Per-IP requests per second on `/api`
    pub rate_limit_rps: u32,
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    pub metrics_enabled: bool,
    pub store_backend: StoreBackend,
    /// Firebase project; audience of ID tokens
    pub project_id: Option<String>,
    /// Web API key for Identity Toolkit and the REST fallback
    pub firebase_api_key: Option<String>,
    pub identity_endpoint: String,
    pub secure_token_endpoint: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 20,
            max_body_size: 1024 * 1024, // 1MB
            environment: "development".to_string(),
            metrics_enabled: true,
            store_backend: StoreBackend::Firestore,
            project_id: None,
            firebase_api_key: None,
            identity_endpoint: DEFAULT_IDENTITY_ENDPOINT.to_string(),
            secure_token_endpoint: DEFAULT_SECURE_TOKEN_ENDPOINT.to_string(),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Read `STORE_BACKEND`. An unrecognized value is logged and treated as
/// Firestore.
fn store_backend_from_env() -> StoreBackend {
    let Ok(raw) = std::env::var("STORE_BACKEND") else {
        return StoreBackend::default();
    };
    raw.parse().unwrap_or_else(|err: String| {
        warn!(value = %raw, "Ignoring {}; using firestore", err);
        StoreBackend::default()
    })
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            host: env_non_empty("API_HOST").unwrap_or(defaults.host),
            port: env_parse("API_PORT").unwrap_or(defaults.port),
            cors_origins: env_non_empty("CORS_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: env_parse("RATE_LIMIT_RPS").unwrap_or(defaults.rate_limit_rps),
            max_body_size: env_parse("MAX_BODY_SIZE").unwrap_or(defaults.max_body_size),
            environment: env_non_empty("ENVIRONMENT").unwrap_or(defaults.environment),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.metrics_enabled),
            store_backend: store_backend_from_env(),
            project_id: env_non_empty("FIREBASE_PROJECT_ID").or_else(|| env_non_empty("GCP_PROJECT_ID")),
            firebase_api_key: env_non_empty("FIREBASE_API_KEY"),
            identity_endpoint: env_non_empty("IDENTITY_ENDPOINT").unwrap_or(defaults.identity_endpoint),
            secure_token_endpoint: env_non_empty("SECURE_TOKEN_ENDPOINT")
                .unwrap_or(defaults.secure_token_endpoint),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}
