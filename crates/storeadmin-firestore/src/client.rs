//! Firestore REST API client.
//!
//! One client type, two ways to authenticate:
//! - service-account OAuth tokens (privileged path)
//! - the project's web API key (REST fallback, subject to security rules)
//!
//! Reads are retried on transient failures. Every request gets a tracing
//! span and request metrics.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use gcp_auth::CustomServiceAccount;
use reqwest::{Client, Method, Response, StatusCode};
use serde::Serialize;
use tracing::{debug, info_span, Instrument};

use storeadmin_models::PRODUCTS_COLLECTION;

use crate::convert::document_to_record;
use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_request;
use crate::retry::{with_retry, RetryConfig};
use crate::store::{DocumentRecord, DocumentStore};
use crate::token_cache::{GcpTokenSource, TokenCache};
use crate::types::{
    Document, Fields, ListDocumentsResponse, RunQueryRequest, RunQueryResponse, StructuredQuery,
};

/// Public Firestore endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://firestore.googleapis.com";

/// Page size used when listing whole collections.
const LIST_PAGE_SIZE: u32 = 300;

// =============================================================================
// Configuration
// =============================================================================

/// Firestore client configuration.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub project_id: String,
    /// Database ID (usually "(default)")
    pub database_id: String,
    /// Scheme and host, without the `/v1` prefix
    pub endpoint: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub retry: RetryConfig,
}

impl FirestoreConfig {
    /// Config for a project with default database, endpoint and timeouts.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database_id: "(default)".to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            retry: RetryConfig::default(),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> FirestoreResult<Self> {
        let project_id = std::env::var("FIREBASE_PROJECT_ID")
            .or_else(|_| std::env::var("GCP_PROJECT_ID"))
            .map_err(|_| {
                FirestoreError::auth_error(
                    "FIREBASE_PROJECT_ID or GCP_PROJECT_ID must be set to access Firestore",
                )
            })?;

        if project_id.trim().is_empty() {
            return Err(FirestoreError::auth_error(
                "FIREBASE_PROJECT_ID or GCP_PROJECT_ID cannot be empty",
            ));
        }

        let connect_timeout_secs: u64 = std::env::var("FIRESTORE_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Ok(Self {
            database_id: std::env::var("FIRESTORE_DATABASE_ID")
                .unwrap_or_else(|_| "(default)".to_string()),
            endpoint: std::env::var("FIRESTORE_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            retry: RetryConfig::from_env(),
            ..Self::new(project_id)
        })
    }

    fn documents_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/databases/{}/documents",
            self.endpoint.trim_end_matches('/'),
            self.project_id,
            self.database_id
        )
    }
}

// =============================================================================
// Authentication
// =============================================================================

/// How requests are authorized.
#[derive(Clone)]
pub enum ClientAuth {
    /// OAuth bearer tokens minted from a service account.
    ServiceAccount(Arc<TokenCache>),
    /// `key=<api key>` on every request.
    ApiKey(String),
}

impl ClientAuth {
    /// Service-account auth from `GOOGLE_APPLICATION_CREDENTIALS`.
    ///
    /// Returns `None` when the variable is not set.
    pub fn service_account_from_env() -> FirestoreResult<Option<Self>> {
        let service_account = CustomServiceAccount::from_env().map_err(|e| {
            FirestoreError::auth_error(format!("Failed to load service account: {}", e))
        })?;

        Ok(service_account.map(|sa| {
            let source = GcpTokenSource::new(Arc::new(sa));
            ClientAuth::ServiceAccount(Arc::new(TokenCache::new(Arc::new(source))))
        }))
    }

    fn backend(&self) -> &'static str {
        match self {
            ClientAuth::ServiceAccount(_) => "firestore",
            ClientAuth::ApiKey(_) => "firestore-rest",
        }
    }
}

fn is_access_token_expired(body: &str) -> bool {
    body.contains("ACCESS_TOKEN_EXPIRED") || body.contains("\"UNAUTHENTICATED\"")
}

// =============================================================================
// Client
// =============================================================================

/// Firestore REST API client.
#[derive(Clone)]
pub struct FirestoreClient {
    http: Client,
    config: FirestoreConfig,
    base_url: String,
    auth: ClientAuth,
}

impl FirestoreClient {
    pub fn new(config: FirestoreConfig, auth: ClientAuth) -> FirestoreResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("storeadmin-firestore/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FirestoreError::Network)?;

        let base_url = config.documents_url();

        Ok(Self {
            http,
            config,
            base_url,
            auth,
        })
    }

    /// REST client authorized by the project's web API key.
    pub fn with_api_key(config: FirestoreConfig, api_key: impl Into<String>) -> FirestoreResult<Self> {
        Self::new(config, ClientAuth::ApiKey(api_key.into()))
    }

    /// Privileged client, or `None` when no service account is configured.
    pub fn with_service_account(config: FirestoreConfig) -> FirestoreResult<Option<Self>> {
        match ClientAuth::service_account_from_env()? {
            Some(auth) => Self::new(config, auth).map(Some),
            None => Ok(None),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.config.project_id
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/{}", self.base_url, collection)
    }

    fn document_url(&self, collection: &str, doc_id: &str) -> String {
        format!("{}/{}/{}", self.base_url, collection, doc_id)
    }

    async fn dispatch<B>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> FirestoreResult<Response>
    where
        B: Serialize + ?Sized + Sync,
    {
        let mut request = self.http.request(method, url);
        request = match &self.auth {
            ClientAuth::ServiceAccount(tokens) => request.bearer_auth(tokens.get_token().await?),
            ClientAuth::ApiKey(key) => request.query(&[("key", key.as_str())]),
        };
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    /// Send a request, refreshing an expired service-account token once.
    async fn send<B>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> FirestoreResult<Response>
    where
        B: Serialize + ?Sized + Sync,
    {
        let response = self.dispatch(method.clone(), url, query, body).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let ClientAuth::ServiceAccount(tokens) = &self.auth else {
            return Ok(response);
        };

        let text = response.text().await.unwrap_or_default();
        if !is_access_token_expired(&text) {
            return Err(FirestoreError::from_http_status(
                StatusCode::UNAUTHORIZED.as_u16(),
                format!("{} failed: {}", url, text),
            ));
        }

        debug!("Firestore access token expired, refreshing");
        tokens.invalidate().await;
        self.dispatch(method, url, query, body).await
    }

    // =========================================================================
    // CRUD Operations
    // =========================================================================

    /// Get a document, `None` when it does not exist.
    pub async fn get_document(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> FirestoreResult<Option<Document>> {
        let url = self.document_url(collection, doc_id);

        self.execute_request("get_document", collection, Some(doc_id), async {
            let response = self.send::<()>(Method::GET, &url, &[], None).await?;
            match response.status() {
                StatusCode::OK => Ok(Some(response.json().await?)),
                StatusCode::NOT_FOUND => Ok(None),
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Create a document. Without an id Firestore assigns one.
    pub async fn create_document(
        &self,
        collection: &str,
        doc_id: Option<&str>,
        fields: Fields,
    ) -> FirestoreResult<Document> {
        let url = self.collection_url(collection);
        let query: Vec<(&str, String)> = doc_id
            .map(|id| vec![("documentId", id.to_string())])
            .unwrap_or_default();
        let body = Document::new(fields);

        self.execute_request("create_document", collection, doc_id, async {
            let response = self.send(Method::POST, &url, &query, Some(&body)).await?;
            match response.status() {
                StatusCode::OK | StatusCode::CREATED => Ok(response.json().await?),
                StatusCode::CONFLICT => Err(FirestoreError::AlreadyExists(format!(
                    "{}/{}",
                    collection,
                    doc_id.unwrap_or_default()
                ))),
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Write a document, replacing all of its fields.
    pub async fn set_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: Fields,
    ) -> FirestoreResult<Document> {
        self.patch_document("set_document", collection, doc_id, fields, &[])
            .await
    }

    /// Overwrite the masked fields of a document.
    ///
    /// With `must_exist` a missing document is `NotFound` instead of being
    /// created.
    pub async fn update_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: Fields,
        update_mask: Option<Vec<String>>,
        must_exist: bool,
    ) -> FirestoreResult<Document> {
        let mut query: Vec<(&str, String)> = update_mask
            .unwrap_or_default()
            .into_iter()
            .map(|path| ("updateMask.fieldPaths", path))
            .collect();
        if must_exist {
            query.push(("currentDocument.exists", "true".to_string()));
        }

        self.patch_document("update_document", collection, doc_id, fields, &query)
            .await
    }

    async fn patch_document(
        &self,
        operation: &str,
        collection: &str,
        doc_id: &str,
        fields: Fields,
        query: &[(&str, String)],
    ) -> FirestoreResult<Document> {
        let url = self.document_url(collection, doc_id);
        let body = Document::new(fields);

        self.execute_request(operation, collection, Some(doc_id), async {
            let response = self.send(Method::PATCH, &url, query, Some(&body)).await?;
            match response.status() {
                StatusCode::OK => Ok(response.json().await?),
                StatusCode::NOT_FOUND => {
                    Err(FirestoreError::not_found(format!("{}/{}", collection, doc_id)))
                }
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Delete a document. A missing document is not an error.
    pub async fn delete_document(&self, collection: &str, doc_id: &str) -> FirestoreResult<()> {
        let url = self.document_url(collection, doc_id);

        self.execute_request("delete_document", collection, Some(doc_id), async {
            let response = self.send::<()>(Method::DELETE, &url, &[], None).await?;
            match response.status() {
                StatusCode::OK | StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => Ok(()),
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// List one page of a collection.
    pub async fn list_documents(
        &self,
        collection: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> FirestoreResult<ListDocumentsResponse> {
        let url = self.collection_url(collection);
        let mut query = vec![("pageSize", page_size.to_string())];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        self.execute_request("list_documents", collection, None, async {
            let response = self.send::<()>(Method::GET, &url, &query, None).await?;
            match response.status() {
                StatusCode::OK => Ok(response.json().await?),
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// List every document in a collection, following page tokens.
    pub async fn list_all_documents(&self, collection: &str) -> FirestoreResult<Vec<Document>> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .list_documents(collection, LIST_PAGE_SIZE, page_token.as_deref())
                .await?;
            documents.extend(page.documents.unwrap_or_default());

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(documents)
    }

    /// Run a structured query against the root collections.
    pub async fn run_query(&self, query: StructuredQuery) -> FirestoreResult<Vec<Document>> {
        let url = format!("{}:runQuery", self.base_url);
        let collection = query
            .from
            .first()
            .map(|c| c.collection_id.clone())
            .unwrap_or_default();
        let body = RunQueryRequest {
            structured_query: query,
        };

        self.execute_request("run_query", &collection, None, async {
            let response = self.send(Method::POST, &url, &[], Some(&body)).await?;
            match response.status() {
                StatusCode::OK => {
                    let text = response.text().await.unwrap_or_default();
                    // runQuery answers with a JSON array of results
                    let results: Vec<RunQueryResponse> =
                        serde_json::from_str(&text).map_err(|e| {
                            FirestoreError::InvalidResponse(format!(
                                "Failed to parse runQuery response: {} (body prefix: {})",
                                e,
                                text.chars().take(200).collect::<String>()
                            ))
                        })?;
                    Ok(results.into_iter().filter_map(|r| r.document).collect())
                }
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    // =========================================================================
    // Internal Helpers
    // =========================================================================

    /// Execute a request with tracing and metrics.
    async fn execute_request<T, F>(
        &self,
        operation: &str,
        collection: &str,
        doc_id: Option<&str>,
        fut: F,
    ) -> FirestoreResult<T>
    where
        F: std::future::Future<Output = FirestoreResult<T>>,
    {
        let auth = self.auth.backend();
        let span = match doc_id {
            Some(id) => info_span!(
                "firestore_request",
                operation = %operation,
                collection = %collection,
                doc_id = %id,
                auth
            ),
            None => info_span!(
                "firestore_request",
                operation = %operation,
                collection = %collection,
                auth
            ),
        };

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, status, latency_ms);

        result
    }

    async fn handle_error_response(status: StatusCode, url: &str, response: Response) -> FirestoreError {
        let body = response.text().await.unwrap_or_default();
        FirestoreError::from_http_status(status.as_u16(), format!("{} failed: {}", url, body))
    }
}

fn records(documents: Vec<Document>) -> FirestoreResult<Vec<DocumentRecord>> {
    documents.into_iter().map(document_to_record).collect()
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    fn backend(&self) -> &'static str {
        self.auth.backend()
    }

    async fn get(&self, collection: &str, id: &str) -> FirestoreResult<Option<DocumentRecord>> {
        let doc = with_retry(&self.config.retry, "get_document", || {
            self.get_document(collection, id)
        })
        .await?;
        doc.map(document_to_record).transpose()
    }

    async fn list(&self, collection: &str) -> FirestoreResult<Vec<DocumentRecord>> {
        let docs = with_retry(&self.config.retry, "list_documents", || {
            self.list_all_documents(collection)
        })
        .await?;
        records(docs)
    }

    async fn create(
        &self,
        collection: &str,
        id: Option<&str>,
        fields: Fields,
    ) -> FirestoreResult<DocumentRecord> {
        document_to_record(self.create_document(collection, id, fields).await?)
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> FirestoreResult<DocumentRecord> {
        document_to_record(self.set_document(collection, id, fields).await?)
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> FirestoreResult<()> {
        let mask: Vec<String> = fields.keys().cloned().collect();
        self.update_document(collection, id, fields, Some(mask), true)
            .await
            .map(|_| ())
    }

    async fn delete(&self, collection: &str, id: &str) -> FirestoreResult<()> {
        self.delete_document(collection, id).await
    }

    /// Reads at most one product, a collection the security rules expose.
    async fn ping(&self) -> FirestoreResult<()> {
        self.run_query(StructuredQuery::collection(PRODUCTS_COLLECTION).limit(1))
            .await
            .map(|_| ())
    }
}

// =============================================================================
// Tests
// =============================================================================
