//! Router tests against an in-memory document store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value as Json};
use tower::ServiceExt;

use storeadmin_api::{
    create_router, ApiConfig, ApiError, ApiResult, AppState, AuthUser, IdentityProvider,
    IdentitySession, TokenVerifier,
};
use storeadmin_firestore::convert::json_map_to_fields;
use storeadmin_firestore::{
    AdminRepository, DocumentRecord, DocumentStore, Fields, FirestoreError, FirestoreResult,
    MemoryStore, UnavailableStore, Value,
};
use storeadmin_models::AdminProfile;

/// Accepts `token-<uid>`.
struct FakeVerifier;

#[async_trait]
impl TokenVerifier for FakeVerifier {
    async fn verify(&self, token: &str) -> ApiResult<AuthUser> {
        token
            .strip_prefix("token-")
            .map(|uid| AuthUser {
                uid: uid.to_string(),
                email: None,
                email_verified: true,
            })
            .ok_or_else(|| ApiError::unauthorized("Token validation failed"))
    }
}

#[derive(Default)]
struct FakeIdentity {
    deleted: Mutex<Vec<String>>,
}

fn session(uid: &str) -> IdentitySession {
    IdentitySession {
        uid: uid.to_string(),
        email: None,
        id_token: format!("token-{}", uid),
        refresh_token: format!("refresh-{}", uid),
        expires_in: 3600,
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn sign_up(&self, email: &str, _password: &str) -> ApiResult<IdentitySession> {
        if email == "taken@example.com" {
            return Err(ApiError::conflict("An account with this email already exists"));
        }
        Ok(session("admin-1"))
    }

    async fn sign_in(&self, email: &str, _password: &str) -> ApiResult<IdentitySession> {
        Ok(session(email.split('@').next().unwrap_or_default()))
    }

    async fn refresh(&self, refresh_token: &str) -> ApiResult<IdentitySession> {
        let uid = refresh_token
            .strip_prefix("refresh-")
            .ok_or_else(|| ApiError::unauthorized("Session expired, please sign in again"))?;
        Ok(session(uid))
    }

    async fn delete_account(&self, id_token: &str) -> ApiResult<()> {
        self.deleted.lock().unwrap().push(id_token.to_string());
        Ok(())
    }
}

/// Records the field names of every partial update. Listing fails while
/// `broken` is set.
struct RecordingStore {
    inner: MemoryStore,
    updates: Mutex<Vec<(String, Vec<String>)>>,
    broken: AtomicBool,
}

impl RecordingStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            updates: Mutex::new(Vec::new()),
            broken: AtomicBool::new(false),
        }
    }

    fn updates_for(&self, id: &str) -> Vec<Vec<String>> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .filter(|(doc, _)| doc == id)
            .map(|(_, fields)| fields.clone())
            .collect()
    }
}

#[async_trait]
impl DocumentStore for RecordingStore {
    fn backend(&self) -> &'static str {
        "recording"
    }

    async fn get(&self, collection: &str, id: &str) -> FirestoreResult<Option<DocumentRecord>> {
        self.inner.get(collection, id).await
    }

    async fn list(&self, collection: &str) -> FirestoreResult<Vec<DocumentRecord>> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(FirestoreError::ServerError(500, "backend 10.0.0.3 refused".into()));
        }
        self.inner.list(collection).await
    }

    async fn create(
        &self,
        collection: &str,
        id: Option<&str>,
        fields: Fields,
    ) -> FirestoreResult<DocumentRecord> {
        self.inner.create(collection, id, fields).await
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> FirestoreResult<DocumentRecord> {
        self.inner.set(collection, id, fields).await
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> FirestoreResult<()> {
        let mut names: Vec<String> = fields.keys().cloned().collect();
        names.sort();
        self.updates.lock().unwrap().push((id.to_string(), names));
        self.inner.update(collection, id, fields).await
    }

    async fn delete(&self, collection: &str, id: &str) -> FirestoreResult<()> {
        self.inner.delete(collection, id).await
    }

    async fn ping(&self) -> FirestoreResult<()> {
        self.inner.ping().await
    }
}

struct TestApp {
    router: Router,
    store: Arc<RecordingStore>,
    identity: Arc<FakeIdentity>,
}

/// App whose store already holds the `owner` admin profile.
async fn test_app() -> TestApp {
    let store = Arc::new(RecordingStore::new());
    AdminRepository::new(store.clone())
        .create(&AdminProfile::new("owner", "Owner", "owner@example.com"))
        .await
        .unwrap();
    let identity = Arc::new(FakeIdentity::default());
    let state = AppState::with_parts(
        ApiConfig::default(),
        store.clone(),
        Arc::new(FakeVerifier),
        identity.clone(),
    );
    TestApp {
        router: create_router(state, None),
        store,
        identity,
    }
}

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Json>,
) -> (StatusCode, Json) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Json::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

const ADMIN: Option<&str> = Some("token-owner");
/// Valid token for an account without an admin profile.
const CUSTOMER: Option<&str> = Some("token-customer-9");

async fn create_product(app: &TestApp, name: &str, popular: bool) -> (StatusCode, Json) {
    send(
        &app.router,
        Method::POST,
        "/api/products",
        ADMIN,
        Some(json!({"name": name, "price": 10, "count": 3, "category": "kitchen", "popular": popular})),
    )
    .await
}

async fn seed_order(store: &RecordingStore, id: &str, doc: Json) {
    store
        .set("orders", id, json_map_to_fields(doc.as_object().unwrap()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_health_and_ready() {
    let app = test_app().await;

    let (status, body) = send(&app.router, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app.router, Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["store"]["backend"], "recording");
}

#[tokio::test]
async fn test_ready_reports_unavailable_store() {
    let state = AppState::with_parts(
        ApiConfig::default(),
        Arc::new(UnavailableStore::new("no credentials")),
        Arc::new(FakeVerifier),
        Arc::new(FakeIdentity::default()),
    );
    let router = create_router(state, None);

    let (status, body) = send(&router, Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unavailable");
}

#[tokio::test]
async fn test_security_headers_and_request_id() {
    let app = test_app().await;
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.headers()["x-request-id"], "req-42");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()["x-frame-options"], "DENY");
}

#[tokio::test]
async fn test_register_then_me() {
    let app = test_app().await;

    let (status, body) = send(
        &app.router,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({"name": "Ada", "email": "ada@example.com", "password": "secret1"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["uid"], "admin-1");
    assert_eq!(body["data"]["idToken"], "token-admin-1");
    assert_eq!(body["data"]["expiresIn"], 3600);

    let token = Some("token-admin-1");
    let (status, body) = send(&app.router, Method::GET, "/api/auth/me", token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Ada");
    assert_eq!(body["data"]["email"], "ada@example.com");

    let (status, body) = send(&app.router, Method::GET, "/api/admin/profile", token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["uid"], "admin-1");
}

#[tokio::test]
async fn test_register_validation_and_conflict() {
    let app = test_app().await;

    let (status, body) = send(
        &app.router,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({"name": "Ada", "email": "nope", "password": "secret1"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "A valid email is required");
    assert!(body["data"].is_null());

    let (status, _) = send(
        &app.router,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({"name": "Ada", "email": "taken@example.com", "password": "secret1"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_rolls_back_auth_account_when_profile_write_fails() {
    let identity = Arc::new(FakeIdentity::default());
    let state = AppState::with_parts(
        ApiConfig::default(),
        Arc::new(UnavailableStore::new("offline")),
        Arc::new(FakeVerifier),
        identity.clone(),
    );
    let router = create_router(state, None);

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({"name": "Ada", "email": "ada@example.com", "password": "secret1"})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
    assert_eq!(*identity.deleted.lock().unwrap(), vec!["token-admin-1".to_string()]);
}

#[tokio::test]
async fn test_login_without_profile_is_forbidden() {
    let app = test_app().await;

    let (status, body) = send(
        &app.router,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"email": "stranger@example.com", "password": "secret1"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
    assert!(app.identity.deleted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_refresh_and_logout() {
    let app = test_app().await;

    let (status, body) = send(
        &app.router,
        Method::POST,
        "/api/auth/refresh",
        None,
        Some(json!({"refreshToken": "refresh-admin-1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["uid"], "admin-1");
    assert_eq!(body["data"]["idToken"], "token-admin-1");

    let (status, _) = send(&app.router, Method::POST, "/api/auth/logout", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app.router, Method::POST, "/api/auth/logout", ADMIN, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = test_app().await;

    let (status, body) = send(&app.router, Method::GET, "/api/orders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = send(&app.router, Method::GET, "/api/orders", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = create_product(&app, "Mug", false).await;
    assert_eq!(status, StatusCode::CREATED);

    // Catalog reads are public
    let (status, body) = send(&app.router, Method::GET, "/api/products", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_document_id_is_rejected() {
    let app = test_app().await;

    let (status, body) = send(&app.router, Method::GET, "/api/products/bad.id", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid id");

    let (status, _) = send(&app.router, Method::GET, "/api/products/missing", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_product_update_persists_only_changed_fields() {
    let app = test_app().await;
    let (_, body) = create_product(&app, "Mug", false).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["createdBy"], "owner");

    let (status, body) = send(
        &app.router,
        Method::PUT,
        &format!("/api/products/{}", id),
        ADMIN,
        Some(json!({"name": "Mug", "price": "12.5", "category": "kitchen"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Product updated successfully");
    assert_eq!(body["data"]["price"], 12.5);
    assert_eq!(
        app.store.updates_for(&id),
        vec![vec!["price".to_string(), "updatedAt".to_string()]]
    );

    let (status, body) = send(
        &app.router,
        Method::PUT,
        &format!("/api/products/{}", id),
        ADMIN,
        Some(json!({"name": "Mug", "price": 12.5})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "No changes detected");
    assert_eq!(app.store.updates_for(&id).len(), 1);
}

#[tokio::test]
async fn test_fifth_popular_product_is_rejected() {
    let app = test_app().await;
    for i in 0..4 {
        let (status, _) = create_product(&app, &format!("Popular {}", i), true).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = create_product(&app, "One too many", true).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Maximum of 4 popular products allowed. Remove one from popular first."
    );

    let (_, body) = create_product(&app, "Plain", false).await;
    let plain_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app.router,
        Method::PATCH,
        &format!("/api/products/{}/popular", plain_id),
        ADMIN,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app.router, Method::GET, "/api/products/popular", None, None).await;
    let popular = body["data"].as_array().unwrap();
    assert_eq!(popular.len(), 4);
    let first_id = popular[0]["id"].as_str().unwrap().to_string();

    // Free a slot, then the toggle goes through
    let (status, body) = send(
        &app.router,
        Method::PATCH,
        &format!("/api/products/{}/popular", first_id),
        ADMIN,
        Some(json!({"popular": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["popular"], false);

    let (status, body) = send(
        &app.router,
        Method::PATCH,
        &format!("/api/products/{}/popular", plain_id),
        ADMIN,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["popular"], true);
}

#[tokio::test]
async fn test_product_delete() {
    let app = test_app().await;
    let (_, body) = create_product(&app, "Mug", false).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let uri = format!("/api/products/{}", id);
    let (status, body) = send(&app.router, Method::DELETE, &uri, ADMIN, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], id.as_str());

    let (status, _) = send(&app.router, Method::DELETE, &uri, ADMIN, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_order_status_and_delete_with_stats() {
    let app = test_app().await;
    seed_order(
        &app.store,
        "o1",
        json!({
            "customer": {"name": "Ada", "email": "ada@example.com"},
            "total": 25.0,
            "status": "pending",
            "createdAt": "2024-02-01T10:00:00Z"
        }),
    )
    .await;
    seed_order(
        &app.store,
        "o2",
        json!({
            "customerName": "Grace",
            "totalAmount": "$15.00",
            "orderStatus": "completed",
            "createdAt": "2024-03-01T10:00:00Z"
        }),
    )
    .await;

    let (status, body) = send(&app.router, Method::GET, "/api/orders", ADMIN, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["id"], "o2");

    let (status, body) = send(
        &app.router,
        Method::PATCH,
        "/api/orders/o1/status",
        ADMIN,
        Some(json!({"status": "teleported"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = send(
        &app.router,
        Method::PATCH,
        "/api/orders/o1/status",
        ADMIN,
        Some(json!({"status": "shipped"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "shipped");

    let (status, body) = send(&app.router, Method::GET, "/api/orders/stats", ADMIN, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalOrders"], 2);
    assert_eq!(body["data"]["totalRevenue"], 40.0);

    let (status, body) = send(&app.router, Method::DELETE, "/api/orders/o1", ADMIN, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], "o1");
    assert_eq!(body["data"]["stats"]["totalOrders"], 1);
    assert_eq!(body["data"]["stats"]["totalRevenue"], 15.0);

    let (status, _) = send(&app.router, Method::GET, "/api/orders/o1", ADMIN, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_dashboard() {
    let app = test_app().await;
    create_product(&app, "Mug", true).await;
    create_product(&app, "Lamp", false).await;
    seed_order(
        &app.store,
        "o1",
        json!({"customer": {"name": "Ada"}, "total": 30, "status": "delivered"}),
    )
    .await;

    let (status, body) = send(&app.router, Method::GET, "/api/admin/dashboard", ADMIN, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["products"]["total"], 2);
    assert_eq!(body["data"]["products"]["active"], 2);
    assert_eq!(body["data"]["products"]["popular"], 1);
    assert_eq!(body["data"]["orders"]["totalOrders"], 1);
    assert_eq!(body["data"]["recentOrders"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_profile_update() {
    let app = test_app().await;

    let (status, body) = send(
        &app.router,
        Method::PUT,
        "/api/admin/profile",
        ADMIN,
        Some(json!({"avatarUrl": "http://169.254.169.254/latest"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = send(
        &app.router,
        Method::PUT,
        "/api/admin/profile",
        ADMIN,
        Some(json!({"name": "Ada King", "avatarUrl": "https://cdn.example.com/ada.png"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Ada King");
    assert_eq!(body["data"]["email"], "owner@example.com");
    assert_eq!(body["data"]["avatarUrl"], "https://cdn.example.com/ada.png");
}

#[tokio::test]
async fn test_token_without_admin_profile_is_forbidden() {
    let app = test_app().await;
    seed_order(&app.store, "o1", json!({"customer": {"name": "Ada"}, "total": 10, "status": "pending"})).await;

    let (status, body) = send(&app.router, Method::DELETE, "/api/orders/o1", CUSTOMER, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Admin access required");

    let (status, _) = send(
        &app.router,
        Method::POST,
        "/api/products",
        CUSTOMER,
        Some(json!({"name": "Mug", "price": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    for uri in ["/api/orders", "/api/orders/stats", "/api/admin/dashboard"] {
        let (status, _) = send(&app.router, Method::GET, uri, CUSTOMER, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
    }

    let (status, _) = send(&app.router, Method::GET, "/api/auth/me", CUSTOMER, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Nothing was touched
    let (status, _) = send(&app.router, Method::GET, "/api/orders/o1", ADMIN, None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app.router, Method::GET, "/api/products", None, None).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_legacy_popular_flags_count_toward_limit() {
    let app = test_app().await;
    let legacy = [
        ("legacy-1", json!({"name": "Old Lamp", "price": 5, "isPopular": true})),
        ("legacy-2", json!({"name": "Old Mug", "price": 5, "isPopular": "true"})),
        ("legacy-3", json!({"name": "Old Desk", "price": 5, "popular": "true"})),
    ];
    for (id, doc) in legacy {
        app.store
            .set("products", id, json_map_to_fields(doc.as_object().unwrap()))
            .await
            .unwrap();
    }
    let (status, _) = create_product(&app, "New Chair", true).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = create_product(&app, "One too many", true).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Maximum of 4 popular products allowed. Remove one from popular first."
    );

    let (_, listed) = send(&app.router, Method::GET, "/api/products?popular=true", None, None).await;
    let (_, popular) = send(&app.router, Method::GET, "/api/products/popular", None, None).await;
    assert_eq!(listed["data"].as_array().unwrap().len(), 4);
    assert_eq!(popular["data"].as_array().unwrap().len(), 4);

    // Re-marking a legacy product writes the canonical flag
    let (status, body) = send(
        &app.router,
        Method::PATCH,
        "/api/products/legacy-1/popular",
        ADMIN,
        Some(json!({"popular": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["popular"], true);
    let stored = app.store.get("products", "legacy-1").await.unwrap().unwrap();
    assert_eq!(stored.fields["popular"], Value::BooleanValue(true));
}

#[tokio::test]
async fn test_blank_names_are_rejected() {
    let app = test_app().await;

    let (status, body) = send(
        &app.router,
        Method::POST,
        "/api/products",
        ADMIN,
        Some(json!({"name": "   ", "price": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (_, body) = create_product(&app, "Mug", false).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();
    let (status, _) = send(
        &app.router,
        Method::PUT,
        &format!("/api/products/{}", id),
        ADMIN,
        Some(json!({"name": " \t "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app.router,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({"name": "  ", "email": "ada@example.com", "password": "secret1"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app.router,
        Method::PUT,
        "/api/admin/profile",
        ADMIN,
        Some(json!({"name": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["data"].is_null());

    let (_, body) = send(&app.router, Method::GET, "/api/admin/profile", ADMIN, None).await;
    assert_eq!(body["data"]["name"], "Owner");
}

#[tokio::test]
async fn test_internal_error_details_hidden_in_production() {
    for (environment, exposed) in [("development", true), ("production", false)] {
        let store = Arc::new(RecordingStore::new());
        store.broken.store(true, Ordering::SeqCst);
        let config = ApiConfig {
            environment: environment.to_string(),
            ..ApiConfig::default()
        };
        let state = AppState::with_parts(
            config,
            store,
            Arc::new(FakeVerifier),
            Arc::new(FakeIdentity::default()),
        );
        let router = create_router(state, None);

        let (status, body) = send(&router, Method::GET, "/api/products", None, None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        let message = body["message"].as_str().unwrap();
        assert_eq!(message.contains("10.0.0.3"), exposed, "{}", environment);
    }
}
