//! Document store abstraction.
//!
//! Repositories talk to a [`DocumentStore`]. The production wiring is a
//! [`FallbackStore`] over two Firestore clients: the service-account
//! client first, then the API-key client when the first is missing or
//! failing.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, warn};

use crate::convert::fields_to_json;
use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_fallback;
use crate::types::Fields;

/// A document read from a store.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub id: String,
    pub fields: Fields,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

impl DocumentRecord {
    /// Fields as a JSON object.
    pub fn to_json(&self) -> Map<String, JsonValue> {
        fields_to_json(&self.fields)
    }
}

/// Collection-oriented document storage.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short name used in logs and metrics.
    fn backend(&self) -> &'static str;

    async fn get(&self, collection: &str, id: &str) -> FirestoreResult<Option<DocumentRecord>>;

    /// Every document in a collection, ordered by id.
    async fn list(&self, collection: &str) -> FirestoreResult<Vec<DocumentRecord>>;

    /// Create a document. A `None` id lets the store assign one.
    ///
    /// Fails with `AlreadyExists` when the id is taken.
    async fn create(
        &self,
        collection: &str,
        id: Option<&str>,
        fields: Fields,
    ) -> FirestoreResult<DocumentRecord>;

    /// Create or fully replace a document.
    async fn set(&self, collection: &str, id: &str, fields: Fields) -> FirestoreResult<DocumentRecord>;

    /// Overwrite only the given fields of an existing document.
    ///
    /// Fails with `NotFound` when the document does not exist.
    async fn update(&self, collection: &str, id: &str, fields: Fields) -> FirestoreResult<()>;

    /// Delete a document. Deleting a missing document succeeds.
    async fn delete(&self, collection: &str, id: &str) -> FirestoreResult<()>;

    /// Cheap round trip used by readiness checks.
    async fn ping(&self) -> FirestoreResult<()>;
}

/// Tries the primary store, then the fallback.
///
/// Errors that describe the data (not found, already exists) are returned
/// as-is; anything else sends the operation to the fallback. A create is
/// replayed only when it names its document id.
pub struct FallbackStore {
    primary: Option<Arc<dyn DocumentStore>>,
    fallback: Arc<dyn DocumentStore>,
}

impl FallbackStore {
    pub fn new(primary: Option<Arc<dyn DocumentStore>>, fallback: Arc<dyn DocumentStore>) -> Self {
        if primary.is_none() {
            warn!(
                fallback = fallback.backend(),
                "No primary document store configured, using fallback only"
            );
        }
        Self { primary, fallback }
    }

    fn note_fallback(&self, operation: &'static str, primary: &dyn DocumentStore, err: &FirestoreError) {
        warn!(
            operation,
            primary = primary.backend(),
            fallback = self.fallback.backend(),
            "Primary document store failed, falling back: {}",
            err
        );
        record_fallback(operation, primary.backend(), self.fallback.backend());
    }

    async fn run<T, F, Fut>(&self, operation: &'static str, call: F) -> FirestoreResult<T>
    where
        F: Fn(Arc<dyn DocumentStore>) -> Fut,
        Fut: Future<Output = FirestoreResult<T>>,
    {
        let Some(primary) = &self.primary else {
            return call(Arc::clone(&self.fallback)).await;
        };

        match call(Arc::clone(primary)).await {
            Ok(value) => Ok(value),
            Err(e) if e.is_semantic() => Err(e),
            Err(e) => {
                self.note_fallback(operation, primary.as_ref(), &e);
                call(Arc::clone(&self.fallback)).await.map_err(|fallback_err| {
                    debug!(operation, "Fallback document store failed too: {}", fallback_err);
                    fallback_err
                })
            }
        }
    }
}

#[async_trait]
impl DocumentStore for FallbackStore {
    fn backend(&self) -> &'static str {
        match &self.primary {
            Some(primary) => primary.backend(),
            None => self.fallback.backend(),
        }
    }

    async fn get(&self, collection: &str, id: &str) -> FirestoreResult<Option<DocumentRecord>> {
        self.run("get", |store| async move { store.get(collection, id).await })
            .await
    }

    async fn list(&self, collection: &str) -> FirestoreResult<Vec<DocumentRecord>> {
        self.run("list", |store| async move { store.list(collection).await })
            .await
    }

    async fn create(
        &self,
        collection: &str,
        id: Option<&str>,
        fields: Fields,
    ) -> FirestoreResult<DocumentRecord> {
        let Some(primary) = &self.primary else {
            return self.fallback.create(collection, id, fields).await;
        };

        let err = match primary.create(collection, id, fields.clone()).await {
            Ok(record) => return Ok(record),
            Err(e) if e.is_semantic() => return Err(e),
            Err(e) => e,
        };

        // The primary may have committed before failing
        let Some(id) = id else {
            warn!(collection, "Primary create failed; not replaying without a document id: {}", err);
            return Err(err);
        };

        self.note_fallback("create", primary.as_ref(), &err);
        match self.fallback.create(collection, Some(id), fields).await {
            Err(FirestoreError::AlreadyExists(_)) => {
                debug!(collection, id, "Create was already committed by the primary store");
                self.fallback
                    .get(collection, id)
                    .await?
                    .ok_or_else(|| FirestoreError::not_found(format!("{}/{}", collection, id)))
            }
            result => result,
        }
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> FirestoreResult<DocumentRecord> {
        self.run("set", |store| {
            let fields = fields.clone();
            async move { store.set(collection, id, fields).await }
        })
        .await
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> FirestoreResult<()> {
        self.run("update", |store| {
            let fields = fields.clone();
            async move { store.update(collection, id, fields).await }
        })
        .await
    }

    async fn delete(&self, collection: &str, id: &str) -> FirestoreResult<()> {
        self.run("delete", |store| async move { store.delete(collection, id).await })
            .await
    }

    async fn ping(&self) -> FirestoreResult<()> {
        self.run("ping", |store| async move { store.ping().await }).await
    }
}

/// A store that is configured but cannot serve requests.
///
/// Used when neither credential mode is available so the server still
/// starts and readiness reports the problem.
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> FirestoreError {
        FirestoreError::Unavailable(self.reason.clone())
    }
}

#[async_trait]
impl DocumentStore for UnavailableStore {
    fn backend(&self) -> &'static str {
        "unavailable"
    }

    async fn get(&self, _collection: &str, _id: &str) -> FirestoreResult<Option<DocumentRecord>> {
        Err(self.error())
    }

    async fn list(&self, _collection: &str) -> FirestoreResult<Vec<DocumentRecord>> {
        Err(self.error())
    }

    async fn create(
        &self,
        _collection: &str,
        _id: Option<&str>,
        _fields: Fields,
    ) -> FirestoreResult<DocumentRecord> {
        Err(self.error())
    }

    async fn set(&self, _collection: &str, _id: &str, _fields: Fields) -> FirestoreResult<DocumentRecord> {
        Err(self.error())
    }

    async fn update(&self, _collection: &str, _id: &str, _fields: Fields) -> FirestoreResult<()> {
        Err(self.error())
    }

    async fn delete(&self, _collection: &str, _id: &str) -> FirestoreResult<()> {
        Err(self.error())
    }

    async fn ping(&self) -> FirestoreResult<()> {
        Err(self.error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::types::Value;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Commits creates to `inner`, then reports a server error.
    struct CommitThenFail {
        inner: Arc<MemoryStore>,
        creates: AtomicUsize,
    }

    impl CommitThenFail {
        fn new(inner: Arc<MemoryStore>) -> Self {
            Self {
                inner,
                creates: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DocumentStore for CommitThenFail {
        fn backend(&self) -> &'static str {
            "flaky"
        }

        async fn get(&self, collection: &str, id: &str) -> FirestoreResult<Option<DocumentRecord>> {
            self.inner.get(collection, id).await
        }

        async fn list(&self, collection: &str) -> FirestoreResult<Vec<DocumentRecord>> {
            self.inner.list(collection).await
        }

        async fn create(
            &self,
            collection: &str,
            id: Option<&str>,
            fields: Fields,
        ) -> FirestoreResult<DocumentRecord> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            self.inner.create(collection, id, fields).await?;
            Err(FirestoreError::ServerError(503, "deadline exceeded".into()))
        }

        async fn set(&self, collection: &str, id: &str, fields: Fields) -> FirestoreResult<DocumentRecord> {
            self.inner.set(collection, id, fields).await
        }

        async fn update(&self, collection: &str, id: &str, fields: Fields) -> FirestoreResult<()> {
            self.inner.update(collection, id, fields).await
        }

        async fn delete(&self, collection: &str, id: &str) -> FirestoreResult<()> {
            self.inner.delete(collection, id).await
        }

        async fn ping(&self) -> FirestoreResult<()> {
            self.inner.ping().await
        }
    }

    fn fields(name: &str) -> Fields {
        HashMap::from([("name".to_string(), Value::StringValue(name.to_string()))])
    }

    #[tokio::test]
    async fn test_missing_primary_uses_fallback() {
        let fallback = Arc::new(MemoryStore::new());
        let store = FallbackStore::new(None, fallback.clone());

        store.set("admin", "u1", fields("Ada")).await.unwrap();
        assert!(fallback.get("admin", "u1").await.unwrap().is_some());
        assert_eq!(store.backend(), "memory");
    }

    #[tokio::test]
    async fn test_failing_primary_falls_back() {
        let fallback = Arc::new(MemoryStore::new());
        fallback.set("admin", "u1", fields("Ada")).await.unwrap();

        let store = FallbackStore::new(
            Some(Arc::new(UnavailableStore::new("credentials rejected"))),
            fallback,
        );

        let record = store.get("admin", "u1").await.unwrap().unwrap();
        assert_eq!(record.fields["name"], Value::StringValue("Ada".into()));
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_semantic_errors_do_not_fall_back() {
        let primary = Arc::new(MemoryStore::new());
        let fallback = Arc::new(MemoryStore::new());
        fallback.set("products", "p1", fields("Lamp")).await.unwrap();

        let store = FallbackStore::new(Some(primary), fallback.clone());
        let err = store.update("products", "p1", fields("Desk")).await.unwrap_err();

        assert!(matches!(err, FirestoreError::NotFound(_)));
        let untouched = fallback.get("products", "p1").await.unwrap().unwrap();
        assert_eq!(untouched.fields["name"], Value::StringValue("Lamp".into()));
    }

    #[tokio::test]
    async fn test_create_committed_by_failing_primary_is_not_duplicated() {
        // Both access paths reach the same database
        let database = Arc::new(MemoryStore::new());
        let primary = Arc::new(CommitThenFail::new(database.clone()));
        let store = FallbackStore::new(Some(primary.clone()), database.clone());

        let record = store.create("products", Some("p1"), fields("Lamp")).await.unwrap();
        assert_eq!(record.id, "p1");
        assert_eq!(record.fields["name"], Value::StringValue("Lamp".into()));
        assert_eq!(database.list("products").await.unwrap().len(), 1);

        let err = store.create("products", None, fields("Desk")).await.unwrap_err();
        assert!(matches!(err, FirestoreError::ServerError(503, _)));
        assert_eq!(database.list("products").await.unwrap().len(), 2);
        assert_eq!(primary.creates.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_create_is_replayed_on_fallback() {
        let fallback = Arc::new(MemoryStore::new());
        let store = FallbackStore::new(
            Some(Arc::new(UnavailableStore::new("token refresh failed"))),
            fallback.clone(),
        );

        let record = store.create("admin", Some("u1"), fields("Ada")).await.unwrap();
        assert_eq!(record.id, "u1");
        assert!(fallback.get("admin", "u1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_both_failing_returns_fallback_error() {
        let store = FallbackStore::new(
            Some(Arc::new(UnavailableStore::new("primary down"))),
            Arc::new(UnavailableStore::new("fallback down")),
        );
        match store.list("orders").await {
            Err(FirestoreError::Unavailable(reason)) => assert_eq!(reason, "fallback down"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
