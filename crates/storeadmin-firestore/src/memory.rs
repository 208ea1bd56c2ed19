//! In-process document store.
//!
//! Backs `STORE_BACKEND=memory` for local development and the API tests.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{FirestoreError, FirestoreResult};
use crate::store::{DocumentRecord, DocumentStore};
use crate::types::Fields;

type Collection = BTreeMap<String, DocumentRecord>;

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Firestore-style 20 character id.
    fn generate_id() -> String {
        Uuid::new_v4().simple().to_string()[..20].to_string()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, collection: &str, id: &str) -> FirestoreResult<Option<DocumentRecord>> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|c| c.get(id)).cloned())
    }

    async fn list(&self, collection: &str) -> FirestoreResult<Vec<DocumentRecord>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn create(
        &self,
        collection: &str,
        id: Option<&str>,
        fields: Fields,
    ) -> FirestoreResult<DocumentRecord> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();

        let id = match id {
            Some(id) if docs.contains_key(id) => {
                return Err(FirestoreError::AlreadyExists(format!("{}/{}", collection, id)));
            }
            Some(id) => id.to_string(),
            None => Self::generate_id(),
        };

        let now = Utc::now();
        let record = DocumentRecord {
            id: id.clone(),
            fields,
            create_time: Some(now),
            update_time: Some(now),
        };
        docs.insert(id, record.clone());
        Ok(record)
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> FirestoreResult<DocumentRecord> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();

        let now = Utc::now();
        let create_time = docs.get(id).and_then(|d| d.create_time).unwrap_or(now);
        let record = DocumentRecord {
            id: id.to_string(),
            fields,
            create_time: Some(create_time),
            update_time: Some(now),
        };
        docs.insert(id.to_string(), record.clone());
        Ok(record)
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> FirestoreResult<()> {
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(collection)
            .and_then(|c| c.get_mut(id))
            .ok_or_else(|| FirestoreError::not_found(format!("{}/{}", collection, id)))?;

        doc.fields.extend(fields);
        doc.update_time = Some(Utc::now());
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> FirestoreResult<()> {
        let mut collections = self.collections.write().await;
        if let Some(docs) = collections.get_mut(collection) {
            docs.remove(id);
        }
        Ok(())
    }

    async fn ping(&self) -> FirestoreResult<()> {
        Ok(())
    }
}
