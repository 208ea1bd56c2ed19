//! Admin profile repository (`admin/{uid}`).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use storeadmin_models::{AdminProfile, ProfileUpdate, ADMIN_COLLECTION};

use crate::error::{FirestoreError, FirestoreResult};
use crate::store::DocumentStore;
use crate::types::{Fields, ToFirestoreValue};

fn profile_to_fields(profile: &AdminProfile) -> Fields {
    let mut fields = HashMap::new();
    fields.insert("uid".to_string(), profile.uid.to_firestore_value());
    fields.insert("name".to_string(), profile.name.to_firestore_value());
    fields.insert("email".to_string(), profile.email.to_firestore_value());
    fields.insert("avatarUrl".to_string(), profile.avatar_url.to_firestore_value());
    fields.insert("createdAt".to_string(), profile.created_at.to_firestore_value());
    fields.insert("updatedAt".to_string(), profile.updated_at.to_firestore_value());
    fields
}

#[derive(Clone)]
pub struct AdminRepository {
    store: Arc<dyn DocumentStore>,
}

impl AdminRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, uid: &str) -> FirestoreResult<Option<AdminProfile>> {
        Ok(self.store.get(ADMIN_COLLECTION, uid).await?.map(|record| {
            AdminProfile::from_fields(
                &record.id,
                &record.to_json(),
                record.create_time,
                record.update_time,
            )
        }))
    }

    /// Store a new profile keyed by its uid.
    pub async fn create(&self, profile: &AdminProfile) -> FirestoreResult<()> {
        self.store
            .create(ADMIN_COLLECTION, Some(&profile.uid), profile_to_fields(profile))
            .await?;
        info!(uid = %profile.uid, "Created admin profile");
        Ok(())
    }

    /// Apply the provided fields. An empty avatar URL clears it.
    pub async fn update(&self, uid: &str, update: &ProfileUpdate) -> FirestoreResult<AdminProfile> {
        let mut profile = self
            .get(uid)
            .await?
            .ok_or_else(|| FirestoreError::not_found(format!("Admin profile {} not found", uid)))?;

        let now = Utc::now();
        let mut fields: Fields = HashMap::new();

        if let Some(name) = update.name.as_deref().map(str::trim) {
            profile.name = name.to_string();
            fields.insert("name".to_string(), profile.name.to_firestore_value());
        }
        if let Some(avatar_url) = update.avatar_url.as_deref().map(str::trim) {
            profile.avatar_url = (!avatar_url.is_empty()).then(|| avatar_url.to_string());
            fields.insert("avatarUrl".to_string(), profile.avatar_url.to_firestore_value());
        }
        fields.insert("updatedAt".to_string(), now.to_firestore_value());
        profile.updated_at = Some(now);

        self.store.update(ADMIN_COLLECTION, uid, fields).await?;
        info!(uid = %uid, "Updated admin profile");
        Ok(profile)
    }
}
