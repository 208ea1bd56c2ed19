//! Product catalog repository.
//!
//! Products live in the top-level `products` collection. At most
//! [`MAX_POPULAR_PRODUCTS`] may be flagged popular at any time; the check
//! runs before every write that turns the flag on. Popularity is read from
//! the normalized product, so legacy `isPopular` and string flags count too.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use storeadmin_models::{
    NewProduct, Product, ProductChange, ProductStatus, ProductUpdate, MAX_POPULAR_PRODUCTS,
    PRODUCTS_COLLECTION,
};

use crate::error::{FirestoreError, FirestoreResult};
use crate::store::{DocumentRecord, DocumentStore};
use crate::types::{Fields, ToFirestoreValue, Value};

/// Listing filters. `None` means "any".
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub status: Option<ProductStatus>,
    pub popular: Option<bool>,
    pub search: Option<String>,
}

impl ProductFilter {
    fn matches(&self, product: &Product) -> bool {
        let category_ok = self
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map_or(true, |c| product.category.eq_ignore_ascii_case(c));
        let status_ok = self.status.map_or(true, |s| product.status == s);
        let popular_ok = self.popular.map_or(true, |p| product.popular == p);
        let search_ok = self
            .search
            .as_deref()
            .map_or(true, |needle| product.matches_search(needle));

        category_ok && status_ok && popular_ok && search_ok
    }
}

/// Result of a partial update.
#[derive(Debug, Clone)]
pub struct ProductUpdateOutcome {
    pub product: Product,
    /// Field paths that were written; empty when nothing changed.
    pub changed_fields: Vec<&'static str>,
}

impl ProductUpdateOutcome {
    pub fn is_unchanged(&self) -> bool {
        self.changed_fields.is_empty()
    }
}

fn product_from_record(record: &DocumentRecord) -> Product {
    Product::from_fields(
        &record.id,
        &record.to_json(),
        record.create_time,
        record.update_time,
    )
}

fn product_to_fields(product: &Product) -> Fields {
    let mut fields = HashMap::new();
    fields.insert("name".to_string(), product.name.to_firestore_value());
    fields.insert("description".to_string(), product.description.to_firestore_value());
    fields.insert("price".to_string(), product.price.to_firestore_value());
    fields.insert("count".to_string(), product.count.to_firestore_value());
    fields.insert("category".to_string(), product.category.to_firestore_value());
    fields.insert("imageUrl".to_string(), product.image_url.to_firestore_value());
    fields.insert("status".to_string(), product.status.as_str().to_firestore_value());
    fields.insert("popular".to_string(), product.popular.to_firestore_value());
    fields.insert("createdBy".to_string(), product.created_by.to_firestore_value());
    fields.insert("createdAt".to_string(), product.created_at.to_firestore_value());
    fields.insert("updatedAt".to_string(), product.updated_at.to_firestore_value());
    fields
}

fn change_value(change: &ProductChange) -> Value {
    match change {
        ProductChange::Name(v) | ProductChange::Description(v) | ProductChange::Category(v) => {
            v.to_firestore_value()
        }
        ProductChange::Price(v) => v.to_firestore_value(),
        ProductChange::Count(v) => v.to_firestore_value(),
        ProductChange::ImageUrl(v) => v.to_firestore_value(),
        ProductChange::Status(v) => v.as_str().to_firestore_value(),
        ProductChange::Popular(v) => v.to_firestore_value(),
    }
}

/// Firestore-style 20 character id for a new product.
fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()[..20].to_string()
}

fn newest_first(products: &mut [Product]) {
    products.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}

/// Repository for catalog products.
#[derive(Clone)]
pub struct ProductRepository {
    store: Arc<dyn DocumentStore>,
}

impl ProductRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Products matching `filter`, newest first.
    pub async fn list(&self, filter: &ProductFilter) -> FirestoreResult<Vec<Product>> {
        let records = self.store.list(PRODUCTS_COLLECTION).await?;
        let mut products: Vec<Product> = records
            .iter()
            .map(product_from_record)
            .filter(|p| filter.matches(p))
            .collect();
        newest_first(&mut products);
        Ok(products)
    }

    pub async fn get(&self, id: &str) -> FirestoreResult<Option<Product>> {
        Ok(self
            .store
            .get(PRODUCTS_COLLECTION, id)
            .await?
            .as_ref()
            .map(product_from_record))
    }

    async fn require_record(&self, id: &str) -> FirestoreResult<DocumentRecord> {
        self.store
            .get(PRODUCTS_COLLECTION, id)
            .await?
            .ok_or_else(|| FirestoreError::not_found(format!("Product {} not found", id)))
    }

    async fn require(&self, id: &str) -> FirestoreResult<Product> {
        Ok(product_from_record(&self.require_record(id).await?))
    }

    /// Products currently flagged popular, newest first.
    pub async fn popular(&self) -> FirestoreResult<Vec<Product>> {
        self.list(&ProductFilter {
            popular: Some(true),
            ..Default::default()
        })
        .await
    }

    /// Number of popular products, not counting `excluding`.
    pub async fn popular_count(&self, excluding: Option<&str>) -> FirestoreResult<usize> {
        Ok(self
            .popular()
            .await?
            .iter()
            .filter(|p| Some(p.id.as_str()) != excluding)
            .count())
    }

    async fn ensure_popular_slot(&self, excluding: Option<&str>) -> FirestoreResult<()> {
        if self.popular_count(excluding).await? >= MAX_POPULAR_PRODUCTS {
            return Err(FirestoreError::invalid_argument(format!(
                "Maximum of {} popular products allowed. Remove one from popular first.",
                MAX_POPULAR_PRODUCTS
            )));
        }
        Ok(())
    }

    /// Store a new product under a freshly generated id.
    pub async fn create(
        &self,
        new_product: NewProduct,
        created_by: Option<String>,
    ) -> FirestoreResult<Product> {
        if new_product.popular {
            self.ensure_popular_slot(None).await?;
        }

        let product = new_product.into_product(generate_id(), created_by);
        self.store
            .create(PRODUCTS_COLLECTION, Some(&product.id), product_to_fields(&product))
            .await?;

        info!(product_id = %product.id, popular = product.popular, "Created product");
        Ok(product)
    }

    /// Write only the fields that differ from the stored product.
    pub async fn update(&self, id: &str, update: &ProductUpdate) -> FirestoreResult<ProductUpdateOutcome> {
        let mut product = self.require(id).await?;
        let changes = update.changes(&product);

        if changes.is_empty() {
            return Ok(ProductUpdateOutcome {
                product,
                changed_fields: Vec::new(),
            });
        }

        if changes.contains(&ProductChange::Popular(true)) {
            self.ensure_popular_slot(Some(id)).await?;
        }

        let now = Utc::now();
        let mut fields: Fields = changes
            .iter()
            .map(|c| (c.field().to_string(), change_value(c)))
            .collect();
        fields.insert("updatedAt".to_string(), now.to_firestore_value());

        self.store.update(PRODUCTS_COLLECTION, id, fields).await?;

        for change in &changes {
            change.apply(&mut product);
        }
        product.updated_at = Some(now);

        let changed_fields: Vec<&'static str> = changes.iter().map(ProductChange::field).collect();
        info!(product_id = %id, fields = ?changed_fields, "Updated product");

        Ok(ProductUpdateOutcome {
            product,
            changed_fields,
        })
    }

    /// Set the popular flag.
    pub async fn set_popular(&self, id: &str, popular: bool) -> FirestoreResult<Product> {
        let record = self.require_record(id).await?;
        self.write_popular(&record, popular).await
    }

    /// Flip the popular flag.
    pub async fn toggle_popular(&self, id: &str) -> FirestoreResult<Product> {
        let record = self.require_record(id).await?;
        let popular = !product_from_record(&record).popular;
        self.write_popular(&record, popular).await
    }

    /// Write the canonical boolean `popular` field unless it already holds
    /// `popular`.
    async fn write_popular(&self, record: &DocumentRecord, popular: bool) -> FirestoreResult<Product> {
        let mut product = product_from_record(record);
        if record.fields.get("popular") == Some(&Value::BooleanValue(popular)) {
            return Ok(product);
        }
        if popular && !product.popular {
            self.ensure_popular_slot(Some(&product.id)).await?;
        }

        let now = Utc::now();
        let fields = HashMap::from([
            ("popular".to_string(), popular.to_firestore_value()),
            ("updatedAt".to_string(), now.to_firestore_value()),
        ]);
        self.store.update(PRODUCTS_COLLECTION, &product.id, fields).await?;

        product.popular = popular;
        product.updated_at = Some(now);
        info!(product_id = %product.id, popular, "Changed product popularity");
        Ok(product)
    }

    /// Delete a product; `NotFound` when it does not exist.
    pub async fn delete(&self, id: &str) -> FirestoreResult<()> {
        self.require(id).await?;
        self.store.delete(PRODUCTS_COLLECTION, id).await?;
        info!(product_id = %id, "Deleted product");
        Ok(())
    }
}
