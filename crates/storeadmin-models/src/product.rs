//! Product catalog models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use crate::error::ModelError;
use crate::normalize::{
    first_present, not_blank, number_field, parse_bool, parse_number, round_cents, string_field,
    timestamp_field,
};

/// Firestore collection holding products.
pub const PRODUCTS_COLLECTION: &str = "products";

/// Maximum number of products flagged as popular at the same time.
pub const MAX_POPULAR_PRODUCTS: usize = 4;

/// Product visibility status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    /// Listed in the storefront
    #[default]
    Active,
    /// Hidden from the storefront
    Inactive,
    /// Not yet published
    Draft,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Active => "active",
            ProductStatus::Inactive => "inactive",
            ProductStatus::Draft => "draft",
        }
    }

    /// Lenient parse used for stored documents. Unknown values are `None`.
    pub fn parse_lenient(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" | "published" | "available" | "in_stock" | "instock" => Some(Self::Active),
            "inactive" | "hidden" | "disabled" | "archived" | "unavailable" => Some(Self::Inactive),
            "draft" | "pending" => Some(Self::Draft),
            _ => None,
        }
    }
}

impl FromStr for ProductStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_lenient(s).ok_or_else(|| ModelError::InvalidProductStatus(s.to_string()))
    }
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Product stored at `products/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    /// Units in stock
    pub count: i64,
    pub category: String,
    pub image_url: Option<String>,
    pub status: ProductStatus,
    pub popular: bool,
    /// Uid of the admin who created the product
    pub created_by: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Read a product from loosely shaped document fields.
    pub fn from_fields(
        id: &str,
        fields: &Map<String, Value>,
        create_time: Option<DateTime<Utc>>,
        update_time: Option<DateTime<Utc>>,
    ) -> Self {
        let status = string_field(fields, &["status"])
            .and_then(|s| ProductStatus::parse_lenient(&s))
            .unwrap_or_default();

        Self {
            id: id.to_string(),
            name: string_field(fields, &["name", "title", "productName"])
                .unwrap_or_else(|| "Untitled product".to_string()),
            description: string_field(fields, &["description", "desc"]).unwrap_or_default(),
            price: round_cents(number_field(fields, &["price"]).unwrap_or(0.0).max(0.0)),
            count: number_field(fields, &["count", "stock", "quantity"])
                .map(|c| c.max(0.0).round() as i64)
                .unwrap_or(0),
            category: string_field(fields, &["category"]).unwrap_or_default(),
            image_url: string_field(fields, &["imageUrl", "image", "imageURL"]),
            status,
            popular: first_present(fields, &["popular", "isPopular"])
                .and_then(parse_bool)
                .unwrap_or(false),
            created_by: string_field(fields, &["createdBy"]),
            created_at: timestamp_field(fields, &["createdAt"]).or(create_time),
            updated_at: timestamp_field(fields, &["updatedAt"]).or(update_time),
        }
    }

    /// Case-insensitive substring match on name, description, and category.
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
            || self.category.to_lowercase().contains(&needle)
    }
}

/// Product creation form.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    #[validate(
        length(min = 1, max = 200, message = "Product name must be 1-200 characters"),
        custom(function = "not_blank")
    )]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 5000, message = "Description is too long"))]
    pub description: String,
    #[serde(deserialize_with = "de_number")]
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: f64,
    #[serde(default, deserialize_with = "de_integer")]
    #[validate(range(min = 0, message = "Count cannot be negative"))]
    pub count: i64,
    #[serde(default)]
    #[validate(length(max = 100, message = "Category is too long"))]
    pub category: String,
    #[serde(default)]
    #[validate(url(message = "Image URL must be a valid URL"))]
    pub image_url: Option<String>,
    #[serde(default)]
    pub status: Option<ProductStatus>,
    #[serde(default, deserialize_with = "de_bool")]
    pub popular: bool,
}

impl NewProduct {
    /// Materialize the product that will be stored under `id`.
    pub fn into_product(self, id: impl Into<String>, created_by: Option<String>) -> Product {
        let now = Utc::now();
        Product {
            id: id.into(),
            name: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            price: round_cents(self.price),
            count: self.count,
            category: self.category.trim().to_string(),
            image_url: self.image_url.filter(|u| !u.trim().is_empty()),
            status: self.status.unwrap_or_default(),
            popular: self.popular,
            created_by,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }
}

/// Partial product update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    #[serde(default)]
    #[validate(
        length(min = 1, max = 200, message = "Product name must be 1-200 characters"),
        custom(function = "not_blank")
    )]
    pub name: Option<String>,
    #[serde(default)]
    #[validate(length(max = 5000, message = "Description is too long"))]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "de_opt_number")]
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_integer")]
    #[validate(range(min = 0, message = "Count cannot be negative"))]
    pub count: Option<i64>,
    #[serde(default)]
    #[validate(length(max = 100, message = "Category is too long"))]
    pub category: Option<String>,
    /// An empty string clears the image.
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub status: Option<ProductStatus>,
    #[serde(default, deserialize_with = "de_opt_bool")]
    pub popular: Option<bool>,
}

/// A single field that differs from the stored product.
#[derive(Debug, Clone, PartialEq)]
pub enum ProductChange {
    Name(String),
    Description(String),
    Price(f64),
    Count(i64),
    Category(String),
    ImageUrl(Option<String>),
    Status(ProductStatus),
    Popular(bool),
}

impl ProductChange {
    /// Firestore field path written by this change.
    pub fn field(&self) -> &'static str {
        match self {
            ProductChange::Name(_) => "name",
            ProductChange::Description(_) => "description",
            ProductChange::Price(_) => "price",
            ProductChange::Count(_) => "count",
            ProductChange::Category(_) => "category",
            ProductChange::ImageUrl(_) => "imageUrl",
            ProductChange::Status(_) => "status",
            ProductChange::Popular(_) => "popular",
        }
    }

    /// Apply the change to an in-memory product.
    pub fn apply(&self, product: &mut Product) {
        match self {
            ProductChange::Name(v) => product.name = v.clone(),
            ProductChange::Description(v) => product.description = v.clone(),
            ProductChange::Price(v) => product.price = *v,
            ProductChange::Count(v) => product.count = *v,
            ProductChange::Category(v) => product.category = v.clone(),
            ProductChange::ImageUrl(v) => product.image_url = v.clone(),
            ProductChange::Status(v) => product.status = *v,
            ProductChange::Popular(v) => product.popular = *v,
        }
    }
}

impl ProductUpdate {
    /// Fields whose submitted value differs from `existing`.
    ///
    /// Strings are compared after trimming; an empty image URL clears it.
    pub fn changes(&self, existing: &Product) -> Vec<ProductChange> {
        let mut changes = Vec::new();

        if let Some(name) = self.name.as_deref().map(str::trim) {
            if name != existing.name {
                changes.push(ProductChange::Name(name.to_string()));
            }
        }
        if let Some(description) = self.description.as_deref().map(str::trim) {
            if description != existing.description {
                changes.push(ProductChange::Description(description.to_string()));
            }
        }
        if let Some(price) = self.price.map(round_cents) {
            if (price - existing.price).abs() > f64::EPSILON {
                changes.push(ProductChange::Price(price));
            }
        }
        if let Some(count) = self.count {
            if count != existing.count {
                changes.push(ProductChange::Count(count));
            }
        }
        if let Some(category) = self.category.as_deref().map(str::trim) {
            if category != existing.category {
                changes.push(ProductChange::Category(category.to_string()));
            }
        }
        if let Some(image_url) = self.image_url.as_deref().map(str::trim) {
            let image_url = (!image_url.is_empty()).then(|| image_url.to_string());
            if image_url != existing.image_url {
                changes.push(ProductChange::ImageUrl(image_url));
            }
        }
        if let Some(status) = self.status {
            if status != existing.status {
                changes.push(ProductChange::Status(status));
            }
        }
        if let Some(popular) = self.popular {
            if popular != existing.popular {
                changes.push(ProductChange::Popular(popular));
            }
        }

        changes
    }
}

/// Body of the popular toggle endpoint. Without a body the flag is flipped.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PopularToggle {
    #[serde(default, deserialize_with = "de_opt_bool")]
    pub popular: Option<bool>,
}

// Form submissions send numbers as strings; accept both.

fn de_number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let v = Value::deserialize(d)?;
    parse_number(&v).ok_or_else(|| serde::de::Error::custom("expected a number"))
}

fn de_integer<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    de_number(d).map(|f| f.round() as i64)
}

fn de_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    let v = Value::deserialize(d)?;
    parse_bool(&v).ok_or_else(|| serde::de::Error::custom("expected a boolean"))
}

fn de_opt_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(None),
        v => parse_number(&v)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("expected a number")),
    }
}

fn de_opt_integer<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    de_opt_number(d).map(|o| o.map(|f| f.round() as i64))
}

fn de_opt_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(None),
        v => parse_bool(&v)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("expected a boolean")),
    }
}
