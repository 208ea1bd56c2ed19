//! Order repository.
//!
//! Orders are written by the storefront in several historical shapes; every
//! read goes through `Order::from_fields` so callers only see the canonical
//! form.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use storeadmin_models::{Order, OrderStats, OrderStatus, ORDERS_COLLECTION};

use crate::error::{FirestoreError, FirestoreResult};
use crate::store::{DocumentRecord, DocumentStore};
use crate::types::ToFirestoreValue;

/// Listing filters.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    /// Matches order id, customer name, or customer email.
    pub search: Option<String>,
    pub limit: Option<usize>,
}

fn order_from_record(record: &DocumentRecord) -> Order {
    Order::from_fields(
        &record.id,
        &record.to_json(),
        record.create_time,
        record.update_time,
    )
}

#[derive(Clone)]
pub struct OrderRepository {
    store: Arc<dyn DocumentStore>,
}

impl OrderRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    async fn all(&self) -> FirestoreResult<Vec<Order>> {
        let records = self.store.list(ORDERS_COLLECTION).await?;
        let mut orders: Vec<Order> = records.iter().map(order_from_record).collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(orders)
    }

    /// Orders matching `filter`, newest first.
    pub async fn list(&self, filter: &OrderFilter) -> FirestoreResult<Vec<Order>> {
        let orders = self.all().await?.into_iter().filter(|o| {
            filter.status.map_or(true, |s| o.status == s)
                && filter.search.as_deref().map_or(true, |q| o.matches_search(q))
        });

        Ok(match filter.limit {
            Some(limit) => orders.take(limit).collect(),
            None => orders.collect(),
        })
    }

    /// The `n` most recent orders.
    pub async fn recent(&self, n: usize) -> FirestoreResult<Vec<Order>> {
        self.list(&OrderFilter {
            limit: Some(n),
            ..Default::default()
        })
        .await
    }

    pub async fn get(&self, id: &str) -> FirestoreResult<Option<Order>> {
        Ok(self
            .store
            .get(ORDERS_COLLECTION, id)
            .await?
            .as_ref()
            .map(order_from_record))
    }

    async fn require(&self, id: &str) -> FirestoreResult<Order> {
        self.get(id)
            .await?
            .ok_or_else(|| FirestoreError::not_found(format!("Order {} not found", id)))
    }

    /// Set the canonical status and bump `updatedAt`.
    pub async fn update_status(&self, id: &str, status: OrderStatus) -> FirestoreResult<Order> {
        let mut order = self.require(id).await?;

        let now = Utc::now();
        let fields = HashMap::from([
            ("status".to_string(), status.as_str().to_firestore_value()),
            ("updatedAt".to_string(), now.to_firestore_value()),
        ]);
        self.store.update(ORDERS_COLLECTION, id, fields).await?;

        info!(order_id = %id, from = %order.status, to = %status, "Updated order status");
        order.status = status;
        order.updated_at = Some(now);
        Ok(order)
    }

    /// Delete an order; `NotFound` when it does not exist.
    pub async fn delete(&self, id: &str) -> FirestoreResult<()> {
        self.require(id).await?;
        self.store.delete(ORDERS_COLLECTION, id).await?;
        info!(order_id = %id, "Deleted order");
        Ok(())
    }

    /// Aggregate figures over every order.
    pub async fn stats(&self) -> FirestoreResult<OrderStats> {
        Ok(OrderStats::from_orders(&self.all().await?))
    }
}
