//! Order models and normalization of historical order shapes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ModelError;
use crate::normalize::{
    first_present, number_field, parse_string, round_cents, string_field, timestamp_field,
};

/// Firestore collection holding orders.
pub const ORDERS_COLLECTION: &str = "orders";

/// Keys that have held the line-item array over time, in priority order.
const ITEM_ARRAY_KEYS: [&str; 3] = ["products", "items", "cartItems"];

/// Keys that have held the order total over time, in priority order.
const TOTAL_KEYS: [&str; 3] = ["total", "amount", "totalAmount"];

/// Order fulfillment status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Map the spellings found in stored orders onto the canonical set.
    pub fn parse_lenient(s: &str) -> Option<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "pending" | "new" | "placed" | "awaiting_payment" => Some(Self::Pending),
            "processing" | "confirmed" | "paid" | "in_progress" => Some(Self::Processing),
            "shipped" | "in_transit" | "dispatched" | "out_for_delivery" => Some(Self::Shipped),
            "delivered" | "complete" | "completed" | "fulfilled" => Some(Self::Delivered),
            "cancelled" | "canceled" | "refunded" | "rejected" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Cancelled orders do not count towards revenue.
    pub fn counts_as_revenue(&self) -> bool {
        !matches!(self, OrderStatus::Cancelled)
    }
}

impl FromStr for OrderStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_lenient(s).ok_or_else(|| ModelError::InvalidOrderStatus(s.to_string()))
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Customer contact details attached to an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Shipping destination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub name: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
}

impl ShippingAddress {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(Self {
                street: Some(s.trim().to_string()),
                ..Default::default()
            }),
            Value::Object(map) => {
                let address = Self {
                    name: string_field(map, &["name", "fullName", "recipient"]),
                    street: string_field(map, &["street", "address", "line1", "addressLine1"]),
                    city: string_field(map, &["city"]),
                    state: string_field(map, &["state", "province", "region"]),
                    zip: string_field(map, &["zip", "zipCode", "postalCode"]),
                    country: string_field(map, &["country"]),
                };
                (address != Self::default()).then_some(address)
            }
            _ => None,
        }
    }
}

/// One line of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: Option<String>,
    pub name: String,
    pub quantity: u32,
    pub price: f64,
    pub subtotal: f64,
    pub image_url: Option<String>,
}

impl OrderItem {
    fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let quantity = number_field(map, &["quantity", "qty", "count"])
            .map(|q| q.max(0.0).round() as u32)
            .unwrap_or(1);
        let price = round_cents(number_field(map, &["price", "unitPrice"]).unwrap_or(0.0));

        Some(Self {
            product_id: string_field(map, &["productId", "id"]),
            name: string_field(map, &["name", "productName", "title"])
                .unwrap_or_else(|| "Unnamed item".to_string()),
            quantity,
            price,
            subtotal: round_cents(price * f64::from(quantity)),
            image_url: string_field(map, &["imageUrl", "image"]),
        })
    }
}

/// Canonical order, independent of the shape it was stored in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub customer: Customer,
    pub items: Vec<OrderItem>,
    /// Sum of item quantities
    pub item_count: u32,
    pub total: f64,
    pub status: OrderStatus,
    pub shipping_address: Option<ShippingAddress>,
    pub notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Normalize a stored order document.
    pub fn from_fields(
        id: &str,
        fields: &Map<String, Value>,
        create_time: Option<DateTime<Utc>>,
        update_time: Option<DateTime<Utc>>,
    ) -> Self {
        let items: Vec<OrderItem> = ITEM_ARRAY_KEYS
            .iter()
            .filter_map(|k| fields.get(*k).and_then(Value::as_array))
            .find(|arr| !arr.is_empty())
            .map(|arr| arr.iter().filter_map(OrderItem::from_value).collect())
            .unwrap_or_default();

        let total = number_field(fields, &TOTAL_KEYS)
            .unwrap_or_else(|| items.iter().map(|i| i.subtotal).sum());

        let status = first_present(fields, &["status", "orderStatus"])
            .and_then(parse_string)
            .and_then(|s| OrderStatus::parse_lenient(&s))
            .unwrap_or_default();

        let shipping_address = first_present(fields, &["shippingAddress", "address", "shipping"])
            .and_then(ShippingAddress::from_value);

        let customer = customer_from_fields(fields, shipping_address.as_ref());

        Self {
            id: id.to_string(),
            customer,
            item_count: items.iter().map(|i| i.quantity).sum(),
            items,
            total: round_cents(total),
            status,
            shipping_address,
            notes: string_field(fields, &["notes", "note", "comments"]),
            created_at: timestamp_field(fields, &["createdAt", "orderDate", "timestamp", "date"])
                .or(create_time),
            updated_at: timestamp_field(fields, &["updatedAt"]).or(update_time),
        }
    }

    /// Case-insensitive match on id, customer name, and customer email.
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.id.to_lowercase().contains(&needle)
            || self.customer.name.to_lowercase().contains(&needle)
            || self
                .customer
                .email
                .as_deref()
                .is_some_and(|e| e.to_lowercase().contains(&needle))
    }
}

fn customer_from_fields(fields: &Map<String, Value>, address: Option<&ShippingAddress>) -> Customer {
    let nested = first_present(fields, &["customer", "customerInfo", "user"]).and_then(Value::as_object);

    let name = pick(
        nested,
        fields,
        &["name", "fullName", "displayName"],
        &["customerName", "userName", "name"],
    )
    .or_else(|| address.and_then(|a| a.name.clone()))
    .unwrap_or_else(|| "Guest".to_string());

    Customer {
        name,
        email: pick(nested, fields, &["email"], &["customerEmail", "userEmail", "email"]),
        phone: pick(
            nested,
            fields,
            &["phone", "phoneNumber"],
            &["customerPhone", "phone", "phoneNumber"],
        ),
    }
}

/// Nested customer object first, then the flat legacy keys.
fn pick(
    nested: Option<&Map<String, Value>>,
    fields: &Map<String, Value>,
    nested_keys: &[&str],
    flat_keys: &[&str],
) -> Option<String> {
    nested
        .and_then(|n| string_field(n, nested_keys))
        .or_else(|| string_field(fields, flat_keys))
}

/// Aggregate figures over a set of orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderStats {
    pub total_orders: usize,
    pub total_revenue: f64,
    pub average_order_value: f64,
    pub by_status: BTreeMap<OrderStatus, usize>,
}

impl OrderStats {
    pub fn from_orders<'a>(orders: impl IntoIterator<Item = &'a Order>) -> Self {
        let mut by_status: BTreeMap<OrderStatus, usize> =
            OrderStatus::ALL.iter().map(|s| (*s, 0)).collect();
        let mut total_orders = 0usize;
        let mut revenue_orders = 0usize;
        let mut total_revenue = 0.0;

        for order in orders {
            total_orders += 1;
            *by_status.entry(order.status).or_default() += 1;
            if order.status.counts_as_revenue() {
                revenue_orders += 1;
                total_revenue += order.total;
            }
        }

        let average_order_value = if revenue_orders > 0 {
            round_cents(total_revenue / revenue_orders as f64)
        } else {
            0.0
        };

        Self {
            total_orders,
            total_revenue: round_cents(total_revenue),
            average_order_value,
            by_status,
        }
    }
}

/// Status change request.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order(fields: Value) -> Order {
        Order::from_fields("o1", fields.as_object().unwrap(), None, None)
    }

    #[test]
    fn test_items_from_products_array() {
        let o = order(json!({
            "products": [
                {"productName": "Mug", "qty": "2", "price": "$4.50"},
                {"name": "Tea", "quantity": 1, "unitPrice": 3}
            ]
        }));
        assert_eq!(o.items.len(), 2);
        assert_eq!(o.items[0].name, "Mug");
        assert_eq!(o.items[0].subtotal, 9.0);
        assert_eq!(o.item_count, 3);
        // No stored total: computed from items
        assert_eq!(o.total, 12.0);
    }

    #[test]
    fn test_items_fall_through_empty_arrays() {
        let o = order(json!({
            "products": [],
            "cartItems": [{"title": "Pot", "price": 20}]
        }));
        assert_eq!(o.items.len(), 1);
        assert_eq!(o.items[0].quantity, 1);
        assert_eq!(o.total, 20.0);
    }

    #[test]
    fn test_total_prefers_stored_fields() {
        let o = order(json!({"amount": "99.99", "items": [{"price": 1}]}));
        assert_eq!(o.total, 99.99);
        let o = order(json!({"totalAmount": 15}));
        assert_eq!(o.total, 15.0);
    }

    #[test]
    fn test_status_normalization() {
        assert_eq!(order(json!({"status": "Canceled"})).status, OrderStatus::Cancelled);
        assert_eq!(order(json!({"status": "COMPLETED"})).status, OrderStatus::Delivered);
        assert_eq!(order(json!({"status": "in transit"})).status, OrderStatus::Shipped);
        assert_eq!(order(json!({"status": "???"})).status, OrderStatus::Pending);
        assert_eq!(order(json!({})).status, OrderStatus::Pending);
    }

    #[test]
    fn test_customer_shapes() {
        let nested = order(json!({"customer": {"name": "Ada", "email": "ada@example.com"}}));
        assert_eq!(nested.customer.name, "Ada");
        assert_eq!(nested.customer.email.as_deref(), Some("ada@example.com"));

        let flat = order(json!({"customerName": "Bob", "customerPhone": "555"}));
        assert_eq!(flat.customer.name, "Bob");
        assert_eq!(flat.customer.phone.as_deref(), Some("555"));

        let from_address = order(json!({"shippingAddress": {"name": "Cy", "city": "Oslo"}}));
        assert_eq!(from_address.customer.name, "Cy");
        assert_eq!(
            from_address.shipping_address.unwrap().city.as_deref(),
            Some("Oslo")
        );

        assert_eq!(order(json!({})).customer.name, "Guest");
    }

    #[test]
    fn test_string_shipping_address() {
        let o = order(json!({"shippingAddress": "1 Main St"}));
        assert_eq!(o.shipping_address.unwrap().street.as_deref(), Some("1 Main St"));
    }

    #[test]
    fn test_created_at_fallbacks() {
        let o = order(json!({"orderDate": {"seconds": 1709294400, "nanoseconds": 0}}));
        assert_eq!(o.created_at.unwrap().timestamp(), 1709294400);

        let create_time = DateTime::from_timestamp(1_700_000_000, 0);
        let o = Order::from_fields("o2", &Map::new(), create_time, None);
        assert_eq!(o.created_at, create_time);
    }

    #[test]
    fn test_stats_exclude_cancelled_revenue() {
        let orders = vec![
            order(json!({"total": 10, "status": "delivered"})),
            order(json!({"total": 30, "status": "pending"})),
            order(json!({"total": 50, "status": "cancelled"})),
        ];
        let stats = OrderStats::from_orders(&orders);
        assert_eq!(stats.total_orders, 3);
        assert_eq!(stats.total_revenue, 40.0);
        assert_eq!(stats.average_order_value, 20.0);
        assert_eq!(stats.by_status[&OrderStatus::Cancelled], 1);
        assert_eq!(stats.by_status[&OrderStatus::Shipped], 0);
    }

    #[test]
    fn test_stats_serialize_status_keys() {
        let stats = OrderStats::from_orders(&Vec::<Order>::new());
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["byStatus"]["pending"], 0);
        assert_eq!(json["averageOrderValue"], 0.0);
    }

    #[test]
    fn test_matches_search() {
        let o = order(json!({"customer": {"name": "Ada Lovelace", "email": "ada@example.com"}}));
        assert!(o.matches_search("lovelace"));
        assert!(o.matches_search("EXAMPLE.COM"));
        assert!(o.matches_search("o1"));
        assert!(!o.matches_search("bob"));
    }
}
