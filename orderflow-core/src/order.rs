//! Order aggregate: header plus owned delivery, payment and item records.
//!
//! Field order of every struct follows the JSON wire format, which is shared
//! by the broker payload, the HTTP response and the cache blob. Serializing a
//! decoded order therefore reproduces the same key order.

use serde::{Deserialize, Serialize};

/// Natural identifier of an order. Also the idempotency key for ingestion.
pub type OrderUid = String;

/// The order aggregate.
///
/// Missing JSON fields decode to their defaults so that structurally thin
/// payloads such as `{"order_uid":"","items":[]}` reach validation instead of
/// being rejected as undecodable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(default)]
pub struct Order {
    pub order_uid: OrderUid,
    pub track_number: String,
    pub entry: String,
    pub delivery: Delivery,
    pub payment: Payment,
    pub items: Vec<Item>,
    pub locale: String,
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    pub sm_id: i32,
    /// RFC 3339 timestamp, kept as text so the stored value round-trips exactly.
    #[cfg_attr(feature = "openapi", schema(format = "date-time"))]
    pub date_created: String,
    pub oof_shard: String,
}

/// Delivery record (1:1 with the order).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(default)]
pub struct Delivery {
    pub name: String,
    pub phone: String,
    pub zip: String,
    pub city: String,
    pub address: String,
    pub region: String,
    pub email: String,
}

/// Payment record (1:1 with the order). Money values are in minor units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(default)]
pub struct Payment {
    pub transaction: String,
    pub request_id: String,
    pub currency: String,
    pub provider: String,
    pub amount: i32,
    /// Epoch seconds.
    pub payment_dt: i64,
    pub bank: String,
    pub delivery_cost: i32,
    pub goods_total: i32,
    pub custom_fee: i32,
}

/// A single line item (1:N with the order).
///
/// `Ord` compares every field in declaration order, so sorting gives a
/// canonical item order for multiset comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(default)]
pub struct Item {
    pub chrt_id: i64,
    pub track_number: String,
    pub price: i32,
    pub rid: String,
    pub name: String,
    pub sale: i32,
    pub size: String,
    pub total_price: i32,
    pub nm_id: i64,
    pub brand: String,
    pub status: i32,
}

impl Order {
    /// Decode an order from its JSON wire form.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Encode the order into its JSON wire form.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Whether `other` describes the same aggregate with items compared as a
    /// multiset. Stores are free to return items in any order.
    pub fn same_aggregate(&self, other: &Order) -> bool {
        let mut header_a = self.clone();
        let mut header_b = other.clone();
        let mut items_a = std::mem::take(&mut header_a.items);
        let mut items_b = std::mem::take(&mut header_b.items);
        if header_a != header_b || items_a.len() != items_b.len() {
            return false;
        }
        items_a.sort();
        items_b.sort();
        items_a == items_b
    }
}
