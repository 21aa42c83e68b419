//! orderflow test utilities
//!
//! Shared fixtures and proptest generators. Every order produced here passes
//! validation and fits the relational column bounds.

pub use orderflow_core::{Delivery, Item, Order, Payment};

// ============================================================================
// FIXTURES
// ============================================================================

/// A fresh, time-sortable order UID.
pub fn new_order_uid() -> String {
    uuid::Uuid::now_v7().simple().to_string()
}

/// A valid order with a single item.
pub fn sample_order(order_uid: &str) -> Order {
    order_with_items(order_uid, 1)
}

/// A valid order with `count` distinct items (at least one).
pub fn order_with_items(order_uid: &str, count: usize) -> Order {
    let items: Vec<Item> = (0..count.max(1))
        .map(|i| sample_item(order_uid, i))
        .collect();
    let goods_total: i32 = items.iter().map(|i| i.total_price).sum();

    Order {
        order_uid: order_uid.to_string(),
        track_number: "WBILMTESTTRACK".to_string(),
        entry: "WBIL".to_string(),
        delivery: Delivery {
            name: "Test Testov".to_string(),
            phone: "+9720000000".to_string(),
            zip: "2639809".to_string(),
            city: "Kiryat Mozkin".to_string(),
            address: "Ploshad Mira 15".to_string(),
            region: "Kraiot".to_string(),
            email: "test@gmail.com".to_string(),
        },
        payment: Payment {
            transaction: order_uid.to_string(),
            request_id: String::new(),
            currency: "USD".to_string(),
            provider: "wbpay".to_string(),
            amount: goods_total + 1500,
            payment_dt: 1_637_907_727,
            bank: "alpha".to_string(),
            delivery_cost: 1500,
            goods_total,
            custom_fee: 0,
        },
        items,
        locale: "en".to_string(),
        internal_signature: String::new(),
        customer_id: "test".to_string(),
        delivery_service: "meest".to_string(),
        shardkey: "9".to_string(),
        sm_id: 99,
        date_created: "2021-11-26T06:22:19Z".to_string(),
        oof_shard: "1".to_string(),
    }
}

fn sample_item(order_uid: &str, index: usize) -> Item {
    let index = index as i64;
    Item {
        chrt_id: 9_934_930 + index,
        track_number: "WBILMTESTTRACK".to_string(),
        price: 453,
        rid: format!("{}-rid-{}", order_uid, index),
        name: "Mascaras".to_string(),
        sale: 30,
        size: "0".to_string(),
        total_price: 317,
        nm_id: 2_389_212 + index,
        brand: "Vivienne Sabo".to_string(),
        status: 202,
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use proptest::prelude::*;

    pub fn arb_order_uid() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9_-]{1,64}"
    }

    fn arb_text() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9 .,-]{0,40}"
    }

    pub fn arb_phone() -> impl Strategy<Value = String> {
        "\\+[1-9][0-9]{7,13}"
    }

    pub fn arb_email() -> impl Strategy<Value = String> {
        ("[a-z][a-z0-9]{0,15}", "[a-z]{1,12}", "(com|org|net|ru)")
            .prop_map(|(user, domain, tld)| format!("{}@{}.{}", user, domain, tld))
    }

    /// RFC 3339 timestamps in UTC.
    pub fn arb_date_created() -> impl Strategy<Value = String> {
        (2000u32..2035, 1u32..=12, 1u32..=28, 0u32..24, 0u32..60, 0u32..60).prop_map(
            |(y, mo, d, h, mi, s)| format!("{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z", y, mo, d, h, mi, s),
        )
    }

    pub fn arb_delivery() -> impl Strategy<Value = Delivery> {
        (
            arb_text(),
            arb_phone(),
            "[0-9]{5,7}",
            arb_text(),
            arb_text(),
            arb_text(),
            arb_email(),
        )
            .prop_map(|(name, phone, zip, city, address, region, email)| Delivery {
                name,
                phone,
                zip,
                city,
                address,
                region,
                email,
            })
    }

    pub fn arb_payment() -> impl Strategy<Value = Payment> {
        (
            "[a-z0-9]{1,32}",
            "[a-z0-9]{0,16}",
            "(USD|EUR|RUB)",
            "[a-z]{2,10}",
            1i32..10_000_000,
            0i64..2_000_000_000,
            "[a-z]{2,10}",
            0i32..100_000,
            0i32..10_000_000,
            0i32..10_000,
        )
            .prop_map(
                |(
                    transaction,
                    request_id,
                    currency,
                    provider,
                    amount,
                    payment_dt,
                    bank,
                    delivery_cost,
                    goods_total,
                    custom_fee,
                )| Payment {
                    transaction,
                    request_id,
                    currency,
                    provider,
                    amount,
                    payment_dt,
                    bank,
                    delivery_cost,
                    goods_total,
                    custom_fee,
                },
            )
    }

    pub fn arb_item() -> impl Strategy<Value = Item> {
        (
            any::<u32>(),
            "[A-Z]{4,14}",
            1i32..1_000_000,
            "[a-z0-9]{1,24}",
            arb_text(),
            0i32..100,
            "[0-9A-Z]{0,4}",
            0i32..1_000_000,
            any::<u32>(),
            arb_text(),
            0i32..1000,
        )
            .prop_map(
                |(chrt_id, track_number, price, rid, name, sale, size, total_price, nm_id, brand, status)| Item {
                    chrt_id: chrt_id as i64,
                    track_number,
                    price,
                    rid,
                    name,
                    sale,
                    size,
                    total_price,
                    nm_id: nm_id as i64,
                    brand,
                    status,
                },
            )
    }

    pub fn arb_order() -> impl Strategy<Value = Order> {
        (
            (
                arb_order_uid(),
                "[A-Z]{4,14}",
                "[A-Z]{2,6}",
                arb_delivery(),
                arb_payment(),
                prop::collection::vec(arb_item(), 1..6),
            ),
            (
                "(en|ru|de)",
                arb_text(),
                "[a-z0-9]{1,16}",
                "[a-z]{2,10}",
                "[0-9]{1,2}",
                0i32..1000,
                arb_date_created(),
                "[0-9]{1,2}",
            ),
        )
            .prop_map(
                |(
                    (order_uid, track_number, entry, delivery, payment, items),
                    (
                        locale,
                        internal_signature,
                        customer_id,
                        delivery_service,
                        shardkey,
                        sm_id,
                        date_created,
                        oof_shard,
                    ),
                )| Order {
                    order_uid,
                    track_number,
                    entry,
                    delivery,
                    payment,
                    items,
                    locale,
                    internal_signature,
                    customer_id,
                    delivery_service,
                    shardkey,
                    sm_id,
                    date_created,
                    oof_shard,
                },
            )
    }
}

pub use generators::{arb_item, arb_order};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_with_items_has_distinct_items() {
        let order = order_with_items("A1", 4);
        assert_eq!(order.items.len(), 4);
        assert_ne!(order.items[0], order.items[1]);
        assert_eq!(order.payment.goods_total, 4 * 317);
    }

    #[test]
    fn test_order_with_zero_items_still_has_one() {
        assert_eq!(order_with_items("A1", 0).items.len(), 1);
    }

    #[test]
    fn test_new_order_uid_is_unique() {
        assert_ne!(new_order_uid(), new_order_uid());
        assert_eq!(new_order_uid().len(), 32);
    }
}
