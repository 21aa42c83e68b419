//! orderflow core - Order aggregate types
//!
//! Pure data structures shared by every other crate. The aggregate is the
//! single unit of ingestion, persistence, caching and lookup. This crate holds
//! no I/O and no validation policy.

pub mod error;
pub mod order;

pub use error::{
    CacheError, CacheResult, ConfigError, OrderError, OrderResult, StoreError, StoreResult,
    ValidationError, ValidationErrors,
};
pub use order::{Delivery, Item, Order, OrderUid, Payment};

/// Maximum length of an `order_uid`, matching the `orders.order_uid` column.
pub const MAX_ORDER_UID_LEN: usize = 64;

/// Maximum length of any other text column in the aggregate.
pub const MAX_TEXT_LEN: usize = 255;
