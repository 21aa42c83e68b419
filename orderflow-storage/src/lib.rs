//! orderflow storage - repository and cache contracts
//!
//! The relational store owns durable state; the cache is a derived view of
//! it. Both are expressed as async traits so the use cases can run against
//! Postgres/Redis in production and against the in-memory implementations in
//! this crate during tests and local runs.

pub mod cache;
pub mod memory;
pub mod repository;

pub use cache::{decode_order, encode_order, OrderCache};
pub use memory::{InMemoryOrderCache, InMemoryOrderRepository};
pub use repository::OrderRepository;
