//! Service Layer
//!
//! The save and get use cases plus the boot-time cache warmer. Services hold
//! the repository and cache as trait objects so every caller (the ingestion
//! worker, the HTTP routes, tests) drives the same logic.

mod cache_warmer;
mod get_order;
mod save_order;

pub use cache_warmer::*;
pub use get_order::*;
pub use save_order::*;
