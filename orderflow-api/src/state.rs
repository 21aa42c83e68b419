//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use orderflow_storage::{OrderCache, OrderRepository};

use crate::services::{CacheWarmer, GetOrderService, SaveOrderService};

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Relational store, also checked by readiness.
    pub repo: Arc<dyn OrderRepository>,
    pub cache: Arc<dyn OrderCache>,
    pub get_order: GetOrderService,
    pub save_order: SaveOrderService,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(repo: Arc<dyn OrderRepository>, cache: Arc<dyn OrderCache>) -> Self {
        Self {
            get_order: GetOrderService::new(repo.clone(), cache.clone()),
            save_order: SaveOrderService::new(repo.clone(), cache.clone()),
            repo,
            cache,
            start_time: Instant::now(),
        }
    }

    /// A warmer over the same repository and cache.
    pub fn cache_warmer(&self) -> CacheWarmer {
        CacheWarmer::new(self.repo.clone(), self.cache.clone())
    }
}

crate::impl_from_ref!(GetOrderService, get_order);
crate::impl_from_ref!(SaveOrderService, save_order);
