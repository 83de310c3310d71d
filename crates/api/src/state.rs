use std::sync::Arc;

use sortia_queue::TaskQueue;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already
/// `Clone`). The queue is a trait object so tests can substitute a fake
/// substrate.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: sortia_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// The async substrate runs are submitted to and reconciled against.
    pub queue: Arc<dyn TaskQueue>,
}
