// Oxidized Pharma - Multi-agent clinical trial pipeline and pharmaceutical AI agents

pub mod config;
pub mod models;
pub mod types;
pub mod agents;
pub mod analysis;
pub mod analysis_registry;
pub mod llm;
pub mod routes;
pub mod middleware;
pub mod queue;
pub mod trials;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;
// Note: Import specific items from types module instead of glob to avoid name conflicts
// e.g., use oxidized_pharma::types::{AppError, AppResult};

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
