//! Concurrency-safe CRUD layer over an embedded transactional store.
//!
//! Every store-touching operation is funneled through one serial `Executor`;
//! the adapters in `service` only differ in how the outcome is delivered.

pub mod db;
pub mod engine;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{DbError, StoreConfig, StoreLocation};
pub use engine::{CrudEngine, CrudError, CrudResult, Executor, ExecutorConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig, LoggingError};
pub use model::entity::{Entity, PrimaryKey, Removed};
pub use model::query::{
    CompareOp, FetchQuery, FieldValue, Filter, QueryError, SortDirection, SortTerm,
};
pub use repo::entity_repo::RepoError;
pub use service::async_service::AsyncDatabaseService;
pub use service::database_service::DatabaseService;
pub use service::reactive_service::{ReactiveDatabaseService, SingleResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
