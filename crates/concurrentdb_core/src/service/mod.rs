//! Adapter services over the serialized engine.
//!
//! # Responsibility
//! - Expose one CRUD method set through three completion idioms: callback
//!   (`DatabaseService`), single-value stream/future
//!   (`ReactiveDatabaseService`), and async/await (`AsyncDatabaseService`).
//! - Route every call through the shared `Executor`.
//!
//! # Invariants
//! - Services never implement CRUD semantics themselves; every method is an
//!   `ops` builder submitted to the executor.
//! - The `CrudError` produced by the engine reaches the caller unchanged,
//!   except that one-key batch failures are narrowed to that key's error.

use crate::db::StoreConfig;
use crate::engine::{CrudEngine, CrudError, CrudResult, Executor, ExecutorConfig};
use std::sync::Arc;

pub mod async_service;
pub mod database_service;
mod ops;
pub mod reactive_service;

/// Opens the store and moves its engine onto a new executor.
pub fn start_executor(
    config: StoreConfig,
    executor_config: ExecutorConfig,
) -> CrudResult<Arc<Executor>> {
    let engine = CrudEngine::open(config)?;
    let executor = Executor::spawn(engine, executor_config).map_err(|err| {
        CrudError::Unexpected(format!("failed to spawn executor worker: {err}"))
    })?;
    Ok(Arc::new(executor))
}
