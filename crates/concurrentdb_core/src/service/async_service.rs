//! async/await adapter.
//!
//! Every method enqueues its operation before returning; the future only waits
//! for the outcome. Dropping it abandons the result, never the operation.
//! Futures are runtime-agnostic and the work always runs on the executor
//! worker, never on the awaiting task.

use super::{ops, start_executor};
use crate::db::StoreConfig;
use crate::engine::{CrudEngine, CrudError, CrudResult, Executor, ExecutorConfig};
use crate::model::entity::{Entity, PrimaryKey, Removed};
use crate::model::query::{FetchQuery, Filter, SortTerm};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;

/// async/await front end of the store.
#[derive(Clone)]
pub struct AsyncDatabaseService {
    executor: Arc<Executor>,
}

impl AsyncDatabaseService {
    pub fn open(config: StoreConfig) -> CrudResult<Self> {
        Self::open_with(config, ExecutorConfig::default())
    }

    pub fn open_with(config: StoreConfig, executor_config: ExecutorConfig) -> CrudResult<Self> {
        Ok(Self::with_executor(start_executor(config, executor_config)?))
    }

    pub fn with_executor(executor: Arc<Executor>) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    pub fn create<T: Entity>(
        &self,
        entity: T,
    ) -> impl Future<Output = CrudResult<()>> + Send + 'static {
        self.run(ops::create(vec![entity]))
    }

    pub fn create_many<T: Entity>(
        &self,
        entities: Vec<T>,
    ) -> impl Future<Output = CrudResult<()>> + Send + 'static {
        self.run(ops::create(entities))
    }

    pub fn read<T: Entity>(
        &self,
        primary_key: impl Into<PrimaryKey>,
    ) -> impl Future<Output = CrudResult<T>> + Send + 'static {
        self.run(ops::read(primary_key.into()))
    }

    pub fn read_first<T: Entity>(
        &self,
        filter: Filter,
    ) -> impl Future<Output = CrudResult<T>> + Send + 'static {
        self.run(ops::read_first(filter))
    }

    pub fn read_all<T: Entity>(
        &self,
    ) -> impl Future<Output = CrudResult<Vec<T>>> + Send + 'static {
        self.run(ops::read_query(FetchQuery::default()))
    }

    pub fn read_filtered<T: Entity>(
        &self,
        filter: Filter,
    ) -> impl Future<Output = CrudResult<Vec<T>>> + Send + 'static {
        self.run(ops::read_query(FetchQuery::filtered(filter)))
    }

    pub fn read_sorted<T: Entity>(
        &self,
        sort: Vec<SortTerm>,
    ) -> impl Future<Output = CrudResult<Vec<T>>> + Send + 'static {
        self.run(ops::read_query(FetchQuery::sorted(sort)))
    }

    pub fn read_query<T: Entity>(
        &self,
        query: FetchQuery,
    ) -> impl Future<Output = CrudResult<Vec<T>>> + Send + 'static {
        self.run(ops::read_query(query))
    }

    pub fn update<T, F>(
        &self,
        primary_key: impl Into<PrimaryKey>,
        update: F,
    ) -> impl Future<Output = CrudResult<()>> + Send + 'static
    where
        T: Entity,
        F: FnOnce(&mut T) + Send + 'static,
    {
        self.run(ops::update(primary_key.into(), update))
    }

    pub fn update_many<T, F>(
        &self,
        primary_keys: Vec<PrimaryKey>,
        update: F,
    ) -> impl Future<Output = CrudResult<()>> + Send + 'static
    where
        T: Entity,
        F: FnOnce(&mut [T]) + Send + 'static,
    {
        self.run(ops::update_many(primary_keys, update))
    }

    pub fn delete<T: Entity>(
        &self,
        primary_key: impl Into<PrimaryKey>,
    ) -> impl Future<Output = CrudResult<Removed<T>>> + Send + 'static {
        self.run(ops::delete(primary_key.into()))
    }

    pub fn delete_many<T: Entity>(
        &self,
        primary_keys: Vec<PrimaryKey>,
    ) -> impl Future<Output = CrudResult<Vec<Removed<T>>>> + Send + 'static {
        self.run(ops::delete_many(primary_keys))
    }

    pub fn erase(&self) -> impl Future<Output = CrudResult<()>> + Send + 'static {
        self.run(ops::erase())
    }

    fn run<R, Op>(&self, op: Op) -> impl Future<Output = CrudResult<R>> + Send + 'static
    where
        R: Send + 'static,
        Op: FnOnce(&CrudEngine) -> CrudResult<R> + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        self.executor.submit(op, move |outcome| {
            let _ = sender.send(outcome);
        });
        async move {
            receiver.await.unwrap_or_else(|_| {
                Err(CrudError::Unexpected(
                    "operation ended without delivering a result".to_string(),
                ))
            })
        }
    }
}
