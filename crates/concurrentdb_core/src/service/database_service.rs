//! Callback adapter.
//!
//! Every method returns immediately; `completion` runs exactly once on the
//! executor worker thread with the outcome.

use super::{ops, start_executor};
use crate::db::StoreConfig;
use crate::engine::{CrudEngine, CrudResult, Executor, ExecutorConfig};
use crate::model::entity::{Entity, PrimaryKey, Removed};
use crate::model::query::{FetchQuery, Filter, SortTerm};
use std::sync::Arc;

/// Completion-callback front end of the store.
#[derive(Clone)]
pub struct DatabaseService {
    executor: Arc<Executor>,
}

impl DatabaseService {
    pub fn open(config: StoreConfig) -> CrudResult<Self> {
        Self::open_with(config, ExecutorConfig::default())
    }

    pub fn open_with(config: StoreConfig, executor_config: ExecutorConfig) -> CrudResult<Self> {
        Ok(Self::with_executor(start_executor(config, executor_config)?))
    }

    /// Shares an existing executor, e.g. with another adapter.
    pub fn with_executor(executor: Arc<Executor>) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    pub fn create<T, C>(&self, entity: T, completion: C)
    where
        T: Entity,
        C: FnOnce(CrudResult<()>) + Send + 'static,
    {
        self.submit(ops::create(vec![entity]), completion);
    }

    pub fn create_many<T, C>(&self, entities: Vec<T>, completion: C)
    where
        T: Entity,
        C: FnOnce(CrudResult<()>) + Send + 'static,
    {
        self.submit(ops::create(entities), completion);
    }

    pub fn read<T, C>(&self, primary_key: impl Into<PrimaryKey>, completion: C)
    where
        T: Entity,
        C: FnOnce(CrudResult<T>) + Send + 'static,
    {
        self.submit(ops::read(primary_key.into()), completion);
    }

    pub fn read_first<T, C>(&self, filter: Filter, completion: C)
    where
        T: Entity,
        C: FnOnce(CrudResult<T>) + Send + 'static,
    {
        self.submit(ops::read_first(filter), completion);
    }

    pub fn read_all<T, C>(&self, completion: C)
    where
        T: Entity,
        C: FnOnce(CrudResult<Vec<T>>) + Send + 'static,
    {
        self.submit(ops::read_query(FetchQuery::default()), completion);
    }

    pub fn read_filtered<T, C>(&self, filter: Filter, completion: C)
    where
        T: Entity,
        C: FnOnce(CrudResult<Vec<T>>) + Send + 'static,
    {
        self.submit(ops::read_query(FetchQuery::filtered(filter)), completion);
    }

    pub fn read_sorted<T, C>(&self, sort: Vec<SortTerm>, completion: C)
    where
        T: Entity,
        C: FnOnce(CrudResult<Vec<T>>) + Send + 'static,
    {
        self.submit(ops::read_query(FetchQuery::sorted(sort)), completion);
    }

    pub fn read_query<T, C>(&self, query: FetchQuery, completion: C)
    where
        T: Entity,
        C: FnOnce(CrudResult<Vec<T>>) + Send + 'static,
    {
        self.submit(ops::read_query(query), completion);
    }

    /// Updates one entity; a missing key completes with `ObjectNotFound`.
    pub fn update<T, F, C>(&self, primary_key: impl Into<PrimaryKey>, update: F, completion: C)
    where
        T: Entity,
        F: FnOnce(&mut T) + Send + 'static,
        C: FnOnce(CrudResult<()>) + Send + 'static,
    {
        self.submit(ops::update(primary_key.into(), update), completion);
    }

    pub fn update_many<T, F, C>(&self, primary_keys: Vec<PrimaryKey>, update: F, completion: C)
    where
        T: Entity,
        F: FnOnce(&mut [T]) + Send + 'static,
        C: FnOnce(CrudResult<()>) + Send + 'static,
    {
        self.submit(ops::update_many(primary_keys, update), completion);
    }

    pub fn delete<T, C>(&self, primary_key: impl Into<PrimaryKey>, completion: C)
    where
        T: Entity,
        C: FnOnce(CrudResult<Removed<T>>) + Send + 'static,
    {
        self.submit(ops::delete(primary_key.into()), completion);
    }

    pub fn delete_many<T, C>(&self, primary_keys: Vec<PrimaryKey>, completion: C)
    where
        T: Entity,
        C: FnOnce(CrudResult<Vec<Removed<T>>>) + Send + 'static,
    {
        self.submit(ops::delete_many(primary_keys), completion);
    }

    pub fn erase<C>(&self, completion: C)
    where
        C: FnOnce(CrudResult<()>) + Send + 'static,
    {
        self.submit(ops::erase(), completion);
    }

    fn submit<R, Op, C>(&self, op: Op, completion: C)
    where
        R: Send + 'static,
        Op: FnOnce(&CrudEngine) -> CrudResult<R> + Send + 'static,
        C: FnOnce(CrudResult<R>) + Send + 'static,
    {
        self.executor.submit(op, completion);
    }
}
