//! Operation builders shared by every adapter.
//!
//! Each builder captures its arguments and returns the closure the executor
//! runs against the engine.

use crate::engine::{CrudEngine, CrudError, CrudResult};
use crate::model::entity::{Entity, PrimaryKey, Removed};
use crate::model::query::{FetchQuery, Filter};

pub(crate) fn create<T: Entity>(
    entities: Vec<T>,
) -> impl FnOnce(&CrudEngine) -> CrudResult<()> + Send + 'static {
    move |engine: &CrudEngine| engine.save(&entities)
}

pub(crate) fn read<T: Entity>(
    primary_key: PrimaryKey,
) -> impl FnOnce(&CrudEngine) -> CrudResult<T> + Send + 'static {
    move |engine: &CrudEngine| engine.read_one(&primary_key)
}

pub(crate) fn read_first<T: Entity>(
    filter: Filter,
) -> impl FnOnce(&CrudEngine) -> CrudResult<T> + Send + 'static {
    move |engine: &CrudEngine| engine.read_first(&filter)
}

pub(crate) fn read_query<T: Entity>(
    query: FetchQuery,
) -> impl FnOnce(&CrudEngine) -> CrudResult<Vec<T>> + Send + 'static {
    move |engine: &CrudEngine| engine.fetch(&query)
}

/// Single-key update: a missing key is `ObjectNotFound`, not a batch failure,
/// and `update` is skipped.
pub(crate) fn update<T, F>(
    primary_key: PrimaryKey,
    update: F,
) -> impl FnOnce(&CrudEngine) -> CrudResult<()> + Send + 'static
where
    T: Entity,
    F: FnOnce(&mut T) + Send + 'static,
{
    move |engine: &CrudEngine| {
        let keys = [primary_key];
        engine
            .modify(&keys, move |entities: &mut [T]| {
                if let Some(entity) = entities.first_mut() {
                    update(entity);
                }
            })
            .map_err(|err| err.into_single(&keys[0]))
    }
}

pub(crate) fn update_many<T, F>(
    primary_keys: Vec<PrimaryKey>,
    update: F,
) -> impl FnOnce(&CrudEngine) -> CrudResult<()> + Send + 'static
where
    T: Entity,
    F: FnOnce(&mut [T]) + Send + 'static,
{
    move |engine: &CrudEngine| engine.modify(&primary_keys, update)
}

pub(crate) fn delete<T: Entity>(
    primary_key: PrimaryKey,
) -> impl FnOnce(&CrudEngine) -> CrudResult<Removed<T>> + Send + 'static {
    move |engine: &CrudEngine| {
        let keys = [primary_key];
        engine
            .remove::<T>(&keys)
            .map_err(|err| err.into_single(&keys[0]))?
            .pop()
            .ok_or_else(|| CrudError::ObjectNotFound(keys[0].clone()))
    }
}

pub(crate) fn delete_many<T: Entity>(
    primary_keys: Vec<PrimaryKey>,
) -> impl FnOnce(&CrudEngine) -> CrudResult<Vec<Removed<T>>> + Send + 'static {
    move |engine: &CrudEngine| engine.remove(&primary_keys)
}

pub(crate) fn erase() -> impl FnOnce(&CrudEngine) -> CrudResult<()> + Send + 'static {
    |engine: &CrudEngine| engine.erase()
}
