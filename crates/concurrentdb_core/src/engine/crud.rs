//! Store-operation semantics, independent of result delivery.
//!
//! # Invariants
//! - Every call opens its own handle and drops it before returning.
//! - `save`, `modify`, `remove` and `erase` each run in exactly one write
//!   transaction; a failed transaction persists nothing.
//! - Missing keys in `modify`/`remove` never abort the transaction; they are
//!   collected and reported through `CrudError::BatchFailure`.

use super::{CrudError, CrudResult};
use crate::db::{open_store, StoreConfig};
use crate::model::entity::{Entity, PrimaryKey, Removed};
use crate::model::query::{FetchQuery, Filter};
use crate::repo::entity_repo::{EntityRepository, SqliteEntityRepository};
use log::{debug, info, warn};
use rusqlite::{Connection, TransactionBehavior};
use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

/// CRUD operations over the configured store.
///
/// Holds no entity state between calls. For memory stores it keeps one idle
/// anchor connection so the named database outlives individual handles.
pub struct CrudEngine {
    config: StoreConfig,
    _anchor: Option<Connection>,
}

impl CrudEngine {
    /// Validates `config` by opening (and migrating) the store once.
    pub fn open(config: StoreConfig) -> CrudResult<Self> {
        let conn = open_store(&config)?;
        let anchor = if config.is_memory() {
            Some(conn)
        } else {
            drop(conn);
            None
        };

        info!(
            "event=engine_open module=engine status=ok mode={}",
            config.mode()
        );
        Ok(Self {
            config,
            _anchor: anchor,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn open_handle(&self) -> CrudResult<Connection> {
        Ok(open_store(&self.config)?)
    }

    /// Inserts all `entities` in one transaction, or none of them.
    ///
    /// A primary key that already exists fails the whole batch.
    pub fn save<T: Entity>(&self, entities: &[T]) -> CrudResult<()> {
        let started_at = Instant::now();
        let result = (|| -> CrudResult<()> {
            let mut conn = self.open_handle()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            SqliteEntityRepository::new(&tx).insert(entities, false)?;
            tx.commit()?;
            Ok(())
        })();

        log_outcome("crud_save", T::ENTITY_TYPE, entities.len(), started_at, &result);
        result
    }

    /// Returns entities of type `T`, filtered, then sorted by `query.sort`.
    ///
    /// No match is an empty vector, not an error.
    pub fn fetch<T: Entity>(&self, query: &FetchQuery) -> CrudResult<Vec<T>> {
        let started_at = Instant::now();
        let result = (|| -> CrudResult<Vec<T>> {
            let conn = self.open_handle()?;
            let entities = SqliteEntityRepository::new(&conn).query::<T>(query)?;
            Ok(entities)
        })();

        let count = result.as_ref().map_or(0, Vec::len);
        log_outcome("crud_fetch", T::ENTITY_TYPE, count, started_at, &result);
        result
    }

    /// Reads one entity by primary key.
    pub fn read_one<T: Entity>(&self, primary_key: &str) -> CrudResult<T> {
        let conn = self.open_handle()?;
        SqliteEntityRepository::new(&conn)
            .find::<T>(primary_key)?
            .ok_or_else(|| CrudError::ObjectNotFound(primary_key.to_string()))
    }

    /// Reads the first entity matching `filter` in natural order.
    pub fn read_first<T: Entity>(&self, filter: &Filter) -> CrudResult<T> {
        self.fetch::<T>(&FetchQuery::filtered(filter.clone()))?
            .into_iter()
            .next()
            .ok_or_else(|| CrudError::NoMatch(filter.clone()))
    }

    /// Applies `mutate` to every entity found for `primary_keys` and persists
    /// the result in one transaction.
    ///
    /// `mutate` runs exactly once, with found entities only (possibly none).
    /// Repeated keys are looked up once. Missing keys are reported after the
    /// found entities are committed.
    pub fn modify<T, F>(&self, primary_keys: &[PrimaryKey], mutate: F) -> CrudResult<()>
    where
        T: Entity,
        F: FnOnce(&mut [T]),
    {
        let started_at = Instant::now();
        let result = (|| -> CrudResult<()> {
            let mut conn = self.open_handle()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let repo = SqliteEntityRepository::new(&tx);

            let mut seen = HashSet::new();
            let mut resolved = Vec::new();
            let mut entities = Vec::new();
            let mut failures = BTreeMap::new();
            for key in primary_keys {
                if !seen.insert(key.as_str()) {
                    continue;
                }
                match repo.find::<T>(key)? {
                    Some(entity) => {
                        resolved.push(key.clone());
                        entities.push(entity);
                    }
                    None => {
                        failures.insert(key.clone(), CrudError::ObjectNotFound(key.clone()));
                    }
                }
            }

            mutate(&mut entities);

            for (before, entity) in resolved.iter().zip(&entities) {
                let after = entity.primary_key();
                if *before != after {
                    return Err(CrudError::PrimaryKeyChanged {
                        before: before.clone(),
                        after,
                    });
                }
            }

            repo.insert(&entities, true)?;
            tx.commit()?;

            batch_outcome(failures, resolved)
        })();

        log_outcome("crud_modify", T::ENTITY_TYPE, primary_keys.len(), started_at, &result);
        result
    }

    /// Deletes the entities for `primary_keys` in one transaction and returns
    /// their detached snapshots.
    ///
    /// On partial failure the error carries the missing keys and, in
    /// `completed`, the keys that were deleted.
    pub fn remove<T: Entity>(&self, primary_keys: &[PrimaryKey]) -> CrudResult<Vec<Removed<T>>> {
        let started_at = Instant::now();
        let result = (|| -> CrudResult<Vec<Removed<T>>> {
            let mut conn = self.open_handle()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let repo = SqliteEntityRepository::new(&tx);

            let mut removed = Vec::new();
            let mut completed = Vec::new();
            let mut failures = BTreeMap::new();
            for key in primary_keys {
                match repo.find::<T>(key)? {
                    Some(entity) => {
                        repo.delete::<T>(key)?;
                        completed.push(key.clone());
                        removed.push(Removed::new(entity));
                    }
                    None => {
                        failures.insert(key.clone(), CrudError::ObjectNotFound(key.clone()));
                    }
                }
            }

            tx.commit()?;

            batch_outcome(failures, completed).map(|()| removed)
        })();

        log_outcome("crud_remove", T::ENTITY_TYPE, primary_keys.len(), started_at, &result);
        result
    }

    /// Deletes every entity of every type. Idempotent.
    pub fn erase(&self) -> CrudResult<()> {
        let started_at = Instant::now();
        let result = (|| -> CrudResult<usize> {
            let mut conn = self.open_handle()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let deleted = SqliteEntityRepository::new(&tx).delete_all()?;
            tx.commit()?;
            Ok(deleted)
        })();

        let count = *result.as_ref().unwrap_or(&0);
        log_outcome("crud_erase", "*", count, started_at, &result);
        result.map(|_| ())
    }

    /// Number of stored entities of type `T`.
    pub fn count<T: Entity>(&self) -> CrudResult<u64> {
        let conn = self.open_handle()?;
        Ok(SqliteEntityRepository::new(&conn).count::<T>()?)
    }
}

fn batch_outcome(
    failures: BTreeMap<PrimaryKey, CrudError>,
    completed: Vec<PrimaryKey>,
) -> CrudResult<()> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(CrudError::BatchFailure {
            failures,
            completed,
        })
    }
}

fn log_outcome<T>(
    event: &str,
    entity_type: &str,
    count: usize,
    started_at: Instant,
    result: &CrudResult<T>,
) {
    let duration_ms = started_at.elapsed().as_millis();
    match result {
        Ok(_) => debug!(
            "event={event} module=engine status=ok entity_type={entity_type} count={count} duration_ms={duration_ms}"
        ),
        Err(CrudError::BatchFailure { failures, .. }) => warn!(
            "event={event} module=engine status=partial entity_type={entity_type} count={count} failed={} duration_ms={duration_ms} error_code=batch_failure",
            failures.len()
        ),
        Err(err) => warn!(
            "event={event} module=engine status=error entity_type={entity_type} count={count} duration_ms={duration_ms} error_code={} error={err}",
            err.code()
        ),
    }
}
