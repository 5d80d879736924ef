//! Serialized CRUD execution engine.
//!
//! # Responsibility
//! - Implement save / fetch / modify / remove / erase against a store handle
//!   opened fresh for every operation (`CrudEngine`).
//! - Run every store-touching operation on one worker, in submission order
//!   (`Executor`).
//! - Report outcomes as `CrudResult`, never by unwinding across the worker.
//!
//! # Invariants
//! - At most one operation touches the store at any time.
//! - Batch operations report every failed key individually.
//! - A panicking operation becomes `CrudError::Unexpected`; the worker keeps
//!   running.

use crate::db::DbError;
use crate::model::entity::PrimaryKey;
use crate::model::query::Filter;
use crate::repo::entity_repo::RepoError;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod crud;
mod executor;

pub use crud::CrudEngine;
pub use executor::{Executor, ExecutorConfig};

pub type CrudResult<T> = Result<T, CrudError>;

/// Outcome error of one engine operation.
#[derive(Debug)]
pub enum CrudError {
    /// Primary-key lookup found nothing.
    ObjectNotFound(PrimaryKey),
    /// Filter-based single read matched nothing.
    NoMatch(Filter),
    /// One or more keys of a batch failed; the rest were processed.
    BatchFailure {
        /// Per-key failure, ordered by key.
        failures: BTreeMap<PrimaryKey, CrudError>,
        /// Keys that were processed and committed, in request order.
        completed: Vec<PrimaryKey>,
    },
    /// The store rejected the open, read or transaction.
    StoreFailure(RepoError),
    /// A filter or sort expression failed validation.
    InvalidQuery(String),
    /// A modify closure changed the primary key of an entity.
    PrimaryKeyChanged {
        before: PrimaryKey,
        after: PrimaryKey,
    },
    /// The operation panicked or could not be delivered.
    Unexpected(String),
}

impl CrudError {
    /// Failed keys of a batch failure, or the key of a single not-found.
    pub fn failed_keys(&self) -> Vec<&str> {
        match self {
            Self::ObjectNotFound(key) => vec![key.as_str()],
            Self::BatchFailure { failures, .. } => failures.keys().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ObjectNotFound(_) | Self::NoMatch(_))
    }

    /// Narrows a batch failure of a one-key request down to that key's error.
    pub(crate) fn into_single(self, key: &str) -> Self {
        match self {
            Self::BatchFailure { mut failures, .. } if failures.contains_key(key) => failures
                .remove(key)
                .unwrap_or_else(|| Self::ObjectNotFound(key.to_string())),
            other => other,
        }
    }

    /// Stable code used in log events.
    pub(crate) fn code(&self) -> &'static str {
        match self {
            Self::ObjectNotFound(_) => "object_not_found",
            Self::NoMatch(_) => "no_match",
            Self::BatchFailure { .. } => "batch_failure",
            Self::StoreFailure(_) => "store_failure",
            Self::InvalidQuery(_) => "invalid_query",
            Self::PrimaryKeyChanged { .. } => "primary_key_changed",
            Self::Unexpected(_) => "unexpected",
        }
    }
}

impl Display for CrudError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ObjectNotFound(key) => write!(f, "object not found: {key}"),
            Self::NoMatch(filter) => write!(f, "no object matches filter: {filter}"),
            Self::BatchFailure {
                failures,
                completed,
            } => {
                write!(
                    f,
                    "{} of {} keys failed:",
                    failures.len(),
                    failures.len() + completed.len()
                )?;
                for (key, err) in failures {
                    write!(f, " [{key}: {err}]")?;
                }
                Ok(())
            }
            Self::StoreFailure(err) => write!(f, "store failure: {err}"),
            Self::InvalidQuery(message) => write!(f, "invalid query: {message}"),
            Self::PrimaryKeyChanged { before, after } => {
                write!(f, "primary key changed during modify: `{before}` -> `{after}`")
            }
            Self::Unexpected(message) => write!(f, "unexpected failure: {message}"),
        }
    }
}

impl Error for CrudError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StoreFailure(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CrudError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::InvalidQuery(err) => Self::InvalidQuery(err.to_string()),
            other => Self::StoreFailure(other),
        }
    }
}

impl From<DbError> for CrudError {
    fn from(value: DbError) -> Self {
        Self::StoreFailure(RepoError::Db(value))
    }
}

impl From<rusqlite::Error> for CrudError {
    fn from(value: rusqlite::Error) -> Self {
        Self::StoreFailure(RepoError::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::CrudError;
    use crate::model::query::{FetchQuery, SortTerm};
    use crate::repo::entity_repo::RepoError;
    use std::collections::BTreeMap;

    fn batch(missing: &[&str], completed: &[&str]) -> CrudError {
        let failures: BTreeMap<_, _> = missing
            .iter()
            .map(|key| (key.to_string(), CrudError::ObjectNotFound(key.to_string())))
            .collect();
        CrudError::BatchFailure {
            failures,
            completed: completed.iter().map(|key| key.to_string()).collect(),
        }
    }

    #[test]
    fn batch_failure_lists_every_failed_key() {
        let err = batch(&["b", "a"], &["c"]);

        assert_eq!(err.failed_keys(), vec!["a", "b"]);
        assert_eq!(
            err.to_string(),
            "2 of 3 keys failed: [a: object not found: a] [b: object not found: b]"
        );
    }

    #[test]
    fn into_single_unwraps_matching_key_only() {
        let single = batch(&["k"], &[]).into_single("k");
        assert!(matches!(single, CrudError::ObjectNotFound(key) if key == "k"));

        let untouched = batch(&["other"], &[]).into_single("k");
        assert!(matches!(untouched, CrudError::BatchFailure { .. }));
    }

    #[test]
    fn invalid_query_is_not_reported_as_store_failure() {
        let query_err = FetchQuery::sorted(vec![SortTerm::asc("bad field")])
            .validate()
            .unwrap_err();
        let err = CrudError::from(RepoError::from(query_err));

        assert!(matches!(err, CrudError::InvalidQuery(_)));
        assert_eq!(err.code(), "invalid_query");
    }
}
