//! Entity contract.
//!
//! # Invariants
//! - `primary_key()` is stable for the lifetime of the stored entity.
//! - The serialized form of an entity is a JSON object.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::ops::Deref;

/// Scalar identifying an entity uniquely within its type.
pub type PrimaryKey = String;

/// A record type managed by the store.
///
/// Entities are plain values: reading one yields an owned copy, and changes
/// reach the store only through a write operation.
pub trait Entity: Serialize + DeserializeOwned + Send + 'static {
    /// Type discriminator stored next to every row of this entity type.
    const ENTITY_TYPE: &'static str;

    /// Returns the primary key of this entity.
    fn primary_key(&self) -> PrimaryKey;
}

/// Snapshot of an entity that has been deleted from the store.
///
/// The snapshot is detached: it carries the last persisted field values but
/// no longer corresponds to a stored row.
#[derive(Debug, Clone, PartialEq)]
pub struct Removed<T> {
    entity: T,
}

impl<T> Removed<T> {
    pub(crate) fn new(entity: T) -> Self {
        Self { entity }
    }

    /// Always `true`: the row behind this snapshot is gone.
    pub fn is_invalidated(&self) -> bool {
        true
    }

    pub fn entity(&self) -> &T {
        &self.entity
    }

    pub fn into_inner(self) -> T {
        self.entity
    }
}

impl<T> Deref for Removed<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.entity
    }
}
