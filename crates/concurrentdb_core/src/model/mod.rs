//! Entity contract and typed read expressions.
//!
//! # Responsibility
//! - Define what a storable entity must provide (`Entity`).
//! - Describe filters and sort terms as data, so they can be validated
//!   before they reach the store.
//!
//! # Invariants
//! - Every entity is identified by a primary key unique within its type.
//! - Filter field names are validated identifier paths.

pub mod entity;
pub mod query;
