//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the primitive store operations the engine composes.
//! - Isolate SQLite query details from engine orchestration.
//!
//! # Invariants
//! - Repository APIs report semantic errors (`DuplicateKey`, `InvalidQuery`)
//!   in addition to DB transport errors.
//! - Lookups report absence as `None`; turning that into a not-found error
//!   is the engine's job.

pub mod entity_repo;
