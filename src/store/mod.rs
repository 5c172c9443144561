//! Entity storage backends.
//!
//! Every backend holds the whole [`Catalog`] behind an `Arc` snapshot.
//! Readers clone the `Arc` and never observe a half-applied write; writers
//! are serialized and publish a new snapshot only when their operation
//! succeeds.

pub mod catalog;
pub mod memory;

#[cfg(feature = "persist")]
pub mod file;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::types::EntityKind;

pub use catalog::{Catalog, MapPatch, RoomPatch};
pub use memory::InMemoryEntityStore;

#[cfg(feature = "persist")]
pub use file::{FileEntityStore, PersistError};

/// Errors raised by catalog operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// A referenced entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of the missing entity.
        kind: &'static str,
        /// The id that failed to resolve.
        id: String,
    },
    /// A uniqueness invariant would be violated.
    #[error("conflict: {0}")]
    Conflict(String),
    /// An id exists but is the wrong kind or outside the expected parent.
    #[error("invalid reference: {0}")]
    InvalidReference(String),
    /// Malformed input, such as a blank name.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The backend failed to persist a committed change.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl StoreError {
    /// Build a `NotFound` for an id of the given kind.
    pub fn not_found(kind: EntityKind, id: impl fmt::Display) -> Self {
        Self::NotFound { kind: kind.name(), id: id.to_string() }
    }
}

/// Trait for entity storage backends.
///
/// `transact` runs an operation against a private copy of the catalog and
/// publishes the copy only on success, so compound operations are atomic
/// and concurrent writers are serialized.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// The current committed catalog.
    fn snapshot(&self) -> Arc<Catalog>;

    /// Apply `op` as one critical section.
    async fn transact<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Catalog) -> Result<T, StoreError> + Send + 'static;
}
