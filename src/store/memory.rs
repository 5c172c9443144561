//! In-memory entity store.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

use super::{Catalog, EntityStore, StoreError};

/// In-memory entity store.
///
/// The write lock is held for the whole of an operation, validation
/// included; readers only hold the read lock long enough to clone the
/// current `Arc<Catalog>`.
#[derive(Debug, Default)]
pub struct InMemoryEntityStore {
    catalog: RwLock<Arc<Catalog>>,
}

impl InMemoryEntityStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding an existing catalog.
    pub fn from_catalog(catalog: Catalog) -> Self {
        Self { catalog: RwLock::new(Arc::new(catalog)) }
    }

    /// Apply `op` synchronously. Shared by the async trait method and by
    /// callers that have no runtime at hand (seeding, benches).
    pub fn apply<T>(
        &self,
        op: impl FnOnce(&mut Catalog) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut current = self.catalog.write();
        let mut next = Catalog::clone(&current);
        let out = op(&mut next)?;
        *current = Arc::new(next);
        Ok(out)
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    fn snapshot(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog.read())
    }

    async fn transact<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Catalog) -> Result<T, StoreError> + Send + 'static,
    {
        self.apply(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Position;

    #[tokio::test]
    async fn test_transact_commits_on_success() {
        let store = InMemoryEntityStore::new();
        let user = store.transact(|c| c.register_user("Jessica")).await.unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.user(&user.id).map(|u| u.name.as_str()), Some("Jessica"));
    }

    #[tokio::test]
    async fn test_compound_transaction_is_atomic() {
        let store = InMemoryEntityStore::new();
        let (user, map) = store
            .transact(|c| {
                let user = c.register_user("Jessica")?;
                let map = c.create_map(&user.id, "Dummy Map", "", "")?;
                Ok((user.id, map.id))
            })
            .await
            .unwrap();

        let before = store.snapshot();
        let map_for_op = map.clone();
        let result = store
            .transact(move |c| {
                let room = c.add_room(&map_for_op, "Barracks", "", 1)?;
                c.add_marker(&map_for_op, &room.id, Position::new(f64::INFINITY, 0.0))
            })
            .await;

        assert!(matches!(result, Err(StoreError::InvalidInput(_))));
        let after = store.snapshot();
        assert_eq!(*before, *after);
        assert!(after.map(&map).unwrap().rooms.is_empty());
        assert!(after.user(&user).is_some());
    }

    #[tokio::test]
    async fn test_snapshot_is_isolated_from_later_writes() {
        let store = InMemoryEntityStore::new();
        let user = store.transact(|c| c.register_user("Jessica")).await.unwrap();
        let old = store.snapshot();

        store
            .transact(move |c| c.create_directory(&user.id, "My Maps"))
            .await
            .unwrap();

        assert_eq!(old.num_directories(), 0);
        assert_eq!(store.snapshot().num_directories(), 1);
    }
}
