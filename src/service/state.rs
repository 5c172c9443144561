//! Service state management.
//!
//! Owns the entity store for the lifetime of the process, together with the
//! read-side services and the pre-provisioned user.

use std::sync::Arc;

use crate::directory::DirectoryLister;
use crate::seed::{ensure_user, seed_demo};
use crate::store::{EntityStore, StoreError};
use crate::types::UserId;
use crate::view::MapViewBuilder;

use super::config::ServiceConfig;
use super::shell::ClientShell;

/// Shared service state.
pub struct ServiceState<S: EntityStore + 'static> {
    /// The entity store all writes go through.
    pub store: Arc<S>,
    /// Map aggregate builder.
    pub views: MapViewBuilder<S>,
    /// Directory listing service.
    pub lister: DirectoryLister<S>,
    /// The user `/api/user` answers with.
    pub current_user: UserId,
    /// Client shell served for non-API paths.
    pub shell: Arc<ClientShell>,
}

impl<S: EntityStore + 'static> ServiceState<S> {
    /// Create service state over an already provisioned store.
    pub fn new(store: S, current_user: UserId, shell: ClientShell) -> Self {
        let store = Arc::new(store);
        Self {
            views: MapViewBuilder::new(Arc::clone(&store)),
            lister: DirectoryLister::new(Arc::clone(&store)),
            store,
            current_user,
            shell: Arc::new(shell),
        }
    }

    /// Provision the configured user (and the sample map, for an empty
    /// catalog) and build the state.
    pub async fn bootstrap(store: S, config: &ServiceConfig) -> Result<Self, StoreError> {
        let user_name = config.user_name.clone();
        let seed = config.seed_demo;

        let (user, seeded) = store
            .transact(move |c| {
                let fresh = c.is_empty();
                let user = ensure_user(c, &user_name)?;
                let seeded = if fresh && seed { Some(seed_demo(c, &user.id)?) } else { None };
                Ok((user, seeded))
            })
            .await?;

        tracing::info!(user_id = %user.id, user_name = %user.name, "Current user provisioned");
        if let Some(summary) = seeded {
            tracing::info!(
                map_id = %summary.map_id,
                directory_id = %summary.directory_id,
                rooms = summary.room_count,
                "Seeded sample map"
            );
        }

        let shell = ClientShell::load(config.client_dir.as_deref());
        Ok(Self::new(store, user.id, shell))
    }
}

impl<S: EntityStore + 'static> Clone for ServiceState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            views: self.views.clone(),
            lister: self.lister.clone(),
            current_user: self.current_user.clone(),
            shell: Arc::clone(&self.shell),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryEntityStore;

    #[tokio::test]
    async fn test_bootstrap_seeds_empty_store_once() {
        let config = ServiceConfig::default();
        let state = ServiceState::bootstrap(InMemoryEntityStore::new(), &config).await.unwrap();

        let dirs = state.lister.list_directories(&state.current_user).unwrap();
        assert_eq!(dirs.len(), 1);
        assert_eq!(dirs[0].maps.len(), 1);

        // A catalog that already has users is left alone.
        let catalog = (*state.store.snapshot()).clone();
        let again = ServiceState::bootstrap(InMemoryEntityStore::from_catalog(catalog), &config)
            .await
            .unwrap();
        assert_eq!(again.current_user, state.current_user);
        assert_eq!(again.lister.list_directories(&again.current_user).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_without_seed() {
        let config = ServiceConfig { seed_demo: false, ..ServiceConfig::default() };
        let state = ServiceState::bootstrap(InMemoryEntityStore::new(), &config).await.unwrap();
        assert!(state.lister.list_directories(&state.current_user).unwrap().is_empty());
        assert_eq!(state.lister.user(&state.current_user).unwrap().name, "Jessica");
    }
}
