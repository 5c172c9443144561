//! Directory listing service.
//!
//! Resolves a user's directories into lightweight directory → map
//! summaries, preserving creation order for directories and link order
//! for the maps inside them.

use std::sync::Arc;

use crate::store::{Catalog, EntityStore};
use crate::types::{DirectorySummary, MapSummary, User, UserId, UserProfile};
use crate::view::ViewError;

/// Summaries of every directory owned by `user_id`.
pub fn project_directories(catalog: &Catalog, user_id: &UserId) -> Result<Vec<DirectorySummary>, ViewError> {
    let user = find_user(catalog, user_id)?;

    user.directory_ids
        .iter()
        .map(|dir_id| -> Result<DirectorySummary, ViewError> {
            let directory = catalog.directory(dir_id).ok_or_else(|| dangling(user_id, dir_id))?;
            let maps = directory
                .map_ids
                .iter()
                .map(|map_id| {
                    catalog
                        .map(map_id)
                        .map(|m| MapSummary { id: m.id.clone(), name: m.name.clone() })
                        .ok_or_else(|| dangling(dir_id, map_id))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(DirectorySummary { id: directory.id.clone(), name: directory.name.clone(), maps })
        })
        .collect()
}

/// Summaries of every map owned by `user_id`, linked or not.
pub fn project_maps(catalog: &Catalog, user_id: &UserId) -> Result<Vec<MapSummary>, ViewError> {
    let user = find_user(catalog, user_id)?;
    user.map_ids
        .iter()
        .map(|map_id| {
            catalog
                .map(map_id)
                .map(|m| MapSummary { id: m.id.clone(), name: m.name.clone() })
                .ok_or_else(|| dangling(user_id, map_id))
        })
        .collect()
}

fn find_user<'a>(catalog: &'a Catalog, user_id: &UserId) -> Result<&'a User, ViewError> {
    catalog.user(user_id).ok_or_else(|| ViewError::NotFound {
        kind: "user",
        id: user_id.to_string(),
    })
}

fn dangling(owner: &impl std::fmt::Display, target: &impl std::fmt::Display) -> ViewError {
    let problem = format!("{owner} references missing {target}");
    tracing::error!(owner = %owner, target = %target, "Dangling reference in directory listing");
    ViewError::Integrity { id: owner.to_string(), problems: vec![problem] }
}

/// Lists directories and maps against a store.
pub struct DirectoryLister<S: EntityStore> {
    store: Arc<S>,
}

impl<S: EntityStore> DirectoryLister<S> {
    /// Create a lister over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Public profile of a user.
    pub fn user(&self, user_id: &UserId) -> Result<UserProfile, ViewError> {
        let snapshot = self.store.snapshot();
        let user = find_user(&snapshot, user_id)?;
        Ok(UserProfile { id: user.id.clone(), name: user.name.clone() })
    }

    /// Directories of a user with their map summaries.
    pub fn list_directories(&self, user_id: &UserId) -> Result<Vec<DirectorySummary>, ViewError> {
        project_directories(&self.store.snapshot(), user_id)
    }

    /// Maps owned by a user.
    pub fn list_maps(&self, user_id: &UserId) -> Result<Vec<MapSummary>, ViewError> {
        project_maps(&self.store.snapshot(), user_id)
    }
}

impl<S: EntityStore> Clone for DirectoryLister<S> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryEntityStore;

    #[test]
    fn test_listing_preserves_creation_and_link_order() {
        let store = InMemoryEntityStore::new();
        let user = store
            .apply(|c| {
                let user = c.register_user("Jessica")?;
                let zeta = c.create_directory(&user.id, "Zeta")?;
                c.create_directory(&user.id, "Alpha")?;
                let second = c.create_map(&user.id, "Second", "", "")?;
                let first = c.create_map(&user.id, "First", "", "")?;
                c.link_map_to_directory(&zeta.id, &second.id)?;
                c.link_map_to_directory(&zeta.id, &first.id)?;
                Ok(user.id)
            })
            .unwrap();

        let lister = DirectoryLister::new(Arc::new(store));
        let dirs = lister.list_directories(&user).unwrap();
        let names: Vec<&str> = dirs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Zeta", "Alpha"]);
        let maps: Vec<&str> = dirs[0].maps.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(maps, vec!["Second", "First"]);
        assert!(dirs[1].maps.is_empty());

        let owned: Vec<String> = lister.list_maps(&user).unwrap().into_iter().map(|m| m.name).collect();
        assert_eq!(owned, vec!["Second", "First"]);
    }

    #[test]
    fn test_unknown_user_is_not_found() {
        let lister = DirectoryLister::new(Arc::new(InMemoryEntityStore::new()));
        let err = lister.list_directories(&UserId::new("usr-9")).unwrap_err();
        assert!(matches!(err, ViewError::NotFound { kind: "user", .. }));
    }

    #[test]
    fn test_summary_json_shape() {
        let store = InMemoryEntityStore::new();
        let user = store
            .apply(|c| {
                let user = c.register_user("Jessica")?;
                let dir = c.create_directory(&user.id, "My Maps")?;
                let map = c.create_map(&user.id, "Dummy Map", "", "")?;
                c.link_map_to_directory(&dir.id, &map.id)?;
                Ok(user.id)
            })
            .unwrap();

        let dirs = DirectoryLister::new(Arc::new(store)).list_directories(&user).unwrap();
        let json = serde_json::to_value(&dirs).unwrap();
        assert_eq!(json[0]["name"], "My Maps");
        assert_eq!(json[0]["maps"][0]["name"], "Dummy Map");
        assert!(json[0]["maps"][0]["id"].is_string());
    }
}
