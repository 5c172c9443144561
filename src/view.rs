//! Map aggregate builder.
//!
//! Projects one map from a single catalog snapshot into the nested
//! [`MapView`] clients render. The projection never mutates the store.

use std::sync::Arc;

use crate::store::catalog::map_problems;
use crate::store::{Catalog, EntityStore};
use crate::types::{MapId, MapView};

/// Error type for read-side projections.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ViewError {
    /// The requested entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of the missing entity.
        kind: &'static str,
        /// The id that failed to resolve.
        id: String,
    },
    /// The stored data breaks a reference invariant (should never happen).
    #[error("integrity violation in {id}: {}", .problems.join("; "))]
    Integrity {
        /// The entity being projected.
        id: String,
        /// What was found broken.
        problems: Vec<String>,
    },
}

/// Build the view of `map_id` from `catalog`.
///
/// Rooms are sorted ascending by `listPosition`, ties broken by room id.
/// Broken references are reported rather than silently dropped.
pub fn project_map_view(catalog: &Catalog, map_id: &MapId) -> Result<MapView, ViewError> {
    let map = catalog.map(map_id).ok_or_else(|| ViewError::NotFound {
        kind: "map",
        id: map_id.to_string(),
    })?;

    let problems = map_problems(map);
    if !problems.is_empty() {
        tracing::error!(
            map_id = %map_id,
            problems = ?problems,
            "Map failed integrity check while building view"
        );
        return Err(ViewError::Integrity { id: map_id.to_string(), problems });
    }

    Ok(MapView {
        id: map.id.clone(),
        name: map.name.clone(),
        description: map.description.clone(),
        image_url: map.image_url.clone(),
        owner_id: map.owner_id.clone(),
        active_room_id: map.active_room_id.clone(),
        room_list: map.ordered_rooms().into_iter().cloned().collect(),
        marker_list: map.markers.clone(),
    })
}

/// Builds map views against a store.
pub struct MapViewBuilder<S: EntityStore> {
    store: Arc<S>,
}

impl<S: EntityStore> MapViewBuilder<S> {
    /// Create a builder over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Build the view of one map from the current snapshot.
    pub fn build(&self, map_id: &MapId) -> Result<MapView, ViewError> {
        let snapshot = self.store.snapshot();
        project_map_view(&snapshot, map_id)
    }
}

impl<S: EntityStore> Clone for MapViewBuilder<S> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store) }
    }
}
