//! # mapkeeper
//!
//! A hierarchical map and note data service.
//!
//! Users own directories and maps. A map owns an ordered list of rooms,
//! each carrying a markdown description, and at most one positional marker
//! per room. Everything is addressed by stable, never-reused string ids.
//!
//! ## Architecture
//!
//! ```text
//! HTTP (service) ──reads──→ MapViewBuilder / DirectoryLister ──snapshot──→ EntityStore
//!        └──────────writes (transact)───────────────────────────────────────→ EntityStore
//!                                                                     (Memory or File)
//! ```
//!
//! ## Consistency Guarantees
//!
//! - Every mutation validates all invariants before anything changes
//! - Writers are serialized; readers work on an immutable `Arc<Catalog>`
//! - Room order is `listPosition` ascending, ties broken by room id
//! - Directory and map listings keep creation (insertion) order

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod canonical;
pub mod directory;
pub mod links;
pub mod seed;
pub mod store;
pub mod types;
pub mod view;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use types::{
    Directory, DirectoryId, DirectorySummary, EntityKind, IdAllocator, Map, MapId, MapSummary,
    MapView, Marker, Position, Room, RoomId, User, UserId, UserProfile,
};
pub use store::{Catalog, EntityStore, InMemoryEntityStore, MapPatch, RoomPatch, StoreError};
#[cfg(feature = "persist")]
pub use store::{FileEntityStore, PersistError};
pub use view::{project_map_view, MapViewBuilder, ViewError};
pub use directory::{project_directories, project_maps, DirectoryLister};
pub use canonical::{canonical_hash, canonical_hash_hex, to_canonical_bytes};
pub use seed::{ensure_user, seed_demo, SeedSummary};

// Service re-exports (when service feature is enabled)
#[cfg(feature = "service")]
pub use service::{create_router, ServiceConfig, ServiceState};

/// Schema version of the persisted catalog snapshot.
/// Increment on breaking changes to any stored type.
pub const CATALOG_SCHEMA_VERSION: &str = "1.0.0";
