//! Core types for the map catalog.

pub mod entity;
pub mod ids;
pub mod view;

pub use entity::{Directory, Map, Marker, Position, Room, User};
pub use ids::{DirectoryId, EntityKind, IdAllocator, MapId, RoomId, UserId};
pub use view::{DirectorySummary, MapSummary, MapView, UserProfile};
