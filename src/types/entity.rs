//! Stored entity records.
//!
//! Field names serialize in camelCase and are shared by the HTTP responses
//! and the persisted snapshot, so renaming a field here breaks clients.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ids::{DirectoryId, MapId, RoomId, UserId};

/// A user. Users are provisioned out of band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User id.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Owned directories, in creation order.
    #[serde(default)]
    pub directory_ids: Vec<DirectoryId>,
    /// Owned maps, in creation order.
    #[serde(default)]
    pub map_ids: Vec<MapId>,
}

/// A named group of maps owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Directory {
    /// Directory id.
    pub id: DirectoryId,
    /// Display name.
    pub name: String,
    /// Owning user.
    pub owner_id: UserId,
    /// Linked maps, in link order. A map appears in at most one directory.
    #[serde(default)]
    pub map_ids: Vec<MapId>,
}

/// A map: an image with ordered rooms and per-room markers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Map {
    /// Map id.
    pub id: MapId,
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Image the markers are positioned on.
    pub image_url: String,
    /// Owning user.
    pub owner_id: UserId,
    /// Currently focused room, if any.
    pub active_room_id: Option<RoomId>,
    /// Directory this map is linked into, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory_id: Option<DirectoryId>,
    /// Rooms keyed by id.
    #[serde(default)]
    pub rooms: BTreeMap<RoomId, Room>,
    /// Markers keyed by the room they annotate.
    #[serde(default)]
    pub markers: BTreeMap<RoomId, Marker>,
}

impl Map {
    /// Room currently holding `list_position`, if any.
    pub fn room_at(&self, list_position: i64) -> Option<&Room> {
        self.rooms.values().find(|r| r.list_position == list_position)
    }

    /// Rooms in display order: ascending `list_position`, then id.
    pub fn ordered_rooms(&self) -> Vec<&Room> {
        let mut rooms: Vec<&Room> = self.rooms.values().collect();
        rooms.sort_by(|a, b| {
            a.list_position
                .cmp(&b.list_position)
                .then_with(|| a.id.cmp(&b.id))
        });
        rooms
    }
}

/// A room: one entry in a map's ordered room list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    /// Room id.
    pub id: RoomId,
    /// Display order within the map. Unique per map, gaps allowed.
    pub list_position: i64,
    /// Display name.
    pub name: String,
    /// Markdown body. `[label](room-id)` links must name rooms of the same map.
    pub description: String,
}

/// Coordinates of a marker on the map image, serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position(pub [f64; 2]);

impl Position {
    /// Build a position from two coordinates.
    pub fn new(x: f64, y: f64) -> Self {
        Self([x, y])
    }

    /// Both coordinates are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|c| c.is_finite())
    }
}

/// A positional annotation of a room, one per room at most.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// Id of the annotated room.
    pub id: RoomId,
    /// Position on the map image.
    pub position: Position,
}
