//! Read-only projections served to clients.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::entity::{Marker, Room};
use super::ids::{DirectoryId, MapId, RoomId, UserId};

/// The full nested representation of one map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapView {
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
    /// Currently focused room.
    pub active_room_id: Option<RoomId>,
    /// Rooms sorted ascending by `listPosition`, ties by id.
    pub room_list: Vec<Room>,
    /// Markers keyed by room id.
    pub marker_list: BTreeMap<RoomId, Marker>,
}

/// `{id, name}` of a map, used in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapSummary {
    /// Map id.
    pub id: MapId,
    /// Display name.
    pub name: String,
}

/// A directory with summaries of its linked maps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorySummary {
    /// Directory id.
    pub id: DirectoryId,
    /// Display name.
    pub name: String,
    /// Linked maps, in link order.
    pub maps: Vec<MapSummary>,
}

/// The public part of a user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// User id.
    pub id: UserId,
    /// Display name.
    pub name: String,
}
