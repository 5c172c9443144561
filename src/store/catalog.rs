//! The canonical entity records and every invariant-checked mutation.
//!
//! Each mutation validates all of its preconditions against `&self` before
//! touching any record, so an `Err` always leaves the catalog unchanged.
//! Stores rely on this to make operations atomic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::links;
use crate::types::{
    Directory, DirectoryId, EntityKind, IdAllocator, Map, MapId, Marker, Position, Room, RoomId,
    User, UserId,
};

use super::StoreError;

/// Partial update of a map's descriptive fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapPatch {
    /// New name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New image URL.
    pub image_url: Option<String>,
}

/// Partial update of a room.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPatch {
    /// New name.
    pub name: Option<String>,
    /// New markdown description.
    pub description: Option<String>,
    /// New display position.
    pub list_position: Option<i64>,
}

/// All users, directories and maps, plus the id allocator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    ids: IdAllocator,
    users: BTreeMap<UserId, User>,
    directories: BTreeMap<DirectoryId, Directory>,
    maps: BTreeMap<MapId, Map>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Look up a user.
    pub fn user(&self, id: &UserId) -> Option<&User> {
        self.users.get(id)
    }

    /// Look up a directory.
    pub fn directory(&self, id: &DirectoryId) -> Option<&Directory> {
        self.directories.get(id)
    }

    /// Look up a map.
    pub fn map(&self, id: &MapId) -> Option<&Map> {
        self.maps.get(id)
    }

    /// Position one past the last room of a map, for appending.
    pub fn next_list_position(&self, map_id: &MapId) -> Result<i64, StoreError> {
        let map = self
            .maps
            .get(map_id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Map, map_id))?;
        Ok(map.rooms.values().map(|r| r.list_position).max().map_or(1, |p| p.saturating_add(1)))
    }

    /// All users, ordered by id.
    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    /// First user whose name matches exactly.
    pub fn user_by_name(&self, name: &str) -> Option<&User> {
        self.users.values().find(|u| u.name == name)
    }

    /// Whether the catalog holds no users (and hence nothing else).
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Number of maps.
    pub fn num_maps(&self) -> usize {
        self.maps.len()
    }

    /// Number of directories.
    pub fn num_directories(&self) -> usize {
        self.directories.len()
    }

    /// Number of ids allocated over the catalog's lifetime.
    pub fn ids_issued(&self) -> u64 {
        self.ids.issued()
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// Provision a user.
    pub fn register_user(&mut self, name: &str) -> Result<User, StoreError> {
        let name = normalize_name(name, "user")?;
        let id = UserId::new(self.ids.allocate(EntityKind::User));
        let user = User { id: id.clone(), name, directory_ids: Vec::new(), map_ids: Vec::new() };
        self.users.insert(id, user.clone());
        Ok(user)
    }

    // ------------------------------------------------------------------
    // Directories
    // ------------------------------------------------------------------

    /// Create a directory owned by `owner_id`.
    pub fn create_directory(&mut self, owner_id: &UserId, name: &str) -> Result<Directory, StoreError> {
        let name = normalize_name(name, "directory")?;
        if !self.users.contains_key(owner_id) {
            return Err(StoreError::not_found(EntityKind::User, owner_id));
        }

        let id = DirectoryId::new(self.ids.allocate(EntityKind::Directory));
        let directory = Directory {
            id: id.clone(),
            name,
            owner_id: owner_id.clone(),
            map_ids: Vec::new(),
        };
        self.directories.insert(id.clone(), directory.clone());
        if let Some(owner) = self.users.get_mut(owner_id) {
            owner.directory_ids.push(id);
        }
        Ok(directory)
    }

    /// Rename a directory.
    pub fn rename_directory(&mut self, id: &DirectoryId, name: &str) -> Result<Directory, StoreError> {
        let name = normalize_name(name, "directory")?;
        let directory = self
            .directories
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Directory, id))?;
        directory.name = name;
        Ok(directory.clone())
    }

    /// Delete a directory. Its maps survive, unlinked. Returns whether
    /// anything was removed.
    pub fn delete_directory(&mut self, id: &DirectoryId) -> Result<bool, StoreError> {
        let Some(directory) = self.directories.remove(id) else {
            return Ok(false);
        };
        if let Some(owner) = self.users.get_mut(&directory.owner_id) {
            owner.directory_ids.retain(|d| d != id);
        }
        for map_id in &directory.map_ids {
            if let Some(map) = self.maps.get_mut(map_id) {
                map.directory_id = None;
            }
        }
        Ok(true)
    }

    /// Link a map into a directory. A map lives in at most one directory;
    /// relinking into the same directory is a no-op.
    pub fn link_map_to_directory(&mut self, directory_id: &DirectoryId, map_id: &MapId) -> Result<(), StoreError> {
        let directory = self
            .directories
            .get(directory_id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Directory, directory_id))?;
        let map = self
            .maps
            .get(map_id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Map, map_id))?;

        if map.owner_id != directory.owner_id {
            return Err(StoreError::InvalidReference(format!(
                "map {map_id} is owned by {}, directory {directory_id} by {}",
                map.owner_id, directory.owner_id
            )));
        }
        match &map.directory_id {
            Some(current) if current == directory_id => return Ok(()),
            Some(current) => {
                return Err(StoreError::Conflict(format!(
                    "map {map_id} is already linked to directory {current}"
                )))
            }
            None => {}
        }

        if let Some(map) = self.maps.get_mut(map_id) {
            map.directory_id = Some(directory_id.clone());
        }
        if let Some(directory) = self.directories.get_mut(directory_id) {
            directory.map_ids.push(map_id.clone());
        }
        Ok(())
    }

    /// Remove a map from a directory. Returns whether a link was removed.
    pub fn unlink_map_from_directory(&mut self, directory_id: &DirectoryId, map_id: &MapId) -> Result<bool, StoreError> {
        let linked = self
            .maps
            .get(map_id)
            .is_some_and(|m| m.directory_id.as_ref() == Some(directory_id));
        if !linked {
            return Ok(false);
        }
        if let Some(map) = self.maps.get_mut(map_id) {
            map.directory_id = None;
        }
        if let Some(directory) = self.directories.get_mut(directory_id) {
            directory.map_ids.retain(|m| m != map_id);
        }
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Maps
    // ------------------------------------------------------------------

    /// Create an empty map owned by `owner_id`.
    pub fn create_map(
        &mut self,
        owner_id: &UserId,
        name: &str,
        description: &str,
        image_url: &str,
    ) -> Result<Map, StoreError> {
        let name = normalize_name(name, "map")?;
        if !self.users.contains_key(owner_id) {
            return Err(StoreError::not_found(EntityKind::User, owner_id));
        }

        let id = MapId::new(self.ids.allocate(EntityKind::Map));
        let map = Map {
            id: id.clone(),
            name,
            description: description.to_string(),
            image_url: image_url.to_string(),
            owner_id: owner_id.clone(),
            active_room_id: None,
            directory_id: None,
            rooms: BTreeMap::new(),
            markers: BTreeMap::new(),
        };
        self.maps.insert(id.clone(), map.clone());
        if let Some(owner) = self.users.get_mut(owner_id) {
            owner.map_ids.push(id);
        }
        Ok(map)
    }

    /// Update a map's descriptive fields.
    pub fn update_map(&mut self, id: &MapId, patch: MapPatch) -> Result<Map, StoreError> {
        let name = patch.name.as_deref().map(|n| normalize_name(n, "map")).transpose()?;
        let map = self
            .maps
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Map, id))?;
        if let Some(name) = name {
            map.name = name;
        }
        if let Some(description) = patch.description {
            map.description = description;
        }
        if let Some(image_url) = patch.image_url {
            map.image_url = image_url;
        }
        Ok(map.clone())
    }

    /// Delete a map with its rooms and markers. Returns whether anything
    /// was removed.
    pub fn delete_map(&mut self, id: &MapId) -> Result<bool, StoreError> {
        let Some(map) = self.maps.remove(id) else {
            return Ok(false);
        };
        if let Some(directory_id) = &map.directory_id {
            if let Some(directory) = self.directories.get_mut(directory_id) {
                directory.map_ids.retain(|m| m != id);
            }
        }
        if let Some(owner) = self.users.get_mut(&map.owner_id) {
            owner.map_ids.retain(|m| m != id);
        }
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Rooms
    // ------------------------------------------------------------------

    /// Add a room at `list_position`.
    pub fn add_room(
        &mut self,
        map_id: &MapId,
        name: &str,
        description: &str,
        list_position: i64,
    ) -> Result<Room, StoreError> {
        let name = normalize_name(name, "room")?;
        let map = self
            .maps
            .get(map_id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Map, map_id))?;
        if let Some(holder) = map.room_at(list_position) {
            return Err(position_taken(map_id, list_position, &holder.id));
        }
        check_room_links(map, description)?;

        let id = RoomId::new(self.ids.allocate(EntityKind::Room));
        let room = Room {
            id: id.clone(),
            list_position,
            name,
            description: description.to_string(),
        };
        if let Some(map) = self.maps.get_mut(map_id) {
            map.rooms.insert(id, room.clone());
        }
        Ok(room)
    }

    /// Update a room's name, description or position.
    pub fn update_room(&mut self, map_id: &MapId, room_id: &RoomId, patch: RoomPatch) -> Result<Room, StoreError> {
        let name = patch.name.as_deref().map(|n| normalize_name(n, "room")).transpose()?;
        let map = self
            .maps
            .get(map_id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Map, map_id))?;
        if !map.rooms.contains_key(room_id) {
            return Err(foreign_room(map_id, room_id));
        }
        if let Some(position) = patch.list_position {
            if let Some(holder) = map.room_at(position).filter(|r| &r.id != room_id) {
                return Err(position_taken(map_id, position, &holder.id));
            }
        }
        if let Some(description) = &patch.description {
            check_room_links(map, description)?;
        }

        let room = self
            .maps
            .get_mut(map_id)
            .and_then(|m| m.rooms.get_mut(room_id))
            .ok_or_else(|| foreign_room(map_id, room_id))?;
        if let Some(name) = name {
            room.name = name;
        }
        if let Some(description) = patch.description {
            room.description = description;
        }
        if let Some(position) = patch.list_position {
            room.list_position = position;
        }
        Ok(room.clone())
    }

    /// Delete a room and its marker. Returns whether anything was removed.
    ///
    /// When the deleted room was active, focus moves to the next room in
    /// display order, or the previous one when it was last.
    pub fn delete_room(&mut self, map_id: &MapId, room_id: &RoomId) -> Result<bool, StoreError> {
        let Some(map) = self.maps.get(map_id) else {
            return Ok(false);
        };
        if !map.rooms.contains_key(room_id) {
            return Ok(false);
        }

        let referrers: Vec<&str> = map
            .rooms
            .values()
            .filter(|r| &r.id != room_id && links::links_to(&r.description, room_id))
            .map(|r| r.id.as_str())
            .collect();
        if !referrers.is_empty() {
            return Err(StoreError::Conflict(format!(
                "room {room_id} is linked from {}",
                referrers.join(", ")
            )));
        }

        let next_active = if map.active_room_id.as_ref() == Some(room_id) {
            let ordered = map.ordered_rooms();
            let idx = ordered.iter().position(|r| &r.id == room_id);
            idx.and_then(|i| ordered.get(i + 1).or_else(|| i.checked_sub(1).and_then(|p| ordered.get(p))))
                .map(|r| r.id.clone())
        } else {
            map.active_room_id.clone()
        };

        if let Some(map) = self.maps.get_mut(map_id) {
            map.rooms.remove(room_id);
            map.markers.remove(room_id);
            map.active_room_id = next_active;
        }
        Ok(true)
    }

    /// Focus a room of the map.
    pub fn set_active_room(&mut self, map_id: &MapId, room_id: &RoomId) -> Result<(), StoreError> {
        let map = self
            .maps
            .get_mut(map_id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Map, map_id))?;
        if !map.rooms.contains_key(room_id) {
            return Err(foreign_room(map_id, room_id));
        }
        map.active_room_id = Some(room_id.clone());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Markers
    // ------------------------------------------------------------------

    /// Place the marker for a room. Each room has at most one marker.
    pub fn add_marker(&mut self, map_id: &MapId, room_id: &RoomId, position: Position) -> Result<Marker, StoreError> {
        check_position(position)?;
        let map = self
            .maps
            .get_mut(map_id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Map, map_id))?;
        if !map.rooms.contains_key(room_id) {
            return Err(foreign_room(map_id, room_id));
        }
        if map.markers.contains_key(room_id) {
            return Err(StoreError::InvalidReference(format!(
                "room {room_id} already has a marker"
            )));
        }
        let marker = Marker { id: room_id.clone(), position };
        map.markers.insert(room_id.clone(), marker.clone());
        Ok(marker)
    }

    /// Move an existing marker.
    pub fn move_marker(&mut self, map_id: &MapId, room_id: &RoomId, position: Position) -> Result<Marker, StoreError> {
        check_position(position)?;
        let map = self
            .maps
            .get_mut(map_id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Map, map_id))?;
        let marker = map.markers.get_mut(room_id).ok_or_else(|| StoreError::NotFound {
            kind: "marker",
            id: room_id.to_string(),
        })?;
        marker.position = position;
        Ok(marker.clone())
    }

    /// Remove a room's marker. Returns whether one was removed.
    pub fn remove_marker(&mut self, map_id: &MapId, room_id: &RoomId) -> Result<bool, StoreError> {
        Ok(self
            .maps
            .get_mut(map_id)
            .is_some_and(|m| m.markers.remove(room_id).is_some()))
    }

    // ------------------------------------------------------------------
    // Integrity
    // ------------------------------------------------------------------

    /// Every broken reference in the catalog, as human-readable messages.
    ///
    /// Empty for any catalog built through the mutation methods; used to
    /// vet catalogs loaded from disk.
    pub fn integrity_problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        for user in self.users.values() {
            for dir in &user.directory_ids {
                if self.directories.get(dir).map(|d| &d.owner_id) != Some(&user.id) {
                    problems.push(format!("user {} lists unknown directory {dir}", user.id));
                }
            }
            for map in &user.map_ids {
                if self.maps.get(map).map(|m| &m.owner_id) != Some(&user.id) {
                    problems.push(format!("user {} lists unknown map {map}", user.id));
                }
            }
        }

        for dir in self.directories.values() {
            if !self.users.contains_key(&dir.owner_id) {
                problems.push(format!("directory {} has unknown owner {}", dir.id, dir.owner_id));
            }
            for map in &dir.map_ids {
                if self.maps.get(map).and_then(|m| m.directory_id.as_ref()) != Some(&dir.id) {
                    problems.push(format!("directory {} links map {map} which does not link back", dir.id));
                }
            }
        }

        for map in self.maps.values() {
            problems.extend(map_problems(map));
            if !self.users.contains_key(&map.owner_id) {
                problems.push(format!("map {} has unknown owner {}", map.id, map.owner_id));
            }
            if let Some(dir) = &map.directory_id {
                if !self.directories.get(dir).is_some_and(|d| d.map_ids.contains(&map.id)) {
                    problems.push(format!("map {} claims directory {dir} which does not list it", map.id));
                }
            }
        }

        problems
    }
}

/// Broken references confined to a single map.
pub(crate) fn map_problems(map: &Map) -> Vec<String> {
    let mut problems = Vec::new();
    if let Some(active) = &map.active_room_id {
        if !map.rooms.contains_key(active) {
            problems.push(format!("map {} has dangling active room {active}", map.id));
        }
    }
    for room_id in map.markers.keys() {
        if !map.rooms.contains_key(room_id) {
            problems.push(format!("map {} has orphan marker {room_id}", map.id));
        }
    }
    for room in map.rooms.values() {
        for target in links::room_links(&room.description) {
            if !map.rooms.contains_key(&target) {
                problems.push(format!("room {} links to missing room {target}", room.id));
            }
        }
    }
    problems
}

fn normalize_name(name: &str, what: &str) -> Result<String, StoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StoreError::InvalidInput(format!("{what} name must not be blank")));
    }
    Ok(trimmed.to_string())
}

fn check_position(position: Position) -> Result<(), StoreError> {
    if position.is_finite() {
        Ok(())
    } else {
        Err(StoreError::InvalidInput("marker coordinates must be finite".to_string()))
    }
}

fn check_room_links(map: &Map, description: &str) -> Result<(), StoreError> {
    match links::room_links(description)
        .into_iter()
        .find(|target| !map.rooms.contains_key(target))
    {
        Some(missing) => Err(StoreError::InvalidReference(format!(
            "description links to room {missing} which is not in map {}",
            map.id
        ))),
        None => Ok(()),
    }
}

fn position_taken(map_id: &MapId, position: i64, holder: &RoomId) -> StoreError {
    StoreError::Conflict(format!(
        "list position {position} in map {map_id} is held by room {holder}"
    ))
}

fn foreign_room(map_id: &MapId, room_id: &RoomId) -> StoreError {
    match EntityKind::of(room_id.as_str()) {
        Some(kind) if kind != EntityKind::Room => StoreError::InvalidReference(format!(
            "{room_id} is a {kind} id, expected a room of map {map_id}"
        )),
        _ => StoreError::InvalidReference(format!("room {room_id} does not belong to map {map_id}")),
    }
}
