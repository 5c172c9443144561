//! Identifier types and the identifier allocator.
//!
//! Every entity id is an opaque string of the form `<prefix>-<hex counter>`.
//! The counter is shared by all kinds, so an id is unique across the whole
//! catalog and never handed out twice, even after the entity is deleted.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kinds of entity that receive allocated identifiers.
///
/// Markers are absent on purpose: a marker is keyed by the room it annotates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A user account.
    User,
    /// A directory grouping maps.
    Directory,
    /// A map with rooms and markers.
    Map,
    /// A room inside a map.
    Room,
}

impl EntityKind {
    /// Id prefix for this kind.
    pub fn prefix(self) -> &'static str {
        match self {
            EntityKind::User => "usr",
            EntityKind::Directory => "dir",
            EntityKind::Map => "map",
            EntityKind::Room => "room",
        }
    }

    /// Lowercase human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Directory => "directory",
            EntityKind::Map => "map",
            EntityKind::Room => "room",
        }
    }

    /// Recover the kind an id was allocated for, if the id is well formed.
    pub fn of(id: &str) -> Option<Self> {
        let (prefix, counter) = id.split_once('-')?;
        if counter.is_empty() || !counter.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        [Self::User, Self::Directory, Self::Map, Self::Room]
            .into_iter()
            .find(|kind| kind.prefix() == prefix)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing id string. No validation is performed;
            /// lookups with a malformed id simply find nothing.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the id as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

entity_id!(
    /// Identifier of a [`User`](super::User).
    UserId
);
entity_id!(
    /// Identifier of a [`Directory`](super::Directory).
    DirectoryId
);
entity_id!(
    /// Identifier of a [`Map`](super::Map).
    MapId
);
entity_id!(
    /// Identifier of a [`Room`](super::Room). Also identifies the room's marker.
    RoomId
);

/// Monotonic identifier allocator.
///
/// Serialized with the catalog so the counter survives restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    /// Create an allocator starting at 1.
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Allocate a fresh id string for `kind`.
    pub fn allocate(&mut self, kind: EntityKind) -> String {
        let id = format!("{}-{:x}", kind.prefix(), self.next);
        self.next += 1;
        id
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.next - 1
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_allocate_unique_across_kinds() {
        let mut ids = IdAllocator::new();
        let mut seen = HashSet::new();
        for kind in [EntityKind::User, EntityKind::Map, EntityKind::Room, EntityKind::Directory]
            .into_iter()
            .cycle()
            .take(400)
        {
            assert!(seen.insert(ids.allocate(kind)));
        }
        assert_eq!(ids.issued(), 400);
    }

    #[test]
    fn test_kind_roundtrip() {
        let mut ids = IdAllocator::new();
        let room = ids.allocate(EntityKind::Room);
        let map = ids.allocate(EntityKind::Map);
        assert_eq!(room, "room-1");
        assert_eq!(map, "map-2");
        assert_eq!(EntityKind::of(&room), Some(EntityKind::Room));
        assert_eq!(EntityKind::of(&map), Some(EntityKind::Map));
    }

    #[test]
    fn test_kind_of_rejects_malformed() {
        assert_eq!(EntityKind::of("room-"), None);
        assert_eq!(EntityKind::of("room-xyz"), None);
        assert_eq!(EntityKind::of("https://example.com"), None);
        assert_eq!(EntityKind::of("332e3"), None);
    }

    #[test]
    fn test_id_serializes_as_plain_string() {
        let id = MapId::new("map-a");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"map-a\"");
    }
}
