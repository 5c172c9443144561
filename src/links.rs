//! Room cross-references embedded in markdown descriptions.
//!
//! Only link targets that parse as room ids count as references; URLs,
//! anchors and legacy numeric targets are left to the renderer.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex_lite::Regex;

use crate::types::{EntityKind, RoomId};

fn link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\[[^\]]*\]\(\s*([^)\s]+)\s*\)").expect("link pattern is valid")
    })
}

/// Room ids linked from `description`, deduplicated and sorted.
pub fn room_links(description: &str) -> BTreeSet<RoomId> {
    link_pattern()
        .captures_iter(description)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|target| EntityKind::of(target) == Some(EntityKind::Room))
        .map(RoomId::from)
        .collect()
}

/// Whether `description` links to `room`.
pub fn links_to(description: &str, room: &RoomId) -> bool {
    room_links(description).contains(room)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_room_links() {
        let text = "Doors to the [Storage Room](room-2) and [Officer's Quarters]( room-a3 ).";
        let links: Vec<String> = room_links(text).into_iter().map(|r| r.to_string()).collect();
        assert_eq!(links, vec!["room-2", "room-a3"]);
    }

    #[test]
    fn test_ignores_non_room_targets() {
        let text = "[map](map-4) [site](https://example.com) [legacy](2) [anchor](#exits)";
        assert!(room_links(text).is_empty());
    }

    #[test]
    fn test_links_to() {
        let text = "See the [Barracks](room-1).";
        assert!(links_to(text, &RoomId::new("room-1")));
        assert!(!links_to(text, &RoomId::new("room-10")));
    }
}
