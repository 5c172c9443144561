//! Startup provisioning: the default user and the sample map.

use crate::store::{Catalog, RoomPatch, StoreError};
use crate::types::{DirectoryId, MapId, Position, User, UserId};

/// Image used by the sample map.
pub const DEMO_IMAGE_URL: &str = "https://rapidnotes.files.wordpress.com/2016/08/dyson-logos-camping-map.jpg";

/// What [`seed_demo`] created.
#[derive(Debug, Clone)]
pub struct SeedSummary {
    /// The sample directory.
    pub directory_id: DirectoryId,
    /// The sample map.
    pub map_id: MapId,
    /// Rooms added to the map.
    pub room_count: usize,
}

/// Return the user named `name`, registering it when absent.
pub fn ensure_user(catalog: &mut Catalog, name: &str) -> Result<User, StoreError> {
    let wanted = name.trim();
    if let Some(user) = catalog.user_by_name(wanted) {
        return Ok(user.clone());
    }
    catalog.register_user(wanted)
}

struct DemoRoom {
    name: &'static str,
    list_position: i64,
    marker: [f64; 2],
    body: &'static str,
    exits: &'static [(&'static str, usize)],
}

const DEMO_ROOMS: &[DemoRoom] = &[
    DemoRoom {
        name: "Barracks",
        list_position: 1,
        marker: [54.0, 70.0],
        body: "## Description\n\
               Fifteen straw mattresses line the walls, each with a small wooden chest at its foot. \
               A long table with benches fills the center of the room.\n\n\
               ## Creatures\n\
               Four **lizardfolk**, one **lizardfolk scaleshield** and one **lizardfolk shaman** \
               prepare for patrol here.\n\n\
               ## Treasure\n\
               The chests are unlocked. Five hold a purse with 6 sp each.",
        exits: &[("Storage Room", 1), ("Officer's Quarters", 2)],
    },
    DemoRoom {
        name: "Storage Room",
        list_position: 3,
        marker: [65.0, 35.0],
        body: "## Description\n\
               **Six carcasses** hang from hooks in the ceiling. Crates, baskets and barrels of \
               fruit, oil, salt and pickled meat are stacked against the walls.\n\n\
               ## Carcasses\n\
               - a manta ray\n- a giant frog\n- two sharks\n- a giant crayfish",
        exits: &[("Barracks", 0), ("Officer's Quarters", 2)],
    },
    DemoRoom {
        name: "Officer's Quarters",
        list_position: 2,
        marker: [30.0, 70.0],
        body: "## Description\n\
               A wooden table holds a jug of cider and a cup. A bed stands against the west wall \
               with a brass-bound chest at its foot.\n\n\
               ## Creatures\n\
               An officer (a **lizardfolk scaleshield**) sits on the bed, sharpening a sword.",
        exits: &[("Barracks", 0), ("Storage Room", 1)],
    },
];

/// Create the sample directory and map for `owner`.
///
/// Rooms are created first and their descriptions filled in afterwards,
/// since the exits link to rooms by id.
pub fn seed_demo(catalog: &mut Catalog, owner: &UserId) -> Result<SeedSummary, StoreError> {
    let directory = catalog.create_directory(owner, "My Maps")?;
    let map = catalog.create_map(
        owner,
        "Dummy Map",
        "Lizardfolk lair: barracks wing",
        DEMO_IMAGE_URL,
    )?;
    catalog.link_map_to_directory(&directory.id, &map.id)?;

    let mut room_ids = Vec::with_capacity(DEMO_ROOMS.len());
    for demo in DEMO_ROOMS {
        let room = catalog.add_room(&map.id, demo.name, "", demo.list_position)?;
        let [x, y] = demo.marker;
        catalog.add_marker(&map.id, &room.id, Position::new(x, y))?;
        room_ids.push(room.id);
    }

    for (demo, room_id) in DEMO_ROOMS.iter().zip(&room_ids) {
        let exits: Vec<String> = demo
            .exits
            .iter()
            .map(|(label, idx)| format!("[{label}]({})", room_ids[*idx]))
            .collect();
        let description = format!(
            "{}\n\n## Exits\nA long hallway leads to the {}.",
            demo.body,
            exits.join(" and ")
        );
        catalog.update_room(
            &map.id,
            room_id,
            RoomPatch { description: Some(description), ..Default::default() },
        )?;
    }

    if let Some(first) = room_ids.first() {
        catalog.set_active_room(&map.id, first)?;
    }

    Ok(SeedSummary { directory_id: directory.id, map_id: map.id, room_count: room_ids.len() })
}
