//! End-to-end tests for the catalog through the store and read services.
//!
//! These cover ordering, counting, cascade and conflict behavior of the
//! public API, independent of the HTTP layer.

use std::sync::Arc;

use mapkeeper::{
    project_map_view, Catalog, DirectoryLister, EntityStore, InMemoryEntityStore, MapId,
    MapViewBuilder, Position, RoomId, RoomPatch, StoreError, UserId, ViewError,
};
use proptest::prelude::*;

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn store_with_map() -> (Arc<InMemoryEntityStore>, UserId, MapId) {
    let store = InMemoryEntityStore::new();
    let (user, map) = store
        .apply(|c| {
            let user = c.register_user("Jessica")?;
            let map = c.create_map(&user.id, "Keep", "", "")?;
            Ok((user.id, map.id))
        })
        .unwrap();
    (Arc::new(store), user, map)
}

fn link(label: &str, id: &RoomId) -> String {
    format!("[{label}]({id})")
}

// ─────────────────────────────────────────────────────────────────────────────
// CONCRETE SCENARIOS
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_barracks_scenario() {
    let (store, _, map) = store_with_map();
    let views = MapViewBuilder::new(Arc::clone(&store));

    let m = map.clone();
    let room = store
        .transact(move |c| c.add_room(&m, "Barracks", "## Description", 1))
        .await
        .unwrap();
    let (m, r) = (map.clone(), room.id.clone());
    store
        .transact(move |c| c.add_marker(&m, &r, Position::new(54.0, 70.0)))
        .await
        .unwrap();

    let view = views.build(&map).unwrap();
    assert_eq!(view.id, map);
    assert_eq!(view.room_list.len(), 1);
    assert_eq!(view.room_list[0].id, room.id);
    assert_eq!(view.room_list[0].list_position, 1);
    assert_eq!(view.marker_list.len(), 1);
    assert_eq!(view.marker_list[&room.id].position, Position::new(54.0, 70.0));

    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["roomList"][0]["listPosition"], 1);
    assert_eq!(
        json["markerList"][room.id.as_str()]["position"],
        serde_json::json!([54.0, 70.0])
    );
}

#[tokio::test]
async fn test_duplicate_position_conflicts_and_changes_nothing() {
    let (store, _, map) = store_with_map();
    let views = MapViewBuilder::new(Arc::clone(&store));

    let m = map.clone();
    store.transact(move |c| c.add_room(&m, "Barracks", "", 1)).await.unwrap();
    let before = store.snapshot();

    let m = map.clone();
    let err = store
        .transact(move |c| c.add_room(&m, "Armory", "", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));

    assert_eq!(views.build(&map).unwrap().room_list.len(), 1);
    // Nothing was allocated either.
    assert_eq!(*store.snapshot(), *before);
}

#[tokio::test]
async fn test_map_lives_in_one_directory() {
    let (store, user, map) = store_with_map();

    let (u, m) = (user.clone(), map.clone());
    let (first, second) = store
        .transact(move |c| {
            let first = c.create_directory(&u, "Dungeons")?;
            let second = c.create_directory(&u, "Towns")?;
            c.link_map_to_directory(&first.id, &m)?;
            Ok((first.id, second.id))
        })
        .await
        .unwrap();

    let (d, m) = (second.clone(), map.clone());
    let err = store
        .transact(move |c| c.link_map_to_directory(&d, &m))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));

    // Relinking into the same directory keeps a single entry.
    let (d, m) = (first.clone(), map.clone());
    store.transact(move |c| c.link_map_to_directory(&d, &m)).await.unwrap();

    let lister = DirectoryLister::new(Arc::clone(&store));
    let dirs = lister.list_directories(&user).unwrap();
    assert_eq!(dirs.len(), 2);
    assert_eq!(dirs[0].id, first);
    assert_eq!(dirs[0].maps.len(), 1);
    assert!(dirs[1].maps.is_empty());
}

#[tokio::test]
async fn test_delete_map_cascades() {
    let (store, user, map) = store_with_map();

    let (u, m) = (user.clone(), map.clone());
    store
        .transact(move |c| {
            let dir = c.create_directory(&u, "Dungeons")?;
            c.link_map_to_directory(&dir.id, &m)?;
            let a = c.add_room(&m, "Barracks", "", 1)?;
            let b = c.add_room(&m, "Storage Room", "", 2)?;
            c.add_marker(&m, &a.id, Position::new(1.0, 2.0))?;
            c.add_marker(&m, &b.id, Position::new(3.0, 4.0))?;
            Ok(())
        })
        .await
        .unwrap();

    let m = map.clone();
    assert!(store.transact(move |c| c.delete_map(&m)).await.unwrap());

    let views = MapViewBuilder::new(Arc::clone(&store));
    assert!(matches!(views.build(&map), Err(ViewError::NotFound { .. })));

    let snapshot = store.snapshot();
    assert!(snapshot.map(&map).is_none());
    assert!(snapshot.user(&user).unwrap().map_ids.is_empty());
    assert!(snapshot.integrity_problems().is_empty());

    let lister = DirectoryLister::new(Arc::clone(&store));
    let dirs = lister.list_directories(&user).unwrap();
    assert!(dirs[0].maps.is_empty());
    assert!(lister.list_maps(&user).unwrap().is_empty());

    // Deleting again is a no-op.
    let m = map.clone();
    assert!(!store.transact(move |c| c.delete_map(&m)).await.unwrap());
}

#[tokio::test]
async fn test_linked_room_cannot_be_deleted_until_unlinked() {
    let (store, _, map) = store_with_map();

    let m = map.clone();
    let (barracks, storage) = store
        .transact(move |c| {
            let storage = c.add_room(&m, "Storage Room", "", 2)?;
            let barracks = c.add_room(&m, "Barracks", &format!("Exits: {}", link("Storage", &storage.id)), 1)?;
            Ok((barracks.id, storage.id))
        })
        .await
        .unwrap();

    let (m, s) = (map.clone(), storage.clone());
    let err = store.transact(move |c| c.delete_room(&m, &s)).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));

    let (m, b) = (map.clone(), barracks.clone());
    store
        .transact(move |c| {
            c.update_room(&m, &b, RoomPatch { description: Some("No exits".into()), ..RoomPatch::default() })
        })
        .await
        .unwrap();

    let (m, s) = (map.clone(), storage.clone());
    assert!(store.transact(move |c| c.delete_room(&m, &s)).await.unwrap());
}

#[tokio::test]
async fn test_failed_compound_transaction_rolls_back() {
    let (store, _, map) = store_with_map();
    let before = store.snapshot();

    let m = map.clone();
    let err = store
        .transact(move |c| {
            c.add_room(&m, "Barracks", "", 1)?;
            c.add_room(&m, "Armory", "", 1)
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
    assert_eq!(*store.snapshot(), *before);
}

#[tokio::test]
async fn test_snapshot_is_stable_across_writes() {
    let (store, _, map) = store_with_map();
    let reader = store.snapshot();

    let m = map.clone();
    store.transact(move |c| c.add_room(&m, "Barracks", "", 1)).await.unwrap();

    assert!(reader.map(&map).unwrap().rooms.is_empty());
    assert_eq!(store.snapshot().map(&map).unwrap().rooms.len(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// PROPERTY TESTS
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Add(i64),
    Delete(usize),
    Mark(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (-20i64..20).prop_map(Op::Add),
        1 => any::<usize>().prop_map(Op::Delete),
        2 => any::<usize>().prop_map(Op::Mark),
    ]
}

/// Replays `ops` against a fresh catalog, returning the map with the number
/// of rooms and markers that should remain.
fn replay(ops: &[Op]) -> (Catalog, MapId, usize, usize) {
    let mut catalog = Catalog::new();
    let user = catalog.register_user("Jessica").unwrap();
    let map = catalog.create_map(&user.id, "Keep", "", "").unwrap().id;

    let mut live: Vec<RoomId> = Vec::new();
    let mut marked = 0usize;
    for op in ops {
        match op {
            Op::Add(position) => {
                let taken = catalog.map(&map).unwrap().room_at(*position).is_some();
                match catalog.add_room(&map, "Room", "", *position) {
                    Ok(room) => {
                        assert!(!taken);
                        live.push(room.id);
                    }
                    Err(StoreError::Conflict(_)) => assert!(taken),
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
            Op::Delete(pick) if !live.is_empty() => {
                let room = live.remove(pick % live.len());
                if catalog.map(&map).unwrap().markers.contains_key(&room) {
                    marked -= 1;
                }
                assert!(catalog.delete_room(&map, &room).unwrap());
            }
            Op::Mark(pick) if !live.is_empty() => {
                let room = &live[pick % live.len()];
                if !catalog.map(&map).unwrap().markers.contains_key(room) {
                    catalog.add_marker(&map, room, Position::new(1.0, 1.0)).unwrap();
                    marked += 1;
                }
            }
            _ => {}
        }
    }
    (catalog, map, live.len(), marked)
}

proptest! {
    #[test]
    fn prop_room_list_sorted_by_position(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let (catalog, map, _, _) = replay(&ops);
        let view = project_map_view(&catalog, &map).unwrap();
        for pair in view.room_list.windows(2) {
            prop_assert!(pair[0].list_position < pair[1].list_position);
        }
    }

    #[test]
    fn prop_room_and_marker_counts_match_history(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let (catalog, map, rooms, markers) = replay(&ops);
        let view = project_map_view(&catalog, &map).unwrap();
        prop_assert_eq!(view.room_list.len(), rooms);
        prop_assert_eq!(view.marker_list.len(), markers);
        prop_assert!(catalog.integrity_problems().is_empty());
    }

    #[test]
    fn prop_ids_never_reused(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let (catalog, map, _, _) = replay(&ops);
        let before = catalog.ids_issued();
        let mut catalog = catalog;
        let position = catalog.next_list_position(&map).unwrap();
        let room = catalog.add_room(&map, "Fresh", "", position).unwrap();
        prop_assert_eq!(catalog.ids_issued(), before + 1);
        prop_assert_eq!(room.id.as_str(), format!("room-{:x}", before + 1));
    }
}
