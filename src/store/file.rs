//! File-backed entity store.
//!
//! The whole catalog is written as one JSON snapshot after every committed
//! operation. Writes go to a sibling temp file that is then renamed over
//! the snapshot, so a crash leaves either the old or the new state on disk.
//!
//! ## Snapshot layout
//!
//! ```text
//! { "schemaVersion": "1.0.0",
//!   "savedAt": "2024-01-01T00:00:00Z",
//!   "checksum": "<xxh64 of canonical catalog JSON>",
//!   "catalog": { "ids": {...}, "users": {...}, "directories": {...}, "maps": {...} } }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::canonical::canonical_hash_hex;
use crate::CATALOG_SCHEMA_VERSION;

use super::{Catalog, EntityStore, StoreError};

/// Errors loading or writing a catalog snapshot.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// Filesystem failure.
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// Snapshot is not valid JSON for the catalog schema.
    #[error("snapshot is malformed: {0}")]
    Json(#[from] serde_json::Error),
    /// Snapshot was written by an incompatible schema.
    #[error("snapshot schema {found} is not supported (expected {expected})")]
    SchemaVersion {
        /// Version found in the file.
        found: String,
        /// Version this build writes.
        expected: &'static str,
    },
    /// Stored checksum does not match the catalog contents.
    #[error("snapshot checksum mismatch: stored {stored}, computed {computed}")]
    Checksum {
        /// Checksum recorded in the file.
        stored: String,
        /// Checksum of the loaded catalog.
        computed: String,
    },
    /// The catalog contains broken references.
    #[error("snapshot has {} broken reference(s): {}", .0.len(), .0.join("; "))]
    Integrity(Vec<String>),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotFile {
    schema_version: String,
    saved_at: DateTime<Utc>,
    checksum: String,
    catalog: Catalog,
}

/// Entity store persisted to a JSON snapshot file.
pub struct FileEntityStore {
    path: PathBuf,
    catalog: RwLock<Arc<Catalog>>,
    writer: tokio::sync::Mutex<()>,
}

impl FileEntityStore {
    /// Open the snapshot at `path`, or start empty when it does not exist.
    ///
    /// Nothing is written until the first committed operation.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let path = path.into();
        let catalog = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let catalog = decode_snapshot(&bytes)?;
                tracing::info!(
                    path = %path.display(),
                    maps = catalog.num_maps(),
                    directories = catalog.num_directories(),
                    "Loaded catalog snapshot"
                );
                catalog
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No catalog snapshot yet, starting empty");
                Catalog::new()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            catalog: RwLock::new(Arc::new(catalog)),
            writer: tokio::sync::Mutex::new(()),
        })
    }

    /// Location of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, catalog: &Catalog) -> Result<(), PersistError> {
        let bytes = encode_snapshot(catalog)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);

        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::debug!(path = %self.path.display(), bytes = bytes.len(), "Catalog snapshot written");
        Ok(())
    }
}

#[async_trait]
impl EntityStore for FileEntityStore {
    fn snapshot(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog.read())
    }

    async fn transact<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Catalog) -> Result<T, StoreError> + Send + 'static,
    {
        // Held across the disk write so snapshots land in commit order.
        let _writer = self.writer.lock().await;

        let mut next = Catalog::clone(&self.snapshot());
        let out = op(&mut next)?;

        if let Err(e) = self.persist(&next).await {
            tracing::error!(path = %self.path.display(), error = %e, "Failed to persist catalog");
            return Err(StoreError::Storage(e.to_string()));
        }
        *self.catalog.write() = Arc::new(next);
        Ok(out)
    }
}

fn encode_snapshot(catalog: &Catalog) -> Result<Vec<u8>, PersistError> {
    let file = SnapshotFile {
        schema_version: CATALOG_SCHEMA_VERSION.to_string(),
        saved_at: Utc::now(),
        checksum: canonical_hash_hex(catalog),
        catalog: catalog.clone(),
    };
    Ok(serde_json::to_vec_pretty(&file)?)
}

fn decode_snapshot(bytes: &[u8]) -> Result<Catalog, PersistError> {
    let file: SnapshotFile = serde_json::from_slice(bytes)?;
    if file.schema_version != CATALOG_SCHEMA_VERSION {
        return Err(PersistError::SchemaVersion {
            found: file.schema_version,
            expected: CATALOG_SCHEMA_VERSION,
        });
    }
    let computed = canonical_hash_hex(&file.catalog);
    if computed != file.checksum {
        return Err(PersistError::Checksum { stored: file.checksum, computed });
    }
    let problems = file.catalog.integrity_problems();
    if !problems.is_empty() {
        return Err(PersistError::Integrity(problems));
    }
    Ok(file.catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Position;

    #[tokio::test]
    async fn test_reopen_restores_catalog_and_id_counter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");

        let store = FileEntityStore::open(&path).await.unwrap();
        let (map, room) = store
            .transact(|c| {
                let user = c.register_user("Jessica")?;
                let map = c.create_map(&user.id, "Dummy Map", "", "map.jpg")?;
                let room = c.add_room(&map.id, "Barracks", "", 1)?;
                c.add_marker(&map.id, &room.id, Position::new(54.0, 70.0))?;
                Ok((map.id, room.id))
            })
            .await
            .unwrap();
        let issued = store.snapshot().ids_issued();
        drop(store);

        let reopened = FileEntityStore::open(&path).await.unwrap();
        let snapshot = reopened.snapshot();
        let stored = snapshot.map(&map).unwrap();
        assert_eq!(stored.markers[&room].position, Position::new(54.0, 70.0));
        assert_eq!(snapshot.ids_issued(), issued);

        let fresh = reopened
            .transact(move |c| c.add_room(&map, "Storage Room", "", 2))
            .await
            .unwrap();
        assert_ne!(fresh.id, room);
    }

    #[tokio::test]
    async fn test_failed_operation_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let store = FileEntityStore::open(&path).await.unwrap();

        let result = store.transact(|c| c.register_user("  ")).await;
        assert!(matches!(result, Err(StoreError::InvalidInput(_))));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_checksum_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let store = FileEntityStore::open(&path).await.unwrap();
        store.transact(|c| c.register_user("Jessica")).await.unwrap();
        drop(store);

        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, text.replace("Jessica", "Mallory")).unwrap();

        let err = FileEntityStore::open(&path).await.err().unwrap();
        assert!(matches!(err, PersistError::Checksum { .. }));
    }

    #[tokio::test]
    async fn test_snapshot_keeps_client_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("catalog.json");
        let store = FileEntityStore::open(&path).await.unwrap();
        store
            .transact(|c| {
                let user = c.register_user("Jessica")?;
                let map = c.create_map(&user.id, "Dummy Map", "", "map.jpg")?;
                let room = c.add_room(&map.id, "Barracks", "", 1)?;
                c.set_active_room(&map.id, &room.id)
            })
            .await
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        for field in ["\"ownerId\"", "\"imageUrl\"", "\"activeRoomId\"", "\"listPosition\"", "\"schemaVersion\""] {
            assert!(text.contains(field), "missing {field}");
        }
    }

    #[tokio::test]
    async fn test_reopen_keeps_marker_coordinates_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let coords = [39.430133835633676, 18.233521453552402];

        let store = FileEntityStore::open(&path).await.unwrap();
        let (map, room) = store
            .transact(move |c| {
                let user = c.register_user("Jessica")?;
                let map = c.create_map(&user.id, "Dummy Map", "", "map.jpg")?;
                let room = c.add_room(&map.id, "Barracks", "", 1)?;
                c.add_marker(&map.id, &room.id, Position::new(coords[0], coords[1]))?;
                Ok((map.id, room.id))
            })
            .await
            .unwrap();
        drop(store);

        let reopened = FileEntityStore::open(&path).await.unwrap();
        let snapshot = reopened.snapshot();
        let [x, y] = snapshot.map(&map).unwrap().markers[&room].position.0;
        assert_eq!(x.to_bits(), coords[0].to_bits());
        assert_eq!(y.to_bits(), coords[1].to_bits());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_disk_and_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let path = data_dir.join("catalog.json");

        let store = FileEntityStore::open(&path).await.unwrap();
        let user = store.transact(|c| c.register_user("Jessica")).await.unwrap();
        let on_disk = std::fs::read_to_string(&path).unwrap();
        let before = store.snapshot();

        // Block the snapshot directory with a regular file.
        std::fs::rename(&data_dir, dir.path().join("moved")).unwrap();
        std::fs::write(&data_dir, b"not a directory").unwrap();

        let result = store
            .transact(move |c| c.create_directory(&user.id, "My Maps"))
            .await;
        assert!(matches!(result, Err(StoreError::Storage(_))));
        assert_eq!(*store.snapshot(), *before);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("moved").join("catalog.json")).unwrap(),
            on_disk
        );
    }
}
