//! Versioned remote persistence.
//!
//! Every save increments the drawing's version and appends a history entry.
//! Entries carry a full shape snapshot on creation, on every
//! [`SNAPSHOT_EVERY`]th version and on rollback; rollback restores the
//! newest snapshot at or before the requested version.

use super::{now_ms, BoxFuture, DrawingDocument, StorageError, StorageResult};
use crate::shapes::Shape;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

/// Versions between automatic snapshots.
pub const SNAPSHOT_EVERY: u64 = 10;

/// What produced a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryAction {
    Create,
    UpdateShapes,
    Rollback { target_version: u64 },
}

/// One recorded version of a drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub version: u64,
    pub action: HistoryAction,
    pub shape_count: usize,
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Vec<Shape>>,
}

/// Server-side drawing store with optimistic versioning.
pub trait RemoteStorage: Send + Sync {
    fn fetch(&self, id: &str) -> BoxFuture<'_, StorageResult<DrawingDocument>>;

    /// Store `document` if the stored version still equals `expected_version`.
    ///
    /// A drawing that does not exist yet is created at version 1 when
    /// `expected_version` is 0. Returns the new version.
    fn save(
        &self,
        document: &DrawingDocument,
        expected_version: u64,
    ) -> BoxFuture<'_, StorageResult<u64>>;

    /// History entries, newest first.
    fn history(&self, id: &str) -> BoxFuture<'_, StorageResult<Vec<HistoryEntry>>>;

    /// Restore the shapes of `version` as a new version.
    fn rollback(&self, id: &str, version: u64) -> BoxFuture<'_, StorageResult<DrawingDocument>>;
}

struct Record {
    document: DrawingDocument,
    history: Vec<HistoryEntry>,
}

impl Record {
    fn record(&mut self, action: HistoryAction, snapshot: bool) {
        self.history.push(HistoryEntry {
            version: self.document.version,
            action,
            shape_count: self.document.shapes.len(),
            created_at: self.document.updated_at,
            snapshot: snapshot.then(|| self.document.shapes.clone()),
        });
    }
}

/// In-process [`RemoteStorage`], also usable to simulate an outage.
pub struct MemoryRemoteStorage {
    records: RwLock<HashMap<String, Record>>,
    available: AtomicBool,
}

impl Default for MemoryRemoteStorage {
    fn default() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }
}

impl MemoryRemoteStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// While unavailable every call fails with [`StorageError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable("remote store offline".into()))
        }
    }
}

fn lock_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Other(format!("Lock error: {e}"))
}

impl RemoteStorage for MemoryRemoteStorage {
    fn fetch(&self, id: &str) -> BoxFuture<'_, StorageResult<DrawingDocument>> {
        let id = id.to_string();
        Box::pin(async move {
            self.check_available()?;
            let records = self.records.read().map_err(lock_error)?;
            records
                .get(&id)
                .map(|r| r.document.clone())
                .ok_or(StorageError::NotFound(id))
        })
    }

    fn save(
        &self,
        document: &DrawingDocument,
        expected_version: u64,
    ) -> BoxFuture<'_, StorageResult<u64>> {
        let document = document.clone();
        Box::pin(async move {
            self.check_available()?;
            document.validate_content()?;
            let mut records = self.records.write().map_err(lock_error)?;
            let now = now_ms();

            if !records.contains_key(&document.id) {
                if expected_version != 0 {
                    return Err(StorageError::NotFound(document.id));
                }
                let mut record = Record {
                    document: DrawingDocument {
                        version: 1,
                        created_at: now,
                        updated_at: now,
                        ..document
                    },
                    history: Vec::new(),
                };
                record.record(HistoryAction::Create, true);
                log::debug!("created remote drawing {}", record.document.id);
                records.insert(record.document.id.clone(), record);
                return Ok(1);
            }
            let record = records
                .get_mut(&document.id)
                .ok_or_else(|| StorageError::NotFound(document.id.clone()))?;

            let actual = record.document.version;
            if actual != expected_version {
                return Err(StorageError::Conflict {
                    expected: expected_version,
                    actual,
                });
            }

            let version = actual + 1;
            record.document = DrawingDocument {
                version,
                created_at: record.document.created_at,
                updated_at: now,
                ..document
            };
            record.record(HistoryAction::UpdateShapes, version % SNAPSHOT_EVERY == 0);
            Ok(version)
        })
    }

    fn history(&self, id: &str) -> BoxFuture<'_, StorageResult<Vec<HistoryEntry>>> {
        let id = id.to_string();
        Box::pin(async move {
            self.check_available()?;
            let records = self.records.read().map_err(lock_error)?;
            let record = records.get(&id).ok_or(StorageError::NotFound(id))?;
            Ok(record.history.iter().rev().cloned().collect())
        })
    }

    fn rollback(&self, id: &str, version: u64) -> BoxFuture<'_, StorageResult<DrawingDocument>> {
        let id = id.to_string();
        Box::pin(async move {
            self.check_available()?;
            let mut records = self.records.write().map_err(lock_error)?;
            let record = records.get_mut(&id).ok_or(StorageError::NotFound(id))?;
            if version == 0 || version > record.document.version {
                return Err(StorageError::RollbackUnavailable(version));
            }

            let shapes = record
                .history
                .iter()
                .rev()
                .filter(|entry| entry.version <= version)
                .find_map(|entry| entry.snapshot.clone())
                .ok_or(StorageError::RollbackUnavailable(version))?;

            record.document.shapes = shapes;
            record.document.version += 1;
            record.document.updated_at = now_ms();
            record.record(
                HistoryAction::Rollback {
                    target_version: version,
                },
                true,
            );
            log::info!(
                "rolled back {} to version {version} as version {}",
                record.document.id,
                record.document.version
            );
            Ok(record.document.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::Rectangle;
    use crate::storage::block_on;
    use kurbo::Point;

    fn rect(x: f64) -> Shape {
        Shape::Rectangle(Rectangle::new(Point::new(x, 0.0), 10.0, 10.0))
    }

    /// Save `count` successive versions, each with one more rectangle.
    fn save_versions(store: &MemoryRemoteStorage, doc: &mut DrawingDocument, count: usize) {
        for _ in 0..count {
            let mut shapes = doc.shapes.clone();
            shapes.push(rect(shapes.len() as f64 * 20.0));
            doc.shapes = shapes;
            doc.version = block_on(store.save(doc, doc.version)).unwrap();
        }
    }

    #[test]
    fn test_create_and_update_versions() {
        let store = MemoryRemoteStorage::new();
        let mut doc = DrawingDocument::new("Plan");
        assert_eq!(block_on(store.save(&doc, 0)).unwrap(), 1);
        doc.version = 1;
        doc.shapes.push(rect(0.0));
        assert_eq!(block_on(store.save(&doc, 1)).unwrap(), 2);

        let fetched = block_on(store.fetch(&doc.id)).unwrap();
        assert_eq!(fetched.version, 2);
        assert_eq!(fetched.shapes.len(), 1);

        let history = block_on(store.history(&doc.id)).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].version, 2);
        assert_eq!(history[1].action, HistoryAction::Create);
        assert!(history[1].snapshot.is_some());
        assert!(history[0].snapshot.is_none());
    }

    #[test]
    fn test_stale_save_conflicts() {
        let store = MemoryRemoteStorage::new();
        let doc = DrawingDocument::new("Plan");
        block_on(store.save(&doc, 0)).unwrap();
        block_on(store.save(&doc, 1)).unwrap();

        let err = block_on(store.save(&doc, 1)).unwrap_err();
        assert!(matches!(err, StorageError::Conflict { expected: 1, actual: 2 }));

        let missing = DrawingDocument::new("Other");
        assert!(matches!(
            block_on(store.save(&missing, 4)),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_snapshot_every_tenth_version() {
        let store = MemoryRemoteStorage::new();
        let mut doc = DrawingDocument::new("Plan");
        doc.version = 0;
        save_versions(&store, &mut doc, 12);
        assert_eq!(doc.version, 12);

        let snapshots: Vec<u64> = block_on(store.history(&doc.id))
            .unwrap()
            .iter()
            .filter(|e| e.snapshot.is_some())
            .map(|e| e.version)
            .collect();
        assert_eq!(snapshots, vec![10, 1]);
    }

    #[test]
    fn test_rollback_uses_nearest_snapshot() {
        let store = MemoryRemoteStorage::new();
        let mut doc = DrawingDocument::new("Plan");
        doc.version = 0;
        save_versions(&store, &mut doc, 12);

        // Version 10 holds ten rectangles; version 11 is restored from it.
        let restored = block_on(store.rollback(&doc.id, 11)).unwrap();
        assert_eq!(restored.version, 13);
        assert_eq!(restored.shapes.len(), 10);

        let restored = block_on(store.rollback(&doc.id, 3)).unwrap();
        assert_eq!(restored.version, 14);
        assert_eq!(restored.shapes.len(), 1);

        let latest = &block_on(store.history(&doc.id)).unwrap()[0];
        assert_eq!(latest.action, HistoryAction::Rollback { target_version: 3 });
        assert!(latest.snapshot.is_some());
    }

    #[test]
    fn test_rollback_out_of_range() {
        let store = MemoryRemoteStorage::new();
        let doc = DrawingDocument::new("Plan");
        block_on(store.save(&doc, 0)).unwrap();
        assert!(matches!(
            block_on(store.rollback(&doc.id, 5)),
            Err(StorageError::RollbackUnavailable(5))
        ));
        assert!(matches!(
            block_on(store.rollback(&doc.id, 0)),
            Err(StorageError::RollbackUnavailable(0))
        ));
    }

    #[test]
    fn test_unavailable_store() {
        let store = MemoryRemoteStorage::new();
        store.set_available(false);
        let doc = DrawingDocument::new("Plan");
        let err = block_on(store.save(&doc, 0)).unwrap_err();
        assert!(err.is_transient());
        store.set_available(true);
        assert!(block_on(store.save(&doc, 0)).is_ok());
    }
}
