//! File-based storage.

use super::{BoxFuture, DrawingDocument, Storage, StorageError, StorageResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Stores documents as JSON files in a directory.
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a file storage rooted at `base_path`, creating the directory if needed.
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                StorageError::Io(format!("Failed to create storage directory: {e}"))
            })?;
        }
        Ok(Self { base_path })
    }

    /// Create file storage in the default location.
    ///
    /// On Unix: `~/.local/share/inkframe/drawings/`
    /// On Windows: `%LOCALAPPDATA%\inkframe\drawings\`
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Io("Could not determine home directory".to_string()))?;

        Self::new(base.join("inkframe").join("drawings"))
    }

    /// File path for a document ID, with unsafe characters replaced.
    fn document_path(&self, id: &str) -> PathBuf {
        let safe_id: String = id
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.base_path.join(format!("{safe_id}.json"))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

impl Storage for FileStorage {
    fn save(&self, id: &str, document: &DrawingDocument) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.document_path(id);
        let json = document.validate().and_then(|()| document.to_json());

        Box::pin(async move {
            let json = json?;
            // Atomic replace: write a sibling temp file, then rename.
            let tmp = path.with_extension("json.tmp");
            fs::write(&tmp, json).map_err(|e| {
                StorageError::Io(format!("Failed to write {}: {e}", tmp.display()))
            })?;
            fs::rename(&tmp, &path).map_err(|e| {
                StorageError::Io(format!("Failed to replace {}: {e}", path.display()))
            })
        })
    }

    fn load(&self, id: &str) -> BoxFuture<'_, StorageResult<DrawingDocument>> {
        let path = self.document_path(id);
        let id_owned = id.to_string();

        Box::pin(async move {
            if !path.exists() {
                return Err(StorageError::NotFound(id_owned));
            }

            let json = fs::read_to_string(&path).map_err(|e| {
                StorageError::Io(format!("Failed to read {}: {e}", path.display()))
            })?;

            DrawingDocument::from_json(&json).map_err(|e| match e {
                StorageError::Serialization(msg) => {
                    StorageError::Serialization(format!("Failed to parse {}: {msg}", path.display()))
                }
                other => other,
            })
        })
    }

    fn delete(&self, id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.document_path(id);

        Box::pin(async move {
            if path.exists() {
                fs::remove_file(&path).map_err(|e| {
                    StorageError::Io(format!("Failed to delete {}: {e}", path.display()))
                })?;
            }
            Ok(())
        })
    }

    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        let base = self.base_path.clone();

        Box::pin(async move {
            if !base.exists() {
                return Ok(vec![]);
            }

            let entries = fs::read_dir(&base)
                .map_err(|e| StorageError::Io(format!("Failed to read directory: {e}")))?;

            let mut ids: Vec<String> = entries
                .flatten()
                .map(|entry| entry.path())
                .filter(|path| path.extension().is_some_and(|e| e == "json"))
                .filter_map(|path| path.file_stem()?.to_str().map(str::to_string))
                .collect();
            ids.sort();
            Ok(ids)
        })
    }

    fn exists(&self, id: &str) -> BoxFuture<'_, StorageResult<bool>> {
        let path = self.document_path(id);
        Box::pin(async move { Ok(path.exists()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Line, Shape};
    use crate::storage::block_on;
    use kurbo::Point;
    use tempfile::{tempdir, TempDir};

    fn drawings_dir() -> (TempDir, FileStorage) {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("drawings")).unwrap();
        (dir, storage)
    }

    #[test]
    fn test_round_trips_shapes_and_metadata() {
        let (_dir, storage) = drawings_dir();
        let line = Shape::Line(Line::new(Point::ZERO, Point::new(10.0, 10.0)));
        let mut doc = DrawingDocument::new("Floor plan").with_shapes(vec![line]);
        doc.description = Some("ground floor".into());
        doc.canvas_width = 800;

        block_on(storage.save(&doc.id, &doc)).unwrap();
        assert_eq!(block_on(storage.load(&doc.id)).unwrap(), doc);
        assert!(!storage.base_path().join(format!("{}.json.tmp", doc.id)).exists());
    }

    #[test]
    fn test_missing_and_corrupt_files() {
        let (_dir, storage) = drawings_dir();
        assert!(matches!(
            block_on(storage.load("nope")),
            Err(StorageError::NotFound(id)) if id == "nope"
        ));

        fs::write(storage.base_path().join("broken.json"), "{\"id\":").unwrap();
        assert!(matches!(
            block_on(storage.load("broken")),
            Err(StorageError::Serialization(_))
        ));
    }

    #[test]
    fn test_invalid_document_not_written() {
        let (_dir, storage) = drawings_dir();
        let mut doc = DrawingDocument::new("tiny");
        doc.canvas_height = 10;

        assert!(matches!(
            block_on(storage.save("tiny", &doc)),
            Err(StorageError::Invalid(_))
        ));
        assert!(!block_on(storage.exists("tiny")).unwrap());
    }

    #[test]
    fn test_list_skips_foreign_files_and_delete_is_idempotent() {
        let (_dir, storage) = drawings_dir();
        fs::write(storage.base_path().join("notes.txt"), "ignored").unwrap();

        let doc = DrawingDocument::new("sketch");
        for id in ["zeta", "alpha"] {
            block_on(storage.save(id, &doc)).unwrap();
        }
        assert_eq!(block_on(storage.list()).unwrap(), vec!["alpha", "zeta"]);

        block_on(storage.delete("alpha")).unwrap();
        block_on(storage.delete("alpha")).unwrap();
        assert_eq!(block_on(storage.list()).unwrap(), vec!["zeta"]);
    }

    #[test]
    fn test_ids_are_sanitized_into_file_names() {
        let (_dir, storage) = drawings_dir();
        let doc = DrawingDocument::new("x");
        block_on(storage.save("team/plan:v2*", &doc)).unwrap();

        assert!(storage.base_path().join("team_plan_v2_.json").exists());
        assert_eq!(block_on(storage.load("team/plan:v2*")).unwrap().id, doc.id);
    }
}
