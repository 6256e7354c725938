//! Storage abstraction for persistence.

mod autosave;
mod file;
mod memory;
mod remote;

pub use autosave::{
    AutoSaveManager, SaveOutcome, DEFAULT_AUTOSAVE_INTERVAL_SECS, LAST_DOCUMENT_KEY,
};
pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use remote::{HistoryAction, HistoryEntry, MemoryRemoteStorage, RemoteStorage, SNAPSHOT_EVERY};

use crate::shapes::{self, Shape, ValidationError};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

/// Longest accepted drawing name, in characters.
pub const MAX_NAME_LEN: usize = 255;
/// Accepted canvas edge lengths.
pub const MIN_CANVAS_SIZE: u32 = 100;
pub const MAX_CANVAS_SIZE: u32 = 10_000;
pub const DEFAULT_CANVAS_WIDTH: u32 = 1920;
pub const DEFAULT_CANVAS_HEIGHT: u32 = 1080;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Invalid document: {0}")]
    Invalid(String),
    #[error("Invalid shape: {0}")]
    Validation(#[from] ValidationError),
    #[error("Version conflict: expected {expected}, found {actual}")]
    Conflict { expected: u64, actual: u64 },
    #[error("No snapshot to roll back to version {0}")]
    RollbackUnavailable(u64),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Storage error: {0}")]
    Other(String),
}

impl StorageError {
    /// Failures where another backend may still succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Io(_) | StorageError::Unavailable(_))
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for async storage operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn default_canvas_width() -> u32 {
    DEFAULT_CANVAS_WIDTH
}

fn default_canvas_height() -> u32 {
    DEFAULT_CANVAS_HEIGHT
}

fn default_version() -> u64 {
    1
}

/// A persisted drawing: metadata plus shapes in paint order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingDocument {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_canvas_width")]
    pub canvas_width: u32,
    #[serde(default = "default_canvas_height")]
    pub canvas_height: u32,
    #[serde(default)]
    pub shapes: Vec<Shape>,
    /// Unix milliseconds.
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub updated_at: u64,
    #[serde(default = "default_version")]
    pub version: u64,
}

impl DrawingDocument {
    /// Empty drawing with a fresh id.
    pub fn new(name: impl Into<String>) -> Self {
        let now = now_ms();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: None,
            canvas_width: DEFAULT_CANVAS_WIDTH,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
            shapes: Vec::new(),
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    pub fn with_shapes(mut self, shapes: Vec<Shape>) -> Self {
        self.shapes = shapes;
        self
    }

    /// Replace the shapes and bump `updated_at`.
    pub fn set_shapes(&mut self, shapes: Vec<Shape>) {
        self.shapes = shapes;
        self.updated_at = now_ms();
    }

    /// Check metadata limits and every shape.
    pub fn validate(&self) -> StorageResult<()> {
        if self.version == 0 {
            return Err(StorageError::Invalid("version must be at least 1".into()));
        }
        self.validate_content()
    }

    /// Name, canvas and shape checks, leaving out `version`, which a
    /// versioned store assigns itself.
    pub fn validate_content(&self) -> StorageResult<()> {
        let name_len = self.name.chars().count();
        if self.name.trim().is_empty() || name_len > MAX_NAME_LEN {
            return Err(StorageError::Invalid(format!(
                "name must be 1..={MAX_NAME_LEN} characters, got {name_len}"
            )));
        }
        for (field, value) in [
            ("canvas_width", self.canvas_width),
            ("canvas_height", self.canvas_height),
        ] {
            if !(MIN_CANVAS_SIZE..=MAX_CANVAS_SIZE).contains(&value) {
                return Err(StorageError::Invalid(format!(
                    "{field} {value} outside {MIN_CANVAS_SIZE}..={MAX_CANVAS_SIZE}"
                )));
            }
        }
        shapes::validate_shapes(&self.shapes)?;
        Ok(())
    }

    pub fn to_json(&self) -> StorageResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    /// Parse and validate.
    pub fn from_json(json: &str) -> StorageResult<Self> {
        let doc: Self =
            serde_json::from_str(json).map_err(|e| StorageError::Serialization(e.to_string()))?;
        doc.validate()?;
        Ok(doc)
    }
}

/// Trait for local document storage backends.
pub trait Storage: Send + Sync {
    /// Save a document under `id`.
    fn save(&self, id: &str, document: &DrawingDocument) -> BoxFuture<'_, StorageResult<()>>;

    fn load(&self, id: &str) -> BoxFuture<'_, StorageResult<DrawingDocument>>;

    fn delete(&self, id: &str) -> BoxFuture<'_, StorageResult<()>>;

    /// List all document IDs.
    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>>;

    fn exists(&self, id: &str) -> BoxFuture<'_, StorageResult<bool>>;
}

/// Minimal executor for driving storage futures in tests.
#[cfg(test)]
pub(crate) fn block_on<F: Future>(f: F) -> F::Output {
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    fn dummy_raw_waker() -> RawWaker {
        fn no_op(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            dummy_raw_waker()
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        RawWaker::new(std::ptr::null(), &VTABLE)
    }

    let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
    let mut cx = Context::from_waker(&waker);
    let mut f = std::pin::pin!(f);

    loop {
        if let Poll::Ready(result) = f.as_mut().poll(&mut cx) {
            return result;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Circle, Rectangle};
    use kurbo::Point;

    #[test]
    fn test_new_document_is_valid() {
        let doc = DrawingDocument::new("Plan");
        assert!(doc.validate().is_ok());
        assert_eq!(doc.canvas_width, 1920);
        assert_eq!(doc.canvas_height, 1080);
        assert_eq!(doc.version, 1);
    }

    #[test]
    fn test_from_json_defaults_and_validation() {
        let doc = DrawingDocument::from_json(r#"{"id":"a","name":"Sketch"}"#).unwrap();
        assert_eq!(doc.canvas_width, DEFAULT_CANVAS_WIDTH);
        assert!(doc.shapes.is_empty());

        let err = DrawingDocument::from_json(r#"{"id":"a","name":""}"#).unwrap_err();
        assert!(matches!(err, StorageError::Invalid(_)));

        let err = DrawingDocument::from_json(r#"{"id":"a","name":"x","canvas_width":50}"#)
            .unwrap_err();
        assert!(matches!(err, StorageError::Invalid(_)));

        let long = "n".repeat(MAX_NAME_LEN + 1);
        assert!(DrawingDocument::new(long).validate().is_err());

        assert!(matches!(
            DrawingDocument::from_json("{"),
            Err(StorageError::Serialization(_))
        ));
    }

    #[test]
    fn test_content_checks_ignore_version() {
        let mut doc = DrawingDocument::new("Unsaved");
        doc.version = 0;
        assert!(matches!(doc.validate(), Err(StorageError::Invalid(_))));
        assert!(doc.validate_content().is_ok());

        doc.canvas_width = 20_000;
        assert!(doc.validate_content().is_err());
    }

    #[test]
    fn test_invalid_shape_rejected() {
        let mut circle = Circle::new(Point::ZERO, 1.0);
        circle.radius = -3.0;
        let doc = DrawingDocument::new("x").with_shapes(vec![Shape::Circle(circle)]);
        let json = doc.to_json().unwrap();
        assert!(matches!(
            DrawingDocument::from_json(&json),
            Err(StorageError::Validation(_))
        ));
    }

    #[test]
    fn test_json_keeps_shapes() {
        let rect = Shape::Rectangle(Rectangle::new(Point::new(5.0, 5.0), 20.0, 10.0));
        let doc = DrawingDocument::new("x").with_shapes(vec![rect.clone()]);
        let loaded = DrawingDocument::from_json(&doc.to_json().unwrap()).unwrap();
        assert_eq!(loaded.shapes, vec![rect]);
        assert_eq!(loaded, doc);
    }

    #[test]
    fn test_transient_errors() {
        assert!(StorageError::Io("disk".into()).is_transient());
        assert!(StorageError::Unavailable("down".into()).is_transient());
        assert!(!StorageError::Conflict { expected: 1, actual: 2 }.is_transient());
    }
}
