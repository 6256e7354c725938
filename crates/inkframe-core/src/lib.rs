//! inkframe core library
//!
//! Platform-agnostic shape model, edit reducer, snapping, boolean
//! combination, persistence and collaboration for the inkframe editor.

pub mod actions;
pub mod boolean;
pub mod camera;
pub mod canvas;
pub mod collaboration;
pub mod config;
pub mod export;
pub mod geometry;
pub mod guides;
pub mod history;
pub mod reducer;
pub mod shapes;
pub mod snap;
pub mod storage;
pub mod sync;
pub mod tools;
pub mod transform;

pub use actions::{Action, Alignment};
pub use boolean::{BooleanError, BooleanOp};
pub use camera::Camera;
pub use canvas::{EditorState, Guideline};
pub use collaboration::{CollabEvent, CollaborationManager};
pub use config::{ConfigError, EngineConfig};
pub use export::{to_png, to_svg, ExportError};
pub use guides::{detect_guides, Guide, GuideOrientation};
pub use history::History;
pub use reducer::{reduce, Editor};
pub use shapes::{Shape, ShapeId, ShapeStyle, ValidationError};
pub use snap::{resolve_point, SnapResult, SnapSettings, SnapTarget, SnapTargetKind};
pub use storage::{DrawingDocument, StorageError, StorageResult};
pub use sync::{ConnectionState, Envelope, NativeWebSocket, Operation, SyncError, SyncEvent};
pub use tools::ToolKind;
