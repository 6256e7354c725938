//! The edit action vocabulary.

use crate::boolean::BooleanOp;
use crate::guides::GuideOrientation;
use crate::shapes::{Axis, Shape, ShapeId, StylePatch};
use crate::tools::ToolKind;
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Alignment targets, measured against the selection's union box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    Left,
    Right,
    Top,
    Bottom,
    /// Same horizontal center (x).
    CenterHorizontal,
    /// Same vertical center (y).
    CenterVertical,
}

/// Every state transition the editor understands.
///
/// Local input and remote operations both arrive as actions.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    // Shape CRUD
    AddShape(Shape),
    UpdateShape(Shape),
    DeleteShapes(Vec<ShapeId>),
    DeleteSelected,
    MoveSelected(Vec2),
    /// Rotate the selection about its union-box center, in degrees.
    RotateSelected(f64),
    ApplyStyleToSelection(StylePatch),
    ReplaceAll(Vec<Shape>),

    // Selection
    Select(Vec<ShapeId>),
    AddToSelection(Vec<ShapeId>),
    ToggleSelection(ShapeId),
    ClearSelection,
    SelectAll,

    // Clipboard
    Copy,
    Cut,
    Paste,
    Duplicate,

    // Z-order
    BringToFront,
    SendToBack,
    BringForward,
    SendBackward,

    // Grouping
    Group,
    Ungroup,

    // Alignment
    Align(Alignment),
    /// Even spacing along the x axis (`Horizontal`) or the y axis (`Vertical`).
    Distribute(Axis),

    Combine(BooleanOp),

    // Tools and gestures
    SetTool(ToolKind),
    StartDrawing { point: Point },
    UpdateDrawing { point: Point, constrain: bool },
    AddDrawingPoint { point: Point },
    FinishDrawing,
    CancelDrawing,

    // View
    SetZoom(f64),
    ZoomAt { anchor: Point, factor: f64 },
    Pan(Vec2),
    SetPan(Vec2),
    ResetView,

    // Toggles
    ToggleGrid,
    ToggleObjectSnap,
    ToggleGuides,
    SetGridSize(f64),

    SetStylePreset(StylePatch),

    // History
    SaveHistory,
    Undo,
    Redo,

    // Vertex edit
    EnterVertexEdit(ShapeId),
    ExitVertexEdit,
    SelectVertex(Option<usize>),
    UpdateVertex { index: usize, point: Point },
    InsertVertex { after: usize, point: Point },
    DeleteVertex { index: usize },

    // Transforms
    FlipHorizontal,
    FlipVertical,
    Scale(f64),

    // Guidelines
    AddGuideline { orientation: GuideOrientation, position: f64 },
    MoveGuideline { id: Uuid, position: f64 },
    RemoveGuideline(Uuid),
    ClearGuidelines,
}

impl Action {
    /// Whether a changed document should be recorded in history after this action.
    ///
    /// Continuous drags (`MoveSelected`, `RotateSelected`, `UpdateVertex`) are
    /// not commit points; hosts follow them with `SaveHistory`.
    pub fn is_commit_point(&self) -> bool {
        matches!(
            self,
            Action::AddShape(_)
                | Action::UpdateShape(_)
                | Action::DeleteShapes(_)
                | Action::DeleteSelected
                | Action::ApplyStyleToSelection(_)
                | Action::ReplaceAll(_)
                | Action::Cut
                | Action::Paste
                | Action::Duplicate
                | Action::BringToFront
                | Action::SendToBack
                | Action::BringForward
                | Action::SendBackward
                | Action::Group
                | Action::Ungroup
                | Action::Align(_)
                | Action::Distribute(_)
                | Action::Combine(_)
                | Action::FinishDrawing
                | Action::SaveHistory
                | Action::InsertVertex { .. }
                | Action::DeleteVertex { .. }
                | Action::FlipHorizontal
                | Action::FlipVertical
                | Action::Scale(_)
        )
    }

    /// Undo and redo move through history instead of recording it.
    pub fn is_history_navigation(&self) -> bool {
        matches!(self, Action::Undo | Action::Redo)
    }

    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Action::AddShape(_) => "add_shape",
            Action::UpdateShape(_) => "update_shape",
            Action::DeleteShapes(_) => "delete_shapes",
            Action::DeleteSelected => "delete_selected",
            Action::MoveSelected(_) => "move_selected",
            Action::RotateSelected(_) => "rotate_selected",
            Action::ApplyStyleToSelection(_) => "apply_style",
            Action::ReplaceAll(_) => "replace_all",
            Action::Select(_) => "select",
            Action::AddToSelection(_) => "add_to_selection",
            Action::ToggleSelection(_) => "toggle_selection",
            Action::ClearSelection => "clear_selection",
            Action::SelectAll => "select_all",
            Action::Copy => "copy",
            Action::Cut => "cut",
            Action::Paste => "paste",
            Action::Duplicate => "duplicate",
            Action::BringToFront => "bring_to_front",
            Action::SendToBack => "send_to_back",
            Action::BringForward => "bring_forward",
            Action::SendBackward => "send_backward",
            Action::Group => "group",
            Action::Ungroup => "ungroup",
            Action::Align(_) => "align",
            Action::Distribute(_) => "distribute",
            Action::Combine(_) => "combine",
            Action::SetTool(_) => "set_tool",
            Action::StartDrawing { .. } => "start_drawing",
            Action::UpdateDrawing { .. } => "update_drawing",
            Action::AddDrawingPoint { .. } => "add_drawing_point",
            Action::FinishDrawing => "finish_drawing",
            Action::CancelDrawing => "cancel_drawing",
            Action::SetZoom(_) => "set_zoom",
            Action::ZoomAt { .. } => "zoom_at",
            Action::Pan(_) => "pan",
            Action::SetPan(_) => "set_pan",
            Action::ResetView => "reset_view",
            Action::ToggleGrid => "toggle_grid",
            Action::ToggleObjectSnap => "toggle_object_snap",
            Action::ToggleGuides => "toggle_guides",
            Action::SetGridSize(_) => "set_grid_size",
            Action::SetStylePreset(_) => "set_style_preset",
            Action::SaveHistory => "save_history",
            Action::Undo => "undo",
            Action::Redo => "redo",
            Action::EnterVertexEdit(_) => "enter_vertex_edit",
            Action::ExitVertexEdit => "exit_vertex_edit",
            Action::SelectVertex(_) => "select_vertex",
            Action::UpdateVertex { .. } => "update_vertex",
            Action::InsertVertex { .. } => "insert_vertex",
            Action::DeleteVertex { .. } => "delete_vertex",
            Action::FlipHorizontal => "flip_horizontal",
            Action::FlipVertical => "flip_vertical",
            Action::Scale(_) => "scale",
            Action::AddGuideline { .. } => "add_guideline",
            Action::MoveGuideline { .. } => "move_guideline",
            Action::RemoveGuideline(_) => "remove_guideline",
            Action::ClearGuidelines => "clear_guidelines",
        }
    }
}
