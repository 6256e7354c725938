//! Editor state: the document plus everything the editing session carries.

use crate::camera::Camera;
use crate::config::EngineConfig;
use crate::geometry;
use crate::guides::GuideOrientation;
use crate::history::History;
use crate::shapes::{Shape, ShapeId, ShapeStyle};
use crate::snap::SnapSettings;
use crate::tools::{DrawingBuffer, ToolKind};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Shapes held for pasting.
///
/// `last_pasted` is the anchor successive pastes offset from, so repeated
/// pastes fan out instead of stacking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clipboard {
    pub shapes: Vec<Shape>,
    pub last_pasted: Option<Vec<Shape>>,
}

impl Clipboard {
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

/// Vertex-edit sub-mode on a single point-list shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexEdit {
    pub shape_id: ShapeId,
    /// Selected vertex index, if any.
    pub vertex: Option<usize>,
}

/// A user-placed guideline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Guideline {
    pub id: Uuid,
    pub orientation: GuideOrientation,
    pub position: f64,
}

/// Complete editor state. Immutable from the outside: every change goes
/// through [`crate::reducer::reduce`].
#[derive(Debug, Clone, PartialEq)]
pub struct EditorState {
    /// Shapes in paint order, back to front.
    pub shapes: Arc<Vec<Shape>>,
    /// Ordered selection; always a subset of top-level document ids.
    pub selection: Vec<ShapeId>,
    pub tool: ToolKind,
    pub drawing: Option<DrawingBuffer>,
    pub vertex_edit: Option<VertexEdit>,
    pub camera: Camera,
    pub toggles: SnapSettings,
    /// Style given to newly drawn shapes.
    pub style_preset: ShapeStyle,
    pub clipboard: Clipboard,
    pub guidelines: Vec<Guideline>,
    pub history: History,
    pub config: Arc<EngineConfig>,
}

impl Default for EditorState {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl EditorState {
    /// Empty document configured by `config`.
    pub fn new(config: EngineConfig) -> Self {
        let toggles = SnapSettings {
            grid_size: config.grid_size,
            ..SnapSettings::default()
        };
        Self {
            shapes: Arc::new(Vec::new()),
            selection: Vec::new(),
            tool: ToolKind::default(),
            drawing: None,
            vertex_edit: None,
            camera: Camera::from_config(&config),
            toggles,
            style_preset: ShapeStyle::default(),
            clipboard: Clipboard::default(),
            guidelines: Vec::new(),
            history: History::new(config.history_limit),
            config: Arc::new(config),
        }
    }

    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.iter().find(|s| s.id() == id)
    }

    /// Paint-order index of a top-level shape.
    pub fn index_of(&self, id: ShapeId) -> Option<usize> {
        self.shapes.iter().position(|s| s.id() == id)
    }

    /// Selected shapes in paint order.
    pub fn selected_shapes(&self) -> Vec<&Shape> {
        let selected: HashSet<ShapeId> = self.selection.iter().copied().collect();
        self.shapes
            .iter()
            .filter(|s| selected.contains(&s.id()))
            .collect()
    }

    /// Union box of the selection.
    pub fn selection_bounds(&self) -> Option<Rect> {
        geometry::union_rects(self.selected_shapes().into_iter().map(Shape::bounds))
    }

    /// Center of the configured canvas.
    pub fn canvas_center(&self) -> Point {
        Point::new(self.config.canvas_width / 2.0, self.config.canvas_height / 2.0)
    }

    /// Drop selection entries and vertex edit targets that no longer exist.
    pub(crate) fn prune_to_document(&mut self) {
        let ids: HashSet<ShapeId> = self.shapes.iter().map(Shape::id).collect();
        let mut seen = HashSet::new();
        self.selection.retain(|id| ids.contains(id) && seen.insert(*id));
        if let Some(edit) = self.vertex_edit {
            let still_valid = self
                .shape(edit.shape_id)
                .is_some_and(|s| s.is_vertex_editable());
            if !still_valid {
                self.vertex_edit = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Circle, Rectangle};

    fn state_with(shapes: Vec<Shape>) -> EditorState {
        EditorState {
            shapes: Arc::new(shapes),
            ..EditorState::default()
        }
    }

    #[test]
    fn test_new_state() {
        let state = EditorState::default();
        assert!(state.shapes.is_empty());
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.tool, ToolKind::Select);
        assert!((state.toggles.grid_size - 20.0).abs() < f64::EPSILON);
        assert_eq!(state.canvas_center(), Point::new(960.0, 540.0));
    }

    #[test]
    fn test_selected_shapes_in_paint_order() {
        let a = Shape::Rectangle(Rectangle::new(Point::ZERO, 10.0, 10.0));
        let b = Shape::Circle(Circle::new(Point::new(50.0, 50.0), 5.0));
        let (a_id, b_id) = (a.id(), b.id());
        let mut state = state_with(vec![a, b]);
        state.selection = vec![b_id, a_id];
        let ids: Vec<_> = state.selected_shapes().iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec![a_id, b_id]);

        let bounds = state.selection_bounds().unwrap();
        assert!((bounds.x1 - 55.0).abs() < 1e-9);
    }

    #[test]
    fn test_prune_to_document() {
        let a = Shape::Rectangle(Rectangle::new(Point::ZERO, 10.0, 10.0));
        let a_id = a.id();
        let mut state = state_with(vec![a]);
        state.selection = vec![a_id, Uuid::new_v4(), a_id];
        state.vertex_edit = Some(VertexEdit {
            shape_id: a_id,
            vertex: None,
        });
        state.prune_to_document();
        assert_eq!(state.selection, vec![a_id]);
        // Rectangles are not vertex editable.
        assert!(state.vertex_edit.is_none());
    }
}
