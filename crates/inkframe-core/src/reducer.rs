//! The edit reducer and the `Editor` that owns its state.
//!
//! `reduce` is a pure, total function: an action whose preconditions are not
//! met leaves the state unchanged and is logged at debug level.

use crate::actions::Action;
use crate::boolean;
use crate::canvas::{EditorState, Guideline, VertexEdit};
use crate::config::EngineConfig;
use crate::guides::{self, Guide};
use crate::shapes::{self, Axis, Group, Shape, ShapeId, ShapeTrait};
use crate::snap::{self, SnapResult};
use crate::tools::DrawingBuffer;
use crate::transform;
use kurbo::{Point, Rect, Vec2};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Apply `action` to `state`, returning the next state.
pub fn reduce(state: &EditorState, action: Action) -> EditorState {
    let mut next = state.clone();
    let name = action.name();
    if !apply(&mut next, action) {
        log::debug!("{name}: no change");
    }
    next
}

/// Whether two snapshots hold the same document.
fn same_document(a: &Arc<Vec<Shape>>, b: &Arc<Vec<Shape>>) -> bool {
    Arc::ptr_eq(a, b) || a == b
}

/// Record the current document in history unless it matches the cursor snapshot.
fn commit_if_changed(state: &mut EditorState) -> bool {
    let unchanged = state
        .history
        .current()
        .is_some_and(|current| same_document(&current, &state.shapes));
    if unchanged {
        return false;
    }
    state.history.commit(Arc::clone(&state.shapes));
    true
}

/// Run `f` on a copy of the document and keep it if `f` reports a change.
fn edit_document(state: &mut EditorState, f: impl FnOnce(&mut Vec<Shape>) -> bool) -> bool {
    let mut shapes = state.shapes.as_ref().clone();
    if !f(&mut shapes) {
        return false;
    }
    state.shapes = Arc::new(shapes);
    state.prune_to_document();
    true
}

/// Keep only ids present in the document, without duplicates.
fn existing_ids(state: &EditorState, ids: &[ShapeId]) -> Vec<ShapeId> {
    let mut seen = HashSet::new();
    ids.iter()
        .copied()
        .filter(|id| state.index_of(*id).is_some() && seen.insert(*id))
        .collect()
}

fn apply(state: &mut EditorState, action: Action) -> bool {
    match action {
        Action::AddShape(shape) => add_shape(state, shape),
        Action::UpdateShape(shape) => update_shape(state, shape),
        Action::DeleteShapes(ids) => {
            let doomed: HashSet<ShapeId> = ids.into_iter().collect();
            edit_document(state, |shapes| {
                let before = shapes.len();
                shapes.retain(|s| !doomed.contains(&s.id()));
                shapes.len() != before
            })
        }
        Action::DeleteSelected => delete_selected(state),
        Action::MoveSelected(delta) => {
            let ids = state.selection.clone();
            edit_document(state, |shapes| transform::move_shapes(shapes, &ids, delta))
        }
        Action::RotateSelected(degrees) => {
            let ids = state.selection.clone();
            edit_document(state, |shapes| transform::rotate_shapes(shapes, &ids, degrees))
        }
        Action::ApplyStyleToSelection(patch) => {
            let ids: HashSet<ShapeId> = state.selection.iter().copied().collect();
            edit_document(state, |shapes| {
                let mut changed = false;
                for shape in shapes.iter_mut() {
                    if ids.contains(&shape.id()) && !shape.is_locked() {
                        let before = shape.style().clone();
                        patch.apply(shape.style_mut());
                        changed |= *shape.style() != before;
                    }
                }
                changed
            })
        }
        Action::ReplaceAll(shapes) => replace_all(state, shapes),

        Action::Select(ids) => {
            let selection = existing_ids(state, &ids);
            set_selection(state, selection)
        }
        Action::AddToSelection(ids) => {
            let mut selection = state.selection.clone();
            selection.extend(existing_ids(state, &ids));
            let selection = existing_ids(state, &selection);
            set_selection(state, selection)
        }
        Action::ToggleSelection(id) => {
            let mut selection = state.selection.clone();
            if let Some(pos) = selection.iter().position(|s| *s == id) {
                selection.remove(pos);
            } else if state.index_of(id).is_some() {
                selection.push(id);
            }
            set_selection(state, selection)
        }
        Action::ClearSelection => set_selection(state, Vec::new()),
        Action::SelectAll => {
            let selection = state
                .shapes
                .iter()
                .filter(|s| s.is_visible() && !s.is_locked())
                .map(Shape::id)
                .collect();
            set_selection(state, selection)
        }

        Action::Copy => copy(state),
        Action::Cut => {
            let copied = copy(state);
            delete_selected(state) || copied
        }
        Action::Paste => paste(state),
        Action::Duplicate => duplicate(state),

        Action::BringToFront => reorder(state, transform::bring_to_front),
        Action::SendToBack => reorder(state, transform::send_to_back),
        Action::BringForward => reorder(state, |s, ids| transform::bring_forward(s, ids)),
        Action::SendBackward => reorder(state, |s, ids| transform::send_backward(s, ids)),

        Action::Group => group(state),
        Action::Ungroup => ungroup(state),

        Action::Align(alignment) => {
            let ids = state.selection.clone();
            edit_document(state, |shapes| transform::align_shapes(shapes, &ids, alignment))
        }
        Action::Distribute(axis) => {
            let ids = state.selection.clone();
            edit_document(state, |shapes| transform::distribute_shapes(shapes, &ids, axis))
        }
        Action::Combine(op) => combine(state, op),

        Action::SetTool(tool) => {
            let changed = state.tool != tool || state.drawing.is_some() || state.vertex_edit.is_some();
            state.tool = tool;
            state.drawing = None;
            state.vertex_edit = None;
            changed
        }
        Action::StartDrawing { point } => match DrawingBuffer::start(state.tool, point) {
            Some(buffer) => {
                state.drawing = Some(buffer);
                true
            }
            None => false,
        },
        Action::UpdateDrawing { point, constrain } => {
            let unit = state.config.angle_snap_degrees;
            match state.drawing.as_mut() {
                Some(buffer) => {
                    buffer.update(point, constrain, unit);
                    true
                }
                None => false,
            }
        }
        Action::AddDrawingPoint { point } => match state.drawing.as_mut() {
            Some(buffer) => {
                buffer.add_point(point);
                true
            }
            None => false,
        },
        Action::FinishDrawing => finish_drawing(state),
        Action::CancelDrawing => state.drawing.take().is_some(),

        Action::SetZoom(zoom) => view(state, |camera| camera.set_zoom(zoom)),
        Action::ZoomAt { anchor, factor } => view(state, |camera| camera.zoom_at(anchor, factor)),
        Action::Pan(delta) => view(state, |camera| camera.pan_by(delta)),
        Action::SetPan(pan) => view(state, |camera| camera.set_pan(pan)),
        Action::ResetView => view(state, |camera| camera.reset()),

        Action::ToggleGrid => {
            state.toggles.grid = !state.toggles.grid;
            true
        }
        Action::ToggleObjectSnap => {
            state.toggles.object_snap = !state.toggles.object_snap;
            true
        }
        Action::ToggleGuides => {
            state.toggles.guides = !state.toggles.guides;
            true
        }
        Action::SetGridSize(size) => {
            if !size.is_finite() || size <= 0.0 {
                return false;
            }
            state.toggles.grid_size = size;
            true
        }

        Action::SetStylePreset(patch) => {
            let before = state.style_preset.clone();
            patch.apply(&mut state.style_preset);
            state.style_preset != before
        }

        Action::SaveHistory => commit_if_changed(state),
        Action::Undo => match state.history.undo() {
            Some(snapshot) => restore(state, snapshot),
            None => false,
        },
        Action::Redo => match state.history.redo() {
            Some(snapshot) => restore(state, snapshot),
            None => false,
        },

        Action::EnterVertexEdit(id) => {
            let eligible = state
                .shape(id)
                .is_some_and(|s| s.is_vertex_editable() && !s.is_locked());
            if !eligible {
                return false;
            }
            state.vertex_edit = Some(VertexEdit {
                shape_id: id,
                vertex: None,
            });
            state.selection = vec![id];
            true
        }
        Action::ExitVertexEdit => state.vertex_edit.take().is_some(),
        Action::SelectVertex(vertex) => select_vertex(state, vertex),
        Action::UpdateVertex { index, point } => edit_vertices(state, |points, _, local| {
            let start = index.checked_mul(2)?;
            let slot = points.get_mut(start..start.checked_add(2)?)?;
            let p = local(point);
            slot[0] = p.x;
            slot[1] = p.y;
            Some(Some(index))
        }),
        Action::InsertVertex { after, point } => edit_vertices(state, |points, _, local| {
            if after >= points.len() / 2 {
                return None;
            }
            let p = local(point);
            let at = 2 * (after + 1);
            points.splice(at..at, [p.x, p.y]);
            Some(Some(after + 1))
        }),
        Action::DeleteVertex { index } => edit_vertices(state, |points, floor, _| {
            let count = points.len() / 2;
            if index >= count || count <= floor {
                log::debug!("refusing to delete vertex {index} of {count} (floor {floor})");
                return None;
            }
            points.drain(2 * index..2 * index + 2);
            Some(None)
        }),

        Action::FlipHorizontal => {
            let ids = state.selection.clone();
            edit_document(state, |shapes| transform::flip_shapes(shapes, &ids, Axis::Horizontal))
        }
        Action::FlipVertical => {
            let ids = state.selection.clone();
            edit_document(state, |shapes| transform::flip_shapes(shapes, &ids, Axis::Vertical))
        }
        Action::Scale(factor) => {
            let ids = state.selection.clone();
            edit_document(state, |shapes| transform::scale_shapes(shapes, &ids, factor))
        }

        Action::AddGuideline {
            orientation,
            position,
        } => {
            if !position.is_finite() {
                return false;
            }
            state.guidelines.push(Guideline {
                id: Uuid::new_v4(),
                orientation,
                position,
            });
            true
        }
        Action::MoveGuideline { id, position } => {
            if !position.is_finite() {
                return false;
            }
            match state.guidelines.iter_mut().find(|g| g.id == id) {
                Some(guideline) => {
                    guideline.position = position;
                    true
                }
                None => false,
            }
        }
        Action::RemoveGuideline(id) => {
            let before = state.guidelines.len();
            state.guidelines.retain(|g| g.id != id);
            state.guidelines.len() != before
        }
        Action::ClearGuidelines => {
            let had_any = !state.guidelines.is_empty();
            state.guidelines.clear();
            had_any
        }
    }
}

fn add_shape(state: &mut EditorState, shape: Shape) -> bool {
    if let Err(err) = shapes::check_placement(&state.shapes, &shape) {
        log::debug!("rejecting invalid shape {}: {err}", shape.id());
        return false;
    }
    edit_document(state, |shapes| {
        match shapes.iter().position(|s| s.id() == shape.id()) {
            Some(index) if shapes[index] == shape => return false,
            Some(index) => shapes[index] = shape,
            None => shapes.push(shape),
        }
        true
    })
}

fn update_shape(state: &mut EditorState, shape: Shape) -> bool {
    if let Err(err) = shapes::check_placement(&state.shapes, &shape) {
        log::debug!("rejecting invalid update for {}: {err}", shape.id());
        return false;
    }
    edit_document(state, |shapes| {
        match shapes.iter().position(|s| s.id() == shape.id()) {
            Some(index) if shapes[index] != shape => {
                shapes[index] = shape;
                true
            }
            _ => false,
        }
    })
}

fn replace_all(state: &mut EditorState, shapes: Vec<Shape>) -> bool {
    if let Err(err) = shapes::validate_shapes(&shapes) {
        log::debug!("rejecting document replacement: {err}");
        return false;
    }
    if *state.shapes == shapes {
        return false;
    }
    state.shapes = Arc::new(shapes);
    state.prune_to_document();
    true
}

fn delete_selected(state: &mut EditorState) -> bool {
    let doomed: HashSet<ShapeId> = state
        .selected_shapes()
        .into_iter()
        .filter(|s| !s.is_locked())
        .map(Shape::id)
        .collect();
    if doomed.is_empty() {
        return false;
    }
    edit_document(state, |shapes| {
        shapes.retain(|s| !doomed.contains(&s.id()));
        true
    })
}

fn set_selection(state: &mut EditorState, selection: Vec<ShapeId>) -> bool {
    if state.selection == selection {
        return false;
    }
    state.selection = selection;
    if let Some(edit) = state.vertex_edit {
        if !state.selection.contains(&edit.shape_id) {
            state.vertex_edit = None;
        }
    }
    true
}

fn copy(state: &mut EditorState) -> bool {
    let copied: Vec<Shape> = state.selected_shapes().into_iter().cloned().collect();
    if copied.is_empty() {
        return false;
    }
    state.clipboard.shapes = copied;
    state.clipboard.last_pasted = None;
    true
}

/// Clone `source` offset by `offset` on both axes, with fresh ids throughout.
fn offset_copies(source: &[Shape], offset: f64) -> Vec<Shape> {
    source
        .iter()
        .cloned()
        .map(|mut shape| {
            shape.translate(Vec2::new(offset, offset));
            shape.regenerate_ids();
            shape
        })
        .collect()
}

fn insert_and_select(state: &mut EditorState, new_shapes: Vec<Shape>) -> bool {
    let ids: Vec<ShapeId> = new_shapes.iter().map(Shape::id).collect();
    let changed = edit_document(state, |shapes| {
        shapes.extend(new_shapes);
        true
    });
    state.selection = ids;
    changed
}

fn paste(state: &mut EditorState) -> bool {
    if state.clipboard.is_empty() {
        return false;
    }
    let source = state
        .clipboard
        .last_pasted
        .as_deref()
        .unwrap_or(state.clipboard.shapes.as_slice());
    let pasted = offset_copies(source, state.config.paste_offset);
    state.clipboard.last_pasted = Some(pasted.clone());
    insert_and_select(state, pasted)
}

fn duplicate(state: &mut EditorState) -> bool {
    let selected: Vec<Shape> = state.selected_shapes().into_iter().cloned().collect();
    if selected.is_empty() {
        return false;
    }
    let copies = offset_copies(&selected, state.config.paste_offset);
    insert_and_select(state, copies)
}

fn reorder(state: &mut EditorState, f: impl FnOnce(&mut Vec<Shape>, &[ShapeId]) -> bool) -> bool {
    let ids = state.selection.clone();
    if ids.is_empty() {
        return false;
    }
    edit_document(state, |shapes| f(shapes, &ids))
}

fn group(state: &mut EditorState) -> bool {
    let selected: HashSet<ShapeId> = state.selection.iter().copied().collect();
    if selected.len() < 2 {
        log::debug!("group needs 2 selected shapes, have {}", selected.len());
        return false;
    }
    let mut group_id = None;
    let changed = edit_document(state, |shapes| {
        let Some(top) = shapes.iter().rposition(|s| selected.contains(&s.id())) else {
            return false;
        };
        let (members, rest): (Vec<Shape>, Vec<Shape>) = shapes
            .drain(..)
            .partition(|s| selected.contains(&s.id()));
        let insert_at = top + 1 - members.len();
        let group = Shape::Group(Group::from_world(members));
        group_id = Some(group.id());
        shapes.extend(rest);
        shapes.insert(insert_at, group);
        true
    });
    if let Some(id) = group_id {
        state.selection = vec![id];
    }
    changed
}

fn ungroup(state: &mut EditorState) -> bool {
    let selected: HashSet<ShapeId> = state.selection.iter().copied().collect();
    let has_group = state
        .shapes
        .iter()
        .any(|s| s.is_group() && selected.contains(&s.id()));
    if !has_group {
        return false;
    }
    let mut released = Vec::new();
    let mut kept_selection = Vec::new();
    edit_document(state, |shapes| {
        let mut out = Vec::with_capacity(shapes.len());
        for shape in shapes.drain(..) {
            match shape {
                Shape::Group(group) if selected.contains(&group.id()) => {
                    let children = group.ungroup();
                    released.extend(children.iter().map(Shape::id));
                    out.extend(children);
                }
                other => {
                    if selected.contains(&other.id()) {
                        kept_selection.push(other.id());
                    }
                    out.push(other);
                }
            }
        }
        *shapes = out;
        true
    });
    kept_selection.extend(released);
    state.selection = kept_selection;
    true
}

fn combine(state: &mut EditorState, op: boolean::BooleanOp) -> bool {
    // Selection order decides the subtrahend: the first selected shape is kept.
    let inputs: Vec<Shape> = state
        .selection
        .iter()
        .filter_map(|id| state.shape(*id))
        .filter(|s| !s.is_locked())
        .cloned()
        .collect();
    let results = match boolean::combine_with_segments(&inputs, op, state.config.arc_segments) {
        Ok(results) => results,
        Err(err) => {
            log::debug!("combine rejected: {err}");
            return false;
        }
    };
    let input_ids: HashSet<ShapeId> = inputs.iter().map(Shape::id).collect();
    let result_ids: Vec<ShapeId> = results.iter().map(Shape::id).collect();
    let changed = edit_document(state, |shapes| {
        let Some(at) = shapes.iter().position(|s| input_ids.contains(&s.id())) else {
            return false;
        };
        shapes.retain(|s| !input_ids.contains(&s.id()));
        let at = at.min(shapes.len());
        shapes.splice(at..at, results);
        true
    });
    if changed {
        state.selection = result_ids;
    }
    changed
}

fn finish_drawing(state: &mut EditorState) -> bool {
    let Some(buffer) = state.drawing.take() else {
        return false;
    };
    let Some(shape) = buffer.finish(&state.style_preset) else {
        // The gesture ended even though nothing was kept.
        return true;
    };
    let id = shape.id();
    let changed = edit_document(state, |shapes| {
        shapes.push(shape);
        true
    });
    state.selection = vec![id];
    changed
}

fn view(state: &mut EditorState, f: impl FnOnce(&mut crate::camera::Camera)) -> bool {
    let before = state.camera.clone();
    f(&mut state.camera);
    state.camera != before
}

fn restore(state: &mut EditorState, snapshot: Arc<Vec<Shape>>) -> bool {
    state.shapes = snapshot;
    state.drawing = None;
    state.prune_to_document();
    true
}

fn select_vertex(state: &mut EditorState, vertex: Option<usize>) -> bool {
    let Some(edit) = state.vertex_edit else {
        return false;
    };
    let count = state
        .shape(edit.shape_id)
        .map(|s| s.vertices().len())
        .unwrap_or(0);
    if vertex.is_some_and(|v| v >= count) {
        return false;
    }
    state.vertex_edit = Some(VertexEdit { vertex, ..edit });
    true
}

/// Edit the point list of the shape in vertex edit.
///
/// `f` receives the local point list, its vertex floor and a world-to-local
/// mapper; it returns `None` to reject, or the vertex to select afterwards.
fn edit_vertices(
    state: &mut EditorState,
    f: impl FnOnce(&mut Vec<f64>, usize, &dyn Fn(Point) -> Point) -> Option<Option<usize>>,
) -> bool {
    let Some(edit) = state.vertex_edit else {
        log::debug!("not in vertex edit");
        return false;
    };
    let mut selected_vertex = edit.vertex;
    let changed = edit_document(state, |shapes| {
        let Some(shape) = shapes.iter_mut().find(|s| s.id() == edit.shape_id) else {
            return false;
        };
        if shape.is_locked() {
            return false;
        }
        let base = shape.base().clone();
        let to_local = move |p: Point| base.to_local(p);
        let Some((points, floor)) = shape.vertex_list_mut() else {
            return false;
        };
        match f(points, floor, &to_local) {
            Some(vertex) => {
                selected_vertex = vertex;
                true
            }
            None => false,
        }
    });
    if changed {
        state.vertex_edit = Some(VertexEdit {
            vertex: selected_vertex,
            ..edit
        });
    }
    changed
}

/// An editing session: state plus the configuration it was created with.
#[derive(Debug, Clone, Default)]
pub struct Editor {
    state: EditorState,
}

impl Editor {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            state: EditorState::new(config),
        }
    }

    /// The current immutable state, for rendering.
    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.state.config
    }

    /// Shapes in paint order.
    pub fn shapes(&self) -> &[Shape] {
        &self.state.shapes
    }

    /// Apply a local action, recording history at commit points.
    ///
    /// Returns whether the document changed.
    pub fn dispatch(&mut self, action: Action) -> bool {
        let commit = action.is_commit_point();
        let before = Arc::clone(&self.state.shapes);
        self.state = reduce(&self.state, action);
        if commit {
            commit_if_changed(&mut self.state);
        }
        !same_document(&before, &self.state.shapes)
    }

    /// Apply an action that originated elsewhere. History is left untouched.
    pub fn apply_remote(&mut self, action: Action) -> bool {
        let before = Arc::clone(&self.state.shapes);
        self.state = reduce(&self.state, action);
        !same_document(&before, &self.state.shapes)
    }

    /// Snap a document point using the current toggles and zoom.
    pub fn snap_point(&self, point: Point, exclude: &[ShapeId]) -> SnapResult {
        snap::resolve_point(
            point,
            &self.state.shapes,
            exclude,
            &self.state.toggles,
            self.state.config.snap_threshold_px,
            self.state.camera.zoom,
        )
    }

    /// Alignment guides for a box being dragged, or none when guides are off.
    pub fn guides_for(&self, dragged: Rect, exclude: &[ShapeId]) -> Vec<Guide> {
        if !self.state.toggles.guides {
            return Vec::new();
        }
        let others: Vec<Rect> = self
            .state
            .shapes
            .iter()
            .filter(|s| s.is_visible() && !exclude.contains(&s.id()))
            .map(Shape::bounds)
            .collect();
        guides::detect_guides(
            dragged,
            &others,
            self.state.canvas_center(),
            self.state.config.guide_threshold_px,
            self.state.camera.zoom,
        )
    }
}
