//! Snap functionality for aligning points to the grid and to shapes.

use crate::geometry;
use crate::shapes::{Shape, ShapeId};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Grid size for snapping (matches the visual grid).
pub const GRID_SIZE: f64 = 20.0;

/// Snap and guide toggles carried in the editor state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapSettings {
    /// Snap to grid intersections.
    pub grid: bool,
    /// Snap to shape candidate points.
    pub object_snap: bool,
    /// Show alignment guides while dragging.
    pub guides: bool,
    /// Grid cell size in document units.
    pub grid_size: f64,
}

impl Default for SnapSettings {
    fn default() -> Self {
        Self {
            grid: false,
            object_snap: true,
            guides: true,
            grid_size: GRID_SIZE,
        }
    }
}

/// Type of snap target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapTargetKind {
    /// Endpoint of a line-like shape.
    Endpoint,
    /// Midpoint of a segment or box edge.
    Midpoint,
    /// Center of a shape.
    Center,
    /// North/east/south/west point of a circle.
    Cardinal,
    /// Corner of a box.
    Corner,
    /// Vertex of a polygon or freehand stroke.
    Vertex,
    /// Anchor of a text shape.
    Anchor,
}

/// A point that can be snapped to on a shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapTarget {
    /// The snap point location (document space).
    pub point: Point,
    /// Type of snap target for visual feedback.
    pub kind: SnapTargetKind,
    /// Shape the candidate belongs to.
    pub shape_id: ShapeId,
}

/// What a resolved point snapped to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SnapKind {
    Object(SnapTarget),
    Grid,
    None,
}

/// Result of a snap operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapResult {
    /// The snapped point.
    pub point: Point,
    pub kind: SnapKind,
}

impl SnapResult {
    /// Create a result with no snapping.
    pub fn none(point: Point) -> Self {
        Self {
            point,
            kind: SnapKind::None,
        }
    }

    /// Check if any snapping occurred.
    pub fn is_snapped(&self) -> bool {
        !matches!(self.kind, SnapKind::None)
    }
}

fn target(point: Point, kind: SnapTargetKind, shape_id: ShapeId) -> SnapTarget {
    SnapTarget {
        point,
        kind,
        shape_id,
    }
}

/// Corners, edge midpoints and center of a box.
fn box_targets(corners: &[Point], shape_id: ShapeId, out: &mut Vec<SnapTarget>) {
    for c in corners {
        out.push(target(*c, SnapTargetKind::Corner, shape_id));
    }
    for (i, c) in corners.iter().enumerate() {
        let next = corners[(i + 1) % corners.len()];
        out.push(target(geometry::midpoint(*c, next), SnapTargetKind::Midpoint, shape_id));
    }
    if let [a, _, c, _] = corners {
        out.push(target(geometry::midpoint(*a, *c), SnapTargetKind::Center, shape_id));
    }
}

fn rect_corners(bounds: Rect) -> [Point; 4] {
    [
        Point::new(bounds.x0, bounds.y0),
        Point::new(bounds.x1, bounds.y0),
        Point::new(bounds.x1, bounds.y1),
        Point::new(bounds.x0, bounds.y1),
    ]
}

/// Each vertex plus the midpoint of each segment (closing segment included when `closed`).
fn polyline_targets(
    points: &[Point],
    closed: bool,
    vertex_kind: SnapTargetKind,
    shape_id: ShapeId,
    out: &mut Vec<SnapTarget>,
) {
    for p in points {
        out.push(target(*p, vertex_kind, shape_id));
    }
    for w in points.windows(2) {
        out.push(target(geometry::midpoint(w[0], w[1]), SnapTargetKind::Midpoint, shape_id));
    }
    if closed && points.len() > 2 {
        if let (Some(first), Some(last)) = (points.first(), points.last()) {
            out.push(target(geometry::midpoint(*last, *first), SnapTargetKind::Midpoint, shape_id));
        }
    }
}

/// Typed snap candidates of one shape, in document space.
pub fn snap_candidates(shape: &Shape) -> Vec<SnapTarget> {
    let id = shape.id();
    let mut out = Vec::new();
    match shape {
        Shape::Line(_) | Shape::Arrow(_) => {
            polyline_targets(&shape.vertices(), false, SnapTargetKind::Endpoint, id, &mut out);
        }
        Shape::Dimension(dim) => {
            if let Some((a, b)) = dim.endpoints() {
                polyline_targets(&[a, b], false, SnapTargetKind::Endpoint, id, &mut out);
            }
        }
        Shape::Circle(circle) => {
            let c = circle.center();
            let r = circle.radius;
            out.push(target(c, SnapTargetKind::Center, id));
            for p in [
                Point::new(c.x + r, c.y),
                Point::new(c.x, c.y + r),
                Point::new(c.x - r, c.y),
                Point::new(c.x, c.y - r),
            ] {
                out.push(target(p, SnapTargetKind::Cardinal, id));
            }
        }
        Shape::Arc(arc) => {
            out.push(target(arc.center(), SnapTargetKind::Center, id));
            let (start, end) = arc.endpoints();
            out.push(target(start, SnapTargetKind::Endpoint, id));
            out.push(target(end, SnapTargetKind::Endpoint, id));
        }
        Shape::Rectangle(rect) => box_targets(&rect.corners(), id, &mut out),
        Shape::Image(_) | Shape::Group(_) => {
            box_targets(&rect_corners(shape.bounds()), id, &mut out);
        }
        Shape::Polygon(_) => {
            polyline_targets(&shape.vertices(), true, SnapTargetKind::Vertex, id, &mut out);
        }
        Shape::Freehand(_) => {
            polyline_targets(&shape.vertices(), false, SnapTargetKind::Vertex, id, &mut out);
        }
        Shape::Text(_) => out.push(target(shape.position(), SnapTargetKind::Anchor, id)),
    }
    out
}

/// Nearest candidate among visible, non-excluded shapes within `threshold_px / zoom`.
pub fn find_snap_target(
    point: Point,
    shapes: &[Shape],
    exclude: &[ShapeId],
    threshold_px: f64,
    zoom: f64,
) -> Option<SnapTarget> {
    if zoom <= 0.0 {
        return None;
    }
    let threshold = threshold_px / zoom;
    let mut best: Option<SnapTarget> = None;
    let mut best_dist_sq = threshold * threshold;

    for shape in shapes {
        if !shape.is_visible() || exclude.contains(&shape.id()) {
            continue;
        }
        for candidate in snap_candidates(shape) {
            let dist_sq = (candidate.point - point).hypot2();
            if dist_sq <= best_dist_sq {
                best_dist_sq = dist_sq;
                best = Some(candidate);
            }
        }
    }
    best
}

/// Snap a point using the active toggles: object snap first, then grid.
pub fn resolve_point(
    point: Point,
    shapes: &[Shape],
    exclude: &[ShapeId],
    settings: &SnapSettings,
    threshold_px: f64,
    zoom: f64,
) -> SnapResult {
    if settings.object_snap {
        if let Some(target) = find_snap_target(point, shapes, exclude, threshold_px, zoom) {
            return SnapResult {
                point: target.point,
                kind: SnapKind::Object(target),
            };
        }
    }
    if settings.grid && settings.grid_size > 0.0 {
        return SnapResult {
            point: geometry::snap_to_grid(point, settings.grid_size),
            kind: SnapKind::Grid,
        };
    }
    SnapResult::none(point)
}
