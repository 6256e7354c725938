//! Drawing tools and the in-progress gesture buffer.

use crate::geometry;
use crate::shapes::{
    Arc, Arrow, Circle, Dimension, Freehand, Line, Polygon, Rectangle, Shape, ShapeStyle, Text,
};
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Content given to a freshly placed text shape.
pub const DEFAULT_TEXT: &str = "Text";

/// Distance in document units below which finished freehand samples are dropped.
pub const FREEHAND_SIMPLIFY_TOLERANCE: f64 = 2.0;

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    #[default]
    Select,
    Pan,
    Line,
    Circle,
    Arc,
    Rectangle,
    Polygon,
    Text,
    Arrow,
    Freehand,
    Dimension,
}

impl ToolKind {
    /// Whether the tool creates shapes.
    pub fn is_drawing_tool(self) -> bool {
        !matches!(self, ToolKind::Select | ToolKind::Pan)
    }
}

/// An in-progress draw gesture.
///
/// `shape` is the live preview; its id stays stable for the whole gesture.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawingBuffer {
    pub tool: ToolKind,
    /// Where the gesture started (document space).
    pub anchor: Point,
    pub shape: Shape,
    /// Latest pointer position (rubber band for polygons).
    pub cursor: Point,
}

impl DrawingBuffer {
    /// Begin a gesture. Returns `None` for tools that do not draw.
    pub fn start(tool: ToolKind, point: Point) -> Option<Self> {
        let shape = match tool {
            ToolKind::Select | ToolKind::Pan => return None,
            ToolKind::Line => Shape::Line(Line::new(point, point)),
            ToolKind::Circle => Shape::Circle(Circle::new(point, 0.0)),
            ToolKind::Arc => Shape::Arc(Arc::new(point, 0.0, 0.0, 0.0)),
            ToolKind::Rectangle => Shape::Rectangle(Rectangle::new(point, 0.0, 0.0)),
            ToolKind::Polygon => Shape::Polygon(Polygon::from_points(&[point])),
            ToolKind::Text => Shape::Text(Text::new(point, DEFAULT_TEXT)),
            ToolKind::Arrow => Shape::Arrow(Arrow::new(point, point)),
            ToolKind::Freehand => Shape::Freehand(Freehand::new(point)),
            ToolKind::Dimension => Shape::Dimension(Dimension::new(point, point)),
        };
        Some(Self {
            tool,
            anchor: point,
            shape,
            cursor: point,
        })
    }

    /// Track the pointer. `constrain` squares boxes and snaps line angles to `angle_unit`.
    pub fn update(&mut self, point: Point, constrain: bool, angle_unit: f64) {
        self.cursor = point;
        let anchor = self.anchor;
        let angled = |p: Point| {
            if constrain {
                geometry::constrain_to_angle(anchor, p, angle_unit)
            } else {
                p
            }
        };

        let next = match self.tool {
            ToolKind::Select | ToolKind::Pan | ToolKind::Text | ToolKind::Polygon => return,
            ToolKind::Freehand => {
                if let Shape::Freehand(stroke) = &mut self.shape {
                    stroke.add_point(point);
                }
                return;
            }
            ToolKind::Rectangle => {
                let end = if constrain {
                    geometry::constrain_to_square(anchor, point)
                } else {
                    point
                };
                Shape::Rectangle(Rectangle::from_corners(anchor, end))
            }
            ToolKind::Circle => {
                if constrain {
                    // Inscribed in the square spanned from the anchor.
                    let corner = geometry::constrain_to_square(anchor, point);
                    let radius = (corner.x - anchor.x).abs() / 2.0;
                    Shape::Circle(Circle::new(geometry::midpoint(anchor, corner), radius))
                } else {
                    Shape::Circle(Circle::new(anchor, geometry::distance(anchor, point)))
                }
            }
            ToolKind::Arc => {
                let end = angled(point);
                let radius = geometry::distance(anchor, end);
                let angle = geometry::angle_degrees(anchor, end);
                // The first drag direction fixes where the sweep starts.
                let start = match &self.shape {
                    Shape::Arc(arc) if arc.radius > 0.0 => arc.start_angle,
                    _ => angle,
                };
                Shape::Arc(Arc::new(anchor, radius, start, angle))
            }
            ToolKind::Line => Shape::Line(Line::new(anchor, angled(point))),
            ToolKind::Arrow => Shape::Arrow(Arrow::new(anchor, angled(point))),
            ToolKind::Dimension => Shape::Dimension(Dimension::new(anchor, angled(point))),
        };
        self.replace_preview(next);
    }

    /// Commit a polygon vertex. Other tools ignore it.
    pub fn add_point(&mut self, point: Point) {
        self.cursor = point;
        if let Shape::Polygon(polygon) = &self.shape {
            let mut vertices = polygon.world_points();
            vertices.push(point);
            self.replace_preview(Shape::Polygon(Polygon::from_points(&vertices)));
        }
    }

    fn replace_preview(&mut self, mut next: Shape) {
        next.base_mut().id = self.shape.id();
        self.shape = next;
    }

    /// Whether the current preview is too small to keep.
    pub fn is_degenerate(&self) -> bool {
        match &self.shape {
            Shape::Rectangle(r) => r.width <= 0.0 || r.height <= 0.0,
            Shape::Circle(c) => c.radius <= 0.0,
            Shape::Arc(a) => a.radius <= 0.0 || a.start_angle == a.end_angle,
            Shape::Line(l) => l.length() <= 0.0,
            Shape::Arrow(a) => match a.world_points().as_slice() {
                [first, .., last] => geometry::distance(*first, *last) <= 0.0,
                _ => true,
            },
            Shape::Dimension(d) => d.length() <= 0.0,
            Shape::Polygon(p) => p.points.len() / 2 < Polygon::MIN_VERTICES,
            Shape::Freehand(f) => f.len() < Freehand::MIN_VERTICES,
            Shape::Text(_) => false,
            Shape::Group(_) | Shape::Image(_) => true,
        }
    }

    /// Finish the gesture with `style` applied, or `None` if the shape is degenerate.
    pub fn finish(self, style: &ShapeStyle) -> Option<Shape> {
        if self.is_degenerate() {
            log::debug!("discarding degenerate {} gesture", self.shape.kind());
            return None;
        }
        let mut shape = self.shape;
        if let Shape::Freehand(stroke) = &mut shape {
            stroke.simplify(FREEHAND_SIMPLIFY_TOLERANCE);
        }
        *shape.style_mut() = style.clone();
        Some(shape)
    }
}
