//! Dimension annotation shape.

use super::{
    check_finite, check_non_negative, check_points, mirror_flat, pairs, scale_flat, Axis,
    ShapeBase, ShapeTrait, ValidationError,
};
use crate::geometry;
use kurbo::{BezPath, Point, Vec2};
use serde::{Deserialize, Serialize};

/// Default label font size.
pub const DEFAULT_DIMENSION_FONT_SIZE: f64 = 14.0;

/// Default perpendicular offset of the measurement line.
pub const DEFAULT_DIMENSION_OFFSET: f64 = 20.0;

fn default_font_size() -> f64 {
    DEFAULT_DIMENSION_FONT_SIZE
}

/// A linear measurement between two points, drawn offset along the
/// segment's normal with extension lines back to the measured points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    #[serde(flatten)]
    pub base: ShapeBase,
    /// `[x1, y1, x2, y2]` in shape-local coordinates.
    pub points: Vec<f64>,
    /// Signed distance of the measurement line along the normal `(-dy, dx)`.
    #[serde(default)]
    pub offset: f64,
    /// Label override; the measured length is shown when absent.
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default = "default_font_size")]
    pub font_size: f64,
}

impl Dimension {
    /// Create a dimension between two document-space points, anchored at `start`.
    pub fn new(start: Point, end: Point) -> Self {
        let delta = end - start;
        Self {
            base: ShapeBase::new(start),
            points: vec![0.0, 0.0, delta.x, delta.y],
            offset: DEFAULT_DIMENSION_OFFSET,
            label: None,
            font_size: DEFAULT_DIMENSION_FONT_SIZE,
        }
    }

    /// Measured endpoints in parent space.
    pub fn endpoints(&self) -> Option<(Point, Point)> {
        let mut it = pairs(&self.points).map(|p| self.base.to_parent(p));
        Some((it.next()?, it.next()?))
    }

    /// Measured length.
    pub fn length(&self) -> f64 {
        self.endpoints()
            .map(|(a, b)| geometry::distance(a, b))
            .unwrap_or(0.0)
    }

    /// Text shown on the measurement line.
    pub fn display_label(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => format!("{:.1}", self.length()),
        }
    }

    /// Unit normal `(-dy, dx)` of the measured segment in parent space.
    fn normal(&self) -> Vec2 {
        let Some((a, b)) = self.endpoints() else {
            return Vec2::ZERO;
        };
        let d = b - a;
        let len = d.hypot();
        if len < f64::EPSILON {
            Vec2::ZERO
        } else {
            Vec2::new(-d.y, d.x) / len
        }
    }

    /// The measurement line's endpoints (measured points pushed along the normal).
    pub fn offset_points(&self) -> Option<(Point, Point)> {
        let (a, b) = self.endpoints()?;
        let shift = self.normal() * self.offset;
        Some((a + shift, b + shift))
    }

    /// Midpoint of the measurement line, where the label sits.
    pub fn label_anchor(&self) -> Option<Point> {
        let (a, b) = self.offset_points()?;
        Some(geometry::midpoint(a, b))
    }
}

impl ShapeTrait for Dimension {
    fn base(&self) -> &ShapeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ShapeBase {
        &mut self.base
    }

    fn outline(&self) -> Vec<Point> {
        match (self.endpoints(), self.offset_points()) {
            (Some((a, b)), Some((oa, ob))) => vec![a, b, oa, ob],
            _ => Vec::new(),
        }
    }

    fn to_path(&self) -> BezPath {
        let mut path = BezPath::new();
        let (Some((a, b)), Some((oa, ob))) = (self.endpoints(), self.offset_points()) else {
            return path;
        };
        // Extension lines
        path.move_to(a);
        path.line_to(oa);
        path.move_to(b);
        path.line_to(ob);
        // Measurement line
        path.move_to(oa);
        path.line_to(ob);
        path
    }

    fn mirror(&mut self, axis: Axis, about: f64) {
        self.base.mirror_anchor(axis, about);
        mirror_flat(&mut self.points, axis);
        // Reflection flips the normal's handedness.
        self.offset = -self.offset;
    }

    fn scale_about(&mut self, center: Point, factor: f64) {
        self.base.scale_anchor(center, factor);
        scale_flat(&mut self.points, factor);
        self.offset *= factor;
        self.font_size *= factor;
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.base.validate()?;
        check_finite("offset", self.offset)?;
        check_non_negative("font_size", self.font_size)?;
        check_points("dimension", &self.points, 2)
    }
}
