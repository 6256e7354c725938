//! Arc shape.

use super::{check_finite, check_non_negative, polyline_path, Axis, ShapeBase, ShapeTrait, ValidationError};
use crate::geometry;
use kurbo::{BezPath, Point};
use serde::{Deserialize, Serialize};

/// Segments used when an arc is tessellated for bounds and export.
const ARC_SEGMENTS: usize = 64;

/// A circular arc centered on its position.
///
/// Angles are degrees from the positive x-axis, normalized to [0, 360), and
/// the arc always sweeps from `start_angle` to `end_angle` in increasing-angle
/// direction. Rotation adds to both angles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arc {
    #[serde(flatten)]
    pub base: ShapeBase,
    pub radius: f64,
    pub start_angle: f64,
    pub end_angle: f64,
}

impl Arc {
    /// Create a new arc.
    pub fn new(center: Point, radius: f64, start_angle: f64, end_angle: f64) -> Self {
        Self {
            base: ShapeBase::new(center),
            radius: radius.abs(),
            start_angle: geometry::normalize_angle(start_angle),
            end_angle: geometry::normalize_angle(end_angle),
        }
    }

    /// Center in parent space.
    pub fn center(&self) -> Point {
        self.base.position
    }

    /// Start and end angles in parent space.
    pub fn world_angles(&self) -> (f64, f64) {
        (
            geometry::normalize_angle(self.start_angle + self.base.rotation),
            geometry::normalize_angle(self.end_angle + self.base.rotation),
        )
    }

    /// Positive sweep in degrees.
    pub fn sweep(&self) -> f64 {
        geometry::arc_sweep(self.start_angle, self.end_angle)
    }

    /// The two angular endpoints in parent space.
    pub fn endpoints(&self) -> (Point, Point) {
        let (start, end) = self.world_angles();
        let at = |deg: f64| {
            let r = deg.to_radians();
            Point::new(
                self.center().x + self.radius * r.cos(),
                self.center().y + self.radius * r.sin(),
            )
        };
        (at(start), at(end))
    }

    /// Tessellated points in parent space (empty for degenerate sweeps).
    pub fn points(&self, segments: usize) -> Vec<Point> {
        let (start, end) = self.world_angles();
        geometry::arc_points(self.center(), self.radius, start, end, segments)
    }
}

impl ShapeTrait for Arc {
    fn base(&self) -> &ShapeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ShapeBase {
        &mut self.base
    }

    fn outline(&self) -> Vec<Point> {
        let points = self.points(ARC_SEGMENTS);
        if points.is_empty() {
            vec![self.center()]
        } else {
            points
        }
    }

    fn to_path(&self) -> BezPath {
        polyline_path(&self.points(ARC_SEGMENTS), false)
    }

    fn mirror(&mut self, axis: Axis, about: f64) {
        self.base.mirror_anchor(axis, about);
        let (start, end) = (self.start_angle, self.end_angle);
        // Reflection reverses the sweep direction, so the endpoints swap roles.
        let (new_start, new_end) = match axis {
            Axis::Horizontal => (180.0 - end, 180.0 - start),
            Axis::Vertical => (-end, -start),
        };
        self.start_angle = geometry::normalize_angle(new_start);
        self.end_angle = geometry::normalize_angle(new_end);
    }

    fn scale_about(&mut self, center: Point, factor: f64) {
        self.base.scale_anchor(center, factor);
        self.radius *= factor;
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.base.validate()?;
        check_non_negative("radius", self.radius)?;
        check_finite("start_angle", self.start_angle)?;
        check_finite("end_angle", self.end_angle)
    }
}
