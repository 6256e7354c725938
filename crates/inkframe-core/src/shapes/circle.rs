//! Circle shape.

use super::{check_non_negative, Axis, ShapeBase, ShapeTrait, ValidationError};
use crate::geometry;
use kurbo::{BezPath, Point, Rect, Shape as KurboShape};
use serde::{Deserialize, Serialize};

/// Segments used for the outline of circles nested in rotated groups.
const OUTLINE_SEGMENTS: usize = 64;

/// A circle centered on its position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    #[serde(flatten)]
    pub base: ShapeBase,
    /// Radius.
    pub radius: f64,
}

impl Circle {
    /// Create a new circle.
    pub fn new(center: Point, radius: f64) -> Self {
        Self {
            base: ShapeBase::new(center),
            radius: radius.abs(),
        }
    }

    /// Center in parent space.
    pub fn center(&self) -> Point {
        self.base.position
    }

    /// Tessellated ring in parent space (closed: last point equals first).
    pub fn ring(&self, segments: usize) -> Vec<Point> {
        geometry::arc_points(self.center(), self.radius, 0.0, 360.0, segments)
    }

    /// Area of the exact circle.
    pub fn area(&self) -> f64 {
        std::f64::consts::PI * self.radius * self.radius
    }
}

impl ShapeTrait for Circle {
    fn base(&self) -> &ShapeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ShapeBase {
        &mut self.base
    }

    fn outline(&self) -> Vec<Point> {
        self.ring(OUTLINE_SEGMENTS)
    }

    fn bounds(&self) -> Rect {
        let c = self.center();
        Rect::new(
            c.x - self.radius,
            c.y - self.radius,
            c.x + self.radius,
            c.y + self.radius,
        )
    }

    fn to_path(&self) -> BezPath {
        kurbo::Circle::new(self.center(), self.radius).to_path(0.1)
    }

    fn mirror(&mut self, axis: Axis, about: f64) {
        self.base.mirror_anchor(axis, about);
    }

    fn scale_about(&mut self, center: Point, factor: f64) {
        self.base.scale_anchor(center, factor);
        self.radius *= factor;
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.base.validate()?;
        check_non_negative("radius", self.radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circle_bounds_ignore_rotation() {
        let mut circle = Circle::new(Point::new(50.0, 50.0), 10.0);
        circle.base.rotation = 33.0;
        let bounds = circle.bounds();
        assert!((bounds.x0 - 40.0).abs() < f64::EPSILON);
        assert!((bounds.y1 - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ring_is_closed() {
        let circle = Circle::new(Point::ZERO, 5.0);
        let ring = circle.ring(32);
        assert_eq!(ring.first(), ring.last());
    }

    #[test]
    fn test_scale_about() {
        let mut circle = Circle::new(Point::new(10.0, 0.0), 5.0);
        circle.scale_about(Point::ZERO, 2.0);
        assert!((circle.center().x - 20.0).abs() < f64::EPSILON);
        assert!((circle.radius - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_negative_radius_rejected() {
        let mut circle = Circle::new(Point::ZERO, 5.0);
        circle.radius = -1.0;
        assert!(circle.validate().is_err());
    }
}
