//! Rectangle shape.

use super::{box_corners, check_non_negative, mirror_box, polyline_path, Axis, ShapeBase, ShapeTrait, ValidationError};
use kurbo::{BezPath, Point};
use serde::{Deserialize, Serialize};

/// A rectangle anchored at its top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    #[serde(flatten)]
    pub base: ShapeBase,
    /// Width of the rectangle.
    pub width: f64,
    /// Height of the rectangle.
    pub height: f64,
}

impl Rectangle {
    /// Create a new rectangle.
    pub fn new(position: Point, width: f64, height: f64) -> Self {
        Self {
            base: ShapeBase::new(position),
            width,
            height,
        }
    }

    /// Create a rectangle from two corner points.
    pub fn from_corners(p1: Point, p2: Point) -> Self {
        let min_x = p1.x.min(p2.x);
        let min_y = p1.y.min(p2.y);
        let width = (p2.x - p1.x).abs();
        let height = (p2.y - p1.y).abs();

        Self::new(Point::new(min_x, min_y), width, height)
    }

    /// The four corners in parent space, clockwise from the anchor.
    pub fn corners(&self) -> Vec<Point> {
        box_corners(&self.base, self.width, self.height)
    }
}

impl ShapeTrait for Rectangle {
    fn base(&self) -> &ShapeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ShapeBase {
        &mut self.base
    }

    fn outline(&self) -> Vec<Point> {
        self.corners()
    }

    fn to_path(&self) -> BezPath {
        polyline_path(&self.corners(), true)
    }

    fn mirror(&mut self, axis: Axis, about: f64) {
        mirror_box(&mut self.base, self.width, self.height, axis, about);
    }

    fn scale_about(&mut self, center: Point, factor: f64) {
        self.base.scale_anchor(center, factor);
        self.width *= factor;
        self.height *= factor;
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.base.validate()?;
        check_non_negative("width", self.width)?;
        check_non_negative("height", self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangle_creation() {
        let rect = Rectangle::new(Point::new(10.0, 20.0), 100.0, 50.0);
        assert!((rect.base.position.x - 10.0).abs() < f64::EPSILON);
        assert!((rect.base.position.y - 20.0).abs() < f64::EPSILON);
        assert!((rect.width - 100.0).abs() < f64::EPSILON);
        assert!((rect.height - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rectangle_from_corners() {
        let rect = Rectangle::from_corners(Point::new(100.0, 100.0), Point::new(50.0, 50.0));
        assert!((rect.base.position.x - 50.0).abs() < f64::EPSILON);
        assert!((rect.base.position.y - 50.0).abs() < f64::EPSILON);
        assert!((rect.width - 50.0).abs() < f64::EPSILON);
        assert!((rect.height - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bounds() {
        let rect = Rectangle::new(Point::new(10.0, 20.0), 100.0, 50.0);
        let bounds = rect.bounds();
        assert!((bounds.x0 - 10.0).abs() < f64::EPSILON);
        assert!((bounds.y0 - 20.0).abs() < f64::EPSILON);
        assert!((bounds.x1 - 110.0).abs() < f64::EPSILON);
        assert!((bounds.y1 - 70.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rotated_bounds() {
        let mut rect = Rectangle::new(Point::new(0.0, 0.0), 10.0, 10.0);
        rect.base.rotation = 90.0;
        let bounds = rect.bounds();
        assert!((bounds.x0 + 10.0).abs() < 1e-9);
        assert!((bounds.x1 - 0.0).abs() < 1e-9);
        assert!((bounds.y1 - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_mirror_keeps_extent_positive() {
        let mut rect = Rectangle::new(Point::new(10.0, 10.0), 20.0, 10.0);
        rect.mirror(Axis::Horizontal, 50.0);
        assert!((rect.base.position.x - 70.0).abs() < 1e-9);
        assert!((rect.width - 20.0).abs() < f64::EPSILON);
        let bounds = rect.bounds();
        assert!((bounds.x0 - 70.0).abs() < 1e-9);
        assert!((bounds.x1 - 90.0).abs() < 1e-9);

        rect.mirror(Axis::Vertical, 0.0);
        let bounds = rect.bounds();
        assert!((bounds.y0 + 20.0).abs() < 1e-9);
        assert!((bounds.y1 + 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_mirror_rotated_matches_point_mirror() {
        let mut rect = Rectangle::new(Point::new(10.0, 10.0), 20.0, 10.0);
        rect.base.rotation = 30.0;
        let before = rect.corners();
        rect.mirror(Axis::Horizontal, 0.0);
        let after = rect.corners();
        for b in &before {
            let mirrored = Point::new(-b.x, b.y);
            assert!(after
                .iter()
                .any(|a| (a.x - mirrored.x).abs() < 1e-9 && (a.y - mirrored.y).abs() < 1e-9));
        }
    }
}
