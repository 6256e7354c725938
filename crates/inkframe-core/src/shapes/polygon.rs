//! Closed polygon shape.

use super::{
    check_points, flatten_points, mirror_flat, pairs, polyline_path, scale_flat, Axis, ShapeBase,
    ShapeTrait, ValidationError,
};
use crate::geometry;
use kurbo::{BezPath, Point};
use serde::{Deserialize, Serialize};

/// A closed polygon. The closing edge from last to first vertex is implicit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    #[serde(flatten)]
    pub base: ShapeBase,
    /// Flat `[x0, y0, x1, y1, ...]` list in shape-local coordinates.
    pub points: Vec<f64>,
}

impl Polygon {
    /// Minimum number of vertices a polygon keeps.
    pub const MIN_VERTICES: usize = 3;

    /// Create a polygon from document-space vertices, anchored at their bounding-box top-left.
    pub fn from_points(points: &[Point]) -> Self {
        let origin = geometry::bounding_box(points)
            .map(|r| r.origin())
            .unwrap_or(Point::ZERO);
        let local: Vec<Point> = points.iter().map(|p| (*p - origin).to_point()).collect();
        Self {
            base: ShapeBase::new(origin),
            points: flatten_points(&local),
        }
    }

    /// Vertices in parent space.
    pub fn world_points(&self) -> Vec<Point> {
        pairs(&self.points).map(|p| self.base.to_parent(p)).collect()
    }

    /// Absolute enclosed area.
    pub fn area(&self) -> f64 {
        let local: Vec<Point> = pairs(&self.points).collect();
        geometry::signed_area(&local).abs()
    }
}

impl ShapeTrait for Polygon {
    fn base(&self) -> &ShapeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ShapeBase {
        &mut self.base
    }

    fn outline(&self) -> Vec<Point> {
        self.world_points()
    }

    fn to_path(&self) -> BezPath {
        polyline_path(&self.world_points(), true)
    }

    fn mirror(&mut self, axis: Axis, about: f64) {
        self.base.mirror_anchor(axis, about);
        mirror_flat(&mut self.points, axis);
    }

    fn scale_about(&mut self, center: Point, factor: f64) {
        self.base.scale_anchor(center, factor);
        scale_flat(&mut self.points, factor);
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.base.validate()?;
        check_points("polygon", &self.points, Self::MIN_VERTICES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Polygon {
        Polygon::from_points(&[
            Point::new(10.0, 10.0),
            Point::new(30.0, 10.0),
            Point::new(10.0, 40.0),
        ])
    }

    #[test]
    fn test_from_points_anchors_at_top_left() {
        let poly = triangle();
        assert!((poly.base.position.x - 10.0).abs() < f64::EPSILON);
        assert_eq!(poly.points, vec![0.0, 0.0, 20.0, 0.0, 0.0, 30.0]);
    }

    #[test]
    fn test_area() {
        assert!((triangle().area() - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_path_is_closed() {
        let path = triangle().to_path();
        assert!(matches!(path.elements().last(), Some(kurbo::PathEl::ClosePath)));
    }

    #[test]
    fn test_validate_requires_three_vertices() {
        let mut poly = triangle();
        poly.points.truncate(4);
        assert!(matches!(
            poly.validate(),
            Err(ValidationError::TooFewVertices { min: 3, found: 2, .. })
        ));
    }

    #[test]
    fn test_scale_about_center() {
        let mut poly = triangle();
        poly.scale_about(Point::new(10.0, 10.0), 2.0);
        let pts = poly.world_points();
        assert!((pts[1].x - 50.0).abs() < 1e-9);
        assert!((pts[2].y - 70.0).abs() < 1e-9);
    }
}
