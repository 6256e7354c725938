//! Line shape.

use super::{
    check_points, flatten_points, mirror_flat, pairs, polyline_path, scale_flat, Axis, ShapeBase,
    ShapeTrait, ValidationError,
};
use kurbo::{BezPath, Point};
use serde::{Deserialize, Serialize};

/// A line segment or open polyline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    #[serde(flatten)]
    pub base: ShapeBase,
    /// Flat `[x0, y0, x1, y1, ...]` list in shape-local coordinates.
    pub points: Vec<f64>,
}

impl Line {
    /// Minimum number of vertices a line keeps.
    pub const MIN_VERTICES: usize = 2;

    /// Create a line between two document-space points, anchored at `start`.
    pub fn new(start: Point, end: Point) -> Self {
        let delta = end - start;
        Self {
            base: ShapeBase::new(start),
            points: vec![0.0, 0.0, delta.x, delta.y],
        }
    }

    /// Create a polyline from document-space points, anchored at the first point.
    pub fn from_points(points: &[Point]) -> Self {
        let origin = points.first().copied().unwrap_or(Point::ZERO);
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

    /// Total polyline length.
    pub fn length(&self) -> f64 {
        let pts: Vec<Point> = pairs(&self.points).collect();
        pts.windows(2).map(|w| (w[1] - w[0]).hypot()).sum()
    }
}

impl ShapeTrait for Line {
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
        polyline_path(&self.world_points(), false)
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
        check_points("line", &self.points, Self::MIN_VERTICES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_creation() {
        let line = Line::new(Point::new(10.0, 20.0), Point::new(40.0, 60.0));
        assert!((line.base.position.x - 10.0).abs() < f64::EPSILON);
        assert_eq!(line.points, vec![0.0, 0.0, 30.0, 40.0]);
        assert!((line.length() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bounds() {
        let line = Line::new(Point::new(10.0, 20.0), Point::new(0.0, 60.0));
        let bounds = line.bounds();
        assert!((bounds.x0 - 0.0).abs() < f64::EPSILON);
        assert!((bounds.y0 - 20.0).abs() < f64::EPSILON);
        assert!((bounds.x1 - 10.0).abs() < f64::EPSILON);
        assert!((bounds.y1 - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rotated_world_points() {
        let mut line = Line::new(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        line.base.rotation = 90.0;
        let pts = line.world_points();
        assert!((pts[1].x - 0.0).abs() < 1e-9);
        assert!((pts[1].y - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_mirror_preserves_world_geometry() {
        let mut line = Line::new(Point::new(10.0, 10.0), Point::new(30.0, 20.0));
        line.base.rotation = 15.0;
        let before = line.world_points();
        line.mirror(Axis::Horizontal, 50.0);
        let after = line.world_points();
        for (b, a) in before.iter().zip(after.iter()) {
            assert!((a.x - (100.0 - b.x)).abs() < 1e-9);
            assert!((a.y - b.y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_validate_floor() {
        let mut line = Line::new(Point::ZERO, Point::new(1.0, 1.0));
        assert!(line.validate().is_ok());
        line.points.truncate(2);
        assert!(matches!(
            line.validate(),
            Err(ValidationError::TooFewVertices { min: 2, .. })
        ));
        line.points.push(1.0);
        assert!(matches!(line.validate(), Err(ValidationError::OddPointList(3))));
    }
}
