//! Arrow shape.

use super::{
    check_non_negative, check_points, flatten_points, mirror_flat, pairs, scale_flat, Axis,
    ShapeBase, ShapeTrait, ValidationError,
};
use kurbo::{BezPath, Point, Vec2};
use serde::{Deserialize, Serialize};

/// Default arrowhead length.
pub const DEFAULT_HEAD_SIZE: f64 = 15.0;

fn default_head_size() -> f64 {
    DEFAULT_HEAD_SIZE
}

/// An open polyline with an arrowhead at its last vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arrow {
    #[serde(flatten)]
    pub base: ShapeBase,
    /// Flat `[x0, y0, x1, y1, ...]` list in shape-local coordinates.
    pub points: Vec<f64>,
    /// Size of the arrowhead.
    #[serde(default = "default_head_size")]
    pub head_size: f64,
}

impl Arrow {
    /// Minimum number of vertices an arrow keeps.
    pub const MIN_VERTICES: usize = 2;

    /// Create a new arrow from `start` to `end`, anchored at `start`.
    pub fn new(start: Point, end: Point) -> Self {
        let delta = end - start;
        Self {
            base: ShapeBase::new(start),
            points: vec![0.0, 0.0, delta.x, delta.y],
            head_size: DEFAULT_HEAD_SIZE,
        }
    }

    /// Create a multi-segment arrow from document-space points.
    pub fn from_points(points: &[Point]) -> Self {
        let origin = points.first().copied().unwrap_or(Point::ZERO);
        let local: Vec<Point> = points.iter().map(|p| (*p - origin).to_point()).collect();
        Self {
            base: ShapeBase::new(origin),
            points: flatten_points(&local),
            head_size: DEFAULT_HEAD_SIZE,
        }
    }

    /// Vertices in parent space.
    pub fn world_points(&self) -> Vec<Point> {
        pairs(&self.points).map(|p| self.base.to_parent(p)).collect()
    }

    /// Unit direction of the final segment in parent space.
    pub fn direction(&self) -> Vec2 {
        let pts = self.world_points();
        match pts.as_slice() {
            [.., prev, last] => {
                let d = *last - *prev;
                let len = d.hypot();
                if len > f64::EPSILON {
                    d / len
                } else {
                    Vec2::new(1.0, 0.0)
                }
            }
            _ => Vec2::new(1.0, 0.0),
        }
    }

    /// The two barb endpoints of the arrowhead in parent space.
    pub fn head_points(&self) -> Option<(Point, Point)> {
        let tip = *self.world_points().last()?;
        let dir = self.direction();
        let perp = Vec2::new(-dir.y, dir.x);
        let back = tip - dir * self.head_size;
        let half = self.head_size * 0.5;
        Some((back + perp * half, back - perp * half))
    }
}

impl ShapeTrait for Arrow {
    fn base(&self) -> &ShapeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ShapeBase {
        &mut self.base
    }

    fn outline(&self) -> Vec<Point> {
        let mut pts = self.world_points();
        if let Some((left, right)) = self.head_points() {
            pts.push(left);
            pts.push(right);
        }
        pts
    }

    fn to_path(&self) -> BezPath {
        let mut path = BezPath::new();
        let pts = self.world_points();
        let (Some(first), Some(tip)) = (pts.first(), pts.last()) else {
            return path;
        };

        // Shaft
        path.move_to(*first);
        for p in &pts[1..] {
            path.line_to(*p);
        }

        // Arrowhead
        if let Some((left, right)) = self.head_points() {
            path.move_to(*tip);
            path.line_to(left);
            path.move_to(*tip);
            path.line_to(right);
        }
        path
    }

    fn mirror(&mut self, axis: Axis, about: f64) {
        self.base.mirror_anchor(axis, about);
        mirror_flat(&mut self.points, axis);
    }

    fn scale_about(&mut self, center: Point, factor: f64) {
        self.base.scale_anchor(center, factor);
        scale_flat(&mut self.points, factor);
        self.head_size *= factor;
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.base.validate()?;
        check_non_negative("head_size", self.head_size)?;
        check_points("arrow", &self.points, Self::MIN_VERTICES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrow_creation() {
        let arrow = Arrow::new(Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        assert_eq!(arrow.points, vec![0.0, 0.0, 100.0, 0.0]);
        assert!((arrow.head_size - DEFAULT_HEAD_SIZE).abs() < f64::EPSILON);
    }

    #[test]
    fn test_direction() {
        let arrow = Arrow::new(Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        let dir = arrow.direction();
        assert!((dir.x - 1.0).abs() < f64::EPSILON);
        assert!(dir.y.abs() < f64::EPSILON);
    }

    #[test]
    fn test_head_points() {
        let arrow = Arrow::new(Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        let (left, right) = arrow.head_points().unwrap();
        assert!((left.x - 85.0).abs() < 1e-9);
        assert!((left.y - 7.5).abs() < 1e-9);
        assert!((right.y + 7.5).abs() < 1e-9);
        let bounds = arrow.bounds();
        assert!((bounds.y0 + 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_path_has_shaft_and_barbs() {
        let arrow = Arrow::from_points(&[
            Point::new(0.0, 0.0),
            Point::new(50.0, 0.0),
            Point::new(50.0, 50.0),
        ]);
        // move + 2 lines, then two move/line barbs
        assert_eq!(arrow.to_path().elements().len(), 7);
    }
}
