//! Freehand drawing shape.

use super::{
    check_points, flatten_points, mirror_flat, pairs, polyline_path, scale_flat, Axis, ShapeBase,
    ShapeTrait, ValidationError,
};
use crate::geometry;
use kurbo::{BezPath, Point};
use serde::{Deserialize, Serialize};

/// A freehand stroke (open polyline of sampled points).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Freehand {
    #[serde(flatten)]
    pub base: ShapeBase,
    /// Flat `[x0, y0, x1, y1, ...]` list in shape-local coordinates.
    pub points: Vec<f64>,
}

impl Freehand {
    /// Minimum number of vertices a committed stroke keeps.
    pub const MIN_VERTICES: usize = 3;

    /// Start a stroke at a document-space point.
    pub fn new(start: Point) -> Self {
        Self {
            base: ShapeBase::new(start),
            points: vec![0.0, 0.0],
        }
    }

    /// Create from document-space points, anchored at the first point.
    pub fn from_points(points: &[Point]) -> Self {
        let origin = points.first().copied().unwrap_or(Point::ZERO);
        let local: Vec<Point> = points.iter().map(|p| (*p - origin).to_point()).collect();
        Self {
            base: ShapeBase::new(origin),
            points: flatten_points(&local),
        }
    }

    /// Append a document-space point to the stroke.
    pub fn add_point(&mut self, point: Point) {
        let local = self.base.to_local(point);
        self.points.push(local.x);
        self.points.push(local.y);
    }

    /// Number of sampled points.
    pub fn len(&self) -> usize {
        self.points.len() / 2
    }

    /// Check if the stroke has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Vertices in parent space.
    pub fn world_points(&self) -> Vec<Point> {
        pairs(&self.points).map(|p| self.base.to_parent(p)).collect()
    }

    /// Simplify the stroke by removing redundant points.
    ///
    /// Never drops below the vertex floor when the input had enough points.
    pub fn simplify(&mut self, tolerance: f64) {
        let pts: Vec<Point> = pairs(&self.points).collect();
        if pts.len() <= Self::MIN_VERTICES {
            return;
        }
        let simplified = rdp_simplify(&pts, tolerance);
        if simplified.len() >= Self::MIN_VERTICES {
            self.points = flatten_points(&simplified);
        }
    }
}

/// Ramer-Douglas-Peucker line simplification.
fn rdp_simplify(points: &[Point], tolerance: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let first = points[0];
    let last = points[points.len() - 1];

    let mut max_dist = 0.0;
    let mut max_index = 0;

    for (i, point) in points.iter().enumerate().skip(1).take(points.len() - 2) {
        let dist = geometry::point_to_segment_dist(*point, first, last);
        if dist > max_dist {
            max_dist = dist;
            max_index = i;
        }
    }

    if max_dist > tolerance {
        let mut left = rdp_simplify(&points[..=max_index], tolerance);
        let right = rdp_simplify(&points[max_index..], tolerance);

        // Junction point appears in both halves.
        left.pop();
        left.extend(right);
        left
    } else {
        vec![first, last]
    }
}

impl ShapeTrait for Freehand {
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
        check_points("freehand", &self.points, Self::MIN_VERTICES)
    }
}
