//! Group shape for combining multiple shapes.

use super::{Axis, Shape, ShapeBase, ShapeId, ShapeTrait, ValidationError};
use crate::geometry;
use kurbo::{BezPath, Point};
use serde::{Deserialize, Serialize};

/// A group of shapes that behave as a single unit.
///
/// Children live in group-local space: a child's world geometry is the
/// child's own geometry mapped through the group's position and rotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    #[serde(flatten)]
    pub base: ShapeBase,
    /// Child shapes in group-local coordinates.
    pub children: Vec<Shape>,
}

impl Group {
    /// Create a group anchored at `position` from children already in group-local space.
    pub fn new(position: Point, children: Vec<Shape>) -> Self {
        Self {
            base: ShapeBase::new(position),
            children,
        }
    }

    /// Group document-space shapes: the anchor becomes the union-box top-left
    /// and children are translated into group-local space.
    pub fn from_world(shapes: Vec<Shape>) -> Self {
        let origin = geometry::union_rects(shapes.iter().map(Shape::bounds))
            .map(|r| r.origin())
            .unwrap_or(Point::ZERO);
        let children = shapes
            .into_iter()
            .map(|mut shape| {
                shape.translate(Point::ZERO - origin);
                shape
            })
            .collect();
        Self::new(origin, children)
    }

    /// Dissolve the group, re-expressing each child in the group's parent
    /// space with a fresh id (recursively).
    pub fn ungroup(self) -> Vec<Shape> {
        let base = self.base;
        self.children
            .into_iter()
            .map(|mut child| {
                let anchor = base.to_parent(child.position());
                let child_base = child.base_mut();
                child_base.position = anchor;
                child_base.rotation += base.rotation;
                child.regenerate_ids();
                child
            })
            .collect()
    }

    /// All shape IDs in this group, including nested groups.
    pub fn all_shape_ids(&self) -> Vec<ShapeId> {
        let mut ids = Vec::new();
        for child in &self.children {
            ids.push(child.id());
            if let Shape::Group(group) = child {
                ids.extend(group.all_shape_ids());
            }
        }
        ids
    }
}

impl ShapeTrait for Group {
    fn base(&self) -> &ShapeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ShapeBase {
        &mut self.base
    }

    fn outline(&self) -> Vec<Point> {
        self.children
            .iter()
            .flat_map(|child| child.outline())
            .map(|p| self.base.to_parent(p))
            .collect()
    }

    fn to_path(&self) -> BezPath {
        let transform = self.base.transform();
        let mut path = BezPath::new();
        for child in &self.children {
            for el in (transform * child.to_path()).elements() {
                path.push(*el);
            }
        }
        path
    }

    fn mirror(&mut self, axis: Axis, about: f64) {
        self.base.mirror_anchor(axis, about);
        for child in &mut self.children {
            child.mirror(axis, 0.0);
        }
    }

    fn scale_about(&mut self, center: Point, factor: f64) {
        self.base.scale_anchor(center, factor);
        for child in &mut self.children {
            child.scale_about(Point::ZERO, factor);
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.base.validate()?;
        self.children.iter().try_for_each(Shape::validate)
    }
}
