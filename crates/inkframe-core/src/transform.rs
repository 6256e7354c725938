//! Geometric and ordering edits over a set of shapes in a document.
//!
//! Each function takes the paint-ordered shape list and the ids to act on,
//! and returns whether anything changed. Locked shapes never move.

use crate::actions::Alignment;
use crate::geometry;
use crate::shapes::{Axis, Shape, ShapeId};
use kurbo::{Rect, Vec2};
use std::collections::HashSet;

fn id_set(ids: &[ShapeId]) -> HashSet<ShapeId> {
    ids.iter().copied().collect()
}

/// Indices of the unlocked shapes among `ids`, in paint order.
fn movable(shapes: &[Shape], ids: &[ShapeId]) -> Vec<usize> {
    let wanted = id_set(ids);
    shapes
        .iter()
        .enumerate()
        .filter(|(_, s)| wanted.contains(&s.id()) && !s.is_locked())
        .map(|(i, _)| i)
        .collect()
}

fn union_bounds(shapes: &[Shape], indices: &[usize]) -> Option<Rect> {
    geometry::union_rects(indices.iter().map(|&i| shapes[i].bounds()))
}

/// Translate the unlocked shapes among `ids`.
pub fn move_shapes(shapes: &mut [Shape], ids: &[ShapeId], delta: Vec2) -> bool {
    if delta == Vec2::ZERO {
        return false;
    }
    let indices = movable(shapes, ids);
    for &i in &indices {
        shapes[i].translate(delta);
    }
    !indices.is_empty()
}

/// Rotate the unlocked shapes among `ids` about their union-box center.
pub fn rotate_shapes(shapes: &mut [Shape], ids: &[ShapeId], degrees: f64) -> bool {
    if !degrees.is_finite() || degrees == 0.0 {
        return false;
    }
    let indices = movable(shapes, ids);
    let Some(bounds) = union_bounds(shapes, &indices) else {
        return false;
    };
    let center = bounds.center();
    for &i in &indices {
        let base = shapes[i].base_mut();
        base.position = geometry::rotate_point(base.position, center, degrees);
        base.rotation += degrees;
    }
    true
}

/// Mirror the unlocked shapes among `ids` about their union-box center.
pub fn flip_shapes(shapes: &mut [Shape], ids: &[ShapeId], axis: Axis) -> bool {
    let indices = movable(shapes, ids);
    let Some(bounds) = union_bounds(shapes, &indices) else {
        return false;
    };
    let about = match axis {
        Axis::Horizontal => bounds.center().x,
        Axis::Vertical => bounds.center().y,
    };
    for &i in &indices {
        shapes[i].mirror(axis, about);
    }
    true
}

/// Scale the unlocked shapes among `ids` by `factor` about their union-box center.
pub fn scale_shapes(shapes: &mut [Shape], ids: &[ShapeId], factor: f64) -> bool {
    if !factor.is_finite() || factor <= 0.0 {
        log::debug!("rejecting scale factor {factor}");
        return false;
    }
    let indices = movable(shapes, ids);
    let Some(bounds) = union_bounds(shapes, &indices) else {
        return false;
    };
    let center = bounds.center();
    for &i in &indices {
        shapes[i].scale_about(center, factor);
    }
    true
}

/// Align the unlocked shapes among `ids` to an edge or center of their union box.
pub fn align_shapes(shapes: &mut [Shape], ids: &[ShapeId], alignment: Alignment) -> bool {
    let indices = movable(shapes, ids);
    if indices.len() < 2 {
        log::debug!("align needs 2 unlocked shapes, have {}", indices.len());
        return false;
    }
    let Some(reference) = union_bounds(shapes, &indices) else {
        return false;
    };
    for &i in &indices {
        let b = shapes[i].bounds();
        let delta = match alignment {
            Alignment::Left => Vec2::new(reference.x0 - b.x0, 0.0),
            Alignment::Right => Vec2::new(reference.x1 - b.x1, 0.0),
            Alignment::Top => Vec2::new(0.0, reference.y0 - b.y0),
            Alignment::Bottom => Vec2::new(0.0, reference.y1 - b.y1),
            Alignment::CenterHorizontal => Vec2::new(reference.center().x - b.center().x, 0.0),
            Alignment::CenterVertical => Vec2::new(0.0, reference.center().y - b.center().y),
        };
        shapes[i].translate(delta);
    }
    true
}

/// Space the unlocked shapes among `ids` evenly by center along an axis.
///
/// The outermost two stay put; the rest are interpolated between them.
pub fn distribute_shapes(shapes: &mut [Shape], ids: &[ShapeId], axis: Axis) -> bool {
    let indices = movable(shapes, ids);
    if indices.len() < 3 {
        log::debug!("distribute needs 3 unlocked shapes, have {}", indices.len());
        return false;
    }
    let center_of = |shape: &Shape| {
        let c = shape.bounds().center();
        match axis {
            Axis::Horizontal => c.x,
            Axis::Vertical => c.y,
        }
    };
    let mut ordered: Vec<(usize, f64)> = indices.iter().map(|&i| (i, center_of(&shapes[i]))).collect();
    ordered.sort_by(|a, b| a.1.total_cmp(&b.1));

    let first = ordered[0].1;
    let last = ordered[ordered.len() - 1].1;
    let step = (last - first) / (ordered.len() - 1) as f64;
    for (rank, &(i, center)) in ordered.iter().enumerate() {
        let target = first + step * rank as f64;
        let shift = target - center;
        let delta = match axis {
            Axis::Horizontal => Vec2::new(shift, 0.0),
            Axis::Vertical => Vec2::new(0.0, shift),
        };
        shapes[i].translate(delta);
    }
    true
}

/// Move `ids` to the top, keeping their relative order.
pub fn bring_to_front(shapes: &mut Vec<Shape>, ids: &[ShapeId]) -> bool {
    let wanted = id_set(ids);
    let (selected, rest): (Vec<Shape>, Vec<Shape>) =
        shapes.drain(..).partition(|s| wanted.contains(&s.id()));
    let changed = !selected.is_empty();
    shapes.extend(rest);
    shapes.extend(selected);
    changed
}

/// Move `ids` to the bottom, keeping their relative order.
pub fn send_to_back(shapes: &mut Vec<Shape>, ids: &[ShapeId]) -> bool {
    let wanted = id_set(ids);
    let (selected, rest): (Vec<Shape>, Vec<Shape>) =
        shapes.drain(..).partition(|s| wanted.contains(&s.id()));
    let changed = !selected.is_empty();
    shapes.extend(selected);
    shapes.extend(rest);
    changed
}

/// Move each of `ids` one step up past an unselected neighbour.
pub fn bring_forward(shapes: &mut [Shape], ids: &[ShapeId]) -> bool {
    let wanted = id_set(ids);
    let mut changed = false;
    for i in (0..shapes.len().saturating_sub(1)).rev() {
        if wanted.contains(&shapes[i].id()) && !wanted.contains(&shapes[i + 1].id()) {
            shapes.swap(i, i + 1);
            changed = true;
        }
    }
    changed
}

/// Move each of `ids` one step down past an unselected neighbour.
pub fn send_backward(shapes: &mut [Shape], ids: &[ShapeId]) -> bool {
    let wanted = id_set(ids);
    let mut changed = false;
    for i in 1..shapes.len() {
        if wanted.contains(&shapes[i].id()) && !wanted.contains(&shapes[i - 1].id()) {
            shapes.swap(i, i - 1);
            changed = true;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Arc, Circle, Line, Rectangle};
    use kurbo::Point;

    fn rect(x: f64, y: f64, w: f64, h: f64) -> Shape {
        Shape::Rectangle(Rectangle::new(Point::new(x, y), w, h))
    }

    fn ids(shapes: &[Shape]) -> Vec<ShapeId> {
        shapes.iter().map(Shape::id).collect()
    }

    #[test]
    fn test_move_skips_locked() {
        let mut shapes = vec![rect(0.0, 0.0, 10.0, 10.0), rect(20.0, 0.0, 10.0, 10.0)];
        shapes[1].base_mut().locked = true;
        let all = ids(&shapes);
        assert!(move_shapes(&mut shapes, &all, Vec2::new(5.0, 5.0)));
        assert_eq!(shapes[0].position(), Point::new(5.0, 5.0));
        assert_eq!(shapes[1].position(), Point::new(20.0, 0.0));
    }

    #[test]
    fn test_flip_about_selection_center() {
        let mut shapes = vec![rect(0.0, 0.0, 10.0, 10.0), rect(90.0, 0.0, 10.0, 10.0)];
        let all = ids(&shapes);
        assert!(flip_shapes(&mut shapes, &all, Axis::Horizontal));
        assert!((shapes[0].bounds().x0 - 90.0).abs() < 1e-9);
        assert!((shapes[1].bounds().x0 - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_flip_arc_angles() {
        let mut shapes = vec![Shape::Arc(Arc::new(Point::ZERO, 10.0, 0.0, 90.0))];
        let all = ids(&shapes);
        flip_shapes(&mut shapes, &all, Axis::Horizontal);
        let Shape::Arc(arc) = &shapes[0] else {
            panic!("not an arc");
        };
        assert!((arc.start_angle - 90.0).abs() < 1e-9);
        assert!((arc.end_angle - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_scale_rejects_bad_factor() {
        let mut shapes = vec![rect(0.0, 0.0, 10.0, 10.0)];
        let all = ids(&shapes);
        assert!(!scale_shapes(&mut shapes, &all, 0.0));
        assert!(!scale_shapes(&mut shapes, &all, f64::INFINITY));
        assert!(scale_shapes(&mut shapes, &all, 2.0));
        let b = shapes[0].bounds();
        assert!((b.width() - 20.0).abs() < 1e-9);
        assert!((b.center().x - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_rotate_about_center() {
        let mut shapes = vec![Shape::Line(Line::new(Point::new(0.0, 0.0), Point::new(10.0, 0.0)))];
        let all = ids(&shapes);
        assert!(rotate_shapes(&mut shapes, &all, 90.0));
        let v = shapes[0].vertices();
        assert!((v[0].x - 5.0).abs() < 1e-9 && (v[0].y + 5.0).abs() < 1e-9);
        assert!((v[1].x - 5.0).abs() < 1e-9 && (v[1].y - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_align_left_and_center() {
        let mut shapes = vec![rect(10.0, 0.0, 10.0, 10.0), rect(50.0, 40.0, 30.0, 10.0)];
        let all = ids(&shapes);
        assert!(align_shapes(&mut shapes, &all, Alignment::Left));
        assert!((shapes[1].bounds().x0 - 10.0).abs() < 1e-9);

        assert!(align_shapes(&mut shapes, &all, Alignment::CenterVertical));
        assert!((shapes[0].bounds().center().y - shapes[1].bounds().center().y).abs() < 1e-9);

        let one = vec![all[0]];
        assert!(!align_shapes(&mut shapes, &one, Alignment::Right));
    }

    #[test]
    fn test_distribute() {
        let mut shapes = vec![
            Shape::Circle(Circle::new(Point::new(0.0, 0.0), 1.0)),
            Shape::Circle(Circle::new(Point::new(100.0, 0.0), 1.0)),
            Shape::Circle(Circle::new(Point::new(10.0, 0.0), 1.0)),
        ];
        let all = ids(&shapes);
        assert!(!distribute_shapes(&mut shapes, &all[..2], Axis::Horizontal));
        assert!(distribute_shapes(&mut shapes, &all, Axis::Horizontal));
        assert!((shapes[2].position().x - 50.0).abs() < 1e-9);
        assert!((shapes[1].position().x - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_z_order() {
        let mut shapes: Vec<Shape> = (0..4).map(|i| rect(i as f64, 0.0, 1.0, 1.0)).collect();
        let original = ids(&shapes);
        let (a, b, c, d) = (original[0], original[1], original[2], original[3]);

        bring_to_front(&mut shapes, &[a, b]);
        assert_eq!(ids(&shapes), vec![c, d, a, b]);

        send_to_back(&mut shapes, &[b]);
        assert_eq!(ids(&shapes), vec![b, c, d, a]);

        assert!(bring_forward(&mut shapes, &[b, c]));
        assert_eq!(ids(&shapes), vec![d, b, c, a]);

        assert!(send_backward(&mut shapes, &[a]));
        assert_eq!(ids(&shapes), vec![d, b, a, c]);

        assert!(!send_backward(&mut shapes, &[d]));
    }
}
