//! Boolean combination of closed shapes (union, subtract, intersect, exclude).
//!
//! Shapes are converted to world-space rings and folded pairwise, left to
//! right. Each pairwise step is an edge-classification clip:
//!
//! 1. every edge is split at its intersections with the other operand,
//!    including the ends of collinear overlaps;
//! 2. each sub-edge is classified by probing both of its sides against both
//!    operands (even-odd), which distinguishes inside, outside and shared
//!    edges of either direction;
//! 3. a sub-edge is kept when the operation's result differs across it, and
//!    is oriented so the result lies on its left;
//! 4. kept edges are chained into rings.
//!
//! Holes are finally bridged into their smallest containing outer ring, so
//! each output region is a single point list.

use crate::geometry;
use crate::shapes::{Polygon, Shape};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Circle tessellation used when no configuration is supplied.
pub const DEFAULT_ARC_SEGMENTS: usize = 64;

/// Boolean operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BooleanOp {
    Union,
    /// First shape minus all the others.
    Subtract,
    Intersect,
    /// Symmetric difference.
    Exclude,
}

impl BooleanOp {
    fn keep(self, in_a: bool, in_b: bool) -> bool {
        match self {
            BooleanOp::Union => in_a || in_b,
            BooleanOp::Subtract => in_a && !in_b,
            BooleanOp::Intersect => in_a && in_b,
            BooleanOp::Exclude => in_a != in_b,
        }
    }
}

/// Errors from boolean combination.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BooleanError {
    #[error("boolean combination needs at least 2 shapes, got {0}")]
    TooFewShapes(usize),
    #[error("{0} shapes cannot be combined")]
    NotCombinable(&'static str),
}

/// A closed ring without a repeated closing point.
type Ring = Vec<Point>;

/// Combine shapes with the default circle tessellation.
pub fn combine(shapes: &[Shape], op: BooleanOp) -> Result<Vec<Shape>, BooleanError> {
    combine_with_segments(shapes, op, DEFAULT_ARC_SEGMENTS)
}

/// Combine rectangles, circles and polygons into new polygons.
///
/// Outputs take the first input's style and visibility and get fresh ids.
/// Degenerate outcomes (no overlap for intersect, full subtraction) yield an
/// empty list.
pub fn combine_with_segments(
    shapes: &[Shape],
    op: BooleanOp,
    segments: usize,
) -> Result<Vec<Shape>, BooleanError> {
    if shapes.len() < 2 {
        return Err(BooleanError::TooFewShapes(shapes.len()));
    }
    let rings = shapes
        .iter()
        .map(|shape| shape_ring(shape, segments))
        .collect::<Result<Vec<_>, _>>()?;

    let mut iter = rings.into_iter();
    let first = iter.next().map(|ring| vec![ring]).unwrap_or_default();
    let region = iter.fold(first, |acc, ring| clip(&acc, &[ring], op));

    let template = &shapes[0];
    let polygons = into_polygons(region, template);
    log::debug!(
        "{:?} of {} shapes produced {} polygon(s)",
        op,
        shapes.len(),
        polygons.len()
    );
    Ok(polygons)
}

/// World-space ring of a combinable shape.
pub fn shape_ring(shape: &Shape, segments: usize) -> Result<Vec<Point>, BooleanError> {
    match shape {
        Shape::Rectangle(rect) => Ok(rect.corners()),
        Shape::Circle(circle) => {
            let mut ring = circle.ring(segments);
            // Drop the closing duplicate.
            ring.pop();
            Ok(ring)
        }
        Shape::Polygon(polygon) => Ok(polygon.world_points()),
        other => Err(BooleanError::NotCombinable(other.kind())),
    }
}

/// Largest extent of all points, at least 1.
fn scale_of<'a>(rings: impl Iterator<Item = &'a Ring>) -> f64 {
    let points: Vec<Point> = rings.flat_map(|r| r.iter().copied()).collect();
    geometry::bounding_box(&points)
        .map(|b| b.width().max(b.height()))
        .unwrap_or(1.0)
        .max(1.0)
}

fn inside(point: Point, region: &[Ring]) -> bool {
    region
        .iter()
        .filter(|ring| geometry::point_in_ring(point, ring))
        .count()
        % 2
        == 1
}

fn ring_edges(region: &[Ring]) -> Vec<(Point, Point)> {
    region
        .iter()
        .filter(|ring| ring.len() >= 2)
        .flat_map(|ring| {
            ring.iter()
                .enumerate()
                .map(move |(i, p)| (*p, ring[(i + 1) % ring.len()]))
        })
        .collect()
}

/// Merges points closer than a tolerance into one vertex index.
struct Welder {
    verts: Vec<Point>,
    tol_sq: f64,
}

impl Welder {
    fn new(tol: f64) -> Self {
        Self {
            verts: Vec::new(),
            tol_sq: tol * tol,
        }
    }

    fn index(&mut self, p: Point) -> usize {
        if let Some(i) = self.verts.iter().position(|v| (*v - p).hypot2() <= self.tol_sq) {
            return i;
        }
        self.verts.push(p);
        self.verts.len() - 1
    }
}

/// Record split points of `a` and `b` where they cross or overlap.
fn intersect(
    a: (Point, Point),
    b: (Point, Point),
    tol: f64,
    splits_a: &mut Vec<(f64, Point)>,
    splits_b: &mut Vec<(f64, Point)>,
) {
    let (p, p2) = a;
    let (q, q2) = b;
    let r = p2 - p;
    let s = q2 - q;
    let (len_r, len_s) = (r.hypot(), s.hypot());
    if len_r <= tol || len_s <= tol {
        return;
    }
    let qp = q - p;
    let denom = r.cross(s);

    if denom.abs() > 1e-12 * len_r * len_s {
        let t = qp.cross(s) / denom;
        let u = qp.cross(r) / denom;
        let (et, eu) = (tol / len_r, tol / len_s);
        if t < -et || t > 1.0 + et || u < -eu || u > 1.0 + eu {
            return;
        }
        // Prefer exact input vertices when the crossing lands on one.
        let point = if t <= et {
            p
        } else if t >= 1.0 - et {
            p2
        } else if u <= eu {
            q
        } else if u >= 1.0 - eu {
            q2
        } else {
            p + r * t
        };
        splits_a.push((t.clamp(0.0, 1.0), point));
        splits_b.push((u.clamp(0.0, 1.0), point));
    } else if qp.cross(r).abs() <= tol * len_r {
        // Collinear: split each edge at the other's endpoints.
        let rr = len_r * len_r;
        let ss = len_s * len_s;
        for point in [q, q2] {
            let t = (point - p).dot(r) / rr;
            if t > 0.0 && t < 1.0 {
                splits_a.push((t, point));
            }
        }
        for point in [p, p2] {
            let u = (point - q).dot(s) / ss;
            if u > 0.0 && u < 1.0 {
                splits_b.push((u, point));
            }
        }
    }
}

/// Split edges at their recorded points and collect unique welded segments.
fn split_edges(
    edges: &[(Point, Point)],
    splits: Vec<Vec<(f64, Point)>>,
    welder: &mut Welder,
    seen: &mut HashSet<(usize, usize)>,
    out: &mut Vec<(usize, usize)>,
) {
    for (edge, mut cuts) in edges.iter().zip(splits) {
        cuts.push((0.0, edge.0));
        cuts.push((1.0, edge.1));
        cuts.sort_by(|a, b| a.0.total_cmp(&b.0));
        let indices: Vec<usize> = cuts.iter().map(|(_, p)| welder.index(*p)).collect();
        for w in indices.windows(2) {
            let (i, j) = (w[0], w[1]);
            if i == j {
                continue;
            }
            if seen.insert((i.min(j), i.max(j))) {
                out.push((i, j));
            }
        }
    }
}

/// One pairwise clip step.
fn clip(a: &[Ring], b: &[Ring], op: BooleanOp) -> Vec<Ring> {
    let scale = scale_of(a.iter().chain(b.iter()));
    let tol = scale * 1e-9;

    let edges_a = ring_edges(a);
    let edges_b = ring_edges(b);
    let mut splits_a = vec![Vec::new(); edges_a.len()];
    let mut splits_b = vec![Vec::new(); edges_b.len()];
    for (i, ea) in edges_a.iter().enumerate() {
        for (j, eb) in edges_b.iter().enumerate() {
            intersect(*ea, *eb, tol, &mut splits_a[i], &mut splits_b[j]);
        }
    }

    let mut welder = Welder::new(tol);
    let mut seen = HashSet::new();
    let mut segments = Vec::new();
    split_edges(&edges_a, splits_a, &mut welder, &mut seen, &mut segments);
    split_edges(&edges_b, splits_b, &mut welder, &mut seen, &mut segments);
    let verts = welder.verts;

    let mut selected = Vec::new();
    for (i, j) in segments {
        let (p, q) = (verts[i], verts[j]);
        let d = q - p;
        let len = d.hypot();
        if len <= tol {
            continue;
        }
        let normal = Vec2::new(-d.y, d.x) / len;
        let probe = (scale * 1e-6).min(len * 0.01);
        let mid = geometry::midpoint(p, q);
        let left = mid + normal * probe;
        let right = mid - normal * probe;
        let keep_left = op.keep(inside(left, a), inside(left, b));
        let keep_right = op.keep(inside(right, a), inside(right, b));
        match (keep_left, keep_right) {
            (true, false) => selected.push((i, j)),
            (false, true) => selected.push((j, i)),
            _ => {}
        }
    }

    let area_tol = scale * scale * 1e-9;
    chain(&verts, &selected)
        .into_iter()
        .map(|ring| drop_collinear(ring, tol))
        .filter(|ring| ring.len() >= 3 && geometry::signed_area(ring).abs() > area_tol)
        .collect()
}

/// Signed turn from `incoming` to `outgoing` in radians; positive turns toward the left side.
fn turn(incoming: Vec2, outgoing: Vec2) -> f64 {
    incoming.cross(outgoing).atan2(incoming.dot(outgoing))
}

/// Chain directed edges into closed rings, taking the leftmost turn at
/// shared vertices so touching lobes stay separate.
fn chain(verts: &[Point], edges: &[(usize, usize)]) -> Vec<Ring> {
    let mut outgoing: HashMap<usize, Vec<usize>> = HashMap::new();
    for (k, (from, _)) in edges.iter().enumerate() {
        outgoing.entry(*from).or_default().push(k);
    }

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();
    for start in 0..edges.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let origin = edges[start].0;
        let mut ring = vec![verts[origin]];
        let mut current = start;
        let mut closed = false;

        loop {
            let (from, to) = edges[current];
            if to == origin {
                closed = true;
                break;
            }
            ring.push(verts[to]);
            let incoming = verts[to] - verts[from];
            let next = outgoing.get(&to).and_then(|candidates| {
                candidates
                    .iter()
                    .copied()
                    .filter(|k| !used[*k])
                    .max_by(|x, y| {
                        let dx = verts[edges[*x].1] - verts[to];
                        let dy = verts[edges[*y].1] - verts[to];
                        turn(incoming, dx).total_cmp(&turn(incoming, dy))
                    })
            });
            match next {
                Some(k) => {
                    used[k] = true;
                    current = k;
                }
                None => break,
            }
        }

        if closed {
            rings.push(ring);
        } else {
            log::warn!("discarding open chain of {} points", ring.len());
        }
    }
    rings
}

/// Remove vertices lying on the straight segment between their neighbours.
fn drop_collinear(mut ring: Ring, tol: f64) -> Ring {
    let mut changed = true;
    while changed && ring.len() > 3 {
        changed = false;
        let n = ring.len();
        for i in 0..n {
            let a = ring[(i + n - 1) % n];
            let b = ring[i];
            let c = ring[(i + 1) % n];
            let span = (c - a).hypot();
            if (b - a).cross(c - b).abs() <= tol * span.max(1.0) && (b - a).dot(c - b) > 0.0 {
                ring.remove(i);
                changed = true;
                break;
            }
        }
    }
    ring
}

fn max_x(ring: &Ring) -> f64 {
    ring.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max)
}

/// Whether segments `a` and `b` cross at a point interior to both.
fn crosses(a: (Point, Point), b: (Point, Point)) -> bool {
    let orient = |p: Point, q: Point, r: Point| (q - p).cross(r - p);
    let d1 = orient(b.0, b.1, a.0);
    let d2 = orient(b.0, b.1, a.1);
    let d3 = orient(a.0, a.1, b.0);
    let d4 = orient(a.0, a.1, b.1);
    d1 * d2 < 0.0 && d3 * d4 < 0.0
}

/// Pick the shortest bridge from a hole vertex to a merged-ring vertex that
/// crosses no boundary and runs through the region's interior.
fn find_bridge(merged: &Ring, outer: &Ring, hole: &Ring, others: &[Ring]) -> (usize, usize) {
    let boundary: Vec<(Point, Point)> = ring_edges(std::slice::from_ref(merged))
        .into_iter()
        .chain(ring_edges(std::slice::from_ref(hole)))
        .chain(ring_edges(others))
        .collect();

    let mut best: Option<(f64, usize, usize)> = None;
    let mut fallback = (f64::INFINITY, 0, 0);
    for (hi, h) in hole.iter().enumerate() {
        for (oi, o) in merged.iter().enumerate() {
            let len = (*o - *h).hypot2();
            if len < fallback.0 {
                fallback = (len, hi, oi);
            }
            if best.is_some_and(|(b, _, _)| len >= b) {
                continue;
            }
            let bridge = (*h, *o);
            let mid = geometry::midpoint(*h, *o);
            let interior = geometry::point_in_ring(mid, outer)
                && !geometry::point_in_ring(mid, hole)
                && !others.iter().any(|r| geometry::point_in_ring(mid, r));
            if interior && !boundary.iter().any(|edge| crosses(bridge, *edge)) {
                best = Some((len, hi, oi));
            }
        }
    }
    let (_, hi, oi) = best.unwrap_or(fallback);
    (hi, oi)
}

/// Splice holes into their outer ring through keyhole bridges.
fn bridge_holes(outer: Ring, mut holes: Vec<Ring>) -> Ring {
    holes.sort_by(|a, b| max_x(b).total_cmp(&max_x(a)));
    let mut merged = outer.clone();
    for k in 0..holes.len() {
        let hole = &holes[k];
        if hole.is_empty() {
            continue;
        }
        let (hi, oi) = find_bridge(&merged, &outer, hole, &holes[k + 1..]);
        let mut spliced = Vec::with_capacity(merged.len() + hole.len() + 2);
        spliced.extend_from_slice(&merged[..=oi]);
        for step in 0..=hole.len() {
            spliced.push(hole[(hi + step) % hole.len()]);
        }
        spliced.push(merged[oi]);
        spliced.extend_from_slice(&merged[oi + 1..]);
        merged = spliced;
    }
    merged
}

/// Build output polygons: outer rings (positive area) with their holes bridged in.
fn into_polygons(region: Vec<Ring>, template: &Shape) -> Vec<Shape> {
    let (outers, holes): (Vec<Ring>, Vec<Ring>) = region
        .into_iter()
        .partition(|ring| geometry::signed_area(ring) > 0.0);

    let scale = scale_of(outers.iter());
    let mut assigned: Vec<Vec<Ring>> = vec![Vec::new(); outers.len()];
    for hole in holes {
        // A point just inside the result, beside the hole's first edge.
        let (p, q) = (hole[0], hole[1 % hole.len()]);
        let d = q - p;
        let len = d.hypot().max(f64::EPSILON);
        let probe = geometry::midpoint(p, q) + Vec2::new(-d.y, d.x) / len * (scale * 1e-6).min(len * 0.01);
        let owner = outers
            .iter()
            .enumerate()
            .filter(|(_, outer)| geometry::point_in_ring(probe, outer))
            .min_by(|(_, x), (_, y)| {
                geometry::signed_area(x).total_cmp(&geometry::signed_area(y))
            })
            .map(|(i, _)| i);
        match owner {
            Some(i) => assigned[i].push(hole),
            None => log::warn!("dropping hole with no containing ring"),
        }
    }

    outers
        .into_iter()
        .zip(assigned)
        .map(|(outer, holes)| {
            let points = bridge_holes(outer, holes);
            let mut polygon = Polygon::from_points(&points);
            polygon.base.style = template.style().clone();
            polygon.base.visible = template.is_visible();
            Shape::Polygon(polygon)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Circle, Line, Rectangle, SerializableColor};
    use proptest::prelude::*;

    fn rect(x: f64, y: f64, w: f64, h: f64) -> Shape {
        Shape::Rectangle(Rectangle::new(Point::new(x, y), w, h))
    }

    fn total_area(shapes: &[Shape]) -> f64 {
        shapes
            .iter()
            .map(|s| match s {
                Shape::Polygon(p) => p.area(),
                _ => 0.0,
            })
            .sum()
    }

    #[test]
    fn test_union_of_contained_rectangles() {
        let big = rect(0.0, 0.0, 100.0, 100.0);
        let small = rect(20.0, 20.0, 30.0, 30.0);
        let out = combine(&[big, small], BooleanOp::Union).unwrap();
        assert_eq!(out.len(), 1);
        assert!((total_area(&out) - 10_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_union_of_overlapping_rectangles() {
        let out = combine(
            &[rect(0.0, 0.0, 10.0, 10.0), rect(5.0, 5.0, 10.0, 10.0)],
            BooleanOp::Union,
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert!((total_area(&out) - 175.0).abs() < 1e-6);
        // Split points on straight runs are removed.
        assert_eq!(out[0].vertices().len(), 8);
    }

    #[test]
    fn test_disjoint_union_yields_two() {
        let out = combine(
            &[rect(0.0, 0.0, 10.0, 10.0), rect(50.0, 0.0, 10.0, 10.0)],
            BooleanOp::Union,
        )
        .unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_edge_sharing_union_merges() {
        let out = combine(
            &[rect(0.0, 0.0, 10.0, 10.0), rect(10.0, 0.0, 10.0, 10.0)],
            BooleanOp::Union,
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert!((total_area(&out) - 200.0).abs() < 1e-6);
        assert_eq!(out[0].vertices().len(), 4);
    }

    #[test]
    fn test_intersect_without_overlap_is_empty() {
        let out = combine(
            &[rect(0.0, 0.0, 10.0, 10.0), rect(50.0, 0.0, 10.0, 10.0)],
            BooleanOp::Intersect,
        )
        .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_full_subtraction_is_empty() {
        let out = combine(
            &[rect(10.0, 10.0, 5.0, 5.0), rect(0.0, 0.0, 50.0, 50.0)],
            BooleanOp::Subtract,
        )
        .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_subtract_inner_makes_keyhole() {
        let out = combine(
            &[rect(0.0, 0.0, 100.0, 100.0), rect(40.0, 40.0, 20.0, 20.0)],
            BooleanOp::Subtract,
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert!((total_area(&out) - 9_600.0).abs() < 1e-6);
        // Outer 4 + hole 4 + both bridge ends repeated.
        assert_eq!(out[0].vertices().len(), 10);
    }

    #[test]
    fn test_exclude_identical_is_empty() {
        let a = rect(0.0, 0.0, 10.0, 10.0);
        let b = rect(0.0, 0.0, 10.0, 10.0);
        assert!(combine(&[a, b], BooleanOp::Exclude).unwrap().is_empty());
    }

    #[test]
    fn test_circle_intersect_rect() {
        let circle = Shape::Circle(Circle::new(Point::new(0.0, 0.0), 10.0));
        let half = rect(0.0, -20.0, 40.0, 40.0);
        let out = combine(&[circle, half], BooleanOp::Intersect).unwrap();
        assert_eq!(out.len(), 1);
        let half_disc = std::f64::consts::PI * 100.0 / 2.0;
        assert!((total_area(&out) - half_disc).abs() < 2.0);
    }

    #[test]
    fn test_output_takes_first_style() {
        let mut a = rect(0.0, 0.0, 10.0, 10.0);
        a.style_mut().stroke_color = SerializableColor::new(255, 0, 0, 255);
        let a_id = a.id();
        let out = combine(&[a, rect(5.0, 0.0, 10.0, 10.0)], BooleanOp::Union).unwrap();
        assert_eq!(out[0].style().stroke_color, SerializableColor::new(255, 0, 0, 255));
        assert_ne!(out[0].id(), a_id);
        assert!(out[0].validate().is_ok());
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            combine(&[rect(0.0, 0.0, 1.0, 1.0)], BooleanOp::Union),
            Err(BooleanError::TooFewShapes(1))
        );
        let line = Shape::Line(Line::new(Point::ZERO, Point::new(1.0, 1.0)));
        assert_eq!(
            combine(&[rect(0.0, 0.0, 1.0, 1.0), line], BooleanOp::Union),
            Err(BooleanError::NotCombinable("line"))
        );
    }

    #[test]
    fn test_fold_three_way_subtract() {
        let out = combine(
            &[
                rect(0.0, 0.0, 30.0, 10.0),
                rect(0.0, 0.0, 10.0, 10.0),
                rect(20.0, 0.0, 10.0, 10.0),
            ],
            BooleanOp::Subtract,
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert!((total_area(&out) - 100.0).abs() < 1e-6);
    }

    fn rect_strategy() -> impl Strategy<Value = (f64, f64, f64, f64)> {
        (0i32..40, 0i32..40, 1i32..30, 1i32..30)
            .prop_map(|(x, y, w, h)| (x as f64, y as f64, w as f64, h as f64))
    }

    proptest! {
        #[test]
        fn union_area_at_least_max_operand((ax, ay, aw, ah) in rect_strategy(), (bx, by, bw, bh) in rect_strategy()) {
            let out = combine(&[rect(ax, ay, aw, ah), rect(bx, by, bw, bh)], BooleanOp::Union).unwrap();
            prop_assert!(total_area(&out) + 1e-6 >= (aw * ah).max(bw * bh));
        }

        #[test]
        fn intersect_area_at_most_min_operand((ax, ay, aw, ah) in rect_strategy(), (bx, by, bw, bh) in rect_strategy()) {
            let out = combine(&[rect(ax, ay, aw, ah), rect(bx, by, bw, bh)], BooleanOp::Intersect).unwrap();
            prop_assert!(total_area(&out) <= (aw * ah).min(bw * bh) + 1e-6);
        }

        #[test]
        fn inclusion_exclusion_for_rectangles((ax, ay, aw, ah) in rect_strategy(), (bx, by, bw, bh) in rect_strategy()) {
            let a = rect(ax, ay, aw, ah);
            let b = rect(bx, by, bw, bh);
            let union = total_area(&combine(&[a.clone(), b.clone()], BooleanOp::Union).unwrap());
            let inter = total_area(&combine(&[a, b], BooleanOp::Intersect).unwrap());
            prop_assert!((union + inter - (aw * ah + bw * bh)).abs() < 1e-6);
        }

        #[test]
        fn exclude_with_self_is_empty((x, y, w, h) in rect_strategy()) {
            let out = combine(&[rect(x, y, w, h), rect(x, y, w, h)], BooleanOp::Exclude).unwrap();
            prop_assert!(out.is_empty());
        }
    }
}
