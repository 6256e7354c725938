//! Geometry kernel: pure helpers shared by shapes, snapping and transforms.
//!
//! All functions are total over finite input. Callers are responsible for
//! rejecting NaN/Infinity before values reach the document.

use kurbo::{Point, Rect, Vec2};

/// Smallest arc sweep (degrees) that still produces points.
pub const MIN_ARC_SWEEP: f64 = 1.0;

/// Minimum number of segments used to tessellate any non-empty arc.
pub const MIN_ARC_SEGMENTS: usize = 8;

/// Euclidean distance between two points.
pub fn distance(a: Point, b: Point) -> f64 {
    (b - a).hypot()
}

/// Angle of the vector a→b in degrees, in the range (-180, 180].
pub fn angle_degrees(a: Point, b: Point) -> f64 {
    let angle = (b.y - a.y).atan2(b.x - a.x).to_degrees();
    // atan2 yields -180 for (-x, -0.0); fold it onto the closed end.
    if angle <= -180.0 { angle + 360.0 } else { angle }
}

/// Normalize an angle in degrees to [0, 360).
pub fn normalize_angle(degrees: f64) -> f64 {
    let a = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if a >= 360.0 { 0.0 } else { a }
}

/// Rotate `point` about `center` by `degrees` (positive = clockwise in y-down space).
pub fn rotate_point(point: Point, center: Point, degrees: f64) -> Point {
    if degrees == 0.0 {
        return point;
    }
    let (sin, cos) = degrees.to_radians().sin_cos();
    let d = point - center;
    Point::new(
        center.x + d.x * cos - d.y * sin,
        center.y + d.x * sin + d.y * cos,
    )
}

/// Rotate a vector by `degrees`.
pub fn rotate_vec(v: Vec2, degrees: f64) -> Vec2 {
    rotate_point(v.to_point(), Point::ZERO, degrees).to_vec2()
}

/// Round each axis to the nearest multiple of `grid_size`.
pub fn snap_to_grid(point: Point, grid_size: f64) -> Point {
    if grid_size <= 0.0 {
        return point;
    }
    Point::new(
        (point.x / grid_size).round() * grid_size,
        (point.y / grid_size).round() * grid_size,
    )
}

/// Round an angle to the nearest multiple of `unit` degrees.
pub fn snap_angle(degrees: f64, unit: f64) -> f64 {
    if unit <= 0.0 {
        return degrees;
    }
    (degrees / unit).round() * unit
}

/// Force equal |dx| and |dy| between `start` and `end`, preserving direction signs.
pub fn constrain_to_square(start: Point, end: Point) -> Point {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let size = dx.abs().max(dy.abs());
    let sx = if dx < 0.0 { -1.0 } else { 1.0 };
    let sy = if dy < 0.0 { -1.0 } else { 1.0 };
    Point::new(start.x + size * sx, start.y + size * sy)
}

/// Snap the direction start→end to `unit` degrees, keeping its length.
pub fn constrain_to_angle(start: Point, end: Point, unit: f64) -> Point {
    let length = distance(start, end);
    if length < f64::EPSILON {
        return end;
    }
    let angle = snap_angle(angle_degrees(start, end), unit).to_radians();
    Point::new(start.x + length * angle.cos(), start.y + length * angle.sin())
}

/// Axis-aligned bounding box of a set of points.
pub fn bounding_box(points: &[Point]) -> Option<Rect> {
    let (first, rest) = points.split_first()?;
    let mut rect = Rect::from_points(*first, *first);
    for p in rest {
        rect = rect.union_pt(*p);
    }
    Some(rect)
}

/// Union of several rectangles.
pub fn union_rects(rects: impl IntoIterator<Item = Rect>) -> Option<Rect> {
    rects.into_iter().reduce(|a, b| a.union(b))
}

/// Normalized sweep (degrees) from `start` to `end` going in increasing-angle direction.
///
/// Equal angles denote a full turn.
pub fn arc_sweep(start_degrees: f64, end_degrees: f64) -> f64 {
    let start = normalize_angle(start_degrees);
    let end = normalize_angle(end_degrees);
    let mut sweep = end - start;
    if sweep <= 0.0 {
        sweep += 360.0;
    }
    sweep
}

/// Tessellate an arc into points.
///
/// Returns an empty vec for sweeps under one degree. A full 360° sweep yields a
/// closed ring whose last point equals its first.
pub fn arc_points(
    center: Point,
    radius: f64,
    start_degrees: f64,
    end_degrees: f64,
    segments: usize,
) -> Vec<Point> {
    let sweep = arc_sweep(start_degrees, end_degrees);
    if sweep < MIN_ARC_SWEEP {
        return Vec::new();
    }
    let start = normalize_angle(start_degrees);
    let count = ((segments as f64 * sweep / 360.0).ceil() as usize).max(MIN_ARC_SEGMENTS);
    let step = sweep / count as f64;

    let mut points: Vec<Point> = (0..=count)
        .map(|i| {
            let angle = (start + step * i as f64).to_radians();
            Point::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
        })
        .collect();

    if (sweep - 360.0).abs() < f64::EPSILON {
        if let Some(first) = points.first().copied() {
            if let Some(last) = points.last_mut() {
                *last = first;
            }
        }
    }
    points
}

/// Signed area of a closed ring (shoelace). Positive for counter-clockwise in y-up space.
pub fn signed_area(ring: &[Point]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[(i + 1) % ring.len()];
        sum += a.x * b.y - b.x * a.y;
    }
    sum / 2.0
}

/// Even-odd point-in-polygon test against a closed ring.
pub fn point_in_ring(point: Point, ring: &[Point]) -> bool {
    let mut inside = false;
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (ring[i], ring[j]);
        if (a.y > point.y) != (b.y > point.y) {
            let x = a.x + (point.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if point.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Distance from a point to the segment a→b.
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = b - a;
    let pv = point - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    distance(point, a + seg * t)
}

/// Midpoint of two points.
pub fn midpoint(a: Point, b: Point) -> Point {
    a.midpoint(b)
}
