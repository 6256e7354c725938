//! Shape definitions for the drawing engine.

mod arc;
mod arrow;
mod circle;
mod dimension;
mod freehand;
mod group;
mod image;
mod line;
mod polygon;
mod rectangle;
mod text;

pub use arc::Arc;
pub use arrow::Arrow;
pub use circle::Circle;
pub use dimension::Dimension;
pub use freehand::Freehand;
pub use group::Group;
pub use image::{Image, ImageFormat};
pub use line::Line;
pub use polygon::Polygon;
pub use rectangle::Rectangle;
pub use text::Text;

use crate::geometry;
use kurbo::{Affine, BezPath, Point, Rect, Vec2};
use peniko::Color;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for shapes.
pub type ShapeId = Uuid;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }

    pub fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#')?;
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            3 => {
                let mut out = [0u8; 3];
                for (i, c) in hex.chars().enumerate() {
                    let v = c.to_digit(16)? as u8;
                    out[i] = v * 17;
                }
                Some(Self::new(out[0], out[1], out[2], 255))
            }
            6 => Some(Self::new(
                channel(hex.get(0..2)?)?,
                channel(hex.get(2..4)?)?,
                channel(hex.get(4..6)?)?,
                255,
            )),
            8 => Some(Self::new(
                channel(hex.get(0..2)?)?,
                channel(hex.get(2..4)?)?,
                channel(hex.get(4..6)?)?,
                channel(hex.get(6..8)?)?,
            )),
            _ => None,
        }
    }

    /// `#rrggbb` (alpha dropped; markup carries opacity separately).
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Stroke dash style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DashStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

impl DashStyle {
    /// Dash pattern scaled by stroke width (empty = solid).
    pub fn pattern(self, stroke_width: f64) -> Vec<f64> {
        let w = stroke_width.max(1.0);
        match self {
            DashStyle::Solid => Vec::new(),
            DashStyle::Dashed => vec![w * 4.0, w * 2.0],
            DashStyle::Dotted => vec![w, w * 2.0],
        }
    }
}

/// Gradient geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradientKind {
    #[default]
    Linear,
    Radial,
}

/// A color stop at `offset` in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradientStop {
    pub offset: f64,
    pub color: SerializableColor,
}

/// Gradient fill. `start`/`end` are in shape-local coordinates; for radial
/// gradients `start` is the center and the distance to `end` the radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gradient {
    #[serde(default)]
    pub kind: GradientKind,
    pub start: Point,
    pub end: Point,
    pub stops: Vec<GradientStop>,
}

/// Shape fill: a solid color or a gradient, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fill {
    Solid { color: SerializableColor },
    Gradient { gradient: Gradient },
}

impl Fill {
    pub fn solid(color: SerializableColor) -> Self {
        Fill::Solid { color }
    }

    /// Representative color (first stop for gradients).
    pub fn representative_color(&self) -> Option<SerializableColor> {
        match self {
            Fill::Solid { color } => Some(*color),
            Fill::Gradient { gradient } => gradient.stops.first().map(|s| s.color),
        }
    }
}

/// Style properties for shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeStyle {
    /// Stroke color.
    pub stroke_color: SerializableColor,
    /// Stroke width.
    pub stroke_width: f64,
    /// Dash style.
    #[serde(default)]
    pub dash: DashStyle,
    /// Fill (None = no fill).
    #[serde(default)]
    pub fill: Option<Fill>,
    /// Overall opacity (0.0 = fully transparent, 1.0 = fully opaque).
    #[serde(default = "default_opacity")]
    pub opacity: f64,
}

fn default_opacity() -> f64 {
    1.0
}

impl ShapeStyle {
    /// Set a solid fill, replacing any gradient.
    pub fn set_fill_color(&mut self, color: SerializableColor) {
        self.fill = Some(Fill::solid(color));
    }

    /// Set a gradient fill, replacing any solid color.
    pub fn set_gradient(&mut self, gradient: Gradient) {
        self.fill = Some(Fill::Gradient { gradient });
    }

    /// Get the stroke color with opacity applied.
    pub fn stroke_with_opacity(&self) -> Color {
        let color: Color = self.stroke_color.into();
        color.multiply_alpha(self.opacity.clamp(0.0, 1.0) as f32)
    }

    /// Get the representative fill color with opacity applied.
    pub fn fill_with_opacity(&self) -> Option<Color> {
        self.fill.as_ref().and_then(Fill::representative_color).map(|c| {
            let color: Color = c.into();
            color.multiply_alpha(self.opacity.clamp(0.0, 1.0) as f32)
        })
    }
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            stroke_color: SerializableColor::black(),
            stroke_width: 2.0,
            dash: DashStyle::default(),
            fill: None,
            opacity: 1.0,
        }
    }
}

/// A partial style update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StylePatch {
    pub stroke_color: Option<SerializableColor>,
    pub stroke_width: Option<f64>,
    pub dash: Option<DashStyle>,
    /// `Some(None)` clears the fill.
    pub fill: Option<Option<Fill>>,
    pub opacity: Option<f64>,
}

impl StylePatch {
    /// Apply this patch to a style.
    pub fn apply(&self, style: &mut ShapeStyle) {
        if let Some(color) = self.stroke_color {
            style.stroke_color = color;
        }
        if let Some(width) = self.stroke_width.filter(|w| w.is_finite() && *w >= 0.0) {
            style.stroke_width = width;
        }
        if let Some(dash) = self.dash {
            style.dash = dash;
        }
        if let Some(fill) = &self.fill {
            style.fill = fill.clone();
        }
        if let Some(opacity) = self.opacity.filter(|o| o.is_finite()) {
            style.opacity = opacity.clamp(0.0, 1.0);
        }
    }
}

/// Attributes shared by every shape variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeBase {
    pub(crate) id: ShapeId,
    /// Anchor position (document space, or group-local for group children).
    pub position: Point,
    /// Rotation in degrees about `position`.
    #[serde(default)]
    pub rotation: f64,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub style: ShapeStyle,
}

fn default_visible() -> bool {
    true
}

impl ShapeBase {
    pub fn new(position: Point) -> Self {
        Self::with_id(Uuid::new_v4(), position)
    }

    pub fn with_id(id: ShapeId, position: Point) -> Self {
        Self {
            id,
            position,
            rotation: 0.0,
            visible: true,
            locked: false,
            style: ShapeStyle::default(),
        }
    }

    /// Local-to-parent transform: rotate about the origin, then translate to `position`.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.position.to_vec2()) * Affine::rotate(self.rotation.to_radians())
    }

    /// Map a local point into parent space.
    pub fn to_parent(&self, local: Point) -> Point {
        self.position + geometry::rotate_vec(local.to_vec2(), self.rotation)
    }

    /// Map a parent-space point into local space.
    pub fn to_local(&self, point: Point) -> Point {
        geometry::rotate_vec(point - self.position, -self.rotation).to_point()
    }

    /// Mirror the anchor across `about` on `axis` and negate the rotation.
    fn mirror_anchor(&mut self, axis: Axis, about: f64) {
        self.position = mirror_point(self.position, axis, about);
        self.rotation = -self.rotation;
    }

    /// Scale the anchor's offset from `center` by `factor`.
    fn scale_anchor(&mut self, center: Point, factor: f64) {
        self.position = center + (self.position - center) * factor;
    }

    fn validate(&self) -> Result<(), ValidationError> {
        check_finite("x", self.position.x)?;
        check_finite("y", self.position.y)?;
        check_finite("rotation", self.rotation)?;
        check_non_negative("stroke_width", self.style.stroke_width)?;
        let opacity = self.style.opacity;
        if !opacity.is_finite() || !(0.0..=1.0).contains(&opacity) {
            return Err(ValidationError::Opacity(opacity));
        }
        Ok(())
    }
}

/// Mirror axis. `Horizontal` flips x (mirror across a vertical line).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// Mirror a point across the line `x = about` (horizontal) or `y = about` (vertical).
pub fn mirror_point(p: Point, axis: Axis, about: f64) -> Point {
    match axis {
        Axis::Horizontal => Point::new(2.0 * about - p.x, p.y),
        Axis::Vertical => Point::new(p.x, 2.0 * about - p.y),
    }
}

/// Structural validation failures for shapes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("non-finite value in field `{0}`")]
    NonFinite(&'static str),
    #[error("negative value {value} in field `{field}`")]
    Negative { field: &'static str, value: f64 },
    #[error("opacity {0} outside [0, 1]")]
    Opacity(f64),
    #[error("point list has odd length {0}")]
    OddPointList(usize),
    #[error("{kind} needs at least {min} vertices, found {found}")]
    TooFewVertices {
        kind: &'static str,
        min: usize,
        found: usize,
    },
    #[error("duplicate shape id {0}")]
    DuplicateId(ShapeId),
}

fn check_finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NonFinite(field))
    }
}

fn check_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    check_finite(field, value)?;
    if value < 0.0 {
        return Err(ValidationError::Negative { field, value });
    }
    Ok(())
}

/// Validate a flat point list: even length, finite, at least `min` vertices.
fn check_points(kind: &'static str, points: &[f64], min: usize) -> Result<(), ValidationError> {
    if points.len() % 2 != 0 {
        return Err(ValidationError::OddPointList(points.len()));
    }
    if points.iter().any(|v| !v.is_finite()) {
        return Err(ValidationError::NonFinite("points"));
    }
    let found = points.len() / 2;
    if found < min {
        return Err(ValidationError::TooFewVertices { kind, min, found });
    }
    Ok(())
}

/// Iterate a flat `[x0, y0, x1, y1, ...]` list as points.
pub fn pairs(points: &[f64]) -> impl Iterator<Item = Point> + '_ {
    points.chunks_exact(2).map(|c| Point::new(c[0], c[1]))
}

/// Flatten points into `[x0, y0, x1, y1, ...]`.
pub fn flatten_points(points: &[Point]) -> Vec<f64> {
    points.iter().flat_map(|p| [p.x, p.y]).collect()
}

fn mirror_flat(points: &mut [f64], axis: Axis) {
    let offset = match axis {
        Axis::Horizontal => 0,
        Axis::Vertical => 1,
    };
    for v in points.iter_mut().skip(offset).step_by(2) {
        *v = -*v;
    }
}

fn scale_flat(points: &mut [f64], factor: f64) {
    for v in points.iter_mut() {
        *v *= factor;
    }
}

/// Build a polyline path from world points.
fn polyline_path(points: &[Point], closed: bool) -> BezPath {
    let mut path = BezPath::new();
    let mut iter = points.iter();
    if let Some(first) = iter.next() {
        path.move_to(*first);
        for p in iter {
            path.line_to(*p);
        }
        if closed {
            path.close_path();
        }
    }
    path
}

/// Corners of a local `[0,w]x[0,h]` box mapped through `base`.
fn box_corners(base: &ShapeBase, width: f64, height: f64) -> Vec<Point> {
    [
        Point::new(0.0, 0.0),
        Point::new(width, 0.0),
        Point::new(width, height),
        Point::new(0.0, height),
    ]
    .into_iter()
    .map(|p| base.to_parent(p))
    .collect()
}

/// Mirror a top-left anchored box, keeping its local extent positive.
fn mirror_box(base: &mut ShapeBase, width: f64, height: f64, axis: Axis, about: f64) {
    base.mirror_anchor(axis, about);
    let shift = match axis {
        Axis::Horizontal => Vec2::new(-width, 0.0),
        Axis::Vertical => Vec2::new(0.0, -height),
    };
    base.position += geometry::rotate_vec(shift, base.rotation);
}

/// Common trait for all shapes.
pub trait ShapeTrait {
    /// Shared attributes.
    fn base(&self) -> &ShapeBase;

    /// Mutable shared attributes.
    fn base_mut(&mut self) -> &mut ShapeBase;

    /// Outline points in parent space, used for bounds and box-based snapping.
    fn outline(&self) -> Vec<Point>;

    /// Get the path representation for export.
    fn to_path(&self) -> BezPath;

    /// Mirror across `x = about` or `y = about` in parent space.
    fn mirror(&mut self, axis: Axis, about: f64);

    /// Uniformly scale about `center` in parent space.
    fn scale_about(&mut self, center: Point, factor: f64);

    /// Structural validation.
    fn validate(&self) -> Result<(), ValidationError>;

    /// Get the unique identifier.
    fn id(&self) -> ShapeId {
        self.base().id
    }

    /// Get the bounding box in parent coordinates.
    fn bounds(&self) -> Rect {
        let position = self.base().position;
        geometry::bounding_box(&self.outline()).unwrap_or_else(|| Rect::from_points(position, position))
    }

    /// Translate by a delta.
    fn translate(&mut self, delta: Vec2) {
        self.base_mut().position += delta;
    }
}

/// Enum wrapper for all shape types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    Line(Line),
    Circle(Circle),
    Arc(Arc),
    Rectangle(Rectangle),
    Polygon(Polygon),
    Text(Text),
    Arrow(Arrow),
    Freehand(Freehand),
    Group(Group),
    Dimension(Dimension),
    Image(Image),
}

macro_rules! dispatch {
    ($self:expr, $s:ident => $body:expr) => {
        match $self {
            Shape::Line($s) => $body,
            Shape::Circle($s) => $body,
            Shape::Arc($s) => $body,
            Shape::Rectangle($s) => $body,
            Shape::Polygon($s) => $body,
            Shape::Text($s) => $body,
            Shape::Arrow($s) => $body,
            Shape::Freehand($s) => $body,
            Shape::Group($s) => $body,
            Shape::Dimension($s) => $body,
            Shape::Image($s) => $body,
        }
    };
}

impl Shape {
    pub fn id(&self) -> ShapeId {
        dispatch!(self, s => s.id())
    }

    pub fn base(&self) -> &ShapeBase {
        dispatch!(self, s => s.base())
    }

    pub fn base_mut(&mut self) -> &mut ShapeBase {
        dispatch!(self, s => s.base_mut())
    }

    pub fn bounds(&self) -> Rect {
        dispatch!(self, s => s.bounds())
    }

    pub fn outline(&self) -> Vec<Point> {
        dispatch!(self, s => s.outline())
    }

    pub fn to_path(&self) -> BezPath {
        dispatch!(self, s => s.to_path())
    }

    pub fn mirror(&mut self, axis: Axis, about: f64) {
        dispatch!(self, s => s.mirror(axis, about))
    }

    pub fn scale_about(&mut self, center: Point, factor: f64) {
        dispatch!(self, s => s.scale_about(center, factor))
    }

    pub fn translate(&mut self, delta: Vec2) {
        dispatch!(self, s => s.translate(delta))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        dispatch!(self, s => s.validate())
    }

    pub fn style(&self) -> &ShapeStyle {
        &self.base().style
    }

    pub fn style_mut(&mut self) -> &mut ShapeStyle {
        &mut self.base_mut().style
    }

    pub fn position(&self) -> Point {
        self.base().position
    }

    pub fn rotation(&self) -> f64 {
        self.base().rotation
    }

    pub fn is_visible(&self) -> bool {
        self.base().visible
    }

    pub fn is_locked(&self) -> bool {
        self.base().locked
    }

    /// Variant name as used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Shape::Line(_) => "line",
            Shape::Circle(_) => "circle",
            Shape::Arc(_) => "arc",
            Shape::Rectangle(_) => "rectangle",
            Shape::Polygon(_) => "polygon",
            Shape::Text(_) => "text",
            Shape::Arrow(_) => "arrow",
            Shape::Freehand(_) => "freehand",
            Shape::Group(_) => "group",
            Shape::Dimension(_) => "dimension",
            Shape::Image(_) => "image",
        }
    }

    /// Check if this shape is a group.
    pub fn is_group(&self) -> bool {
        matches!(self, Shape::Group(_))
    }

    /// Get the group if this shape is a group.
    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Shape::Group(g) => Some(g),
            _ => None,
        }
    }

    /// This shape's id followed by every descendant id.
    pub fn all_ids(&self) -> Vec<ShapeId> {
        let mut ids = vec![self.id()];
        if let Shape::Group(group) = self {
            ids.extend(group.all_shape_ids());
        }
        ids
    }

    /// Regenerate the shape's ID with a new unique identifier.
    pub fn regenerate_id(&mut self) {
        self.base_mut().id = Uuid::new_v4();
    }

    /// Regenerate IDs for this shape and, for groups, every descendant.
    pub fn regenerate_ids(&mut self) {
        self.regenerate_id();
        if let Shape::Group(group) = self {
            for child in &mut group.children {
                child.regenerate_ids();
            }
        }
    }

    /// The editable point list and its vertex floor, for vertex-edit eligible variants.
    pub fn vertex_list_mut(&mut self) -> Option<(&mut Vec<f64>, usize)> {
        match self {
            Shape::Line(s) => Some((&mut s.points, Line::MIN_VERTICES)),
            Shape::Arrow(s) => Some((&mut s.points, Arrow::MIN_VERTICES)),
            Shape::Polygon(s) => Some((&mut s.points, Polygon::MIN_VERTICES)),
            Shape::Freehand(s) => Some((&mut s.points, Freehand::MIN_VERTICES)),
            _ => None,
        }
    }

    /// Whether vertex editing applies to this variant.
    pub fn is_vertex_editable(&self) -> bool {
        matches!(
            self,
            Shape::Line(_) | Shape::Arrow(_) | Shape::Polygon(_) | Shape::Freehand(_)
        )
    }

    /// World-space vertices of point-list shapes (empty for other variants).
    pub fn vertices(&self) -> Vec<Point> {
        let base = self.base();
        let points = match self {
            Shape::Line(s) => &s.points,
            Shape::Arrow(s) => &s.points,
            Shape::Polygon(s) => &s.points,
            Shape::Freehand(s) => &s.points,
            Shape::Dimension(s) => &s.points,
            _ => return Vec::new(),
        };
        pairs(points).map(|p| base.to_parent(p)).collect()
    }
}

/// Validate a whole shape list: each shape plus id uniqueness (recursive).
pub fn validate_shapes(shapes: &[Shape]) -> Result<(), ValidationError> {
    fn visit(
        shape: &Shape,
        seen: &mut std::collections::HashSet<ShapeId>,
    ) -> Result<(), ValidationError> {
        if !seen.insert(shape.id()) {
            return Err(ValidationError::DuplicateId(shape.id()));
        }
        if let Shape::Group(group) = shape {
            for child in &group.children {
                visit(child, seen)?;
            }
        }
        Ok(())
    }

    let mut seen = std::collections::HashSet::new();
    for shape in shapes {
        shape.validate()?;
        visit(shape, &mut seen)?;
    }
    Ok(())
}

/// Check that `incoming` can be inserted into `doc`, or replace the
/// top-level shape with its id, without any id appearing twice.
pub fn check_placement(doc: &[Shape], incoming: &Shape) -> Result<(), ValidationError> {
    validate_shapes(std::slice::from_ref(incoming))?;
    let taken: std::collections::HashSet<ShapeId> = doc
        .iter()
        .filter(|s| s.id() != incoming.id())
        .flat_map(Shape::all_ids)
        .collect();
    match incoming.all_ids().into_iter().find(|id| taken.contains(id)) {
        Some(id) => Err(ValidationError::DuplicateId(id)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip() {
        let c = SerializableColor::from_hex("#FF6B6B").unwrap();
        assert_eq!(c, SerializableColor::new(255, 107, 107, 255));
        assert_eq!(c.to_hex(), "#ff6b6b");
        assert_eq!(
            SerializableColor::from_hex("#fff"),
            Some(SerializableColor::white())
        );
        assert!(SerializableColor::from_hex("red").is_none());
        assert!(SerializableColor::from_hex("#12345").is_none());
    }

    #[test]
    fn test_fill_is_exclusive() {
        let mut style = ShapeStyle::default();
        style.set_fill_color(SerializableColor::white());
        style.set_gradient(Gradient {
            kind: GradientKind::Linear,
            start: Point::ZERO,
            end: Point::new(10.0, 0.0),
            stops: vec![GradientStop {
                offset: 0.0,
                color: SerializableColor::black(),
            }],
        });
        assert!(matches!(style.fill, Some(Fill::Gradient { .. })));
        style.set_fill_color(SerializableColor::white());
        assert!(matches!(style.fill, Some(Fill::Solid { .. })));
    }

    #[test]
    fn test_style_patch() {
        let mut style = ShapeStyle::default();
        let patch = StylePatch {
            stroke_width: Some(5.0),
            opacity: Some(3.0),
            fill: Some(Some(Fill::solid(SerializableColor::white()))),
            ..Default::default()
        };
        patch.apply(&mut style);
        assert!((style.stroke_width - 5.0).abs() < f64::EPSILON);
        assert!((style.opacity - 1.0).abs() < f64::EPSILON);
        assert!(style.fill.is_some());

        StylePatch {
            fill: Some(None),
            ..Default::default()
        }
        .apply(&mut style);
        assert!(style.fill.is_none());
    }

    #[test]
    fn test_shape_serde_tagged() {
        let shape = Shape::Rectangle(Rectangle::new(Point::new(1.0, 2.0), 3.0, 4.0));
        let json = serde_json::to_string(&shape).unwrap();
        assert!(json.contains("\"type\":\"rectangle\""));
        let back: Shape = serde_json::from_str(&json).unwrap();
        assert_eq!(back, shape);
    }

    #[test]
    fn test_shape_deserialize_defaults() {
        let json = format!(
            r#"{{"type":"circle","id":"{}","position":{{"x":5,"y":5}},"radius":3}}"#,
            Uuid::new_v4()
        );
        let shape: Shape = serde_json::from_str(&json).unwrap();
        assert!(shape.is_visible());
        assert!(!shape.is_locked());
        assert!((shape.style().opacity - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validate_shapes_duplicate_id() {
        let a = Shape::Circle(Circle::new(Point::ZERO, 5.0));
        let b = a.clone();
        assert!(matches!(
            validate_shapes(&[a, b]),
            Err(ValidationError::DuplicateId(_))
        ));
    }

    #[test]
    fn test_regenerate_ids_recurses() {
        let child = Shape::Circle(Circle::new(Point::ZERO, 5.0));
        let child_id = child.id();
        let mut group = Shape::Group(Group::new(Point::ZERO, vec![child]));
        group.regenerate_ids();
        let g = group.as_group().unwrap();
        assert_ne!(g.children[0].id(), child_id);
    }

    #[test]
    fn test_base_local_roundtrip() {
        let mut base = ShapeBase::new(Point::new(10.0, 20.0));
        base.rotation = 30.0;
        let p = Point::new(3.0, -4.0);
        let back = base.to_local(base.to_parent(p));
        assert!((back.x - p.x).abs() < 1e-9);
        assert!((back.y - p.y).abs() < 1e-9);
        let via_affine = base.transform() * p;
        let direct = base.to_parent(p);
        assert!((via_affine.x - direct.x).abs() < 1e-9);
        assert!((via_affine.y - direct.y).abs() < 1e-9);
    }
}
