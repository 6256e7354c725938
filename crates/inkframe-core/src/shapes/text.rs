//! Text shape.

use super::{box_corners, check_non_negative, mirror_box, polyline_path, Axis, ShapeBase, ShapeTrait, ValidationError};
use kurbo::{BezPath, Point};
use serde::{Deserialize, Serialize};

/// Default font size for new text.
pub const DEFAULT_FONT_SIZE: f64 = 20.0;

/// Average glyph advance as a fraction of the font size.
const CHAR_WIDTH_FACTOR: f64 = 0.6;

/// Line height as a multiple of the font size.
const LINE_HEIGHT_FACTOR: f64 = 1.2;

fn default_font_family() -> String {
    "sans-serif".to_string()
}

/// A text label anchored at its top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    #[serde(flatten)]
    pub base: ShapeBase,
    /// Text content (may contain newlines).
    pub text: String,
    /// Font size in document units.
    pub font_size: f64,
    /// Font family name.
    #[serde(default = "default_font_family")]
    pub font_family: String,
}

impl Text {
    /// Create a new text shape.
    pub fn new(position: Point, text: impl Into<String>) -> Self {
        Self {
            base: ShapeBase::new(position),
            text: text.into(),
            font_size: DEFAULT_FONT_SIZE,
            font_family: default_font_family(),
        }
    }

    /// Set font size.
    pub fn with_font_size(mut self, size: f64) -> Self {
        self.font_size = size;
        self
    }

    /// Number of rendered lines (empty text is one line).
    pub fn line_count(&self) -> usize {
        let count = self.text.lines().count().max(1);
        if self.text.ends_with('\n') {
            count + 1
        } else {
            count
        }
    }

    /// Approximate width: widest line times an average glyph advance.
    pub fn approximate_width(&self) -> f64 {
        let widest = self
            .text
            .lines()
            .map(|line| line.chars().count())
            .max()
            .unwrap_or(0);
        widest as f64 * self.font_size * CHAR_WIDTH_FACTOR
    }

    /// Approximate height from the line count.
    pub fn approximate_height(&self) -> f64 {
        self.line_count() as f64 * self.font_size * LINE_HEIGHT_FACTOR
    }
}

impl ShapeTrait for Text {
    fn base(&self) -> &ShapeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ShapeBase {
        &mut self.base
    }

    fn outline(&self) -> Vec<Point> {
        box_corners(&self.base, self.approximate_width(), self.approximate_height())
    }

    fn to_path(&self) -> BezPath {
        // Glyph outlines are the renderer's job; export the layout box.
        polyline_path(&self.outline(), true)
    }

    fn mirror(&mut self, axis: Axis, about: f64) {
        let (w, h) = (self.approximate_width(), self.approximate_height());
        mirror_box(&mut self.base, w, h, axis, about);
    }

    fn scale_about(&mut self, center: Point, factor: f64) {
        self.base.scale_anchor(center, factor);
        self.font_size *= factor;
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.base.validate()?;
        check_non_negative("font_size", self.font_size)
    }
}
