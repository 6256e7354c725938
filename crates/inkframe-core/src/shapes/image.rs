//! Image shape for embedding raster images.

use super::{box_corners, check_non_negative, mirror_box, polyline_path, Axis, ShapeBase, ShapeTrait, ValidationError};
use base64::{engine::general_purpose::STANDARD, Engine};
use kurbo::{BezPath, Point};
use serde::{Deserialize, Serialize};

/// Image format for embedded image data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    Png,
    Jpeg,
    WebP,
}

impl ImageFormat {
    /// Get MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::WebP => "image/webp",
        }
    }

    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "webp" => Some(ImageFormat::WebP),
            _ => None,
        }
    }

    /// Detect format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            return Some(ImageFormat::Png);
        }
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(ImageFormat::Jpeg);
        }
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Some(ImageFormat::WebP);
        }
        None
    }
}

/// A raster image placed in a box anchored at its top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    #[serde(flatten)]
    pub base: ShapeBase,
    /// Display width.
    pub width: f64,
    /// Display height.
    pub height: f64,
    /// Image source: a `data:` URL or a remote URL.
    pub src: String,
}

impl Image {
    /// Create an image referencing `src`.
    pub fn new(position: Point, width: f64, height: f64, src: impl Into<String>) -> Self {
        Self {
            base: ShapeBase::new(position),
            width,
            height,
            src: src.into(),
        }
    }

    /// Create an image from raw bytes, embedding them as a base64 data URL.
    /// Returns `None` when the bytes are not a recognized format.
    pub fn from_bytes(position: Point, width: f64, height: f64, data: &[u8]) -> Option<Self> {
        let format = ImageFormat::from_magic_bytes(data)?;
        let src = format!("data:{};base64,{}", format.mime_type(), STANDARD.encode(data));
        Some(Self::new(position, width, height, src))
    }

    /// Scale the display box to fit within max dimensions, keeping the aspect ratio.
    pub fn fit_within(mut self, max_width: f64, max_height: f64) -> Self {
        if self.width <= 0.0 || self.height <= 0.0 || max_height <= 0.0 {
            return self;
        }
        let aspect = self.width / self.height;
        if aspect > max_width / max_height {
            self.width = max_width;
            self.height = max_width / aspect;
        } else {
            self.height = max_height;
            self.width = max_height * aspect;
        }
        self
    }

    /// Whether the source is an embedded data URL.
    pub fn is_embedded(&self) -> bool {
        self.src.starts_with("data:")
    }

    /// Decode the embedded bytes of a base64 data URL.
    pub fn data(&self) -> Option<Vec<u8>> {
        let rest = self.src.strip_prefix("data:")?;
        let (_, payload) = rest.split_once(";base64,")?;
        STANDARD.decode(payload).ok()
    }

    /// Format of the embedded bytes, if any.
    pub fn format(&self) -> Option<ImageFormat> {
        self.data().as_deref().and_then(ImageFormat::from_magic_bytes)
    }

}

impl ShapeTrait for Image {
    fn base(&self) -> &ShapeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ShapeBase {
        &mut self.base
    }

    fn outline(&self) -> Vec<Point> {
        box_corners(&self.base, self.width, self.height)
    }

    fn to_path(&self) -> BezPath {
        polyline_path(&self.outline(), true)
    }

    fn mirror(&mut self, axis: Axis, about: f64) {
        mirror_box(&mut self.base, self.width, self.height, axis, about);
    }

    fn scale_about(&mut self, center: Point, factor: f64) {
        self.base.scale_anchor(center, factor);
        self.width *= factor;
        self.height *= factor;
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.base.validate()?;
        check_non_negative("width", self.width)?;
        check_non_negative("height", self.height)
    }
}
