//! SVG and PNG export of a shape list.
//!
//! The PNG path is a coarse rasteriser: closed rings are filled with an
//! even-odd scanline fill and outlines are stamped along each segment.
//! Glyphs and embedded image pixels are not rasterised.

use crate::shapes::{Fill, Gradient, GradientKind, SerializableColor, Shape, ShapeStyle};
use kurbo::{Affine, BezPath, PathEl, Point};
use peniko::Color;
use std::fmt::Write as _;
use thiserror::Error;

/// Largest PNG edge we will allocate.
pub const MAX_RASTER_SIZE: u32 = 16_384;

/// Flattening tolerance for curves, in pixels.
const FLATTEN_TOLERANCE: f64 = 0.25;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("invalid export size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("PNG encoding failed: {0}")]
    Png(#[from] png::EncodingError),
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

fn svg_rgb(color: SerializableColor) -> (String, f64) {
    (
        format!("rgb({},{},{})", color.r, color.g, color.b),
        f64::from(color.a) / 255.0,
    )
}

fn svg_matrix(transform: Affine) -> String {
    let [a, b, c, d, e, f] = transform.as_coeffs();
    format!("matrix({a:.6} {b:.6} {c:.6} {d:.6} {e:.3} {f:.3})")
}

/// Whether the shape's outline encloses an area that takes a fill.
fn is_fillable(shape: &Shape) -> bool {
    matches!(shape, Shape::Circle(_) | Shape::Rectangle(_) | Shape::Polygon(_))
}

struct SvgWriter {
    defs: String,
    body: String,
    next_gradient: usize,
}

impl SvgWriter {
    fn gradient_def(&mut self, gradient: &Gradient, transform: Affine) -> String {
        let id = format!("grad{}", self.next_gradient);
        self.next_gradient += 1;
        let matrix = svg_matrix(transform);
        match gradient.kind {
            GradientKind::Linear => {
                let _ = write!(
                    self.defs,
                    r#"<linearGradient id="{id}" gradientUnits="userSpaceOnUse" gradientTransform="{matrix}" x1="{:.3}" y1="{:.3}" x2="{:.3}" y2="{:.3}">"#,
                    gradient.start.x, gradient.start.y, gradient.end.x, gradient.end.y
                );
            }
            GradientKind::Radial => {
                let _ = write!(
                    self.defs,
                    r#"<radialGradient id="{id}" gradientUnits="userSpaceOnUse" gradientTransform="{matrix}" cx="{:.3}" cy="{:.3}" r="{:.3}">"#,
                    gradient.start.x,
                    gradient.start.y,
                    gradient.start.distance(gradient.end)
                );
            }
        }
        for stop in &gradient.stops {
            let (rgb, alpha) = svg_rgb(stop.color);
            let _ = write!(
                self.defs,
                r#"<stop offset="{:.4}" stop-color="{rgb}" stop-opacity="{alpha:.3}"/>"#,
                stop.offset.clamp(0.0, 1.0)
            );
        }
        self.defs.push_str(match gradient.kind {
            GradientKind::Linear => "</linearGradient>",
            GradientKind::Radial => "</radialGradient>",
        });
        id
    }

    /// `fill`, `stroke`, dash and opacity attributes.
    fn paint_attrs(&mut self, style: &ShapeStyle, fill: bool, local: Affine) -> String {
        let mut attrs = String::new();
        match style.fill.as_ref().filter(|_| fill) {
            Some(Fill::Solid { color }) => {
                let (rgb, alpha) = svg_rgb(*color);
                let _ = write!(attrs, r#" fill="{rgb}""#);
                if alpha < 1.0 {
                    let _ = write!(attrs, r#" fill-opacity="{alpha:.3}""#);
                }
            }
            Some(Fill::Gradient { gradient }) => {
                let id = self.gradient_def(gradient, local);
                let _ = write!(attrs, r#" fill="url(#{id})""#);
            }
            None => attrs.push_str(r#" fill="none""#),
        }

        let (rgb, alpha) = svg_rgb(style.stroke_color);
        let _ = write!(
            attrs,
            r#" stroke="{rgb}" stroke-width="{:.3}" stroke-linecap="round" stroke-linejoin="round""#,
            style.stroke_width
        );
        if alpha < 1.0 {
            let _ = write!(attrs, r#" stroke-opacity="{alpha:.3}""#);
        }
        let pattern = style.dash.pattern(style.stroke_width);
        if !pattern.is_empty() {
            let dashes: Vec<String> = pattern.iter().map(|v| format!("{v:.3}")).collect();
            let _ = write!(attrs, r#" stroke-dasharray="{}""#, dashes.join(" "));
        }
        if style.opacity < 1.0 {
            let _ = write!(attrs, r#" opacity="{:.3}""#, style.opacity);
        }
        attrs
    }

    fn shape(&mut self, shape: &Shape, parent: Affine) {
        if !shape.is_visible() {
            return;
        }
        let local = parent * shape.base().transform();
        match shape {
            Shape::Group(group) => {
                let _ = write!(self.body, r#"<g transform="{}">"#, svg_matrix(local));
                for child in &group.children {
                    self.shape(child, Affine::IDENTITY);
                }
                self.body.push_str("</g>");
            }
            Shape::Text(text) => {
                let (rgb, alpha) = svg_rgb(text.base.style.stroke_color);
                let opacity = alpha * text.base.style.opacity;
                let _ = write!(
                    self.body,
                    r#"<text transform="{}" font-family="{}" font-size="{:.3}" fill="{rgb}" fill-opacity="{opacity:.3}" dominant-baseline="hanging">"#,
                    svg_matrix(local),
                    escape_xml(&text.font_family),
                    text.font_size
                );
                let line_height = text.font_size * 1.2;
                for (i, line) in text.text.lines().enumerate() {
                    let _ = write!(
                        self.body,
                        r#"<tspan x="0" y="{:.3}">{}</tspan>"#,
                        i as f64 * line_height,
                        escape_xml(line)
                    );
                }
                self.body.push_str("</text>");
            }
            Shape::Image(image) => {
                let _ = write!(
                    self.body,
                    r#"<image transform="{}" x="0" y="0" width="{:.3}" height="{:.3}" href="{}" preserveAspectRatio="none"/>"#,
                    svg_matrix(local),
                    image.width,
                    image.height,
                    escape_xml(&image.src)
                );
            }
            _ => {
                let path = parent * shape.to_path();
                let attrs = self.paint_attrs(shape.style(), is_fillable(shape), local);
                let _ = write!(self.body, r#"<path d="{}"{attrs}/>"#, path.to_svg());
                if let Shape::Dimension(dim) = shape {
                    if let Some(anchor) = dim.label_anchor() {
                        let anchor = parent * anchor;
                        let (rgb, _) = svg_rgb(dim.base.style.stroke_color);
                        let _ = write!(
                            self.body,
                            r#"<text x="{:.3}" y="{:.3}" font-size="{:.3}" fill="{rgb}" text-anchor="middle">{}</text>"#,
                            anchor.x,
                            anchor.y,
                            dim.font_size,
                            escape_xml(&dim.display_label())
                        );
                    }
                }
            }
        }
    }
}

/// Serialize shapes, back to front, as an SVG document of the given size.
pub fn to_svg(shapes: &[Shape], width: u32, height: u32) -> String {
    let mut writer = SvgWriter {
        defs: String::new(),
        body: String::new(),
        next_gradient: 0,
    };
    for shape in shapes {
        writer.shape(shape, Affine::IDENTITY);
    }

    let mut out = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    );
    if !writer.defs.is_empty() {
        let _ = write!(out, "<defs>{}</defs>", writer.defs);
    }
    out.push_str(&writer.body);
    out.push_str("</svg>\n");
    out
}

/// RGBA8 canvas with source-over blending.
struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Raster {
    fn new(width: u32, height: u32, background: SerializableColor) -> Self {
        let pixels = [background.r, background.g, background.b, background.a]
            .repeat(width as usize * height as usize);
        Self {
            width,
            height,
            pixels,
        }
    }

    fn blend(&mut self, x: i64, y: i64, color: [f64; 4]) {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let a = color[3];
        let dst_a = f64::from(self.pixels[i + 3]) / 255.0;
        let out_a = a + dst_a * (1.0 - a);
        if out_a <= 0.0 {
            return;
        }
        for c in 0..3 {
            let dst = f64::from(self.pixels[i + c]) / 255.0;
            let v = (color[c] * a + dst * dst_a * (1.0 - a)) / out_a;
            self.pixels[i + c] = (v * 255.0).round().clamp(0.0, 255.0) as u8;
        }
        self.pixels[i + 3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    }

    /// Even-odd fill of closed rings, sampling pixel centers.
    fn fill_even_odd(&mut self, rings: &[Vec<Point>], color: [f64; 4]) {
        let edges: Vec<(Point, Point)> = rings
            .iter()
            .filter(|ring| ring.len() >= 3)
            .flat_map(|ring| {
                ring.iter()
                    .zip(ring.iter().cycle().skip(1))
                    .map(|(a, b)| (*a, *b))
            })
            .collect();
        if edges.is_empty() {
            return;
        }

        let (min_y, max_y) = edges.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |acc, (a, b)| {
            (acc.0.min(a.y).min(b.y), acc.1.max(a.y).max(b.y))
        });
        let row_start = min_y.floor().max(0.0) as i64;
        let row_end = max_y.ceil().min(f64::from(self.height)) as i64;

        let mut crossings = Vec::new();
        for row in row_start..row_end {
            let y = row as f64 + 0.5;
            crossings.clear();
            for (a, b) in &edges {
                // Half-open so shared vertices count once.
                if (a.y <= y) != (b.y <= y) {
                    crossings.push(a.x + (y - a.y) / (b.y - a.y) * (b.x - a.x));
                }
            }
            crossings.sort_by(f64::total_cmp);
            for pair in crossings.chunks_exact(2) {
                let x_start = (pair[0] - 0.5).ceil().max(0.0) as i64;
                let x_end = (pair[1] - 0.5).floor().min(f64::from(self.width) - 1.0) as i64;
                for x in x_start..=x_end {
                    self.blend(x, row, color);
                }
            }
        }
    }

    /// Stamp round dots along a polyline.
    fn stroke_polyline(&mut self, points: &[Point], closed: bool, width: f64, color: [f64; 4]) {
        let radius = (width / 2.0).max(0.5);
        let mut segments: Vec<(Point, Point)> = points.windows(2).map(|w| (w[0], w[1])).collect();
        if closed && points.len() > 2 {
            if let (Some(first), Some(last)) = (points.first(), points.last()) {
                segments.push((*last, *first));
            }
        }

        let mut covered = vec![false; self.width as usize * self.height as usize];
        let mut stamp = |raster: &mut Raster, center: Point| {
            let x0 = (center.x - radius).floor() as i64;
            let x1 = (center.x + radius).ceil() as i64;
            let y0 = (center.y - radius).floor() as i64;
            let y1 = (center.y + radius).ceil() as i64;
            for y in y0..=y1 {
                for x in x0..=x1 {
                    if x < 0 || y < 0 || x >= i64::from(raster.width) || y >= i64::from(raster.height) {
                        continue;
                    }
                    let pixel = Point::new(x as f64 + 0.5, y as f64 + 0.5);
                    let idx = y as usize * raster.width as usize + x as usize;
                    // Each pixel is painted once per stroke so alpha does not stack.
                    if pixel.distance(center) <= radius && !covered[idx] {
                        covered[idx] = true;
                        raster.blend(x, y, color);
                    }
                }
            }
        };

        for (a, b) in segments {
            let steps = (a.distance(b) * 2.0).ceil().max(1.0) as usize;
            for i in 0..=steps {
                stamp(self, a.lerp(b, i as f64 / steps as f64));
            }
        }
        if let [only] = points {
            stamp(self, *only);
        }
    }
}

fn rgba(color: Color) -> [f64; 4] {
    let c = color.to_rgba8();
    [
        f64::from(c.r) / 255.0,
        f64::from(c.g) / 255.0,
        f64::from(c.b) / 255.0,
        f64::from(c.a) / 255.0,
    ]
}

/// Split a path into flattened subpaths, each with its closed flag.
fn flatten_subpaths(path: &BezPath) -> Vec<(Vec<Point>, bool)> {
    let mut subpaths: Vec<(Vec<Point>, bool)> = Vec::new();
    kurbo::flatten(path.iter(), FLATTEN_TOLERANCE, |el| match el {
        PathEl::MoveTo(p) => subpaths.push((vec![p], false)),
        PathEl::LineTo(p) => match subpaths.last_mut() {
            Some((points, _)) => points.push(p),
            None => subpaths.push((vec![p], false)),
        },
        PathEl::ClosePath => {
            if let Some((_, closed)) = subpaths.last_mut() {
                *closed = true;
            }
        }
        _ => {}
    });
    subpaths
}

fn rasterize_shape(raster: &mut Raster, shape: &Shape, parent: Affine) {
    if !shape.is_visible() {
        return;
    }
    let style = shape.style();
    match shape {
        Shape::Group(group) => {
            let local = parent * group.base.transform();
            for child in &group.children {
                rasterize_shape(raster, child, local);
            }
        }
        Shape::Text(_) => {}
        Shape::Image(_) => {
            let placeholder = Color::from_rgba8(200, 200, 200, 255)
                .multiply_alpha(style.opacity.clamp(0.0, 1.0) as f32);
            let rings: Vec<Vec<Point>> = flatten_subpaths(&(parent * shape.to_path()))
                .into_iter()
                .map(|(points, _)| points)
                .collect();
            raster.fill_even_odd(&rings, rgba(placeholder));
        }
        _ => {
            let subpaths = flatten_subpaths(&(parent * shape.to_path()));
            if is_fillable(shape) {
                if let Some(color) = style.fill_with_opacity() {
                    let rings: Vec<Vec<Point>> = subpaths
                        .iter()
                        .filter(|(_, closed)| *closed)
                        .map(|(points, _)| points.clone())
                        .collect();
                    raster.fill_even_odd(&rings, rgba(color));
                }
            }
            if style.stroke_width > 0.0 {
                let color = rgba(style.stroke_with_opacity());
                for (points, closed) in &subpaths {
                    raster.stroke_polyline(points, *closed, style.stroke_width, color);
                }
            }
        }
    }
}

/// Rasterise shapes onto a `width`x`height` canvas and encode it as PNG.
pub fn to_png(
    shapes: &[Shape],
    width: u32,
    height: u32,
    background: SerializableColor,
) -> Result<Vec<u8>, ExportError> {
    if width == 0 || height == 0 || width > MAX_RASTER_SIZE || height > MAX_RASTER_SIZE {
        return Err(ExportError::InvalidSize { width, height });
    }

    let mut raster = Raster::new(width, height, background);
    for shape in shapes {
        rasterize_shape(&mut raster, shape, Affine::IDENTITY);
    }

    let mut png_data = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut png_data, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&raster.pixels)?;
    }
    log::debug!(
        "exported {} shapes to {width}x{height} PNG ({} bytes)",
        shapes.len(),
        png_data.len()
    );
    Ok(png_data)
}
