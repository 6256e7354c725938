//! View state: zoom and pan.

use crate::config::EngineConfig;
use kurbo::{Affine, Point, Vec2};
use serde::{Deserialize, Serialize};

/// Zoom level shown as 100%.
pub const DEFAULT_ZOOM: f64 = 1.0;

/// Maps document coordinates to screen coordinates.
///
/// `screen = document * zoom + pan`. Zoom is clamped to the configured range;
/// pan is unbounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Translation in screen pixels.
    pub pan: Vec2,
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            pan: Vec2::ZERO,
            zoom: DEFAULT_ZOOM,
            min_zoom: 0.1,
            max_zoom: 10.0,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Camera using the zoom limits from `config`.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
            ..Self::default()
        }
    }

    /// Document-to-screen transform.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.pan) * Affine::scale(self.zoom)
    }

    /// Screen-to-document transform.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.zoom) * Affine::translate(-self.pan)
    }

    pub fn screen_to_world(&self, screen_point: Point) -> Point {
        self.inverse_transform() * screen_point
    }

    pub fn world_to_screen(&self, world_point: Point) -> Point {
        self.transform() * world_point
    }

    fn clamp_zoom(&self, zoom: f64) -> f64 {
        if zoom.is_finite() {
            zoom.clamp(self.min_zoom, self.max_zoom)
        } else {
            self.zoom
        }
    }

    /// Set the zoom level, clamped.
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = self.clamp_zoom(zoom);
    }

    /// Pan by a screen-space delta.
    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan += delta;
    }

    pub fn set_pan(&mut self, pan: Vec2) {
        self.pan = pan;
    }

    /// Multiply the zoom by `factor`, keeping `screen_point` fixed on screen.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        let new_zoom = self.clamp_zoom(self.zoom * factor);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }

        let world_point = self.screen_to_world(screen_point);
        self.zoom = new_zoom;
        let new_screen = self.world_to_screen(world_point);
        self.pan += screen_point - new_screen;
    }

    /// Back to 100% with no pan.
    pub fn reset(&mut self) {
        self.pan = Vec2::ZERO;
        self.zoom = DEFAULT_ZOOM;
    }
}
