//! Alignment guides shown while a box is dragged.
//!
//! Guides are advisory: they describe near-alignments between the dragged
//! box and the other boxes (plus the canvas center) but never move anything.

use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Default on-screen distance (pixels) within which a guide appears.
pub const GUIDE_THRESHOLD: f64 = 5.0;

/// Orientation of a guide line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuideOrientation {
    /// A vertical line at some x.
    Vertical,
    /// A horizontal line at some y.
    Horizontal,
}

/// Which edges or centers line up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuideRelation {
    /// Left/left or top/top.
    StartStart,
    /// Right/right or bottom/bottom.
    EndEnd,
    /// Dragged start against the other box's end.
    StartEnd,
    /// Dragged end against the other box's start.
    EndStart,
    CenterCenter,
    /// Dragged center against the canvas center.
    CenterCanvas,
}

/// A detected alignment guide.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Guide {
    pub orientation: GuideOrientation,
    /// x for vertical guides, y for horizontal ones.
    pub position: f64,
    pub relation: GuideRelation,
    /// Extent along the guide covering both boxes.
    pub start: f64,
    pub end: f64,
}

impl Guide {
    /// Guide endpoints in document space.
    pub fn line(&self) -> (Point, Point) {
        match self.orientation {
            GuideOrientation::Vertical => (
                Point::new(self.position, self.start),
                Point::new(self.position, self.end),
            ),
            GuideOrientation::Horizontal => (
                Point::new(self.start, self.position),
                Point::new(self.end, self.position),
            ),
        }
    }
}

/// Start, center and end of a box along one axis.
fn axis_values(rect: &Rect, orientation: GuideOrientation) -> [f64; 3] {
    match orientation {
        GuideOrientation::Vertical => [rect.x0, rect.center().x, rect.x1],
        GuideOrientation::Horizontal => [rect.y0, rect.center().y, rect.y1],
    }
}

/// Extent of a box across the guide direction.
fn cross_span(rect: &Rect, orientation: GuideOrientation) -> (f64, f64) {
    match orientation {
        GuideOrientation::Vertical => (rect.y0, rect.y1),
        GuideOrientation::Horizontal => (rect.x0, rect.x1),
    }
}

/// Detect alignment guides between `dragged` and `others`.
///
/// A guide is emitted when two compared values differ by less than
/// `threshold_px` on screen; the guide sits at the other box's value. Results
/// are de-duplicated by orientation and position, first occurrence wins.
pub fn detect_guides(
    dragged: Rect,
    others: &[Rect],
    canvas_center: Point,
    threshold_px: f64,
    zoom: f64,
) -> Vec<Guide> {
    let mut guides: Vec<Guide> = Vec::new();
    let near = |a: f64, b: f64| (a - b).abs() * zoom < threshold_px;

    let mut push = |guide: Guide| {
        let duplicate = guides.iter().any(|g| {
            g.orientation == guide.orientation && (g.position - guide.position).abs() < 1e-6
        });
        if !duplicate {
            guides.push(guide);
        }
    };

    for orientation in [GuideOrientation::Vertical, GuideOrientation::Horizontal] {
        let [d_start, d_center, d_end] = axis_values(&dragged, orientation);
        let (ds, de) = cross_span(&dragged, orientation);

        for other in others {
            let [o_start, o_center, o_end] = axis_values(other, orientation);
            let (os, oe) = cross_span(other, orientation);
            let pairs = [
                (d_start, o_start, GuideRelation::StartStart),
                (d_end, o_end, GuideRelation::EndEnd),
                (d_start, o_end, GuideRelation::StartEnd),
                (d_end, o_start, GuideRelation::EndStart),
                (d_center, o_center, GuideRelation::CenterCenter),
            ];
            for (mine, theirs, relation) in pairs {
                if near(mine, theirs) {
                    push(Guide {
                        orientation,
                        position: theirs,
                        relation,
                        start: ds.min(os),
                        end: de.max(oe),
                    });
                }
            }
        }

        let canvas_value = match orientation {
            GuideOrientation::Vertical => canvas_center.x,
            GuideOrientation::Horizontal => canvas_center.y,
        };
        if near(d_center, canvas_value) {
            push(Guide {
                orientation,
                position: canvas_value,
                relation: GuideRelation::CenterCanvas,
                start: ds,
                end: de,
            });
        }
    }

    guides
}
