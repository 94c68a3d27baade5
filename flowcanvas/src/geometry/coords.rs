//! Graph-space / screen-space coordinate types and the viewport transform.
//!
//! Graph space is the infinite plane nodes live in; screen space is the pixel
//! surface of the host canvas. The two are distinct `euclid` units so a point
//! from one space cannot be handed to code expecting the other.
//!
//! Points map with `screen = graph * zoom + pan`. Offsets (deltas) map with
//! the zoom only, since they describe relative movement.

use super::tolerance::{clamp, safe_div, EPS_ZOOM};
use euclid::{Point2D, Rect, Size2D, Vector2D};
use serde::{Deserialize, Serialize};

/// Unit tag for the logical graph plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphSpace {}

/// Unit tag for canvas pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScreenSpace {}

pub type GraphPoint = Point2D<f64, GraphSpace>;
pub type GraphVector = Vector2D<f64, GraphSpace>;
pub type GraphSize = Size2D<f64, GraphSpace>;
pub type GraphRect = Rect<f64, GraphSpace>;

pub type ScreenPoint = Point2D<f64, ScreenSpace>;
pub type ScreenVector = Vector2D<f64, ScreenSpace>;
pub type ScreenSize = Size2D<f64, ScreenSpace>;
pub type ScreenRect = Rect<f64, ScreenSpace>;

/// Pan/zoom triple. `x`/`y` are the screen-space position of the graph origin.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport { x: 0.0, y: 0.0, zoom: 1.0 }
    }
}

impl Viewport {
    pub fn new(x: f64, y: f64, zoom: f64) -> Self {
        Viewport { x, y, zoom }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.zoom.is_finite() && self.zoom > EPS_ZOOM
    }

    pub fn pan(&self) -> ScreenVector {
        ScreenVector::new(self.x, self.y)
    }

    #[inline]
    pub fn to_screen(&self, p: GraphPoint) -> ScreenPoint {
        ScreenPoint::new(p.x * self.zoom + self.x, p.y * self.zoom + self.y)
    }

    #[inline]
    pub fn to_graph(&self, p: ScreenPoint) -> GraphPoint {
        GraphPoint::new(
            safe_div(p.x - self.x, self.zoom, 0.0),
            safe_div(p.y - self.y, self.zoom, 0.0),
        )
    }

    #[inline]
    pub fn offset_to_screen(&self, v: GraphVector) -> ScreenVector {
        ScreenVector::new(v.x * self.zoom, v.y * self.zoom)
    }

    #[inline]
    pub fn offset_to_graph(&self, v: ScreenVector) -> GraphVector {
        GraphVector::new(safe_div(v.x, self.zoom, 0.0), safe_div(v.y, self.zoom, 0.0))
    }

    pub fn rect_to_screen(&self, r: &GraphRect) -> ScreenRect {
        let a = self.to_screen(GraphPoint::new(r.min_x(), r.min_y()));
        let b = self.to_screen(GraphPoint::new(r.max_x(), r.max_y()));
        super::rect::from_corners(a, b)
    }

    pub fn rect_to_graph(&self, r: &ScreenRect) -> GraphRect {
        let a = self.to_graph(ScreenPoint::new(r.min_x(), r.min_y()));
        let b = self.to_graph(ScreenPoint::new(r.max_x(), r.max_y()));
        super::rect::from_corners(a, b)
    }

    /// Graph-space rect currently covered by a canvas of `screen` pixels.
    pub fn visible_rect(&self, screen: ScreenSize) -> GraphRect {
        self.rect_to_graph(&ScreenRect::new(ScreenPoint::origin(), screen))
    }

    pub fn clamped(mut self, min_zoom: f64, max_zoom: f64) -> Self {
        self.zoom = clamp(self.zoom, min_zoom, max_zoom);
        self
    }

    pub fn panned(mut self, delta: ScreenVector) -> Self {
        self.x += delta.x;
        self.y += delta.y;
        self
    }

    /// Scale the zoom by `factor` while keeping the graph point under
    /// `anchor` fixed on screen.
    pub fn zoomed_at(self, factor: f64, anchor: ScreenPoint, min_zoom: f64, max_zoom: f64) -> Self {
        let pinned = self.to_graph(anchor);
        let zoom = clamp(self.zoom * factor, min_zoom, max_zoom);
        Viewport {
            x: anchor.x - pinned.x * zoom,
            y: anchor.y - pinned.y * zoom,
            zoom,
        }
    }

    /// Viewport that centers `bounds` inside `screen`, leaving `padding`
    /// pixels on each side.
    pub fn fitted(bounds: &GraphRect, screen: ScreenSize, padding: f64, min_zoom: f64, max_zoom: f64) -> Self {
        let avail_w = (screen.width - 2.0 * padding).max(1.0);
        let avail_h = (screen.height - 2.0 * padding).max(1.0);
        let zx = safe_div(avail_w, bounds.size.width, max_zoom);
        let zy = safe_div(avail_h, bounds.size.height, max_zoom);
        let zoom = clamp(zx.min(zy), min_zoom, max_zoom);
        let cx = bounds.origin.x + bounds.size.width * 0.5;
        let cy = bounds.origin.y + bounds.size.height * 0.5;
        Viewport {
            x: screen.width * 0.5 - cx * zoom,
            y: screen.height * 0.5 - cy * zoom,
            zoom,
        }
    }
}
