use super::coords::{GraphPoint, GraphRect, GraphSize};
use euclid::{Point2D, Rect, Size2D};

// euclid's own `intersects`/`union` treat zero-area rects as empty. Connection
// segments are frequently zero-height or zero-width, so everything here is
// inclusive on the boundary.

#[inline]
pub fn overlaps<U>(a: &Rect<f64, U>, b: &Rect<f64, U>) -> bool {
    a.min_x() <= b.max_x() && b.min_x() <= a.max_x() && a.min_y() <= b.max_y() && b.min_y() <= a.max_y()
}

#[inline]
pub fn contains_point<U>(r: &Rect<f64, U>, p: Point2D<f64, U>) -> bool {
    p.x >= r.min_x() && p.x <= r.max_x() && p.y >= r.min_y() && p.y <= r.max_y()
}

#[inline]
pub fn contains_rect<U>(outer: &Rect<f64, U>, inner: &Rect<f64, U>) -> bool {
    inner.min_x() >= outer.min_x()
        && inner.max_x() <= outer.max_x()
        && inner.min_y() >= outer.min_y()
        && inner.max_y() <= outer.max_y()
}

/// Grow a rect by `dx`/`dy` on every side.
#[inline]
pub fn inflate<U>(r: &Rect<f64, U>, dx: f64, dy: f64) -> Rect<f64, U> {
    Rect::new(
        Point2D::new(r.origin.x - dx, r.origin.y - dy),
        Size2D::new((r.size.width + 2.0 * dx).max(0.0), (r.size.height + 2.0 * dy).max(0.0)),
    )
}

/// Normalized rect spanning two arbitrary corners.
pub fn from_corners<U>(a: Point2D<f64, U>, b: Point2D<f64, U>) -> Rect<f64, U> {
    let minx = a.x.min(b.x);
    let miny = a.y.min(b.y);
    let maxx = a.x.max(b.x);
    let maxy = a.y.max(b.y);
    Rect::new(Point2D::new(minx, miny), Size2D::new(maxx - minx, maxy - miny))
}

pub fn union_all<'a, I>(rects: I) -> Option<GraphRect>
where
    I: IntoIterator<Item = &'a GraphRect>,
{
    let mut acc: Option<(f64, f64, f64, f64)> = None;
    for r in rects {
        acc = Some(match acc {
            None => (r.min_x(), r.min_y(), r.max_x(), r.max_y()),
            Some((x0, y0, x1, y1)) => (
                x0.min(r.min_x()),
                y0.min(r.min_y()),
                x1.max(r.max_x()),
                y1.max(r.max_y()),
            ),
        });
    }
    acc.map(|(x0, y0, x1, y1)| GraphRect::new(GraphPoint::new(x0, y0), GraphSize::new(x1 - x0, y1 - y0)))
}

/// Axis-aligned rect around the segment `a`-`b`, padded by `pad` on every side.
pub fn segment_rect(a: GraphPoint, b: GraphPoint, pad: f64) -> GraphRect {
    inflate(&from_corners(a, b), pad, pad)
}

/// Squared distance from a point to the closest point of a rect (0 inside).
pub fn rect_distance_sq<U>(r: &Rect<f64, U>, p: Point2D<f64, U>) -> f64 {
    let dx = (r.min_x() - p.x).max(0.0).max(p.x - r.max_x());
    let dy = (r.min_y() - p.y).max(0.0).max(p.y - r.max_y());
    dx * dx + dy * dy
}

pub fn seg_distance_sq(p: GraphPoint, a: GraphPoint, b: GraphPoint) -> (f64, f64) {
    let vx = b.x - a.x; let vy = b.y - a.y;
    let wx = p.x - a.x; let wy = p.y - a.y;
    let vv = vx*vx + vy*vy;
    let mut t = if vv > 0.0 { (wx*vx + wy*vy) / vv } else { 0.0 };
    if t < 0.0 { t = 0.0; } else if t > 1.0 { t = 1.0; }
    let projx = a.x + t * vx; let projy = a.y + t * vy;
    let dx = p.x - projx; let dy = p.y - projy;
    (dx*dx + dy*dy, t)
}
