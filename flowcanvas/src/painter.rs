//! Connection path geometry as seen by the index and hit-testing.
//!
//! Actual curve rendering lives in the host. The core only needs a bounding
//! rect and the axis-aligned segment rects of whatever the host will draw.

use crate::geometry::coords::{GraphPoint, GraphRect};
use crate::geometry::rect::{segment_rect, union_all};
use crate::model::{Connection, Node};

#[derive(Clone, Debug, PartialEq)]
pub struct PathGeometry {
    pub bounds: GraphRect,
    /// Polyline vertices from source port to target port.
    pub points: Vec<GraphPoint>,
    /// One rect per polyline leg, padded by the stroke half width.
    pub segments: Vec<GraphRect>,
}

impl PathGeometry {
    pub fn from_points(points: Vec<GraphPoint>, pad: f64) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }
        let segments: Vec<GraphRect> = points.windows(2).map(|w| segment_rect(w[0], w[1], pad)).collect();
        let bounds = union_all(segments.iter())?;
        Some(PathGeometry { bounds, points, segments })
    }
}

pub trait PathPainter {
    /// Geometry for `conn` between its two endpoint nodes. `None` (a hidden
    /// connection, an unknown port) drops the connection from spatial queries.
    fn path(&self, conn: &Connection, source: &Node, target: &Node) -> Option<PathGeometry>;
}

impl<F> PathPainter for F
where
    F: Fn(&Connection, &Node, &Node) -> Option<PathGeometry>,
{
    fn path(&self, conn: &Connection, source: &Node, target: &Node) -> Option<PathGeometry> {
        self(conn, source, target)
    }
}

/// Step route: horizontal out of the source, vertical at the midpoint,
/// horizontal into the target. Control points, when present, replace the
/// midpoint leg with straight runs through each point.
#[derive(Clone, Debug)]
pub struct OrthogonalPainter {
    pub stroke_pad: f64,
}

impl Default for OrthogonalPainter {
    fn default() -> Self {
        OrthogonalPainter { stroke_pad: 2.0 }
    }
}

impl PathPainter for OrthogonalPainter {
    fn path(&self, conn: &Connection, source: &Node, target: &Node) -> Option<PathGeometry> {
        if !source.visible || !target.visible {
            return None;
        }
        let a = source.port_point(conn.source_port.as_str())?;
        let b = target.port_point(conn.target_port.as_str())?;
        let mut pts = Vec::with_capacity(4 + conn.control_points.len());
        pts.push(a);
        if conn.control_points.is_empty() {
            let mid = (a.x + b.x) * 0.5;
            pts.push(GraphPoint::new(mid, a.y));
            pts.push(GraphPoint::new(mid, b.y));
        } else {
            pts.extend(conn.control_points.iter().copied());
        }
        pts.push(b);
        pts.dedup();
        if pts.len() == 1 {
            pts.push(b);
        }
        PathGeometry::from_points(pts, self.stroke_pad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Port;

    fn pair() -> (Node, Node) {
        let a = Node::new("a", 0.0, 0.0, 100.0, 40.0).with_port(Port::output("out"));
        let b = Node::new("b", 300.0, 200.0, 100.0, 40.0).with_port(Port::input("in"));
        (a, b)
    }

    #[test]
    fn step_route_has_three_legs() {
        let (a, b) = pair();
        let c = Connection::new("c", ("a", "out"), ("b", "in"));
        let g = OrthogonalPainter::default().path(&c, &a, &b).unwrap();
        assert_eq!(g.points.len(), 4);
        assert_eq!(g.segments.len(), 3);
        assert_eq!(g.points[0], GraphPoint::new(100.0, 20.0));
        assert_eq!(g.points[3], GraphPoint::new(300.0, 220.0));
        assert_eq!(g.bounds.min_x(), 98.0);
        assert_eq!(g.bounds.max_y(), 222.0);
    }

    #[test]
    fn hidden_or_unknown_port_yields_nothing() {
        let (a, mut b) = pair();
        let bad = Connection::new("c", ("a", "nope"), ("b", "in"));
        assert!(OrthogonalPainter::default().path(&bad, &a, &b).is_none());
        b.visible = false;
        let c = Connection::new("c", ("a", "out"), ("b", "in"));
        assert!(OrthogonalPainter::default().path(&c, &a, &b).is_none());
    }

    #[test]
    fn control_points_replace_midpoint() {
        let (a, b) = pair();
        let mut c = Connection::new("c", ("a", "out"), ("b", "in"));
        c.control_points.push(GraphPoint::new(150.0, 500.0));
        let g = OrthogonalPainter::default().path(&c, &a, &b).unwrap();
        assert_eq!(g.points, vec![GraphPoint::new(100.0, 20.0), GraphPoint::new(150.0, 500.0), GraphPoint::new(300.0, 220.0)]);
    }
}
