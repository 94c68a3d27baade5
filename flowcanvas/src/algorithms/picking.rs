use crate::geometry::coords::GraphPoint;
use crate::geometry::rect::{contains_point, seg_distance_sq};
use crate::geometry::tolerance::safe_div;
use crate::model::{ConnectionId, NodeId, PortRef};
use crate::spatial::SpatialKey;
use crate::Editor;

#[derive(Clone, Debug, PartialEq)]
pub enum Hit {
    Port { port: PortRef, dist: f64 },
    Node { id: NodeId },
    Connection { id: ConnectionId, dist: f64 },
}

/// Ports first (nearest attachment point), then the topmost node containing
/// the point, then the nearest connection within tolerance.
///
/// Reads the spatial index as is, so nodes moved during a drag are found at
/// their last flushed place.
pub fn pick_impl(ed: &Editor, p: GraphPoint) -> Option<Hit> {
    let base = ed.config.connection_hit_tolerance;
    let tol = safe_div(base, ed.viewport.zoom, base);
    let tol2 = tol * tol;

    let mut best_port: Option<(PortRef, f64)> = None;
    let mut nodes: Vec<NodeId> = Vec::new();
    let mut best_conn: Option<(ConnectionId, f64)> = None;

    for key in ed.spatial.query_point(p, tol) {
        match key {
            SpatialKey::Port(r) => {
                let inside = ed
                    .spatial
                    .geometry(&SpatialKey::Port(r.clone()))
                    .map_or(false, |rects| rects.iter().any(|rc| contains_point(rc, p)));
                if !inside {
                    continue;
                }
                let Some(pt) = ed.port_point(&r) else { continue };
                let d2 = (pt - p).square_length();
                if best_port.as_ref().map_or(true, |(_, bd)| d2 < *bd) {
                    best_port = Some((r, d2));
                }
            }
            SpatialKey::Node(id) => {
                if ed.store.node(id.as_str()).map_or(false, |n| contains_point(&n.bounds(), p)) {
                    nodes.push(id);
                }
            }
            SpatialKey::Connection(id) => {
                let Some(path) = ed.paths.get(&id) else { continue };
                let d2 = path
                    .points
                    .windows(2)
                    .map(|w| seg_distance_sq(p, w[0], w[1]).0)
                    .fold(f64::INFINITY, f64::min);
                if d2 <= tol2 && best_conn.as_ref().map_or(true, |(_, bd)| d2 < *bd) {
                    best_conn = Some((id, d2));
                }
            }
        }
    }

    if let Some((port, d2)) = best_port {
        return Some(Hit::Port { port, dist: d2.sqrt() });
    }
    if let Some(id) = topmost(ed, nodes) {
        return Some(Hit::Node { id });
    }
    best_conn.map(|(id, d2)| Hit::Connection { id, dist: d2.sqrt() })
}

// Highest z wins; equal z goes to the node painted last.
fn topmost(ed: &Editor, mut ids: Vec<NodeId>) -> Option<NodeId> {
    match ids.len() {
        0 => None,
        1 => ids.pop(),
        _ => ed.store.sorted_node_ids().into_iter().rev().find(|id| ids.contains(id)),
    }
}
