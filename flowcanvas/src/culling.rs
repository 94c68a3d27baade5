//! What to hand the renderer each frame.
//!
//! The culler keeps a query window somewhat larger than the visible rect and
//! only rebuilds it when the view leaves it (or has zoomed far enough in that
//! the window is mostly waste). Results are memoised on (window, spatial
//! version), so an idle frame costs a rect comparison.

use crate::config::EditorConfig;
use crate::geometry::coords::{GraphPoint, GraphRect};
use crate::geometry::rect::{contains_rect, inflate};
use crate::model::{ConnectionId, NodeId};
use crate::spatial::{SpatialIndex, SpatialKey, SpatialKind};
use crate::store::GraphStore;
use log::trace;

/// A window may be kept while its area is at most this multiple of the area a
/// freshly built one would have.
const MAX_WINDOW_GROWTH: f64 = 4.0;

#[derive(Clone, Debug, Default)]
pub struct Culler {
    window: Option<GraphRect>,
    last_center: Option<GraphPoint>,
    node_memo: Option<(GraphRect, u64, Vec<NodeId>)>,
    // Connection visibility also depends on node visibility flags, hence
    // the node version in the key.
    conn_memo: Option<(GraphRect, u64, u64, Vec<ConnectionId>)>,
    rebuilds: u64,
}

fn area(r: &GraphRect) -> f64 {
    r.size.width * r.size.height
}

fn center(r: &GraphRect) -> GraphPoint {
    GraphPoint::new(r.origin.x + r.size.width * 0.5, r.origin.y + r.size.height * 0.5)
}

impl Culler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times the query window was rebuilt.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    pub fn current_window(&self) -> Option<GraphRect> {
        self.window
    }

    pub fn invalidate(&mut self) {
        *self = Culler { rebuilds: self.rebuilds, ..Culler::default() };
    }

    /// Query window for `visible`, reusing the previous one when it still
    /// covers the view.
    pub fn window(&mut self, visible: GraphRect, zoom: f64, config: &EditorConfig) -> GraphRect {
        let margin = if zoom > 0.0 { config.cull_margin / zoom } else { config.cull_margin };
        let base = inflate(&visible, margin, margin);
        if let Some(w) = self.window {
            if contains_rect(&w, &visible) && area(&w) <= area(&base) * MAX_WINDOW_GROWTH {
                return w;
            }
        }
        let hx = visible.size.width * config.cull_hysteresis;
        let hy = visible.size.height * config.cull_hysteresis;
        let mut w = inflate(&base, hx, hy);

        // Extend ahead of the direction the view has been travelling.
        let c = center(&visible);
        if let Some(prev) = self.last_center {
            let bx = visible.size.width * config.prefetch_bias;
            let by = visible.size.height * config.prefetch_bias;
            let dx = c.x - prev.x;
            let dy = c.y - prev.y;
            if dx > 0.0 {
                w.size.width += bx;
            } else if dx < 0.0 {
                w.origin.x -= bx;
                w.size.width += bx;
            }
            if dy > 0.0 {
                w.size.height += by;
            } else if dy < 0.0 {
                w.origin.y -= by;
                w.size.height += by;
            }
        }
        self.last_center = Some(c);
        self.window = Some(w);
        self.rebuilds += 1;
        trace!("culling window rebuilt: {:?}", w);
        w
    }

    pub fn visible_nodes(
        &mut self,
        spatial: &SpatialIndex,
        visible: GraphRect,
        zoom: f64,
        config: &EditorConfig,
    ) -> Vec<NodeId> {
        let w = self.window(visible, zoom, config);
        let ver = spatial.version();
        if let Some((mw, mv, ids)) = &self.node_memo {
            if *mw == w && *mv == ver {
                return ids.clone();
            }
        }
        let ids: Vec<NodeId> = spatial
            .query_kind(&w, SpatialKind::Node)
            .into_iter()
            .filter_map(|k| match k {
                SpatialKey::Node(id) => Some(id),
                _ => None,
            })
            .collect();
        self.node_memo = Some((w, ver, ids.clone()));
        ids
    }

    /// Connections in the window whose endpoint nodes both exist and are
    /// visible. Dangling references are skipped, never reported.
    pub fn visible_connections(
        &mut self,
        spatial: &SpatialIndex,
        store: &GraphStore,
        visible: GraphRect,
        zoom: f64,
        config: &EditorConfig,
    ) -> Vec<ConnectionId> {
        let w = self.window(visible, zoom, config);
        let ver = spatial.version();
        let nver = store.node_version();
        if let Some((mw, mv, mn, ids)) = &self.conn_memo {
            if *mw == w && *mv == ver && *mn == nver {
                return ids.clone();
            }
        }
        let shown = |id: &NodeId| store.node(id.as_str()).map_or(false, |n| n.visible);
        let ids: Vec<ConnectionId> = spatial
            .query_kind(&w, SpatialKind::Connection)
            .into_iter()
            .filter_map(|k| match k {
                SpatialKey::Connection(id) => Some(id),
                _ => None,
            })
            .filter(|id| {
                store
                    .connection(id.as_str())
                    .map_or(false, |c| shown(&c.source_node) && shown(&c.target_node))
            })
            .collect();
        self.conn_memo = Some((w, ver, nver, ids.clone()));
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::coords::GraphSize;

    fn view(x: f64, y: f64) -> GraphRect {
        GraphRect::new(GraphPoint::new(x, y), GraphSize::new(800.0, 600.0))
    }

    #[test]
    fn small_pans_reuse_the_window() {
        let cfg = EditorConfig::default();
        let mut c = Culler::new();
        let w0 = c.window(view(0.0, 0.0), 1.0, &cfg);
        let w1 = c.window(view(30.0, -20.0), 1.0, &cfg);
        assert_eq!(w0, w1);
        assert_eq!(c.rebuilds(), 1);
    }

    #[test]
    fn leaving_the_window_rebuilds_ahead_of_motion() {
        let cfg = EditorConfig::default();
        let mut c = Culler::new();
        c.window(view(0.0, 0.0), 1.0, &cfg);
        let w = c.window(view(5000.0, 0.0), 1.0, &cfg);
        assert_eq!(c.rebuilds(), 2);
        let right_slack = w.max_x() - (5000.0 + 800.0);
        let left_slack = 5000.0 - w.min_x();
        assert!(right_slack > left_slack, "window should lean right: {:?}", w);
    }

    #[test]
    fn zooming_in_far_rebuilds() {
        let cfg = EditorConfig::default();
        let mut c = Culler::new();
        c.window(view(0.0, 0.0), 1.0, &cfg);
        let small = GraphRect::new(GraphPoint::new(100.0, 100.0), GraphSize::new(80.0, 60.0));
        c.window(small, 10.0, &cfg);
        assert_eq!(c.rebuilds(), 2);
    }
}
