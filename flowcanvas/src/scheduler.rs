//! Immediate vs. deferred spatial-index maintenance.
//!
//! While a node drag or resize is in progress, geometry changes only record
//! ids here. The interaction's end flushes everything through one spatial
//! batch, so the index version moves once per gesture instead of once per
//! pointer event.

use crate::events::GraphEvent;
use crate::model::{ConnectionId, NodeId};
use crate::spatial::SpatialKey;
use crate::Editor;
use log::{debug, trace, warn};
use std::collections::{BTreeSet, HashMap};

#[derive(Clone, Debug, Default)]
pub struct DirtyTracker {
    nodes: BTreeSet<NodeId>,
    connections: BTreeSet<ConnectionId>,
    live: bool,
    flushes: u64,
}

impl DirtyTracker {
    pub fn new(live: bool) -> Self {
        DirtyTracker { live, ..Default::default() }
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn set_live(&mut self, live: bool) {
        self.live = live;
    }

    /// Whether a change made now should wait for the next flush.
    pub fn should_defer(&self, drag_active: bool) -> bool {
        drag_active && !self.live
    }

    pub fn defer_node(&mut self, id: NodeId, incident: impl IntoIterator<Item = ConnectionId>) {
        self.nodes.insert(id);
        self.connections.extend(incident);
    }

    pub fn defer_connection(&mut self, id: ConnectionId) {
        self.connections.insert(id);
    }

    pub fn has_pending(&self) -> bool {
        !self.nodes.is_empty() || !self.connections.is_empty()
    }

    pub fn pending_nodes(&self) -> &BTreeSet<NodeId> {
        &self.nodes
    }

    pub fn pending_connections(&self) -> &BTreeSet<ConnectionId> {
        &self.connections
    }

    pub fn is_node_pending(&self, id: &str) -> bool {
        self.nodes.contains(id)
    }

    /// Number of flushes that actually had work to do.
    pub fn flush_count(&self) -> u64 {
        self.flushes
    }

    pub fn take(&mut self) -> (Vec<NodeId>, Vec<ConnectionId>) {
        self.flushes += 1;
        (
            std::mem::take(&mut self.nodes).into_iter().collect(),
            std::mem::take(&mut self.connections).into_iter().collect(),
        )
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.connections.clear();
    }
}

impl Editor {
    /// Run `f` inside one spatial batch and emit `SpatialIndexChanged` once
    /// if the index version moved.
    pub(crate) fn index_batch<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let before = self.spatial.version();
        self.spatial.begin_batch();
        let r = f(self);
        self.spatial.end_batch();
        let after = self.spatial.version();
        // Nested calls see no change: the index bumps only at the outermost end.
        if after != before {
            self.emit(GraphEvent::SpatialIndexChanged { version: after });
        }
        r
    }

    pub(crate) fn index_node_now(&mut self, id: &str) {
        let radius = self.config.port_hit_radius;
        match self.store.node(id) {
            Some(node) => self.spatial.update_node(node, radius),
            None => {
                self.spatial.remove(&SpatialKey::Node(id.into()));
            }
        }
    }

    pub(crate) fn index_connection_now(&mut self, id: &str) {
        let geometry = match self.store.connection(id) {
            Some(conn) => match (self.store.node(conn.source_node.as_str()), self.store.node(conn.target_node.as_str())) {
                (Some(s), Some(t)) => self.painter.path(conn, s, t),
                _ => {
                    warn!("connection {} has a dangling endpoint; dropping it from the index", id);
                    None
                }
            },
            None => None,
        };
        let key = SpatialKey::Connection(id.into());
        match geometry {
            Some(g) => {
                self.spatial.insert_or_update(key, g.segments.clone());
                self.paths.insert(id.into(), g);
            }
            None => {
                self.spatial.remove(&key);
                self.paths.remove(id);
            }
        }
    }

    /// Record a geometry change to `id`. Indexes it (and its connections)
    /// right away unless a drag is active, in which case the work is queued
    /// for the next flush.
    pub fn mark_dirty(&mut self, id: &str) {
        let incident = self.store.connection_ids_for_node(id);
        if self.dirty.should_defer(self.interaction.defers_index()) {
            trace!("deferring index update for {} (+{} connections)", id, incident.len());
            self.dirty.defer_node(id.into(), incident);
            return;
        }
        self.index_batch(|ed| {
            ed.index_node_now(id);
            for c in &incident {
                ed.index_connection_now(c.as_str());
            }
        });
    }

    pub fn mark_nodes_dirty(&mut self, ids: &[NodeId]) {
        if self.dirty.should_defer(self.interaction.defers_index()) {
            for id in ids {
                let incident = self.store.connection_ids_for_node(id.as_str());
                self.dirty.defer_node(id.clone(), incident);
            }
            trace!("deferring index update for {} nodes", ids.len());
            return;
        }
        self.index_batch(|ed| {
            let mut conns = BTreeSet::new();
            for id in ids {
                ed.index_node_now(id.as_str());
                conns.extend(ed.store.connection_ids_for_node(id.as_str()));
            }
            for c in &conns {
                ed.index_connection_now(c.as_str());
            }
        });
    }

    pub fn mark_connection_dirty(&mut self, id: &str) {
        if self.dirty.should_defer(self.interaction.defers_index()) {
            self.dirty.defer_connection(id.into());
            return;
        }
        self.index_batch(|ed| ed.index_connection_now(id));
    }

    /// Apply every queued update now: nodes first, then the segment geometry
    /// of every queued connection, all inside one spatial batch. Returns
    /// whether anything was pending.
    pub fn flush_pending(&mut self) -> bool {
        if !self.dirty.has_pending() {
            return false;
        }
        let (nodes, conns) = self.dirty.take();
        debug!("flushing {} nodes and {} connections", nodes.len(), conns.len());
        self.index_batch(|ed| {
            for id in &nodes {
                ed.index_node_now(id.as_str());
            }
            for id in &conns {
                ed.index_connection_now(id.as_str());
            }
        });
        true
    }

    pub fn pending_updates(&self) -> &DirtyTracker {
        &self.dirty
    }

    pub fn set_live_index_updates(&mut self, live: bool) {
        self.dirty.set_live(live);
        if live {
            self.flush_pending();
        }
    }

    /// Discard the index and rebuild it from the store in one step, e.g.
    /// after the painter changed.
    pub fn reindex_all(&mut self) {
        self.index_batch(|ed| ed.rebuild_index());
        debug!("spatial index rebuilt at version {}", self.spatial.version());
    }

    fn rebuild_index(&mut self) {
        self.dirty.clear();
        self.culler.invalidate();
        let radius = self.config.port_hit_radius;
        let painter = &self.painter;
        let store = &self.store;
        let mut paths = HashMap::new();
        self.spatial.rebuild(store.nodes(), store.connections(), radius, |c| {
            let g = match (store.node(c.source_node.as_str()), store.node(c.target_node.as_str())) {
                (Some(s), Some(t)) => painter.path(c, s, t),
                _ => None,
            };
            match g {
                Some(g) => {
                    let segs = g.segments.clone();
                    paths.insert(c.id.clone(), g);
                    segs
                }
                None => Vec::new(),
            }
        });
        self.paths = paths;
    }
}
