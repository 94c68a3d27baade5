//! Uniform-grid spatial hash over node, port and connection geometry.
//!
//! Nodes and ports are stored as one rect each. Connections are stored as the
//! list of segment rects of their rendered path, so a long diagonal route does
//! not claim the empty space inside its bounding box.
//!
//! Every structural change bumps `version`. Inside a batch the bump (and the
//! change notification) is deferred to the outermost `end_batch`.

use crate::geometry::coords::{GraphPoint, GraphRect, GraphSize};
use crate::geometry::rect::{inflate, overlaps};
use crate::model::{Connection, ConnectionId, Node, NodeId, PortRef};
use std::collections::{HashMap, HashSet};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SpatialKey {
    Node(NodeId),
    Port(PortRef),
    Connection(ConnectionId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpatialKind {
    Node,
    Port,
    Connection,
}

impl SpatialKey {
    pub fn kind(&self) -> SpatialKind {
        match self {
            SpatialKey::Node(_) => SpatialKind::Node,
            SpatialKey::Port(_) => SpatialKind::Port,
            SpatialKey::Connection(_) => SpatialKind::Connection,
        }
    }
}

/// Maximum cells a rect can span in one dimension before it is kept in the
/// oversized list instead of being rasterized into the grid.
const MAX_CELL_SPAN: i64 = 256;

#[derive(Clone, Debug)]
struct Entry {
    rects: Vec<GraphRect>,
    cells: Vec<(i32, i32)>,
    oversized: bool,
}

fn cell_ix(cell: f64, x: f64) -> i32 {
    (x / cell).floor().clamp(i32::MIN as f64, i32::MAX as f64) as i32
}

type ChangeListener = Box<dyn FnMut(u64)>;

pub struct SpatialIndex {
    cell: f64,
    grid: HashMap<(i32, i32), HashSet<SpatialKey>>,
    entries: HashMap<SpatialKey, Entry>,
    oversized: HashSet<SpatialKey>,
    version: u64,
    batch_depth: usize,
    batch_dirty: bool,
    listeners: Vec<ChangeListener>,
}

impl SpatialIndex {
    pub fn new(cell: f64) -> Self {
        SpatialIndex {
            cell: if cell.is_finite() && cell > 0.0 { cell } else { 256.0 },
            grid: HashMap::new(),
            entries: HashMap::new(),
            oversized: HashSet::new(),
            version: 0,
            batch_depth: 0,
            batch_dirty: false,
            listeners: Vec::new(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn cell_size(&self) -> f64 {
        self.cell
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &SpatialKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn geometry(&self, key: &SpatialKey) -> Option<&[GraphRect]> {
        self.entries.get(key).map(|e| e.rects.as_slice())
    }

    /// Register a callback invoked with the new version after every change
    /// (once per outermost batch).
    pub fn subscribe(&mut self, f: impl FnMut(u64) + 'static) {
        self.listeners.push(Box::new(f));
    }

    fn changed(&mut self) {
        if self.batch_depth > 0 {
            self.batch_dirty = true;
            return;
        }
        self.version = self.version.wrapping_add(1);
        let v = self.version;
        for l in self.listeners.iter_mut() {
            l(v);
        }
    }

    pub fn begin_batch(&mut self) {
        self.batch_depth += 1;
    }

    pub fn end_batch(&mut self) {
        debug_assert!(self.batch_depth > 0, "end_batch without begin_batch");
        self.batch_depth = self.batch_depth.saturating_sub(1);
        if self.batch_depth == 0 && self.batch_dirty {
            self.batch_dirty = false;
            self.changed();
        }
    }

    /// Run `f` with version bumps coalesced into a single one at the end.
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.begin_batch();
        let r = f(self);
        self.end_batch();
        r
    }

    fn unlink(&mut self, key: &SpatialKey) -> bool {
        let Some(entry) = self.entries.remove(key) else {
            return false;
        };
        if entry.oversized {
            self.oversized.remove(key);
        }
        for c in entry.cells {
            if let Some(set) = self.grid.get_mut(&c) {
                set.remove(key);
                if set.is_empty() {
                    self.grid.remove(&c);
                }
            }
        }
        true
    }

    /// Insert or replace the geometry stored for `key`. Empty geometry (a
    /// hidden connection, for instance) removes the key so it simply drops out
    /// of queries.
    pub fn insert_or_update(&mut self, key: SpatialKey, rects: Vec<GraphRect>) {
        let existed = self.unlink(&key);
        let rects: Vec<GraphRect> = rects
            .into_iter()
            .filter(|r| r.origin.x.is_finite() && r.origin.y.is_finite() && r.size.width.is_finite() && r.size.height.is_finite())
            .collect();
        if rects.is_empty() {
            if existed {
                self.changed();
            }
            return;
        }
        let mut cells: HashSet<(i32, i32)> = HashSet::new();
        let mut oversized = false;
        for r in &rects {
            let ix0 = cell_ix(self.cell, r.min_x());
            let ix1 = cell_ix(self.cell, r.max_x());
            let iy0 = cell_ix(self.cell, r.min_y());
            let iy1 = cell_ix(self.cell, r.max_y());
            if (ix1 as i64 - ix0 as i64) > MAX_CELL_SPAN || (iy1 as i64 - iy0 as i64) > MAX_CELL_SPAN {
                oversized = true;
                continue;
            }
            for ix in ix0..=ix1 {
                for iy in iy0..=iy1 {
                    cells.insert((ix, iy));
                }
            }
        }
        for c in &cells {
            self.grid.entry(*c).or_default().insert(key.clone());
        }
        if oversized {
            self.oversized.insert(key.clone());
        }
        self.entries.insert(key, Entry { rects, cells: cells.into_iter().collect(), oversized });
        self.changed();
    }

    pub fn remove(&mut self, key: &SpatialKey) -> bool {
        let removed = self.unlink(key);
        if removed {
            self.changed();
        }
        removed
    }

    /// Every key with at least one stored rect overlapping `query`, sorted.
    pub fn query_rect(&self, query: &GraphRect) -> Vec<SpatialKey> {
        let mut candidates: HashSet<&SpatialKey> = HashSet::new();
        let ix0 = cell_ix(self.cell, query.min_x());
        let ix1 = cell_ix(self.cell, query.max_x());
        let iy0 = cell_ix(self.cell, query.min_y());
        let iy1 = cell_ix(self.cell, query.max_y());
        let span = (ix1 as i64 - ix0 as i64 + 1).checked_mul(iy1 as i64 - iy0 as i64 + 1);
        if span.map_or(true, |s| s > self.grid.len() as i64) {
            // Query covers more cells than are populated; walk the populated ones.
            for ((cx, cy), set) in &self.grid {
                if *cx >= ix0 && *cx <= ix1 && *cy >= iy0 && *cy <= iy1 {
                    candidates.extend(set.iter());
                }
            }
        } else {
            for ix in ix0..=ix1 {
                for iy in iy0..=iy1 {
                    if let Some(set) = self.grid.get(&(ix, iy)) {
                        candidates.extend(set.iter());
                    }
                }
            }
        }
        candidates.extend(self.oversized.iter());
        let mut out: Vec<SpatialKey> = candidates
            .into_iter()
            .filter(|k| {
                self.entries
                    .get(*k)
                    .map_or(false, |e| e.rects.iter().any(|r| overlaps(r, query)))
            })
            .cloned()
            .collect();
        out.sort_unstable();
        out
    }

    pub fn query_kind(&self, query: &GraphRect, kind: SpatialKind) -> Vec<SpatialKey> {
        let mut v = self.query_rect(query);
        v.retain(|k| k.kind() == kind);
        v
    }

    pub fn query_point(&self, p: GraphPoint, radius: f64) -> Vec<SpatialKey> {
        let r = inflate(&GraphRect::new(p, GraphSize::zero()), radius, radius);
        self.query_rect(&r)
    }

    pub fn clear(&mut self) {
        let had = !self.entries.is_empty();
        self.grid.clear();
        self.entries.clear();
        self.oversized.clear();
        if had {
            self.changed();
        }
    }

    /// Replace a node's own rect and its port squares. A hidden node ends up
    /// with no entries at all.
    pub fn update_node(&mut self, node: &Node, port_radius: f64) {
        self.batch(|idx| {
            idx.remove_node_entries(node);
            for (key, rects) in node_entries(node, port_radius) {
                idx.insert_or_update(key, rects);
            }
        });
    }

    pub fn remove_node_entries(&mut self, node: &Node) {
        self.batch(|idx| {
            idx.remove(&SpatialKey::Node(node.id.clone()));
            for p in &node.ports {
                idx.remove(&SpatialKey::Port(PortRef { node: node.id.clone(), port: p.id.clone() }));
            }
        });
    }

    /// Drop everything and re-insert all nodes, their ports and every
    /// connection. `segments` supplies the path segment rects of a connection
    /// and may return an empty list. Always bumps the version exactly once.
    pub fn rebuild<'a, N, C, F>(&mut self, nodes: N, connections: C, port_radius: f64, mut segments: F)
    where
        N: IntoIterator<Item = &'a Node>,
        C: IntoIterator<Item = &'a Connection>,
        F: FnMut(&Connection) -> Vec<GraphRect>,
    {
        self.begin_batch();
        self.grid.clear();
        self.entries.clear();
        self.oversized.clear();
        for n in nodes {
            for (key, rects) in node_entries(n, port_radius) {
                self.insert_or_update(key, rects);
            }
        }
        for c in connections {
            let segs = segments(c);
            self.insert_or_update(SpatialKey::Connection(c.id.clone()), segs);
        }
        self.batch_dirty = true;
        self.end_batch();
    }
}

/// Keys and rects a node contributes: its bounds plus one square per port.
/// Hidden nodes contribute nothing.
pub fn node_entries(n: &Node, port_radius: f64) -> Vec<(SpatialKey, Vec<GraphRect>)> {
    let mut out = Vec::with_capacity(n.ports.len() + 1);
    if !n.visible {
        return out;
    }
    out.push((SpatialKey::Node(n.id.clone()), vec![n.bounds()]));
    for p in &n.ports {
        if let Some(pt) = n.port_point(p.id.as_str()) {
            let r = inflate(&GraphRect::new(pt, GraphSize::zero()), port_radius, port_radius);
            out.push((SpatialKey::Port(PortRef { node: n.id.clone(), port: p.id.clone() }), vec![r]));
        }
    }
    out
}
