//! Node dragging.
//!
//! A drag moves each node's intended `position` by the raw pointer delta and
//! derives `visual_position` from it through the snap delegate and then the
//! grid. Because the intended position keeps accumulating unsnapped, a small
//! further move can always escape a previous snap.

use crate::error::{GraphError, Result};
use crate::events::{DragKind, GraphEvent};
use crate::geometry::coords::{GraphPoint, GraphVector, ScreenVector};
use crate::geometry::rect::contains_rect;
use crate::interaction::{Interaction, NodeDrag};
use crate::model::NodeId;
use crate::store::GraphStore;
use crate::Editor;
use log::debug;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SnapResult {
    pub position: GraphPoint,
    pub snapped_x: bool,
    pub snapped_y: bool,
}

impl SnapResult {
    pub fn none(position: GraphPoint) -> Self {
        SnapResult { position, snapped_x: false, snapped_y: false }
    }
}

/// Alignment hook consulted on every drag move. Axes it reports as snapped
/// are left alone by grid quantisation.
pub trait SnapDelegate {
    fn snap(&mut self, store: &GraphStore, dragged: &[NodeId], primary: &NodeId, intended: GraphPoint) -> SnapResult;
}

impl<F> SnapDelegate for F
where
    F: FnMut(&GraphStore, &[NodeId], &NodeId, GraphPoint) -> SnapResult,
{
    fn snap(&mut self, store: &GraphStore, dragged: &[NodeId], primary: &NodeId, intended: GraphPoint) -> SnapResult {
        self(store, dragged, primary, intended)
    }
}

/// Snaps the primary node's left/top edge to the left/top edge of any
/// non-dragged visible node within `threshold`.
#[derive(Clone, Debug)]
pub struct EdgeAlignSnap {
    pub threshold: f64,
}

impl SnapDelegate for EdgeAlignSnap {
    fn snap(&mut self, store: &GraphStore, dragged: &[NodeId], _primary: &NodeId, intended: GraphPoint) -> SnapResult {
        let moving: BTreeSet<&NodeId> = dragged.iter().collect();
        let mut best_x: Option<(f64, f64)> = None;
        let mut best_y: Option<(f64, f64)> = None;
        for n in store.nodes().filter(|n| n.visible && !moving.contains(&n.id)) {
            let dx = (n.visual_position.x - intended.x).abs();
            if dx <= self.threshold && best_x.map_or(true, |(d, _)| dx < d) {
                best_x = Some((dx, n.visual_position.x));
            }
            let dy = (n.visual_position.y - intended.y).abs();
            if dy <= self.threshold && best_y.map_or(true, |(d, _)| dy < d) {
                best_y = Some((dy, n.visual_position.y));
            }
        }
        SnapResult {
            position: GraphPoint::new(best_x.map_or(intended.x, |b| b.1), best_y.map_or(intended.y, |b| b.1)),
            snapped_x: best_x.is_some(),
            snapped_y: best_y.is_some(),
        }
    }
}

pub fn snap_to_grid(v: f64, grid: f64) -> f64 {
    if grid > 0.0 {
        (v / grid).round() * grid
    } else {
        v
    }
}

impl Editor {
    /// Visual position for `intended` on node `id`: snap delegate first, then
    /// grid on the axes the delegate did not claim.
    pub(crate) fn snapped_visual(&mut self, id: &str, intended: GraphPoint) -> GraphPoint {
        let primary = NodeId::from(id);
        let dragged = [primary.clone()];
        self.snap_with(&dragged, &primary, intended)
    }

    fn snap_with(&mut self, dragged: &[NodeId], primary: &NodeId, intended: GraphPoint) -> GraphPoint {
        let res = match self.snap.as_mut() {
            Some(s) => s.snap(&self.store, dragged, primary, intended),
            None => SnapResult::none(intended),
        };
        let grid = if self.config.snap_to_grid { self.config.grid_size } else { 0.0 };
        GraphPoint::new(
            if res.snapped_x { res.position.x } else { snap_to_grid(res.position.x, grid) },
            if res.snapped_y { res.position.y } else { snap_to_grid(res.position.y, grid) },
        )
    }

    /// Nodes moving with `id`: the selection when `id` is part of it, plus
    /// the members of every moving group, transitively.
    fn drag_set(&self, id: &NodeId) -> Vec<NodeId> {
        let mut set: BTreeSet<NodeId> = BTreeSet::new();
        set.insert(id.clone());
        if self.store.is_node_selected(id.as_str()) {
            set.extend(self.store.selected_nodes().iter().cloned());
        }
        let mut stack: Vec<NodeId> = set.iter().cloned().collect();
        while let Some(n) = stack.pop() {
            for m in self.store.group_members(n.as_str()) {
                if set.insert(m.clone()) {
                    stack.push(m);
                }
            }
        }
        // Primary first so snapping always looks at it.
        let mut out = vec![id.clone()];
        out.extend(set.into_iter().filter(|n| n != id));
        out
    }

    pub fn start_node_drag(&mut self, id: &str) -> Result<()> {
        if !self.store.contains_node(id) {
            return Err(GraphError::NodeNotFound(id.into()));
        }
        self.cancel_interaction();
        let primary = NodeId::from(id);
        if !self.store.is_node_selected(id) {
            let changed = self.store.select_nodes(&[primary.clone()], false);
            if changed {
                self.emit(GraphEvent::SelectionChanged);
            }
        }
        self.store.bring_to_front(id)?;
        let nodes = self.drag_set(&primary);
        let mut origins = BTreeMap::new();
        for n in &nodes {
            if let Some(node) = self.store.node_mut(n.as_str()) {
                node.dragging = true;
                origins.insert(n.clone(), (node.position, node.visual_position));
            }
        }
        debug!("node drag started on {} ({} nodes)", id, nodes.len());
        self.interaction = Interaction::NodeDragging(NodeDrag {
            primary,
            nodes: nodes.clone(),
            origins,
            total_delta: GraphVector::zero(),
        });
        self.emit(GraphEvent::DragStarted { kind: DragKind::Node, ids: nodes });
        Ok(())
    }

    /// Move every dragged node by a graph-space delta.
    pub fn move_node_drag(&mut self, delta: GraphVector) -> Result<()> {
        if !delta.x.is_finite() || !delta.y.is_finite() {
            return Err(GraphError::NonFinite("drag delta"));
        }
        let Interaction::NodeDragging(drag) = &mut self.interaction else {
            return Err(GraphError::NoActiveInteraction { expected: "node drag" });
        };
        drag.total_delta += delta;
        let nodes = drag.nodes.clone();
        let primary = drag.primary.clone();

        for id in &nodes {
            if let Some(n) = self.store.node_mut(id.as_str()) {
                n.position += delta;
            }
        }
        // The whole group follows the primary's snap offset so relative
        // layout is preserved.
        let shift = match self.store.node(primary.as_str()).map(|n| n.position) {
            Some(intended) => self.snap_with(&nodes, &primary, intended) - intended,
            None => GraphVector::zero(),
        };
        for id in &nodes {
            if let Some(n) = self.store.node_mut(id.as_str()) {
                n.visual_position = n.position + shift;
            }
        }
        self.mark_nodes_dirty(&nodes);
        Ok(())
    }

    /// Screen-space variant: the delta is converted with the current zoom.
    pub fn move_node_drag_screen(&mut self, delta: ScreenVector) -> Result<()> {
        let d = self.viewport.offset_to_graph(delta);
        self.move_node_drag(d)
    }

    /// Finish the drag: commit visual positions, flush deferred index work
    /// and lift nested groups above their containers. Returns the moved ids.
    pub fn end_node_drag(&mut self) -> Result<Vec<NodeId>> {
        let Some(drag) = self.interaction.take_node_drag() else {
            return Err(GraphError::NoActiveInteraction { expected: "node drag" });
        };
        self.batch("node_drag_end", |ed| {
            for id in &drag.nodes {
                if let Some(n) = ed.store.node_mut(id.as_str()) {
                    n.dragging = false;
                    n.position = n.visual_position;
                }
            }
            ed.flush_pending();
            ed.raise_nested_groups(&drag.nodes);
        });
        debug!("node drag ended on {} after {:?}", drag.primary, drag.total_delta);
        self.emit(GraphEvent::DragEnded { kind: DragKind::Node, ids: drag.nodes.clone(), cancelled: false });
        Ok(drag.nodes)
    }

    /// Abort the drag. Positions come from `original` when given (e.g. undo
    /// history), otherwise from the positions captured at start.
    pub fn cancel_node_drag(&mut self, original: Option<&HashMap<NodeId, GraphPoint>>) -> Result<()> {
        let Some(drag) = self.interaction.take_node_drag() else {
            return Err(GraphError::NoActiveInteraction { expected: "node drag" });
        };
        self.batch("node_drag_cancel", |ed| {
            for id in &drag.nodes {
                let restored = match original.and_then(|m| m.get(id)) {
                    Some(p) => Some(*p),
                    None => drag.origins.get(id).map(|o| o.0),
                };
                let Some(pos) = restored else { continue };
                let visual = match (original.is_none(), drag.origins.get(id)) {
                    (true, Some(o)) => o.1,
                    _ => ed.snapped_visual(id.as_str(), pos),
                };
                if let Some(n) = ed.store.node_mut(id.as_str()) {
                    n.dragging = false;
                    n.position = pos;
                    n.visual_position = visual;
                }
                ed.mark_dirty(id.as_str());
            }
            ed.flush_pending();
        });
        debug!("node drag on {} cancelled", drag.primary);
        self.emit(GraphEvent::DragEnded { kind: DragKind::Node, ids: drag.nodes, cancelled: true });
        Ok(())
    }

    /// After a drag, any group node wholly inside a dragged group node is
    /// raised one level above it.
    fn raise_nested_groups(&mut self, dragged: &[NodeId]) {
        let groups: Vec<(NodeId, crate::geometry::coords::GraphRect, i32)> = self
            .store
            .nodes()
            .filter(|n| n.is_group && n.visible)
            .map(|n| (n.id.clone(), n.bounds(), n.z_index))
            .collect();
        for outer in groups.iter().filter(|g| dragged.contains(&g.0)) {
            for inner in groups.iter().filter(|g| g.0 != outer.0) {
                let outer_z = self.store.node(outer.0.as_str()).map_or(outer.2, |n| n.z_index);
                let inner_z = self.store.node(inner.0.as_str()).map_or(inner.2, |n| n.z_index);
                if contains_rect(&outer.1, &inner.1) && inner_z <= outer_z {
                    if let Some(n) = self.store.node_mut(inner.0.as_str()) {
                        n.z_index = outer_z.saturating_add(1);
                    }
                }
            }
        }
    }
}
