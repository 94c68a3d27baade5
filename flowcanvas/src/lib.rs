pub mod config;
pub mod error;
pub mod events;
pub mod extensions;
pub mod model;
pub mod geometry {
    pub mod coords;
    pub mod limits;
    pub mod rect;
    pub mod tolerance;
}
pub mod algorithms {
    pub mod cycles;
    pub mod picking;
}
pub mod connection;
pub mod culling;
pub mod drag;
pub mod interaction;
pub mod json;
pub mod marquee;
pub mod painter;
pub mod resize;
pub mod scheduler;
pub mod spatial;
pub mod store;
pub mod veto;

use algorithms::picking::Hit;
use config::EditorConfig;
use connection::ConnectionValidator;
use culling::Culler;
use drag::SnapDelegate;
use error::{GraphError, Result};
use events::{EventBus, GraphEvent, GraphListener, ListenerId};
use extensions::ExtensionRegistry;
use geometry::coords::{GraphPoint, GraphRect, ScreenPoint, ScreenSize, ScreenVector, Viewport};
use geometry::limits::MAX_CONTROL_POINTS;
use geometry::rect::union_all;
use interaction::Interaction;
use log::debug;
use model::{Connection, ConnectionId, Node, NodeId, PortRef};
use painter::{OrthogonalPainter, PathGeometry, PathPainter};
use resize::{DefaultResize, ResizeGeometry};
use scheduler::DirtyTracker;
use serde_json::{Map, Value};
use spatial::{SpatialIndex, SpatialKey};
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;
use store::GraphStore;
use veto::{ConnectVeto, DeleteVeto};

pub use model::{Port, PortDirection};

/// Controller owning the graph, its spatial index and the active interaction.
///
/// Every mutation goes through here so the derived indexes, the spatial
/// index and the event stream stay in step.
pub struct Editor {
    pub(crate) store: GraphStore,
    pub(crate) spatial: SpatialIndex,
    pub(crate) dirty: DirtyTracker,
    pub(crate) interaction: Interaction,
    pub(crate) viewport: Viewport,
    pub(crate) screen: ScreenSize,
    pub(crate) config: EditorConfig,
    pub(crate) painter: Box<dyn PathPainter>,
    pub(crate) snap: Option<Box<dyn SnapDelegate>>,
    pub(crate) resizer: Box<dyn ResizeGeometry>,
    pub(crate) validator: Option<Box<dyn ConnectionValidator>>,
    pub(crate) delete_veto: Option<Rc<dyn DeleteVeto>>,
    pub(crate) connect_veto: Option<Rc<dyn ConnectVeto>>,
    pub(crate) events: EventBus,
    pub(crate) extensions: ExtensionRegistry,
    pub(crate) culler: Culler,
    pub(crate) paths: HashMap<ConnectionId, PathGeometry>,
    pub(crate) metadata: Map<String, Value>,
    pub(crate) next_connection_seq: u64,
}

impl Default for Editor {
    fn default() -> Self {
        Editor::new(EditorConfig::default())
    }
}

impl Editor {
    pub fn new(config: EditorConfig) -> Self {
        Editor {
            store: GraphStore::new(),
            spatial: SpatialIndex::new(config.spatial_cell_size),
            dirty: DirtyTracker::new(config.live_index_updates),
            interaction: Interaction::Idle,
            viewport: Viewport::default(),
            screen: ScreenSize::new(800.0, 600.0),
            painter: Box::new(OrthogonalPainter::default()),
            snap: None,
            resizer: Box::new(DefaultResize),
            validator: None,
            delete_veto: None,
            connect_veto: None,
            events: EventBus::new(),
            extensions: ExtensionRegistry::new(),
            culler: Culler::new(),
            paths: HashMap::new(),
            metadata: Map::new(),
            next_connection_seq: 1,
            config,
        }
    }

    /// Validated construction from a JSON config document.
    pub fn with_config_json(json: &str) -> Result<Self> {
        Ok(Editor::new(EditorConfig::from_json_str(json)?))
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn spatial(&self) -> &SpatialIndex {
        &self.spatial
    }

    pub fn spatial_version(&self) -> u64 {
        self.spatial.version()
    }

    // Collaborators

    /// Swap the path painter and rebuild connection geometry with it.
    pub fn set_painter(&mut self, painter: Box<dyn PathPainter>) {
        self.painter = painter;
        self.reindex_all();
    }

    pub fn set_snap_delegate(&mut self, snap: Option<Box<dyn SnapDelegate>>) {
        self.snap = snap;
    }

    pub fn set_resize_geometry(&mut self, resizer: Box<dyn ResizeGeometry>) {
        self.resizer = resizer;
    }

    pub fn set_validator(&mut self, validator: Option<Box<dyn ConnectionValidator>>) {
        self.validator = validator;
    }

    pub fn set_delete_veto(&mut self, veto: Option<Rc<dyn DeleteVeto>>) {
        self.delete_veto = veto;
    }

    pub fn set_connect_veto(&mut self, veto: Option<Rc<dyn ConnectVeto>>) {
        self.connect_veto = veto;
    }

    // Events

    pub fn subscribe(&mut self, listener: impl GraphListener + 'static) -> ListenerId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut ExtensionRegistry {
        &mut self.extensions
    }

    pub(crate) fn emit(&mut self, event: GraphEvent) {
        self.events.emit(&event);
        self.extensions.dispatch(&event);
    }

    /// Group several mutations: observers see one BatchStarted/BatchEnded
    /// pair at the outermost level and the spatial index bumps once.
    pub fn batch<R>(&mut self, reason: &str, f: impl FnOnce(&mut Self) -> R) -> R {
        if self.events.begin_batch(reason) {
            self.extensions.dispatch(&GraphEvent::BatchStarted { reason: reason.to_string() });
        }
        let r = self.index_batch(f);
        if self.events.end_batch(reason) {
            self.extensions.dispatch(&GraphEvent::BatchEnded { reason: reason.to_string() });
        }
        r
    }

    // Viewport

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn screen_size(&self) -> ScreenSize {
        self.screen
    }

    pub fn set_screen_size(&mut self, width: f64, height: f64) -> Result<()> {
        if !width.is_finite() || !height.is_finite() || width < 0.0 || height < 0.0 {
            return Err(GraphError::NonFinite("screen size"));
        }
        self.screen = ScreenSize::new(width, height);
        Ok(())
    }

    pub fn visible_rect(&self) -> GraphRect {
        self.viewport.visible_rect(self.screen)
    }

    pub fn to_graph(&self, p: ScreenPoint) -> GraphPoint {
        self.viewport.to_graph(p)
    }

    pub fn to_screen(&self, p: GraphPoint) -> ScreenPoint {
        self.viewport.to_screen(p)
    }

    fn apply_viewport(&mut self, next: Viewport) -> bool {
        let next = next.clamped(self.config.min_zoom, self.config.max_zoom);
        if next == self.viewport {
            return false;
        }
        self.viewport = next;
        self.emit(GraphEvent::ViewportChanged { viewport: next });
        true
    }

    pub fn set_viewport(&mut self, viewport: Viewport) -> Result<bool> {
        if !viewport.is_finite() {
            return Err(GraphError::NonFinite("viewport"));
        }
        Ok(self.apply_viewport(viewport))
    }

    /// Pan by a screen-space delta. Refused (returns false) while a drag
    /// holds the canvas.
    pub fn pan_by(&mut self, delta: ScreenVector) -> Result<bool> {
        if !delta.x.is_finite() || !delta.y.is_finite() {
            return Err(GraphError::NonFinite("pan delta"));
        }
        if self.interaction.canvas_locked() {
            return Ok(false);
        }
        Ok(self.apply_viewport(self.viewport.panned(delta)))
    }

    /// Multiply zoom by `factor` keeping the graph point under `anchor` fixed.
    pub fn zoom_at(&mut self, factor: f64, anchor: ScreenPoint) -> Result<bool> {
        if !factor.is_finite() || factor <= 0.0 || !anchor.x.is_finite() || !anchor.y.is_finite() {
            return Err(GraphError::NonFinite("zoom factor"));
        }
        let next = self.viewport.zoomed_at(factor, anchor, self.config.min_zoom, self.config.max_zoom);
        Ok(self.apply_viewport(next))
    }

    /// Fit all visible nodes into the screen with `padding` pixels around.
    pub fn fit_to_nodes(&mut self, padding: f64) -> bool {
        let rects: Vec<GraphRect> = self.store.nodes().filter(|n| n.visible).map(|n| n.bounds()).collect();
        let Some(bounds) = union_all(rects.iter()) else {
            return false;
        };
        let next = Viewport::fitted(&bounds, self.screen, padding.max(0.0), self.config.min_zoom, self.config.max_zoom);
        self.apply_viewport(next)
    }

    // Nodes

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.store.node(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.store.nodes()
    }

    pub fn add_node(&mut self, node: Node) -> Result<()> {
        let id = node.id.clone();
        self.store.add_node(node)?;
        self.mark_dirty(id.as_str());
        self.emit(GraphEvent::NodeAdded { id });
        Ok(())
    }

    /// Remove a node together with every connection touching it.
    pub fn remove_node(&mut self, id: &str) -> Result<Node> {
        self.batch("remove_node", |ed| {
            let (node, removed) = ed.store.remove_node(id)?;
            ed.spatial.remove_node_entries(&node);
            for c in &removed {
                ed.spatial.remove(&SpatialKey::Connection(c.id.clone()));
                ed.paths.remove(&c.id);
            }
            debug!("removed node {} with {} connections", id, removed.len());
            for c in removed {
                ed.emit(GraphEvent::ConnectionRemoved { id: c.id });
            }
            ed.emit(GraphEvent::NodeRemoved { id: node.id.clone() });
            ed.forget_node(&node.id);
            if !ed.interaction.defers_index() {
                ed.flush_pending();
            }
            Ok(node)
        })
    }

    /// Programmatic move: sets the intended position and re-derives the
    /// visual one through the snap pipeline.
    pub fn move_node_to(&mut self, id: &str, position: GraphPoint) -> Result<()> {
        if !position.x.is_finite() || !position.y.is_finite() {
            return Err(GraphError::NonFinite("position"));
        }
        if !self.store.contains_node(id) {
            return Err(GraphError::NodeNotFound(id.into()));
        }
        let visual = self.snapped_visual(id, position);
        if let Some(n) = self.store.node_mut(id) {
            n.position = position;
            n.visual_position = visual;
        }
        self.mark_dirty(id);
        Ok(())
    }

    pub fn set_node_size(&mut self, id: &str, width: f64, height: f64) -> Result<()> {
        if !width.is_finite() || !height.is_finite() || width < 0.0 || height < 0.0 {
            return Err(GraphError::NonFinite("size"));
        }
        let n = self.store.node_mut(id).ok_or_else(|| GraphError::NodeNotFound(id.into()))?;
        n.size = geometry::coords::GraphSize::new(width, height);
        self.mark_dirty(id);
        self.emit(GraphEvent::NodeResized { id: id.into() });
        Ok(())
    }

    /// Hidden nodes leave the spatial index; their connections drop out of
    /// the visible set.
    pub fn set_node_visible(&mut self, id: &str, visible: bool) -> Result<()> {
        let n = self.store.node_mut(id).ok_or_else(|| GraphError::NodeNotFound(id.into()))?;
        if n.visible == visible {
            return Ok(());
        }
        n.visible = visible;
        self.mark_dirty(id);
        Ok(())
    }

    pub fn set_node_data(&mut self, id: &str, data: Value) -> Result<()> {
        let n = self.store.node_mut(id).ok_or_else(|| GraphError::NodeNotFound(id.into()))?;
        n.data = data;
        Ok(())
    }

    // Connections

    pub fn connection(&self, id: &str) -> Option<&Connection> {
        self.store.connection(id)
    }

    pub fn connections(&self) -> &[Connection] {
        self.store.connections()
    }

    /// Direct insertion. No port validation happens here; use the drag
    /// protocol for user-driven connections.
    pub fn add_connection(&mut self, conn: Connection) -> Result<()> {
        let id = conn.id.clone();
        self.store.add_connection(conn)?;
        self.mark_connection_dirty(id.as_str());
        self.emit(GraphEvent::ConnectionCreated { id });
        Ok(())
    }

    /// Unchecked removal; an unknown id is an error.
    pub fn remove_connection(&mut self, id: &str) -> Result<Connection> {
        let conn = self.store.remove_connection(id)?;
        self.index_batch(|ed| {
            ed.spatial.remove(&SpatialKey::Connection(conn.id.clone()));
        });
        self.paths.remove(id);
        self.emit(GraphEvent::ConnectionRemoved { id: conn.id.clone() });
        Ok(conn)
    }

    /// Geometry last computed for a connection, if it is drawable.
    pub fn connection_path(&self, id: &str) -> Option<&PathGeometry> {
        self.paths.get(id)
    }

    pub fn connections_for_node(&self, id: &str) -> Vec<&Connection> {
        self.store.connections_for_node(id)
    }

    pub fn set_connection_locked(&mut self, id: &str, locked: bool) -> Result<()> {
        let c = self.store.connection_mut(id).ok_or_else(|| GraphError::ConnectionNotFound(id.into()))?;
        c.locked = locked;
        Ok(())
    }

    pub fn add_control_point(&mut self, id: &str, index: usize, point: GraphPoint) -> Result<()> {
        if !point.x.is_finite() || !point.y.is_finite() {
            return Err(GraphError::NonFinite("control point"));
        }
        let c = self.store.connection_mut(id).ok_or_else(|| GraphError::ConnectionNotFound(id.into()))?;
        if index > c.control_points.len() || c.control_points.len() >= MAX_CONTROL_POINTS {
            return Err(GraphError::ControlPointOutOfRange { id: id.into(), index });
        }
        c.control_points.insert(index, point);
        self.mark_connection_dirty(id);
        Ok(())
    }

    pub fn move_control_point(&mut self, id: &str, index: usize, point: GraphPoint) -> Result<()> {
        if !point.x.is_finite() || !point.y.is_finite() {
            return Err(GraphError::NonFinite("control point"));
        }
        let c = self.store.connection_mut(id).ok_or_else(|| GraphError::ConnectionNotFound(id.into()))?;
        let slot = c
            .control_points
            .get_mut(index)
            .ok_or_else(|| GraphError::ControlPointOutOfRange { id: id.into(), index })?;
        *slot = point;
        self.mark_connection_dirty(id);
        Ok(())
    }

    pub fn remove_control_point(&mut self, id: &str, index: usize) -> Result<GraphPoint> {
        let c = self.store.connection_mut(id).ok_or_else(|| GraphError::ConnectionNotFound(id.into()))?;
        if index >= c.control_points.len() {
            return Err(GraphError::ControlPointOutOfRange { id: id.into(), index });
        }
        let p = c.control_points.remove(index);
        self.mark_connection_dirty(id);
        Ok(p)
    }

    pub fn has_cycles(&self) -> bool {
        algorithms::cycles::has_cycles(&self.store)
    }

    pub fn get_cycles(&self) -> Vec<Vec<NodeId>> {
        algorithms::cycles::get_cycles(&self.store)
    }

    // Selection

    pub fn selected_nodes(&self) -> Vec<NodeId> {
        self.store.selected_nodes().iter().cloned().collect()
    }

    pub fn selected_connections(&self) -> Vec<ConnectionId> {
        self.store.selected_connections().iter().cloned().collect()
    }

    fn selection_changed(&mut self, changed: bool) -> bool {
        if changed {
            self.emit(GraphEvent::SelectionChanged);
        }
        changed
    }

    pub fn select_node(&mut self, id: &str, additive: bool) -> Result<bool> {
        if !self.store.contains_node(id) {
            return Err(GraphError::NodeNotFound(id.into()));
        }
        let changed = self.store.select_nodes(&[NodeId::from(id)], additive);
        Ok(self.selection_changed(changed))
    }

    pub fn select_nodes(&mut self, ids: &[NodeId], additive: bool) -> bool {
        let changed = self.store.select_nodes(ids, additive);
        self.selection_changed(changed)
    }

    pub fn select_connection(&mut self, id: &str, additive: bool) -> Result<bool> {
        if !self.store.contains_connection(id) {
            return Err(GraphError::ConnectionNotFound(id.into()));
        }
        let changed = self.store.select_connections(&[ConnectionId::from(id)], additive);
        Ok(self.selection_changed(changed))
    }

    pub fn select_all(&mut self) -> bool {
        let ids: Vec<NodeId> = self.store.node_ids().to_vec();
        let changed = self.store.select_nodes(&ids, false);
        self.selection_changed(changed)
    }

    pub fn clear_selection(&mut self) -> bool {
        let changed = self.store.clear_selection();
        self.selection_changed(changed)
    }

    /// Remove every selected node (with its connections) or every selected
    /// unlocked connection, as one batch.
    pub fn delete_selection(&mut self) -> (Vec<NodeId>, Vec<ConnectionId>) {
        let nodes = self.selected_nodes();
        let conns: Vec<ConnectionId> = self
            .store
            .selected_connections()
            .iter()
            .filter(|c| self.store.connection(c.as_str()).map_or(false, |c| !c.locked))
            .cloned()
            .collect();
        if nodes.is_empty() && conns.is_empty() {
            return (nodes, conns);
        }
        self.batch("delete_selection", |ed| {
            let mut removed_nodes = Vec::new();
            let mut removed_conns = Vec::new();
            for id in &conns {
                if ed.remove_connection(id.as_str()).is_ok() {
                    removed_conns.push(id.clone());
                }
            }
            for id in &nodes {
                if ed.remove_node(id.as_str()).is_ok() {
                    removed_nodes.push(id.clone());
                }
            }
            ed.emit(GraphEvent::SelectionChanged);
            (removed_nodes, removed_conns)
        })
    }

    // Z order

    pub fn bring_to_front(&mut self, id: &str) -> Result<()> {
        self.store.bring_to_front(id)
    }

    pub fn send_to_back(&mut self, id: &str) -> Result<()> {
        self.store.send_to_back(id)
    }

    /// Node ids back-to-front.
    pub fn nodes_by_z(&self) -> Vec<NodeId> {
        self.store.sorted_node_ids()
    }

    // Groups

    pub fn set_group_members(&mut self, group: &str, members: &[NodeId]) -> Result<()> {
        self.store.set_group_members(group, members)
    }

    pub fn group_members(&self, group: &str) -> Vec<NodeId> {
        self.store.group_members(group)
    }

    pub fn group_of(&self, node: &str) -> Option<&NodeId> {
        self.store.group_of(node)
    }

    // Queries

    /// Topmost entity under a screen point: ports win over nodes, nodes over
    /// connections.
    pub fn hit_test(&self, p: ScreenPoint) -> Option<Hit> {
        algorithms::picking::pick_impl(self, self.viewport.to_graph(p))
    }

    pub fn hit_test_graph(&self, p: GraphPoint) -> Option<Hit> {
        algorithms::picking::pick_impl(self, p)
    }

    /// Node ids inside the culling window, pending drag moves included.
    pub fn visible_nodes(&mut self) -> Vec<NodeId> {
        let visible = self.visible_rect();
        let mut ids: BTreeSet<NodeId> =
            self.culler.visible_nodes(&self.spatial, visible, self.viewport.zoom, &self.config).into_iter().collect();
        for id in self.dirty.pending_nodes() {
            if self.store.node(id.as_str()).map_or(false, |n| n.visible) {
                ids.insert(id.clone());
            }
        }
        ids.into_iter().collect()
    }

    pub fn visible_connections(&mut self) -> Vec<ConnectionId> {
        let visible = self.visible_rect();
        self.culler.visible_connections(&self.spatial, &self.store, visible, self.viewport.zoom, &self.config)
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.insert(key.into(), value);
    }

    /// Drop all nodes, connections and interaction state.
    pub fn clear(&mut self) {
        self.cancel_interaction();
        self.batch("clear", |ed| {
            ed.store.clear();
            ed.dirty.clear();
            ed.paths.clear();
            ed.spatial.clear();
        });
    }

    pub(crate) fn next_connection_id(&mut self) -> ConnectionId {
        loop {
            let id = ConnectionId::new(format!("conn-{}", self.next_connection_seq));
            self.next_connection_seq += 1;
            if !self.store.contains_connection(id.as_str()) {
                return id;
            }
        }
    }

    pub(crate) fn port_point(&self, port: &PortRef) -> Option<GraphPoint> {
        self.store.node(port.node.as_str())?.port_point(port.port.as_str())
    }
}
