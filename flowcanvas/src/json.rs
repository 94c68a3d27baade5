//! Document import/export.
//!
//! The persisted shape is `{version, nodes, connections, viewport, metadata}`
//! with camelCase keys. Loading is all-or-nothing: the document is validated
//! against the ingest caps in [`crate::geometry::limits`] and built into a
//! fresh store before anything in the editor is replaced.

use crate::error::{GraphError, Result};
use crate::events::GraphEvent;
use crate::geometry::coords::{GraphPoint, GraphSize, GraphVector, Viewport};
use crate::geometry::limits::{
    in_coord_bounds, in_size_bounds, valid_id, MAX_CONNECTIONS, MAX_CONTROL_POINTS, MAX_NODES, MAX_PORTS_PER_NODE,
};
use crate::model::{Connection, ConnectionId, Node, NodeId, Port, PortDirection, PortId};
use crate::store::GraphStore;
use crate::Editor;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DOCUMENT_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDocument {
    #[serde(default = "current_version")]
    pub version: u32,
    #[serde(default)]
    pub nodes: Vec<NodeDoc>,
    #[serde(default)]
    pub connections: Vec<ConnectionDoc>,
    #[serde(default)]
    pub viewport: Option<Viewport>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

fn current_version() -> u32 {
    DOCUMENT_VERSION
}

fn yes() -> bool {
    true
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDoc {
    pub id: NodeId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub z_index: i32,
    #[serde(default = "yes")]
    pub visible: bool,
    #[serde(default = "yes")]
    pub resizable: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_group: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<NodeId>,
    #[serde(default)]
    pub ports: Vec<PortDoc>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortDoc {
    pub id: PortId,
    pub direction: PortDirection,
    #[serde(default = "yes")]
    pub connectable: bool,
    #[serde(default = "yes")]
    pub multi_connections: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<[f64; 2]>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDoc {
    pub id: ConnectionId,
    pub source_node: NodeId,
    pub source_port: PortId,
    pub target_node: NodeId,
    pub target_port: PortId,
    #[serde(default, skip_serializing_if = "is_false")]
    pub locked: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub control_points: Vec<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl From<&Port> for PortDoc {
    fn from(p: &Port) -> Self {
        PortDoc {
            id: p.id.clone(),
            direction: p.direction,
            connectable: p.connectable,
            multi_connections: p.multi_connections,
            max_connections: p.max_connections,
            offset: p.offset.map(|v| [v.x, v.y]),
        }
    }
}

impl From<&Connection> for ConnectionDoc {
    fn from(c: &Connection) -> Self {
        ConnectionDoc {
            id: c.id.clone(),
            source_node: c.source_node.clone(),
            source_port: c.source_port.clone(),
            target_node: c.target_node.clone(),
            target_port: c.target_port.clone(),
            locked: c.locked,
            control_points: c.control_points.iter().map(|p| [p.x, p.y]).collect(),
            data: c.data.clone(),
        }
    }
}

impl TryFrom<&NodeDoc> for Node {
    type Error = GraphError;

    /// Checks the entry against the ingest caps; positions load unsnapped.
    fn try_from(d: &NodeDoc) -> Result<Node> {
        node_from_doc(d)
    }
}

impl TryFrom<&ConnectionDoc> for Connection {
    type Error = GraphError;

    fn try_from(d: &ConnectionDoc) -> Result<Connection> {
        connection_from_doc(d)
    }
}

fn bad(msg: String) -> GraphError {
    warn!("document rejected: {}", msg);
    GraphError::Document(msg)
}

fn check_point(what: &str, id: &str, x: f64, y: f64) -> Result<GraphPoint> {
    if in_coord_bounds(x) && in_coord_bounds(y) {
        Ok(GraphPoint::new(x, y))
    } else {
        Err(bad(format!("{} of {} is out of bounds", what, id)))
    }
}

fn node_from_doc(d: &NodeDoc) -> Result<Node> {
    if !valid_id(d.id.as_str()) {
        return Err(bad(format!("invalid node id '{}'", d.id)));
    }
    let position = check_point("position", d.id.as_str(), d.x, d.y)?;
    if !in_size_bounds(d.width) || !in_size_bounds(d.height) {
        return Err(bad(format!("size of {} is out of bounds", d.id)));
    }
    if d.ports.len() > MAX_PORTS_PER_NODE {
        return Err(bad(format!("node {} has more than {} ports", d.id, MAX_PORTS_PER_NODE)));
    }
    let mut ports: Vec<Port> = Vec::with_capacity(d.ports.len());
    for p in &d.ports {
        if !valid_id(p.id.as_str()) {
            return Err(bad(format!("invalid port id '{}' on {}", p.id, d.id)));
        }
        if ports.iter().any(|q| q.id == p.id) {
            return Err(bad(format!("duplicate port {} on {}", p.id, d.id)));
        }
        let offset = match p.offset {
            Some([dx, dy]) => {
                check_point("port offset", d.id.as_str(), dx, dy)?;
                Some(GraphVector::new(dx, dy))
            }
            None => None,
        };
        ports.push(Port {
            id: p.id.clone(),
            direction: p.direction,
            connectable: p.connectable,
            max_connections: p.max_connections,
            multi_connections: p.multi_connections,
            offset,
        });
    }
    Ok(Node {
        id: d.id.clone(),
        position,
        visual_position: position,
        size: GraphSize::new(d.width, d.height),
        z_index: d.z_index,
        visible: d.visible,
        resizable: d.resizable,
        is_group: d.is_group,
        dragging: false,
        data: d.data.clone(),
        ports,
    })
}

fn connection_from_doc(d: &ConnectionDoc) -> Result<Connection> {
    for id in [d.id.as_str(), d.source_node.as_str(), d.source_port.as_str(), d.target_node.as_str(), d.target_port.as_str()] {
        if !valid_id(id) {
            return Err(bad(format!("invalid id '{}' in connection {}", id, d.id)));
        }
    }
    if d.control_points.len() > MAX_CONTROL_POINTS {
        return Err(bad(format!("connection {} has more than {} control points", d.id, MAX_CONTROL_POINTS)));
    }
    let control_points = d
        .control_points
        .iter()
        .map(|[x, y]| check_point("control point", d.id.as_str(), *x, *y))
        .collect::<Result<Vec<_>>>()?;
    Ok(Connection {
        id: d.id.clone(),
        source_node: d.source_node.clone(),
        source_port: d.source_port.clone(),
        target_node: d.target_node.clone(),
        target_port: d.target_port.clone(),
        selected: false,
        locked: d.locked,
        control_points,
        data: d.data.clone(),
    })
}

/// Validate `doc` and build the store it describes. Connections whose
/// endpoint node or port does not exist are dropped with a warning.
pub fn store_from_document(doc: &GraphDocument) -> Result<GraphStore> {
    if doc.version > DOCUMENT_VERSION {
        return Err(bad(format!("unsupported document version {}", doc.version)));
    }
    if doc.nodes.len() > MAX_NODES {
        return Err(bad(format!("more than {} nodes", MAX_NODES)));
    }
    if doc.connections.len() > MAX_CONNECTIONS {
        return Err(bad(format!("more than {} connections", MAX_CONNECTIONS)));
    }
    if let Some(vp) = &doc.viewport {
        if !vp.is_finite() {
            return Err(bad("viewport must be finite with a positive zoom".into()));
        }
    }
    let mut store = GraphStore::new();
    for d in &doc.nodes {
        let node = node_from_doc(d)?;
        store.add_node(node).map_err(|e| bad(e.to_string()))?;
    }
    for d in &doc.nodes {
        if d.members.is_empty() {
            continue;
        }
        if let Some(m) = d.members.iter().find(|m| !store.contains_node(m.as_str())) {
            return Err(bad(format!("group {} lists unknown member {}", d.id, m)));
        }
        store.set_group_members(d.id.as_str(), &d.members).map_err(|e| bad(e.to_string()))?;
    }
    let mut dropped = 0usize;
    for d in &doc.connections {
        let conn = connection_from_doc(d)?;
        let source_ok = store.node(conn.source_node.as_str()).map_or(false, |n| n.port(conn.source_port.as_str()).is_some());
        let target_ok = store.node(conn.target_node.as_str()).map_or(false, |n| n.port(conn.target_port.as_str()).is_some());
        if !source_ok || !target_ok {
            warn!("skipping connection {}: endpoint {} -> {} not found", conn.id, conn.source(), conn.target());
            dropped += 1;
            continue;
        }
        store.add_connection(conn).map_err(|e| bad(e.to_string()))?;
    }
    if dropped > 0 {
        debug!("{} dangling connections dropped on load", dropped);
    }
    Ok(store)
}

impl Editor {
    pub fn to_document(&self) -> GraphDocument {
        let nodes = self
            .store
            .nodes()
            .map(|n| NodeDoc {
                id: n.id.clone(),
                x: n.position.x,
                y: n.position.y,
                width: n.size.width,
                height: n.size.height,
                z_index: n.z_index,
                visible: n.visible,
                resizable: n.resizable,
                is_group: n.is_group,
                members: self.store.group_members(n.id.as_str()),
                ports: n.ports.iter().map(PortDoc::from).collect(),
                data: n.data.clone(),
            })
            .collect();
        GraphDocument {
            version: DOCUMENT_VERSION,
            nodes,
            connections: self.store.connections().iter().map(ConnectionDoc::from).collect(),
            viewport: Some(self.viewport),
            metadata: self.metadata.clone(),
        }
    }

    /// Replace the whole graph with `doc`. On error nothing changes. Any
    /// active interaction is cancelled first; the spatial index is rebuilt
    /// once.
    pub fn load_document(&mut self, doc: &GraphDocument) -> Result<()> {
        let store = store_from_document(doc)?;
        self.cancel_interaction();
        self.batch("load_document", |ed| {
            ed.store = store;
            ed.metadata = doc.metadata.clone();
            ed.reindex_all();
        });
        if let Some(vp) = doc.viewport {
            self.apply_viewport(vp);
        }
        debug!(
            "loaded document with {} nodes and {} connections",
            self.store.node_count(),
            self.store.connection_count()
        );
        Ok(())
    }

    pub fn to_json_value(&self) -> Value {
        // Only maps with string keys and finite numbers are involved.
        serde_json::to_value(self.to_document()).unwrap_or(Value::Null)
    }

    pub fn from_json_value(&mut self, v: Value) -> Result<()> {
        let doc: GraphDocument = serde_json::from_value(v).map_err(|e| bad(e.to_string()))?;
        self.load_document(&doc)
    }

    pub fn to_json_string(&self) -> String {
        self.to_json_value().to_string()
    }

    pub fn from_json_str(&mut self, s: &str) -> Result<()> {
        let doc: GraphDocument = serde_json::from_str(s).map_err(|e| bad(e.to_string()))?;
        self.load_document(&doc)
    }
}
