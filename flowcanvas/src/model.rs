use crate::geometry::coords::{GraphPoint, GraphRect, GraphSize, GraphVector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Borrow;
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Unique node identity, stable for the lifetime of the graph.
    NodeId
);
string_id!(
    /// Port identity, unique within its node.
    PortId
);
string_id!(
    /// Unique connection identity.
    ConnectionId
);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    Input,
    Output,
}

impl PortDirection {
    pub fn is_output(self) -> bool {
        self == PortDirection::Output
    }
    pub fn opposite(self) -> Self {
        match self {
            PortDirection::Input => PortDirection::Output,
            PortDirection::Output => PortDirection::Input,
        }
    }
}

/// (node, port) pair addressing one port in the graph.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortRef {
    pub node: NodeId,
    pub port: PortId,
}

impl PortRef {
    pub fn new(node: impl Into<NodeId>, port: impl Into<PortId>) -> Self {
        PortRef { node: node.into(), port: port.into() }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.port)
    }
}

/// Exact (source port -> target port) tuple used for duplicate detection.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    pub source: PortRef,
    pub target: PortRef,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Port {
    pub id: PortId,
    pub direction: PortDirection,
    pub connectable: bool,
    /// Only enforced when `multi_connections` is set; single-connection
    /// ports replace their existing connection instead of rejecting.
    pub max_connections: Option<usize>,
    pub multi_connections: bool,
    /// Connection point relative to the node's top-left corner. `None` lays
    /// the port out along the node's left (input) or right (output) edge.
    pub offset: Option<GraphVector>,
}

impl Port {
    pub fn new(id: impl Into<PortId>, direction: PortDirection) -> Self {
        Port {
            id: id.into(),
            direction,
            connectable: true,
            max_connections: None,
            multi_connections: true,
            offset: None,
        }
    }
    pub fn input(id: impl Into<PortId>) -> Self {
        Port::new(id, PortDirection::Input)
    }
    pub fn output(id: impl Into<PortId>) -> Self {
        Port::new(id, PortDirection::Output)
    }
    pub fn single(mut self) -> Self {
        self.multi_connections = false;
        self
    }
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = Some(max);
        self
    }
    pub fn with_offset(mut self, dx: f64, dy: f64) -> Self {
        self.offset = Some(GraphVector::new(dx, dy));
        self
    }
    pub fn not_connectable(mut self) -> Self {
        self.connectable = false;
        self
    }

    /// True when `count` existing connections already exhaust the port.
    pub fn is_full(&self, count: usize) -> bool {
        self.multi_connections && self.max_connections.map_or(false, |max| count >= max)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: NodeId,
    /// Where the user intends the node to be; drags accumulate here.
    pub position: GraphPoint,
    /// Snapped position used for rendering and hit-testing.
    pub visual_position: GraphPoint,
    pub size: GraphSize,
    pub z_index: i32,
    pub visible: bool,
    pub resizable: bool,
    pub is_group: bool,
    pub dragging: bool,
    pub data: Value,
    pub ports: Vec<Port>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, x: f64, y: f64, width: f64, height: f64) -> Self {
        let p = GraphPoint::new(x, y);
        Node {
            id: id.into(),
            position: p,
            visual_position: p,
            size: GraphSize::new(width, height),
            z_index: 0,
            visible: true,
            resizable: true,
            is_group: false,
            dragging: false,
            data: Value::Null,
            ports: Vec::new(),
        }
    }

    pub fn with_port(mut self, port: Port) -> Self {
        self.ports.push(port);
        self
    }

    pub fn group(mut self) -> Self {
        self.is_group = true;
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Rendered bounds, anchored at the visual position.
    pub fn bounds(&self) -> GraphRect {
        GraphRect::new(self.visual_position, self.size)
    }

    pub fn port(&self, id: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.id.as_str() == id)
    }

    /// Graph-space point where connections attach to `port`.
    pub fn port_point(&self, id: &str) -> Option<GraphPoint> {
        let port = self.port(id)?;
        if let Some(off) = port.offset {
            return Some(self.visual_position + off);
        }
        let siblings: Vec<&Port> = self.ports.iter().filter(|p| p.direction == port.direction).collect();
        let idx = siblings.iter().position(|p| p.id == port.id)?;
        let step = self.size.height / (siblings.len() as f64 + 1.0);
        let x = match port.direction {
            PortDirection::Input => 0.0,
            PortDirection::Output => self.size.width,
        };
        Some(self.visual_position + GraphVector::new(x, step * (idx as f64 + 1.0)))
    }

    pub fn is_finite(&self) -> bool {
        self.position.x.is_finite()
            && self.position.y.is_finite()
            && self.visual_position.x.is_finite()
            && self.visual_position.y.is_finite()
            && self.size.width.is_finite()
            && self.size.height.is_finite()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Connection {
    pub id: ConnectionId,
    pub source_node: NodeId,
    pub source_port: PortId,
    pub target_node: NodeId,
    pub target_port: PortId,
    pub selected: bool,
    pub locked: bool,
    pub control_points: Vec<GraphPoint>,
    pub data: Value,
}

impl Connection {
    pub fn new(
        id: impl Into<ConnectionId>,
        source: (impl Into<NodeId>, impl Into<PortId>),
        target: (impl Into<NodeId>, impl Into<PortId>),
    ) -> Self {
        Connection {
            id: id.into(),
            source_node: source.0.into(),
            source_port: source.1.into(),
            target_node: target.0.into(),
            target_port: target.1.into(),
            selected: false,
            locked: false,
            control_points: Vec::new(),
            data: Value::Null,
        }
    }

    pub fn between(id: impl Into<ConnectionId>, source: &PortRef, target: &PortRef) -> Self {
        Connection::new(
            id,
            (source.node.clone(), source.port.clone()),
            (target.node.clone(), target.port.clone()),
        )
    }

    pub fn source(&self) -> PortRef {
        PortRef { node: self.source_node.clone(), port: self.source_port.clone() }
    }

    pub fn target(&self) -> PortRef {
        PortRef { node: self.target_node.clone(), port: self.target_port.clone() }
    }

    pub fn key(&self) -> ConnectionKey {
        ConnectionKey { source: self.source(), target: self.target() }
    }

    pub fn involves_node(&self, id: &str) -> bool {
        self.source_node.as_str() == id || self.target_node.as_str() == id
    }
}
