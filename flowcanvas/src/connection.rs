//! Creating connections by dragging from one port to another.
//!
//! Validation outcomes are values, not errors: a pointer hovering an invalid
//! port is the normal case. Only misuse of the lifecycle itself (completing a
//! drag that never started) is reported through [`GraphError`].

use crate::error::GraphError;
use crate::events::{DragKind, GraphEvent};
use crate::geometry::coords::GraphPoint;
use crate::interaction::{Interaction, TempConnection};
use crate::model::{Connection, ConnectionId, ConnectionKey, NodeId, Port, PortDirection, PortRef};
use crate::store::GraphStore;
use crate::Editor;
use log::{debug, trace};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartRejection {
    #[error("node {0} not found")]
    NodeNotFound(NodeId),
    #[error("port {0} not found")]
    PortNotFound(PortRef),
    #[error("port {0} is not connectable")]
    PortNotConnectable(PortRef),
    #[error("port {0} cannot start a drag in this direction")]
    WrongDirection(PortRef),
    #[error("port {0} has reached its connection limit")]
    MaxConnectionsReached(PortRef),
    #[error("rejected: {0}")]
    Vetoed(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConnectRejection {
    #[error("no connection drag in progress")]
    NoActiveDrag,
    #[error("cannot connect a port to itself")]
    SelfConnection,
    #[error("target node {0} not found")]
    TargetNodeNotFound(NodeId),
    #[error("both ports have the same direction")]
    SameDirectionPorts,
    #[error("source port {0} not found")]
    SourcePortNotFound(PortRef),
    #[error("target port {0} not found")]
    TargetPortNotFound(PortRef),
    #[error("port {0} is not connectable")]
    PortNotConnectable(PortRef),
    #[error("connections must run from an output to an input")]
    WrongDirection,
    #[error("connection {0} -> {1} already exists")]
    DuplicateConnection(PortRef, PortRef),
    #[error("port {0} has reached its connection limit")]
    MaxConnectionsOnTarget(PortRef),
    #[error("rejected: {0}")]
    Vetoed(String),
    #[error(transparent)]
    Store(#[from] GraphError),
}

impl StartRejection {
    /// Stable snake_case tag, used by hosts that switch on the outcome.
    pub fn reason(&self) -> &'static str {
        match self {
            StartRejection::NodeNotFound(_) => "node_not_found",
            StartRejection::PortNotFound(_) => "port_not_found",
            StartRejection::PortNotConnectable(_) => "port_not_connectable",
            StartRejection::WrongDirection(_) => "wrong_direction",
            StartRejection::MaxConnectionsReached(_) => "max_connections",
            StartRejection::Vetoed(_) => "vetoed",
        }
    }
}

impl ConnectRejection {
    pub fn reason(&self) -> &'static str {
        match self {
            ConnectRejection::NoActiveDrag => "no_active_drag",
            ConnectRejection::SelfConnection => "self_connection",
            ConnectRejection::TargetNodeNotFound(_) => "node_not_found",
            ConnectRejection::SameDirectionPorts => "same_direction",
            ConnectRejection::SourcePortNotFound(_) | ConnectRejection::TargetPortNotFound(_) => "port_not_found",
            ConnectRejection::PortNotConnectable(_) => "port_not_connectable",
            ConnectRejection::WrongDirection => "wrong_direction",
            ConnectRejection::DuplicateConnection(..) => "duplicate_connection",
            ConnectRejection::MaxConnectionsOnTarget(_) => "max_connections",
            ConnectRejection::Vetoed(_) => "vetoed",
            ConnectRejection::Store(e) => e.code(),
        }
    }
}

/// How much of the rule set to run. Hover feedback runs on every pointer
/// move and skips the custom validator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Validation {
    Full,
    Structural,
}

/// Application rules layered on top of the structural checks.
pub trait ConnectionValidator {
    fn validate_start(&self, _store: &GraphStore, _port: &PortRef, _is_output: bool) -> Result<(), String> {
        Ok(())
    }
    fn validate_connection(&self, _store: &GraphStore, _source: &PortRef, _target: &PortRef) -> Result<(), String> {
        Ok(())
    }
}

impl<F> ConnectionValidator for F
where
    F: Fn(&GraphStore, &PortRef, &PortRef) -> Result<(), String>,
{
    fn validate_connection(&self, store: &GraphStore, source: &PortRef, target: &PortRef) -> Result<(), String> {
        self(store, source, target)
    }
}

fn port_of<'a>(store: &'a GraphStore, r: &PortRef) -> Option<&'a Port> {
    store.node(r.node.as_str())?.port(r.port.as_str())
}

impl Editor {
    pub fn can_start_connection(&self, node: &str, port: &str, is_output: bool) -> Result<(), StartRejection> {
        let n = self.store.node(node).ok_or_else(|| StartRejection::NodeNotFound(node.into()))?;
        let r = PortRef::new(node, port);
        let p = n.port(port).ok_or_else(|| StartRejection::PortNotFound(r.clone()))?;
        if !p.connectable {
            return Err(StartRejection::PortNotConnectable(r));
        }
        if p.direction.is_output() != is_output {
            return Err(StartRejection::WrongDirection(r));
        }
        if p.is_full(self.store.port_connection_count(&r)) {
            return Err(StartRejection::MaxConnectionsReached(r));
        }
        if let Some(v) = &self.validator {
            v.validate_start(&self.store, &r, is_output).map_err(StartRejection::Vetoed)?;
        }
        Ok(())
    }

    /// Begin dragging a temporary connection out of `node.port`. A
    /// single-connection origin loses its existing connections right away.
    /// Returns the ids removed that way.
    pub fn start_connection_drag(&mut self, node: &str, port: &str, is_output: bool) -> Result<Vec<ConnectionId>, StartRejection> {
        self.can_start_connection(node, port, is_output)?;
        self.cancel_interaction();
        let origin = PortRef::new(node, port);
        let Some(p) = port_of(&self.store, &origin) else {
            return Err(StartRejection::PortNotFound(origin));
        };
        let direction = p.direction;
        let replaced = if p.multi_connections { Vec::new() } else { self.store.connections_at_port(&origin) };
        if !replaced.is_empty() {
            self.batch("connection_replace", |ed| {
                for id in &replaced {
                    // Listed from the index just above.
                    let _ = ed.remove_connection(id.as_str());
                }
            });
        }
        let start_point = self
            .port_point(&origin)
            .or_else(|| self.store.node(node).map(|n| n.visual_position))
            .unwrap_or_else(GraphPoint::origin);
        debug!("connection drag started at {} ({} replaced)", origin, replaced.len());
        self.interaction = Interaction::ConnectionDragging(TempConnection {
            origin,
            origin_direction: direction,
            start_point,
            current_point: start_point,
            highlighted: None,
        });
        self.emit(GraphEvent::DragStarted { kind: DragKind::Connection, ids: vec![node.into()] });
        Ok(replaced)
    }

    /// Check whether dropping the active drag on `node.port` would be
    /// accepted.
    pub fn can_connect(&self, node: &str, port: &str, mode: Validation) -> Result<(), ConnectRejection> {
        self.resolve_connection(node, port, mode).map(|_| ())
    }

    /// Validates and returns the `(source, target)` pair for a drop on
    /// `node.port`, taking drag direction into account.
    pub(crate) fn resolve_connection(
        &self,
        node: &str,
        port: &str,
        mode: Validation,
    ) -> Result<(PortRef, PortRef), ConnectRejection> {
        let temp = self.interaction.temp_connection().ok_or(ConnectRejection::NoActiveDrag)?;
        let drop = PortRef::new(node, port);
        if drop == temp.origin {
            return Err(ConnectRejection::SelfConnection);
        }
        let drop_node = self.store.node(node).ok_or_else(|| ConnectRejection::TargetNodeNotFound(node.into()))?;
        if let Some(p) = drop_node.port(port) {
            if p.direction == temp.origin_direction {
                return Err(ConnectRejection::SameDirectionPorts);
            }
        }
        // A drag pulled out of an input port is dropped on its source.
        let (source, target) = match temp.origin_direction {
            PortDirection::Output => (temp.origin.clone(), drop.clone()),
            PortDirection::Input => (drop.clone(), temp.origin.clone()),
        };
        let sp = port_of(&self.store, &source).ok_or_else(|| ConnectRejection::SourcePortNotFound(source.clone()))?;
        let tp = port_of(&self.store, &target).ok_or_else(|| ConnectRejection::TargetPortNotFound(target.clone()))?;
        if !sp.connectable {
            return Err(ConnectRejection::PortNotConnectable(source));
        }
        if !tp.connectable {
            return Err(ConnectRejection::PortNotConnectable(target));
        }
        if sp.direction != PortDirection::Output || tp.direction != PortDirection::Input {
            return Err(ConnectRejection::WrongDirection);
        }
        let key = ConnectionKey { source: source.clone(), target: target.clone() };
        if self.store.has_connection(&key) {
            return Err(ConnectRejection::DuplicateConnection(source, target));
        }
        let drop_port = if drop == target { tp } else { sp };
        if drop_port.is_full(self.store.port_connection_count(&drop)) {
            return Err(ConnectRejection::MaxConnectionsOnTarget(drop));
        }
        if mode == Validation::Full {
            if let Some(v) = &self.validator {
                v.validate_connection(&self.store, &source, &target).map_err(ConnectRejection::Vetoed)?;
            }
        }
        Ok((source, target))
    }

    /// Follow the pointer. When `hovered` passes the structural checks the
    /// free end snaps onto that port and it becomes the highlighted port.
    /// Returns the point the free end was placed at.
    pub fn update_connection_drag(&mut self, point: GraphPoint, hovered: Option<&PortRef>) -> crate::error::Result<GraphPoint> {
        if !point.x.is_finite() || !point.y.is_finite() {
            return Err(GraphError::NonFinite("pointer"));
        }
        if self.interaction.temp_connection().is_none() {
            return Err(GraphError::NoActiveInteraction { expected: "connection drag" });
        }
        let candidate = hovered
            .filter(|p| self.can_connect(p.node.as_str(), p.port.as_str(), Validation::Structural).is_ok())
            .cloned();
        let placed = candidate.as_ref().and_then(|p| self.port_point(p)).unwrap_or(point);
        let mut previous = None;
        if let Interaction::ConnectionDragging(t) = &mut self.interaction {
            t.current_point = placed;
            previous = Some(std::mem::replace(&mut t.highlighted, candidate.clone()));
        }
        if let Some(prev) = previous {
            if prev != candidate {
                trace!("hover target {:?} -> {:?}", prev, candidate);
                self.emit(GraphEvent::PortHoverChanged { port: candidate });
            }
        }
        Ok(placed)
    }

    pub fn highlighted_port(&self) -> Option<&PortRef> {
        self.interaction.temp_connection().and_then(|t| t.highlighted.as_ref())
    }

    /// Drop the drag on `node.port`. Runs the full rule set; a rejection
    /// cancels the drag. On success single-connection ports on either end
    /// give up their existing connections and the new one is returned.
    pub fn complete_connection_drag(&mut self, node: &str, port: &str) -> Result<Connection, ConnectRejection> {
        let (source, target) = match self.resolve_connection(node, port, Validation::Full) {
            Ok(pair) => pair,
            Err(reason) => {
                debug!("connection to {}.{} rejected: {}", node, port, reason);
                self.abort_connection_drag();
                return Err(reason);
            }
        };
        self.commit_connection(source, target)
    }

    pub(crate) fn commit_connection(&mut self, source: PortRef, target: PortRef) -> Result<Connection, ConnectRejection> {
        let temp = self.interaction.take_temp_connection().ok_or(ConnectRejection::NoActiveDrag)?;
        let mut replaced: Vec<ConnectionId> = Vec::new();
        for end in [&source, &target] {
            if port_of(&self.store, end).map_or(false, |p| !p.multi_connections) {
                for id in self.store.connections_at_port(end) {
                    if !replaced.contains(&id) {
                        replaced.push(id);
                    }
                }
            }
        }
        let id = self.next_connection_id();
        let conn = Connection::between(id, &source, &target);
        let created = self.batch("connect", |ed| -> Result<Connection, ConnectRejection> {
            for id in &replaced {
                ed.remove_connection(id.as_str())?;
            }
            ed.add_connection(conn.clone())?;
            Ok(conn)
        })?;
        debug!("connection {} created {} -> {} ({} replaced)", created.id, source, target, replaced.len());
        if temp.highlighted.is_some() {
            self.emit(GraphEvent::PortHoverChanged { port: None });
        }
        self.emit(GraphEvent::DragEnded { kind: DragKind::Connection, ids: vec![temp.origin.node], cancelled: false });
        Ok(created)
    }

    /// Throw the temporary connection away. Connections removed by
    /// replacement at start are not restored.
    pub fn cancel_connection_drag(&mut self) -> crate::error::Result<()> {
        if self.interaction.temp_connection().is_none() {
            return Err(GraphError::NoActiveInteraction { expected: "connection drag" });
        }
        self.abort_connection_drag();
        Ok(())
    }

    pub(crate) fn abort_connection_drag(&mut self) {
        let Some(temp) = self.interaction.take_temp_connection() else {
            return;
        };
        if temp.highlighted.is_some() {
            self.emit(GraphEvent::PortHoverChanged { port: None });
        }
        debug!("connection drag from {} cancelled", temp.origin);
        self.emit(GraphEvent::DragEnded { kind: DragKind::Connection, ids: vec![temp.origin.node], cancelled: true });
    }
}
