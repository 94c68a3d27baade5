//! The single active pointer-driven operation and its ephemeral data.

use crate::events::{DragKind, GraphEvent};
use crate::geometry::coords::{GraphPoint, GraphRect, GraphVector};
use crate::geometry::rect::from_corners;
use crate::model::{NodeId, PortDirection, PortRef};
use crate::resize::ResizeHandle;
use crate::Editor;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, PartialEq)]
pub struct NodeDrag {
    pub primary: NodeId,
    /// Every node moving with the primary, primary included.
    pub nodes: Vec<NodeId>,
    /// Pre-drag (position, visual_position) per moving node.
    pub origins: BTreeMap<NodeId, (GraphPoint, GraphPoint)>,
    pub total_delta: GraphVector,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResizeState {
    pub node: NodeId,
    /// Handle grabbed at start.
    pub handle: ResizeHandle,
    /// Handle currently active after any edge crossing.
    pub active_handle: ResizeHandle,
    pub original: GraphRect,
    pub original_position: GraphPoint,
    pub start_pointer: GraphPoint,
}

/// Non-persisted connection record that follows the pointer.
#[derive(Clone, Debug, PartialEq)]
pub struct TempConnection {
    pub origin: PortRef,
    pub origin_direction: PortDirection,
    pub start_point: GraphPoint,
    pub current_point: GraphPoint,
    /// Port the pointer is over that passed the structural checks.
    pub highlighted: Option<PortRef>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Marquee {
    pub anchor: GraphPoint,
    pub current: GraphPoint,
    pub hits: BTreeSet<NodeId>,
}

impl Marquee {
    pub fn rect(&self) -> GraphRect {
        from_corners(self.anchor, self.current)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Interaction {
    #[default]
    Idle,
    NodeDragging(NodeDrag),
    Resizing(ResizeState),
    ConnectionDragging(TempConnection),
    MarqueeSelecting(Marquee),
}

impl Interaction {
    pub fn is_idle(&self) -> bool {
        matches!(self, Interaction::Idle)
    }

    /// Viewport panning is blocked while anything is being dragged.
    pub fn canvas_locked(&self) -> bool {
        !self.is_idle()
    }

    /// Geometry-changing interactions defer spatial index work to their end.
    pub fn defers_index(&self) -> bool {
        matches!(self, Interaction::NodeDragging(_) | Interaction::Resizing(_))
    }

    pub fn kind(&self) -> Option<DragKind> {
        match self {
            Interaction::Idle => None,
            Interaction::NodeDragging(_) => Some(DragKind::Node),
            Interaction::Resizing(_) => Some(DragKind::Resize),
            Interaction::ConnectionDragging(_) => Some(DragKind::Connection),
            Interaction::MarqueeSelecting(_) => Some(DragKind::Marquee),
        }
    }

    pub fn dragged_node(&self) -> Option<&NodeId> {
        match self {
            Interaction::NodeDragging(d) => Some(&d.primary),
            Interaction::Resizing(r) => Some(&r.node),
            _ => None,
        }
    }

    pub fn node_drag(&self) -> Option<&NodeDrag> {
        match self {
            Interaction::NodeDragging(d) => Some(d),
            _ => None,
        }
    }

    pub fn resize(&self) -> Option<&ResizeState> {
        match self {
            Interaction::Resizing(r) => Some(r),
            _ => None,
        }
    }

    pub fn temp_connection(&self) -> Option<&TempConnection> {
        match self {
            Interaction::ConnectionDragging(t) => Some(t),
            _ => None,
        }
    }

    pub fn marquee(&self) -> Option<&Marquee> {
        match self {
            Interaction::MarqueeSelecting(m) => Some(m),
            _ => None,
        }
    }

    // take_* leave any other active state in place.

    pub(crate) fn take_node_drag(&mut self) -> Option<NodeDrag> {
        match std::mem::take(self) {
            Interaction::NodeDragging(d) => Some(d),
            other => {
                *self = other;
                None
            }
        }
    }

    pub(crate) fn take_resize(&mut self) -> Option<ResizeState> {
        match std::mem::take(self) {
            Interaction::Resizing(r) => Some(r),
            other => {
                *self = other;
                None
            }
        }
    }

    pub(crate) fn take_temp_connection(&mut self) -> Option<TempConnection> {
        match std::mem::take(self) {
            Interaction::ConnectionDragging(t) => Some(t),
            other => {
                *self = other;
                None
            }
        }
    }

    pub(crate) fn take_marquee(&mut self) -> Option<Marquee> {
        match std::mem::take(self) {
            Interaction::MarqueeSelecting(m) => Some(m),
            other => {
                *self = other;
                None
            }
        }
    }
}

impl Editor {
    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn is_canvas_locked(&self) -> bool {
        self.interaction.canvas_locked()
    }

    /// Drop a just-removed node from the active interaction. A node drag
    /// keeps going with the remaining nodes, promoting the next one when the
    /// primary went away. Resizes and connection drags anchored on the node
    /// end as cancelled.
    pub(crate) fn forget_node(&mut self, id: &NodeId) {
        let mut unhover = false;
        let ended = match &mut self.interaction {
            Interaction::Idle => None,
            Interaction::NodeDragging(drag) => {
                drag.nodes.retain(|n| n != id);
                drag.origins.remove(id);
                match drag.nodes.first() {
                    None => Some(DragKind::Node),
                    Some(next) => {
                        if drag.primary == *id {
                            debug!("drag primary {} removed, continuing with {}", id, next);
                            drag.primary = next.clone();
                        }
                        None
                    }
                }
            }
            Interaction::Resizing(r) => (r.node == *id).then_some(DragKind::Resize),
            Interaction::ConnectionDragging(t) => {
                if t.origin.node == *id {
                    Some(DragKind::Connection)
                } else {
                    if t.highlighted.as_ref().map_or(false, |h| h.node == *id) {
                        t.highlighted = None;
                        unhover = true;
                    }
                    None
                }
            }
            Interaction::MarqueeSelecting(m) => {
                m.hits.remove(id);
                None
            }
        };
        if unhover {
            self.emit(GraphEvent::PortHoverChanged { port: None });
        }
        match ended {
            None => {}
            Some(DragKind::Connection) => self.abort_connection_drag(),
            Some(kind) => {
                debug!("{:?} interaction ended: node {} removed", kind, id);
                self.interaction = Interaction::Idle;
                self.emit(GraphEvent::DragEnded { kind, ids: vec![id.clone()], cancelled: true });
            }
        }
    }

    /// Cancel whatever is in progress, restoring pre-drag state. No-op when
    /// idle.
    pub fn cancel_interaction(&mut self) {
        match self.interaction.kind() {
            None => {}
            Some(kind) => {
                debug!("cancelling active {:?} interaction", kind);
                // Each cancel only fails when its state is not active, which
                // the match above rules out.
                let _ = match kind {
                    DragKind::Node => self.cancel_node_drag(None),
                    DragKind::Resize => self.cancel_resize(),
                    DragKind::Connection => self.cancel_connection_drag(),
                    DragKind::Marquee => self.cancel_marquee(),
                };
            }
        }
    }
}
