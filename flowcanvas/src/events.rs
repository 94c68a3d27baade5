//! Typed mutation events and the ordered listener list they are delivered to.
//!
//! Listeners are pure observers: the editor never reads anything back from
//! them, so correctness does not depend on any being registered.

use crate::geometry::coords::Viewport;
use crate::model::{ConnectionId, NodeId, PortRef};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragKind {
    Node,
    Resize,
    Connection,
    Marquee,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GraphEvent {
    NodeAdded { id: NodeId },
    NodeRemoved { id: NodeId },
    NodeResized { id: NodeId },
    ConnectionCreated { id: ConnectionId },
    ConnectionRemoved { id: ConnectionId },
    DragStarted { kind: DragKind, ids: Vec<NodeId> },
    DragEnded { kind: DragKind, ids: Vec<NodeId>, cancelled: bool },
    SelectionChanged,
    ViewportChanged { viewport: Viewport },
    PortHoverChanged { port: Option<PortRef> },
    SpatialIndexChanged { version: u64 },
    BatchStarted { reason: String },
    BatchEnded { reason: String },
}

pub trait GraphListener {
    fn on_event(&mut self, event: &GraphEvent);
}

impl<F> GraphListener for F
where
    F: FnMut(&GraphEvent),
{
    fn on_event(&mut self, event: &GraphEvent) {
        self(event)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct EventBus {
    listeners: Vec<(ListenerId, Box<dyn GraphListener>)>,
    next_id: u64,
    batch_depth: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl GraphListener + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn emit(&mut self, event: &GraphEvent) {
        for (_, l) in self.listeners.iter_mut() {
            l.on_event(event);
        }
    }

    pub fn in_batch(&self) -> bool {
        self.batch_depth > 0
    }

    /// Returns true when this call opened the outermost batch.
    pub fn begin_batch(&mut self, reason: &str) -> bool {
        self.batch_depth += 1;
        if self.batch_depth == 1 {
            self.emit(&GraphEvent::BatchStarted { reason: reason.to_string() });
            true
        } else {
            false
        }
    }

    /// Returns true when this call closed the outermost batch.
    pub fn end_batch(&mut self, reason: &str) -> bool {
        debug_assert!(self.batch_depth > 0, "end_batch without begin_batch");
        self.batch_depth = self.batch_depth.saturating_sub(1);
        if self.batch_depth == 0 {
            self.emit(&GraphEvent::BatchEnded { reason: reason.to_string() });
            true
        } else {
            false
        }
    }
}
