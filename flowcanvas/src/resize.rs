use crate::error::{GraphError, Result};
use crate::events::{DragKind, GraphEvent};
use crate::geometry::coords::{GraphPoint, GraphRect, GraphSize};
use crate::geometry::tolerance::MIN_NODE_SIZE;
use crate::interaction::{Interaction, ResizeState};
use crate::Editor;
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeHandle {
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl ResizeHandle {
    pub fn moves_left(self) -> bool {
        matches!(self, ResizeHandle::Left | ResizeHandle::TopLeft | ResizeHandle::BottomLeft)
    }
    pub fn moves_right(self) -> bool {
        matches!(self, ResizeHandle::Right | ResizeHandle::TopRight | ResizeHandle::BottomRight)
    }
    pub fn moves_top(self) -> bool {
        matches!(self, ResizeHandle::Top | ResizeHandle::TopLeft | ResizeHandle::TopRight)
    }
    pub fn moves_bottom(self) -> bool {
        matches!(self, ResizeHandle::Bottom | ResizeHandle::BottomLeft | ResizeHandle::BottomRight)
    }

    pub fn flip_horizontal(self) -> Self {
        match self {
            ResizeHandle::Left => ResizeHandle::Right,
            ResizeHandle::Right => ResizeHandle::Left,
            ResizeHandle::TopLeft => ResizeHandle::TopRight,
            ResizeHandle::TopRight => ResizeHandle::TopLeft,
            ResizeHandle::BottomLeft => ResizeHandle::BottomRight,
            ResizeHandle::BottomRight => ResizeHandle::BottomLeft,
            h => h,
        }
    }

    pub fn flip_vertical(self) -> Self {
        match self {
            ResizeHandle::Top => ResizeHandle::Bottom,
            ResizeHandle::Bottom => ResizeHandle::Top,
            ResizeHandle::TopLeft => ResizeHandle::BottomLeft,
            ResizeHandle::BottomLeft => ResizeHandle::TopLeft,
            ResizeHandle::TopRight => ResizeHandle::BottomRight,
            ResizeHandle::BottomRight => ResizeHandle::TopRight,
            h => h,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "top" | "n" => ResizeHandle::Top,
            "bottom" | "s" => ResizeHandle::Bottom,
            "left" | "w" => ResizeHandle::Left,
            "right" | "e" => ResizeHandle::Right,
            "top-left" | "nw" => ResizeHandle::TopLeft,
            "top-right" | "ne" => ResizeHandle::TopRight,
            "bottom-left" | "sw" => ResizeHandle::BottomLeft,
            "bottom-right" | "se" => ResizeHandle::BottomRight,
            _ => return None,
        })
    }
}

/// New bounds for a resize gesture plus the handle that is active after it.
///
/// Edges not owned by `handle` stay where they were. When the moving edge is
/// dragged past the opposite one the rect is re-normalised and the handle
/// flips, so the gesture keeps working from the other side. The result never
/// shrinks below `min` and grows away from the fixed edge when clamped.
pub fn resize_bounds(
    handle: ResizeHandle,
    original: &GraphRect,
    start: GraphPoint,
    current: GraphPoint,
    min: GraphSize,
) -> (GraphRect, ResizeHandle) {
    let dx = current.x - start.x;
    let dy = current.y - start.y;
    let (mut left, mut right) = (original.min_x(), original.max_x());
    let (mut top, mut bottom) = (original.min_y(), original.max_y());
    let mut active = handle;

    if handle.moves_left() {
        left += dx;
    }
    if handle.moves_right() {
        right += dx;
    }
    if handle.moves_top() {
        top += dy;
    }
    if handle.moves_bottom() {
        bottom += dy;
    }
    if left > right {
        std::mem::swap(&mut left, &mut right);
        active = active.flip_horizontal();
    }
    if top > bottom {
        std::mem::swap(&mut top, &mut bottom);
        active = active.flip_vertical();
    }
    if right - left < min.width {
        if active.moves_left() {
            left = right - min.width;
        } else {
            right = left + min.width;
        }
    }
    if bottom - top < min.height {
        if active.moves_top() {
            top = bottom - min.height;
        } else {
            bottom = top + min.height;
        }
    }
    (GraphRect::new(GraphPoint::new(left, top), GraphSize::new(right - left, bottom - top)), active)
}

pub trait ResizeGeometry {
    fn resize(
        &self,
        handle: ResizeHandle,
        original: &GraphRect,
        start: GraphPoint,
        current: GraphPoint,
        min: GraphSize,
    ) -> (GraphRect, ResizeHandle);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultResize;

impl ResizeGeometry for DefaultResize {
    fn resize(
        &self,
        handle: ResizeHandle,
        original: &GraphRect,
        start: GraphPoint,
        current: GraphPoint,
        min: GraphSize,
    ) -> (GraphRect, ResizeHandle) {
        resize_bounds(handle, original, start, current, min)
    }
}

impl Editor {
    pub fn start_resize(&mut self, id: &str, handle: ResizeHandle, pointer: GraphPoint) -> Result<()> {
        if !pointer.x.is_finite() || !pointer.y.is_finite() {
            return Err(GraphError::NonFinite("pointer"));
        }
        let node = self.store.node(id).ok_or_else(|| GraphError::NodeNotFound(id.into()))?;
        if !node.resizable {
            return Err(GraphError::NotResizable(id.into()));
        }
        // Cancelling first so a restore of this same node is what gets captured.
        self.cancel_interaction();
        let node = self.store.node(id).ok_or_else(|| GraphError::NodeNotFound(id.into()))?;
        let state = ResizeState {
            node: node.id.clone(),
            handle,
            active_handle: handle,
            original: node.bounds(),
            original_position: node.position,
            start_pointer: pointer,
        };
        debug!("resize started on {} via {:?}", id, handle);
        self.interaction = Interaction::Resizing(state);
        self.emit(GraphEvent::DragStarted { kind: DragKind::Resize, ids: vec![id.into()] });
        Ok(())
    }

    /// Recompute bounds for the current pointer. Returns the new bounds.
    pub fn update_resize(&mut self, pointer: GraphPoint) -> Result<GraphRect> {
        if !pointer.x.is_finite() || !pointer.y.is_finite() {
            return Err(GraphError::NonFinite("pointer"));
        }
        let Interaction::Resizing(state) = &mut self.interaction else {
            return Err(GraphError::NoActiveInteraction { expected: "resize" });
        };
        let min = GraphSize::new(MIN_NODE_SIZE, MIN_NODE_SIZE);
        let (rect, active) = self.resizer.resize(state.handle, &state.original, state.start_pointer, pointer, min);
        state.active_handle = active;
        let id = state.node.clone();
        if let Some(n) = self.store.node_mut(id.as_str()) {
            n.position = rect.origin;
            n.visual_position = rect.origin;
            n.size = rect.size;
        }
        self.mark_dirty(id.as_str());
        Ok(rect)
    }

    pub fn end_resize(&mut self) -> Result<GraphRect> {
        let Some(state) = self.interaction.take_resize() else {
            return Err(GraphError::NoActiveInteraction { expected: "resize" });
        };
        self.flush_pending();
        let bounds = self.store.node(state.node.as_str()).map_or(state.original, |n| n.bounds());
        debug!("resize ended on {}", state.node);
        self.emit(GraphEvent::NodeResized { id: state.node.clone() });
        self.emit(GraphEvent::DragEnded { kind: DragKind::Resize, ids: vec![state.node], cancelled: false });
        Ok(bounds)
    }

    /// Restore the bounds captured at start.
    pub fn cancel_resize(&mut self) -> Result<()> {
        let Some(state) = self.interaction.take_resize() else {
            return Err(GraphError::NoActiveInteraction { expected: "resize" });
        };
        if let Some(n) = self.store.node_mut(state.node.as_str()) {
            n.position = state.original_position;
            n.visual_position = state.original.origin;
            n.size = state.original.size;
        }
        self.batch("resize_cancel", |ed| {
            ed.mark_dirty(state.node.as_str());
            ed.flush_pending();
        });
        self.emit(GraphEvent::DragEnded { kind: DragKind::Resize, ids: vec![state.node], cancelled: true });
        Ok(())
    }
}
