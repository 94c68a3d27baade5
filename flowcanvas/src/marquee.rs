use crate::error::{GraphError, Result};
use crate::events::{DragKind, GraphEvent};
use crate::geometry::coords::GraphPoint;
use crate::interaction::{Interaction, Marquee};
use crate::model::NodeId;
use crate::spatial::{SpatialKey, SpatialKind};
use crate::Editor;
use log::debug;
use std::collections::BTreeSet;

impl Editor {
    pub fn start_marquee(&mut self, anchor: GraphPoint) -> Result<()> {
        if !anchor.x.is_finite() || !anchor.y.is_finite() {
            return Err(GraphError::NonFinite("marquee anchor"));
        }
        self.cancel_interaction();
        self.interaction = Interaction::MarqueeSelecting(Marquee { anchor, current: anchor, hits: BTreeSet::new() });
        self.emit(GraphEvent::DragStarted { kind: DragKind::Marquee, ids: Vec::new() });
        Ok(())
    }

    /// Stretch the rectangle to `point` and recompute the nodes it touches.
    pub fn update_marquee(&mut self, point: GraphPoint) -> Result<Vec<NodeId>> {
        if !point.x.is_finite() || !point.y.is_finite() {
            return Err(GraphError::NonFinite("marquee point"));
        }
        let Interaction::MarqueeSelecting(m) = &mut self.interaction else {
            return Err(GraphError::NoActiveInteraction { expected: "marquee" });
        };
        m.current = point;
        let rect = m.rect();
        m.hits = self
            .spatial
            .query_kind(&rect, SpatialKind::Node)
            .into_iter()
            .filter_map(|k| match k {
                SpatialKey::Node(id) => Some(id),
                _ => None,
            })
            .collect();
        Ok(m.hits.iter().cloned().collect())
    }

    /// Commit the hits as the node selection. With `toggle`, hits flip their
    /// membership in the existing selection instead of replacing it.
    pub fn finish_marquee(&mut self, toggle: bool) -> Result<Vec<NodeId>> {
        let Some(m) = self.interaction.take_marquee() else {
            return Err(GraphError::NoActiveInteraction { expected: "marquee" });
        };
        let next: BTreeSet<NodeId> = if toggle {
            self.store.selected_nodes().symmetric_difference(&m.hits).cloned().collect()
        } else {
            m.hits
        };
        let ids: Vec<NodeId> = next.into_iter().collect();
        let changed = self.store.select_nodes(&ids, false);
        if changed {
            self.emit(GraphEvent::SelectionChanged);
        }
        debug!("marquee selected {} nodes", ids.len());
        self.emit(GraphEvent::DragEnded { kind: DragKind::Marquee, ids: ids.clone(), cancelled: false });
        Ok(ids)
    }

    pub fn cancel_marquee(&mut self) -> Result<()> {
        if self.interaction.take_marquee().is_none() {
            return Err(GraphError::NoActiveInteraction { expected: "marquee" });
        }
        self.emit(GraphEvent::DragEnded { kind: DragKind::Marquee, ids: Vec::new(), cancelled: true });
        Ok(())
    }
}
