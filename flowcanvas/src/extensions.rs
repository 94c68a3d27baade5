use crate::events::GraphEvent;
use std::collections::HashMap;

/// What an extension offers, so hosts can look extensions up by role
/// instead of by concrete type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    History,
    Minimap,
    Autosave,
    Custom(String),
}

pub trait Extension {
    fn id(&self) -> &str;
    fn capabilities(&self) -> &[Capability];
    fn on_event(&mut self, _event: &GraphEvent) {}
}

/// Registered extensions keyed by id, notified in registration order.
#[derive(Default)]
pub struct ExtensionRegistry {
    order: Vec<String>,
    entries: HashMap<String, Box<dyn Extension>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extension; replaces (and returns) any previous one with
    /// the same id, keeping its original position in the notification order.
    pub fn register(&mut self, ext: Box<dyn Extension>) -> Option<Box<dyn Extension>> {
        let id = ext.id().to_string();
        let prev = self.entries.insert(id.clone(), ext);
        if prev.is_none() {
            self.order.push(id);
        }
        prev
    }

    pub fn unregister(&mut self, id: &str) -> Option<Box<dyn Extension>> {
        let ext = self.entries.remove(id)?;
        self.order.retain(|x| x != id);
        Some(ext)
    }

    pub fn get(&self, id: &str) -> Option<&dyn Extension> {
        self.entries.get(id).map(|e| &**e)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Box<dyn Extension>> {
        self.entries.get_mut(id)
    }

    pub fn with_capability(&self, cap: &Capability) -> Vec<&str> {
        self.order
            .iter()
            .filter(|id| self.entries.get(id.as_str()).map_or(false, |e| e.capabilities().contains(cap)))
            .map(|id| id.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub(crate) fn dispatch(&mut self, event: &GraphEvent) {
        for id in &self.order {
            if let Some(ext) = self.entries.get_mut(id) {
                ext.on_event(event);
            }
        }
    }
}

/// Keeps every event it sees, up to `limit` most recent ones.
pub struct EventRecorder {
    id: String,
    caps: Vec<Capability>,
    limit: usize,
    pub events: Vec<GraphEvent>,
}

impl EventRecorder {
    pub fn new(id: impl Into<String>, limit: usize) -> Self {
        EventRecorder { id: id.into(), caps: vec![Capability::History], limit, events: Vec::new() }
    }
}

impl Extension for EventRecorder {
    fn id(&self) -> &str {
        &self.id
    }
    fn capabilities(&self) -> &[Capability] {
        &self.caps
    }
    fn on_event(&mut self, event: &GraphEvent) {
        if self.events.len() == self.limit && self.limit > 0 {
            self.events.remove(0);
        }
        if self.limit > 0 {
            self.events.push(event.clone());
        }
    }
}
