//! Authoritative node/connection collections plus the derived indexes that
//! keep connectivity queries O(1).
//!
//! Derived indexes are never authoritative: every one of them can be rebuilt
//! from `nodes` and `connections`, and `debug_assert_indexes` does exactly
//! that in debug builds after each connection mutation.

use crate::error::{GraphError, Result};
use crate::model::{Connection, ConnectionId, ConnectionKey, Node, NodeId, PortRef};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Debug, Default)]
pub struct GraphStore {
    nodes: HashMap<NodeId, Node>,
    node_order: Vec<NodeId>,
    connections: Vec<Connection>,
    connection_pos: HashMap<ConnectionId, usize>,

    connections_by_node: HashMap<NodeId, HashSet<ConnectionId>>,
    source_counts: HashMap<PortRef, usize>,
    target_counts: HashMap<PortRef, usize>,
    pair_counts: HashMap<ConnectionKey, usize>,

    selected_nodes: BTreeSet<NodeId>,
    selected_connections: BTreeSet<ConnectionId>,

    group_members: HashMap<NodeId, BTreeSet<NodeId>>,
    member_group: HashMap<NodeId, NodeId>,

    node_ver: u64,
    conn_ver: u64,
    selection_ver: u64,
    // (node_ver, ids sorted by z then insertion order)
    sorted_memo: RefCell<Option<(u64, Vec<NodeId>)>>,
}

fn bump_count<K: std::hash::Hash + Eq>(map: &mut HashMap<K, usize>, key: K) {
    *map.entry(key).or_insert(0) += 1;
}

fn drop_count<K: std::hash::Hash + Eq>(map: &mut HashMap<K, usize>, key: &K) {
    if let Some(c) = map.get_mut(key) {
        *c -= 1;
        if *c == 0 {
            map.remove(key);
        }
    }
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Versions

    pub fn node_version(&self) -> u64 {
        self.node_ver
    }
    pub fn connection_version(&self) -> u64 {
        self.conn_ver
    }
    pub fn selection_version(&self) -> u64 {
        self.selection_ver
    }

    // Nodes

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub(crate) fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        let n = self.nodes.get_mut(id)?;
        self.node_ver += 1;
        Some(n)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.node_order.iter().filter_map(move |id| self.nodes.get(id))
    }

    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_order
    }

    pub fn add_node(&mut self, node: Node) -> Result<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateNodeId(node.id));
        }
        if !node.is_finite() {
            return Err(GraphError::NonFinite("node geometry"));
        }
        self.node_order.push(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
        self.node_ver += 1;
        Ok(())
    }

    /// Remove a node and every connection touching it. Returns the node and
    /// the cascaded connections in list order.
    pub fn remove_node(&mut self, id: &str) -> Result<(Node, Vec<Connection>)> {
        let node = self.nodes.remove(id).ok_or_else(|| GraphError::NodeNotFound(id.into()))?;
        self.node_order.retain(|n| n.as_str() != id);

        let mut touching: Vec<ConnectionId> = self
            .connections_by_node
            .get(id)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        touching.sort_by_key(|c| self.connection_pos.get(c).copied().unwrap_or(usize::MAX));
        let mut removed = Vec::with_capacity(touching.len());
        for cid in touching {
            removed.push(self.remove_connection(cid.as_str())?);
        }

        if self.selected_nodes.remove(id) {
            self.selection_ver += 1;
        }
        if let Some(group) = self.member_group.remove(id) {
            if let Some(set) = self.group_members.get_mut(&group) {
                set.remove(id);
                if set.is_empty() {
                    self.group_members.remove(&group);
                }
            }
        }
        if let Some(members) = self.group_members.remove(id) {
            for m in members {
                self.member_group.remove(&m);
            }
        }
        self.node_ver += 1;
        Ok((node, removed))
    }

    // Connections

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Connections in insertion order.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn connection(&self, id: &str) -> Option<&Connection> {
        self.connection_pos.get(id).map(|&i| &self.connections[i])
    }

    /// Mutable access for fields outside the derived indexes (control points,
    /// lock, data). Endpoints must not be rewritten through this.
    pub(crate) fn connection_mut(&mut self, id: &str) -> Option<&mut Connection> {
        let i = *self.connection_pos.get(id)?;
        self.conn_ver += 1;
        Some(&mut self.connections[i])
    }

    pub fn contains_connection(&self, id: &str) -> bool {
        self.connection_pos.contains_key(id)
    }

    /// Insert a connection and update every derived index in the same call.
    /// Endpoint existence is not checked; dangling references are tolerated.
    pub fn add_connection(&mut self, mut conn: Connection) -> Result<()> {
        if self.connection_pos.contains_key(&conn.id) {
            return Err(GraphError::DuplicateConnectionId(conn.id));
        }
        if conn.control_points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(GraphError::NonFinite("control point"));
        }
        let id = conn.id.clone();
        self.connections_by_node.entry(conn.source_node.clone()).or_default().insert(id.clone());
        self.connections_by_node.entry(conn.target_node.clone()).or_default().insert(id.clone());
        bump_count(&mut self.source_counts, conn.source());
        bump_count(&mut self.target_counts, conn.target());
        bump_count(&mut self.pair_counts, conn.key());
        if conn.selected {
            // Selection is single-kind; an incoming selected flag wins.
            if !self.selected_nodes.is_empty() {
                self.selected_nodes.clear();
            }
            self.selected_connections.insert(id.clone());
            self.selection_ver += 1;
        }
        conn.selected = self.selected_connections.contains(&id);
        self.connection_pos.insert(id, self.connections.len());
        self.connections.push(conn);
        self.conn_ver += 1;
        self.debug_assert_indexes();
        Ok(())
    }

    /// Unchecked removal: an unknown id is caller misuse.
    pub fn remove_connection(&mut self, id: &str) -> Result<Connection> {
        let pos = self
            .connection_pos
            .remove(id)
            .ok_or_else(|| GraphError::ConnectionNotFound(id.into()))?;
        let conn = self.connections.remove(pos);
        for c in &self.connections[pos..] {
            if let Some(p) = self.connection_pos.get_mut(&c.id) {
                *p -= 1;
            }
        }
        for node in [&conn.source_node, &conn.target_node] {
            if let Some(set) = self.connections_by_node.get_mut(node) {
                set.remove(&conn.id);
                if set.is_empty() {
                    self.connections_by_node.remove(node);
                }
            }
        }
        drop_count(&mut self.source_counts, &conn.source());
        drop_count(&mut self.target_counts, &conn.target());
        drop_count(&mut self.pair_counts, &conn.key());
        if self.selected_connections.remove(&conn.id) {
            self.selection_ver += 1;
        }
        self.conn_ver += 1;
        self.debug_assert_indexes();
        Ok(conn)
    }

    /// Ids of connections touching `node`, from the node index.
    pub fn connection_ids_for_node(&self, node: &str) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self
            .connections_by_node
            .get(node)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort_by_key(|c| self.connection_pos.get(c).copied().unwrap_or(usize::MAX));
        ids
    }

    pub fn connections_for_node(&self, node: &str) -> Vec<&Connection> {
        self.connection_ids_for_node(node)
            .iter()
            .filter_map(|id| self.connection(id.as_str()))
            .collect()
    }

    /// Linear scan; prefer the count queries when only presence matters.
    pub fn connections_from_port(&self, node: &str, port: &str) -> Vec<&Connection> {
        self.connections
            .iter()
            .filter(|c| c.source_node.as_str() == node && c.source_port.as_str() == port)
            .collect()
    }

    /// Linear scan; prefer the count queries when only presence matters.
    pub fn connections_to_port(&self, node: &str, port: &str) -> Vec<&Connection> {
        self.connections
            .iter()
            .filter(|c| c.target_node.as_str() == node && c.target_port.as_str() == port)
            .collect()
    }

    /// Every connection attached to `port` at either end.
    pub fn connections_at_port(&self, port: &PortRef) -> Vec<ConnectionId> {
        self.connections_for_node(port.node.as_str())
            .into_iter()
            .filter(|c| c.source() == *port || c.target() == *port)
            .map(|c| c.id.clone())
            .collect()
    }

    pub fn outgoing_count(&self, port: &PortRef) -> usize {
        self.source_counts.get(port).copied().unwrap_or(0)
    }

    pub fn incoming_count(&self, port: &PortRef) -> usize {
        self.target_counts.get(port).copied().unwrap_or(0)
    }

    /// Connections using `port` as either endpoint, from the count indexes.
    pub fn port_connection_count(&self, port: &PortRef) -> usize {
        self.outgoing_count(port) + self.incoming_count(port)
    }

    pub fn has_outgoing_connections_from_port(&self, port: &PortRef) -> bool {
        self.source_counts.contains_key(port)
    }

    pub fn has_incoming_connections_to_port(&self, port: &PortRef) -> bool {
        self.target_counts.contains_key(port)
    }

    pub fn has_connection(&self, key: &ConnectionKey) -> bool {
        self.pair_counts.contains_key(key)
    }

    // Selection

    pub fn selected_nodes(&self) -> &BTreeSet<NodeId> {
        &self.selected_nodes
    }

    pub fn selected_connections(&self) -> &BTreeSet<ConnectionId> {
        &self.selected_connections
    }

    pub fn is_node_selected(&self, id: &str) -> bool {
        self.selected_nodes.contains(id)
    }

    pub fn is_connection_selected(&self, id: &str) -> bool {
        self.selected_connections.contains(id)
    }

    fn clear_connection_selection(&mut self) {
        let ids: Vec<ConnectionId> = std::mem::take(&mut self.selected_connections).into_iter().collect();
        for id in ids {
            if let Some(&i) = self.connection_pos.get(&id) {
                self.connections[i].selected = false;
            }
        }
    }

    /// Replace (or extend, when `additive`) the node selection. Clears any
    /// connection selection. Unknown ids are skipped. Returns whether the
    /// selection changed.
    pub fn select_nodes<'a, I>(&mut self, ids: I, additive: bool) -> bool
    where
        I: IntoIterator<Item = &'a NodeId>,
    {
        let mut next: BTreeSet<NodeId> = if additive { self.selected_nodes.clone() } else { BTreeSet::new() };
        next.extend(ids.into_iter().filter(|id| self.nodes.contains_key(*id)).cloned());
        let changed = next != self.selected_nodes || !self.selected_connections.is_empty();
        if changed {
            self.clear_connection_selection();
            self.selected_nodes = next;
            self.selection_ver += 1;
        }
        changed
    }

    pub fn deselect_node(&mut self, id: &str) -> bool {
        let changed = self.selected_nodes.remove(id);
        if changed {
            self.selection_ver += 1;
        }
        changed
    }

    /// Counterpart of [`select_nodes`](Self::select_nodes) for connections;
    /// keeps each connection's `selected` flag in sync.
    pub fn select_connections<'a, I>(&mut self, ids: I, additive: bool) -> bool
    where
        I: IntoIterator<Item = &'a ConnectionId>,
    {
        let mut next: BTreeSet<ConnectionId> =
            if additive { self.selected_connections.clone() } else { BTreeSet::new() };
        next.extend(ids.into_iter().filter(|id| self.connection_pos.contains_key(*id)).cloned());
        let changed = next != self.selected_connections || !self.selected_nodes.is_empty();
        if changed {
            self.selected_nodes.clear();
            self.clear_connection_selection();
            for id in &next {
                if let Some(&i) = self.connection_pos.get(id) {
                    self.connections[i].selected = true;
                }
            }
            self.selected_connections = next;
            self.selection_ver += 1;
        }
        changed
    }

    pub fn clear_selection(&mut self) -> bool {
        if self.selected_nodes.is_empty() && self.selected_connections.is_empty() {
            return false;
        }
        self.selected_nodes.clear();
        self.clear_connection_selection();
        self.selection_ver += 1;
        true
    }

    // Z order

    pub fn max_z(&self) -> i32 {
        self.nodes.values().map(|n| n.z_index).max().unwrap_or(0)
    }

    pub fn min_z(&self) -> i32 {
        self.nodes.values().map(|n| n.z_index).min().unwrap_or(0)
    }

    /// Raise `id` above every other node. No-op when it already is strictly on top.
    pub fn bring_to_front(&mut self, id: &str) -> Result<()> {
        let z = self.node(id).ok_or_else(|| GraphError::NodeNotFound(id.into()))?.z_index;
        let others_max = self.nodes.values().filter(|n| n.id.as_str() != id).map(|n| n.z_index).max();
        if let Some(m) = others_max {
            if m >= z {
                if let Some(n) = self.node_mut(id) {
                    n.z_index = m.saturating_add(1);
                }
            }
        }
        Ok(())
    }

    pub fn send_to_back(&mut self, id: &str) -> Result<()> {
        let z = self.node(id).ok_or_else(|| GraphError::NodeNotFound(id.into()))?.z_index;
        let others_min = self.nodes.values().filter(|n| n.id.as_str() != id).map(|n| n.z_index).min();
        if let Some(m) = others_min {
            if m <= z {
                if let Some(n) = self.node_mut(id) {
                    n.z_index = m.saturating_sub(1);
                }
            }
        }
        Ok(())
    }

    /// Node ids ordered back-to-front (ascending z, ties by insertion order).
    /// Memoised on the node version.
    pub fn sorted_node_ids(&self) -> Vec<NodeId> {
        if let Some((ver, ids)) = self.sorted_memo.borrow().as_ref() {
            if *ver == self.node_ver {
                return ids.clone();
            }
        }
        let mut ids: Vec<(i32, usize, NodeId)> = self
            .node_order
            .iter()
            .enumerate()
            .filter_map(|(i, id)| self.nodes.get(id).map(|n| (n.z_index, i, id.clone())))
            .collect();
        ids.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        let ids: Vec<NodeId> = ids.into_iter().map(|(_, _, id)| id).collect();
        *self.sorted_memo.borrow_mut() = Some((self.node_ver, ids.clone()));
        ids
    }

    // Groups

    /// Replace the member set of `group`. Members move out of any group they
    /// previously belonged to; a group cannot contain itself.
    pub fn set_group_members(&mut self, group: &str, members: &[NodeId]) -> Result<()> {
        if !self.nodes.contains_key(group) {
            return Err(GraphError::NodeNotFound(group.into()));
        }
        if let Some(missing) = members.iter().find(|m| !self.nodes.contains_key(*m)) {
            return Err(GraphError::NodeNotFound(missing.clone()));
        }
        let group_id = NodeId::from(group);
        if let Some(old) = self.group_members.remove(group) {
            for m in old {
                self.member_group.remove(&m);
            }
        }
        let mut set = BTreeSet::new();
        for m in members {
            if m.as_str() == group {
                continue;
            }
            if let Some(prev) = self.member_group.insert(m.clone(), group_id.clone()) {
                if let Some(prev_set) = self.group_members.get_mut(&prev) {
                    prev_set.remove(m);
                    if prev_set.is_empty() {
                        self.group_members.remove(&prev);
                    }
                }
            }
            set.insert(m.clone());
        }
        if !set.is_empty() {
            self.group_members.insert(group_id, set);
        }
        self.node_ver += 1;
        Ok(())
    }

    pub fn group_members(&self, group: &str) -> Vec<NodeId> {
        self.group_members.get(group).map(|s| s.iter().cloned().collect()).unwrap_or_default()
    }

    pub fn group_of(&self, node: &str) -> Option<&NodeId> {
        self.member_group.get(node)
    }

    pub fn clear(&mut self) {
        let nv = self.node_ver + 1;
        let cv = self.conn_ver + 1;
        let sv = self.selection_ver + 1;
        *self = GraphStore::default();
        self.node_ver = nv;
        self.conn_ver = cv;
        self.selection_ver = sv;
    }

    /// Rebuild every derived connection index from the connection list and
    /// compare with the maintained ones.
    pub fn indexes_consistent(&self) -> bool {
        let mut by_node: HashMap<NodeId, HashSet<ConnectionId>> = HashMap::new();
        let mut src: HashMap<PortRef, usize> = HashMap::new();
        let mut dst: HashMap<PortRef, usize> = HashMap::new();
        let mut pairs: HashMap<ConnectionKey, usize> = HashMap::new();
        for c in &self.connections {
            by_node.entry(c.source_node.clone()).or_default().insert(c.id.clone());
            by_node.entry(c.target_node.clone()).or_default().insert(c.id.clone());
            bump_count(&mut src, c.source());
            bump_count(&mut dst, c.target());
            bump_count(&mut pairs, c.key());
        }
        let positions_ok = self.connection_pos.len() == self.connections.len()
            && self.connections.iter().enumerate().all(|(i, c)| self.connection_pos.get(&c.id) == Some(&i));
        positions_ok
            && by_node == self.connections_by_node
            && src == self.source_counts
            && dst == self.target_counts
            && pairs == self.pair_counts
    }

    fn debug_assert_indexes(&self) {
        // Full rebuild is O(n); keep it to small graphs so debug test runs of
        // large fixtures stay usable.
        if cfg!(debug_assertions) && self.connections.len() <= 512 {
            debug_assert!(self.indexes_consistent(), "connection indexes drifted from the connection list");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Port;

    fn store_abc() -> GraphStore {
        let mut s = GraphStore::new();
        for id in ["a", "b", "c"] {
            s.add_node(Node::new(id, 0.0, 0.0, 100.0, 50.0).with_port(Port::input("in")).with_port(Port::output("out")))
                .unwrap();
        }
        s
    }

    #[test]
    fn counts_follow_add_and_remove() {
        let mut s = store_abc();
        s.add_connection(Connection::new("c1", ("a", "out"), ("b", "in"))).unwrap();
        s.add_connection(Connection::new("c2", ("a", "out"), ("b", "in"))).unwrap();
        let a_out = PortRef::new("a", "out");
        let b_in = PortRef::new("b", "in");
        assert_eq!(s.outgoing_count(&a_out), 2);
        assert!(s.has_incoming_connections_to_port(&b_in));
        s.remove_connection("c1").unwrap();
        assert_eq!(s.outgoing_count(&a_out), 1);
        assert!(s.has_connection(&ConnectionKey { source: a_out.clone(), target: b_in.clone() }));
        s.remove_connection("c2").unwrap();
        assert!(!s.has_outgoing_connections_from_port(&a_out));
        assert!(!s.has_connection(&ConnectionKey { source: a_out, target: b_in }));
        assert!(s.indexes_consistent());
    }

    #[test]
    fn unknown_connection_is_an_error() {
        let mut s = store_abc();
        let err = s.remove_connection("nope").unwrap_err();
        assert_eq!(err, GraphError::ConnectionNotFound("nope".into()));
        assert_eq!(err.to_string(), "Connection nope not found");
    }

    #[test]
    fn selection_is_single_kind() {
        let mut s = store_abc();
        s.add_connection(Connection::new("c1", ("a", "out"), ("b", "in"))).unwrap();
        s.select_nodes(&[NodeId::from("a"), NodeId::from("b")], false);
        assert_eq!(s.selected_nodes().len(), 2);
        s.select_connections(&[ConnectionId::from("c1")], false);
        assert!(s.selected_nodes().is_empty());
        assert!(s.connection("c1").unwrap().selected);
        s.select_nodes(&[NodeId::from("c")], false);
        assert!(s.selected_connections().is_empty());
        assert!(!s.connection("c1").unwrap().selected);
    }

    #[test]
    fn sorted_ids_follow_z() {
        let mut s = store_abc();
        assert_eq!(s.sorted_node_ids(), vec![NodeId::from("a"), NodeId::from("b"), NodeId::from("c")]);
        s.bring_to_front("a").unwrap();
        assert_eq!(s.sorted_node_ids().last(), Some(&NodeId::from("a")));
        s.send_to_back("c").unwrap();
        assert_eq!(s.sorted_node_ids().first(), Some(&NodeId::from("c")));
    }

    #[test]
    fn group_index_is_pruned_on_removal() {
        let mut s = store_abc();
        s.set_group_members("a", &[NodeId::from("b"), NodeId::from("c")]).unwrap();
        assert_eq!(s.group_of("b"), Some(&NodeId::from("a")));
        s.remove_node("b").unwrap();
        assert_eq!(s.group_members("a"), vec![NodeId::from("c")]);
        s.remove_node("a").unwrap();
        assert_eq!(s.group_of("c"), None);
    }

    #[test]
    fn moving_a_member_between_groups() {
        let mut s = store_abc();
        s.set_group_members("a", &[NodeId::from("c")]).unwrap();
        s.set_group_members("b", &[NodeId::from("c")]).unwrap();
        assert!(s.group_members("a").is_empty());
        assert_eq!(s.group_of("c"), Some(&NodeId::from("b")));
    }
}
