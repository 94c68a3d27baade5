use crate::model::NodeId;
use crate::store::GraphStore;
use std::collections::{HashMap, HashSet};

/// source -> targets, in connection order; dangling endpoints are kept so the
/// walk sees exactly what the connection list says.
fn adjacency(store: &GraphStore) -> HashMap<&NodeId, Vec<&NodeId>> {
    let mut adj: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();
    for c in store.connections() {
        adj.entry(&c.source_node).or_default().push(&c.target_node);
    }
    adj
}

fn roots<'a>(store: &'a GraphStore, adj: &HashMap<&'a NodeId, Vec<&'a NodeId>>) -> Vec<&'a NodeId> {
    let mut out: Vec<&NodeId> = store.node_ids().iter().collect();
    let known: HashSet<&NodeId> = out.iter().copied().collect();
    let mut extra: Vec<&NodeId> = adj.keys().copied().filter(|k| !known.contains(k)).collect();
    extra.sort();
    out.extend(extra);
    out
}

/// Iterative DFS from every unvisited node. `on_cycle` receives each closed
/// path (first node repeated at the end) and returns false to stop early.
fn walk<'a>(store: &'a GraphStore, mut on_cycle: impl FnMut(Vec<NodeId>) -> bool) {
    let adj = adjacency(store);
    let mut visited: HashSet<&NodeId> = HashSet::new();
    for root in roots(store, &adj) {
        if visited.contains(root) {
            continue;
        }
        // Frames of (node, next child index); `path`/`on_path` mirror the
        // recursion stack.
        let mut frames: Vec<(&NodeId, usize)> = vec![(root, 0)];
        let mut path: Vec<&NodeId> = vec![root];
        let mut on_path: HashMap<&NodeId, usize> = HashMap::from([(root, 0)]);
        visited.insert(root);
        while let Some(frame) = frames.last_mut() {
            let (node, next) = *frame;
            let children = adj.get(node).map(|v| v.as_slice()).unwrap_or(&[]);
            if next >= children.len() {
                frames.pop();
                path.pop();
                on_path.remove(node);
                continue;
            }
            frame.1 += 1;
            let child = children[next];
            if let Some(&start) = on_path.get(child) {
                let mut cycle: Vec<NodeId> = path[start..].iter().map(|n| (*n).clone()).collect();
                cycle.push(child.clone());
                if !on_cycle(cycle) {
                    return;
                }
            } else if visited.insert(child) {
                on_path.insert(child, path.len());
                path.push(child);
                frames.push((child, 0));
            }
        }
    }
}

pub fn has_cycles(store: &GraphStore) -> bool {
    let mut found = false;
    walk(store, |_| {
        found = true;
        false
    });
    found
}

/// A covering set of directed cycles, each closed by repeating its first
/// node. The same cycle can be reported more than once when several edges
/// re-enter the recursion stack at the same node.
pub fn get_cycles(store: &GraphStore) -> Vec<Vec<NodeId>> {
    let mut out = Vec::new();
    walk(store, |c| {
        out.push(c);
        true
    });
    out
}
