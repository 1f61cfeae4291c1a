//! Tree Assembly
//!
//! Pure functions that turn a flat list of parent-referencing nodes into an
//! ordered forest of [`TreeNode`]s.
//!
//! # Strategy
//!
//! 1. Index nodes by id and build an adjacency list `parent_id → children`
//! 2. Sort every sibling list by `(sort, id)`
//! 3. Walk the adjacency list depth-first with an explicit stack, starting from
//!    the roots, then materialize the nested structure bottom-up
//!
//! Members of a parent cycle lose their parent edge and join the roots.
//!
//! Only the adjacency list is walked, never parent pointers, and every id is
//! visited at most once. Corrupt input (dangling parents, cycles, duplicate
//! ids) therefore still yields a finite forest in which no node appears twice.
//! Nothing here is recursive, so arbitrarily deep chains are safe.

use crate::models::{Node, NodeId, TreeNode};
use std::collections::{HashMap, HashSet};

/// Assemble every node into an ordered forest.
///
/// - Top-level nodes, nodes whose parent is absent from `nodes`, and nodes
///   that name themselves as parent become roots.
/// - Every member of a parent cycle becomes an independent root. Nodes that
///   hang off a cycle stay nested under their parent.
/// - When an id occurs more than once, the first occurrence wins.
pub fn build_tree(nodes: &[Node]) -> Vec<TreeNode> {
    assemble(nodes, false)
}

/// Like [`build_tree`], but inactive nodes are pruned together with their
/// whole subtree. Children of a pruned node are not promoted to roots.
pub fn build_active_tree(nodes: &[Node]) -> Vec<TreeNode> {
    assemble(nodes, true)
}

fn assemble(nodes: &[Node], hide_inactive: bool) -> Vec<TreeNode> {
    let mut node_map: HashMap<NodeId, &Node> = HashMap::with_capacity(nodes.len());
    let mut ordered: Vec<&Node> = Vec::with_capacity(nodes.len());
    for node in nodes {
        if !node_map.contains_key(&node.id) {
            node_map.insert(node.id, node);
            ordered.push(node);
        }
    }
    ordered.sort_by_key(|n| n.sibling_key());

    let on_cycle = cycle_members(&ordered, &node_map);

    // `ordered` is already sorted, so every sibling list comes out sorted too
    let mut roots: Vec<&Node> = Vec::new();
    let mut adjacency_list: HashMap<NodeId, Vec<&Node>> = HashMap::new();
    for &node in &ordered {
        match resolved_parent(node, &node_map) {
            Some(parent_id) if !on_cycle.contains(&node.id) => {
                adjacency_list.entry(parent_id).or_default().push(node);
            }
            _ => roots.push(node),
        }
    }

    let mut walk = Walk {
        adjacency_list: &adjacency_list,
        hide_inactive,
        visited: HashSet::with_capacity(ordered.len()),
        emitted: Vec::with_capacity(ordered.len()),
    };

    for &root in &roots {
        walk.visit_from(root);
    }

    materialize(walk.emitted)
}

/// The parent a node hangs under, if it names one other than itself that is present
fn resolved_parent(node: &Node, node_map: &HashMap<NodeId, &Node>) -> Option<NodeId> {
    node.parent_id
        .filter(|&parent_id| parent_id != node.id && node_map.contains_key(&parent_id))
}

struct Walk<'a> {
    adjacency_list: &'a HashMap<NodeId, Vec<&'a Node>>,
    hide_inactive: bool,
    visited: HashSet<NodeId>,
    /// Pre-order list of emitted nodes with the index of their emitted parent
    emitted: Vec<(&'a Node, Option<usize>)>,
}

impl<'a> Walk<'a> {
    fn visit_from(&mut self, start: &'a Node) {
        let hidden = self.hide_inactive && !start.is_active;
        let mut stack: Vec<(&'a Node, Option<usize>, bool)> = vec![(start, None, hidden)];

        while let Some((node, parent_slot, hidden)) = stack.pop() {
            if !self.visited.insert(node.id) {
                continue;
            }

            let slot = if hidden {
                None
            } else {
                self.emitted.push((node, parent_slot));
                Some(self.emitted.len() - 1)
            };

            if let Some(children) = self.adjacency_list.get(&node.id) {
                // Reverse push so the first sibling is popped first
                for &child in children.iter().rev() {
                    let child_hidden = hidden || (self.hide_inactive && !child.is_active);
                    stack.push((child, slot, child_hidden));
                }
            }
        }
    }
}

/// Ids of every node that lies on a parent cycle.
///
/// Each node has at most one parent edge, so following parents from every
/// node once, and marking finished chains, finds all cycles in linear time.
/// Nodes that merely hang off a cycle are not included.
fn cycle_members(ordered: &[&Node], node_map: &HashMap<NodeId, &Node>) -> HashSet<NodeId> {
    let mut finished: HashSet<NodeId> = HashSet::with_capacity(ordered.len());
    let mut on_cycle: HashSet<NodeId> = HashSet::new();

    for &start in ordered {
        let mut path: Vec<NodeId> = Vec::new();
        let mut on_path: HashSet<NodeId> = HashSet::new();
        let mut current = Some(start.id);

        while let Some(id) = current {
            if finished.contains(&id) {
                break;
            }
            if !on_path.insert(id) {
                // The chain came back to `id`: everything from it onwards is the cycle
                if let Some(pos) = path.iter().position(|&p| p == id) {
                    on_cycle.extend(path[pos..].iter().copied());
                }
                break;
            }
            path.push(id);
            current = node_map
                .get(&id)
                .and_then(|node| resolved_parent(node, node_map));
        }

        finished.extend(path);
    }

    on_cycle
}

/// Build nested trees from a pre-order list where each parent precedes its children
fn materialize(emitted: Vec<(&Node, Option<usize>)>) -> Vec<TreeNode> {
    let parents: Vec<Option<usize>> = emitted.iter().map(|(_, parent)| *parent).collect();
    let mut slots: Vec<Option<TreeNode>> = emitted
        .into_iter()
        .map(|(node, _)| Some(TreeNode::leaf(node.clone())))
        .collect();
    let mut roots = Vec::new();

    // Reverse pre-order: every child is finished before its parent is taken
    for index in (0..slots.len()).rev() {
        let Some(mut tree) = slots[index].take() else {
            continue;
        };
        tree.children.reverse();

        match parents[index].and_then(|p| slots.get_mut(p)).and_then(Option::as_mut) {
            Some(parent) => parent.children.push(tree),
            None => roots.push(tree),
        }
    }

    roots.reverse();
    roots
}
