//! Wakeup trees: the ordered set of sequences that still have to be explored from a
//! state, as used by optimal DPOR.
//!
//! The root carries no action. Every other node carries one transition, and the
//! sequence of a node is the list of actions on the path from the root to it
//! (inclusive). Children are kept in insertion order, which is the order in which
//! they get explored. Nodes live in an arena and are addressed by [`NodeId`].

use super::execution::{Execution, PartialExecution};
use crate::transition::{Aid, Transition};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct WakeupTreeNode {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    action: Option<Arc<Transition>>,
}

/// Where a sequence landed in [`WakeupTree::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertionResult {
    /// Added below the root
    Root,
    /// Added below an existing interior node
    InteriorNode,
    /// Already covered by an existing leaf; the tree is unchanged
    Leaf,
}

#[derive(Debug, Clone)]
pub struct WakeupTree {
    nodes: Vec<Option<WakeupTreeNode>>,
    free: Vec<usize>,
    live: usize,
}

impl Default for WakeupTree {
    fn default() -> Self {
        Self::new()
    }
}

impl WakeupTree {
    const ROOT: NodeId = NodeId(0);

    pub fn new() -> Self {
        WakeupTree {
            nodes: vec![Some(WakeupTreeNode {
                parent: None,
                children: Vec::new(),
                action: None,
            })],
            free: Vec::new(),
            live: 1,
        }
    }

    pub fn root(&self) -> NodeId {
        Self::ROOT
    }

    fn node(&self, id: NodeId) -> &WakeupTreeNode {
        self.nodes[id.0]
            .as_ref()
            .expect("wakeup tree node used after removal")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut WakeupTreeNode {
        self.nodes[id.0]
            .as_mut()
            .expect("wakeup tree node used after removal")
    }

    fn make_node(&mut self, parent: NodeId, action: Arc<Transition>) -> NodeId {
        let node = WakeupTreeNode {
            parent: Some(parent),
            children: Vec::new(),
            action: Some(action),
        };
        let id = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            }
        };
        self.node_mut(parent).children.push(id);
        self.live += 1;
        id
    }

    /// Whether nothing is left to explore.
    pub fn is_empty(&self) -> bool {
        self.node(Self::ROOT).children.is_empty()
    }

    /// Number of nodes, the root included.
    pub fn size(&self) -> usize {
        self.live
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.node(id).children.is_empty()
    }

    /// The action of a non-root node.
    pub fn action(&self, id: NodeId) -> &Arc<Transition> {
        self.node(id)
            .action
            .as_ref()
            .expect("the root of a wakeup tree has no action")
    }

    /// Actions on the path from the root to `id`.
    pub fn sequence(&self, id: NodeId) -> PartialExecution {
        let mut seq = Vec::new();
        let mut cur = Some(id);
        while let Some(n) = cur {
            let node = self.node(n);
            if let Some(action) = &node.action {
                seq.push(Arc::clone(action));
            }
            cur = node.parent;
        }
        seq.reverse();
        seq
    }

    /// The leftmost child of the root, explored first.
    pub fn min_single_process_node(&self) -> Option<NodeId> {
        self.node(Self::ROOT).children.first().copied()
    }

    pub fn min_single_process_actor(&self) -> Option<Aid> {
        self.min_single_process_node().map(|n| self.action(n).aid)
    }

    /// Child of the root whose action belongs to `aid`, if any.
    pub fn root_child_of_actor(&self, aid: Aid) -> Option<NodeId> {
        self.node(Self::ROOT)
            .children
            .iter()
            .copied()
            .find(|&c| self.action(c).aid == aid)
    }

    /// Actors of the children of the root.
    pub fn root_actors(&self) -> Vec<Aid> {
        self.node(Self::ROOT)
            .children
            .iter()
            .map(|&c| self.action(c).aid)
            .collect()
    }

    pub fn remove_min_single_process_subtree(&mut self) {
        if let Some(first) = self.min_single_process_node() {
            self.remove_subtree(first);
        }
    }

    /// Removes `id` and everything below it. Removing the root only clears its children.
    pub fn remove_subtree(&mut self, id: NodeId) {
        if id == Self::ROOT {
            let children = std::mem::take(&mut self.node_mut(Self::ROOT).children);
            for c in children {
                self.free_recursively(c);
            }
            return;
        }
        if let Some(parent) = self.node(id).parent {
            self.node_mut(parent).children.retain(|&c| c != id);
        }
        self.free_recursively(id);
    }

    fn free_recursively(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            if let Some(node) = self.nodes[n.0].take() {
                stack.extend(node.children);
                self.free.push(n.0);
                self.live -= 1;
            }
        }
    }

    /// Deep copy of the subtree below `id`, with `id` as the (actionless) new root.
    pub fn make_subtree_rooted_at(&self, id: NodeId) -> WakeupTree {
        let mut subtree = WakeupTree::new();
        let mut frontier = VecDeque::from([(id, subtree.root())]);
        while let Some((in_self, in_subtree)) = frontier.pop_front() {
            for &child in self.children(in_self) {
                let copy = subtree.make_node(in_subtree, Arc::clone(self.action(child)));
                frontier.push_back((child, copy));
            }
        }
        subtree
    }

    /// Nodes in post-order, children left to right, the root last.
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.live);
        let mut stack = vec![(Self::ROOT, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            stack.push((id, true));
            for &c in self.children(id).iter().rev() {
                stack.push((c, false));
            }
        }
        order
    }

    /// Adds a single-step sequence below the root.
    pub fn insert_at_root(&mut self, action: Arc<Transition>) -> NodeId {
        self.make_node(Self::ROOT, action)
    }

    /// Appends `w` as a fresh chain below `node`.
    pub fn insert_sequence_after(&mut self, node: NodeId, w: &[Arc<Transition>]) {
        let mut cur = node;
        for t in w {
            cur = self.make_node(cur, Arc::clone(t));
        }
    }

    /// Inserts `w` below the first node `v` (in post-order) such that `v ~_[E] w`.
    /// Nothing is inserted when that node is a leaf, which already covers `w`.
    pub fn insert(&mut self, w: &[Arc<Transition>]) -> InsertionResult {
        for node in self.post_order() {
            let v = self.sequence(node);
            if let Some(rest) = Execution::get_shortest_odpor_sq_subset_insertion(&v, w) {
                if node != Self::ROOT && self.is_leaf(node) {
                    trace!("the sequence is already covered by a leaf");
                    return InsertionResult::Leaf;
                }
                self.insert_sequence_after(node, &rest);
                return if node == Self::ROOT {
                    InsertionResult::Root
                } else {
                    InsertionResult::InteriorNode
                };
            }
        }
        unreachable!("the root, with an empty sequence, always accepts the insertion")
    }

    /// One line per leaf, for debugging.
    pub fn string_of_whole_tree(&self) -> String {
        let mut out = String::new();
        for node in self.post_order() {
            if node != Self::ROOT && self.is_leaf(node) {
                let seq: Vec<String> = self
                    .sequence(node)
                    .iter()
                    .map(|t| format!("{}", t.aid))
                    .collect();
                out.push_str(&format!("<{}>\n", seq.join(",")));
            }
        }
        out
    }
}
