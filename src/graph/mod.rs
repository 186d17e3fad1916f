//! The statechart graph: an arena of [`Node`]s connected by [`Transition`]
//! edges, backed by `petgraph`. Nodes carry parent/child/initial-child
//! structure directly (rather than deriving it from the edge set) since
//! containment and transitions are independent relations in a statechart.
//!
//! Graph nodes are immutable once built; all per-instance runtime state
//! (active substate, still-running regions, history snapshots) lives in
//! [`crate::store::InstanceStore`], keyed by [`NodeId`].

mod node;
mod transition;

pub use node::{Hooks, Node, NodeHook, NodeKind};
pub use transition::{Action, Guard, Hook, Kind as TransitionKind, Transition, Trigger};

use petgraph::graph::DiGraph;
use std::collections::HashMap;

/// Stable identity of a node in the graph arena. Indices are never reused
/// within one [`Graph`]'s lifetime (`petgraph::graph::NodeIndex` semantics).
pub type NodeId = petgraph::graph::NodeIndex;

/// Stable identity of a transition (= an edge index into the underlying graph).
pub type TransitionId = petgraph::graph::EdgeIndex;

/// The built, validated statechart. Produced by [`crate::builder::GraphBuilder::build`]
/// and never mutated afterwards.
pub struct Graph<E> {
    pub(crate) inner: DiGraph<Node<E>, Transition<E>>,
    pub(crate) root: NodeId,
}

impl<E> Graph<E> {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node<E> {
        &self.inner[id]
    }

    pub fn transition(&self, id: TransitionId) -> &Transition<E> {
        &self.inner[id]
    }

    /// The node a transition fires from. (`Transition::target` already
    /// carries the semantic destination; the source has no equivalent
    /// field on `Transition` itself since it is exactly the edge's source
    /// endpoint.)
    pub fn source(&self, id: TransitionId) -> NodeId {
        self.inner.edge_endpoints(id).expect("valid transition id").0
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.inner[id].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.inner[id].children
    }

    /// Outgoing transitions from `id`, in declaration order.
    ///
    /// `petgraph::Graph` prepends each new edge onto its source's adjacency
    /// list, so a plain `edges()` walk yields them most-recently-added
    /// first — the reverse of the builder's `add_transition` call order.
    /// The selector's scan and the junction/compound-transition walk both
    /// depend on declaration order, so this reverses that list back into
    /// insertion order once here
    /// rather than at every call site.
    pub fn transitions_from(&self, id: NodeId) -> impl Iterator<Item = TransitionId> + '_ {
        let mut edges: Vec<TransitionId> = self.inner.edges(id).map(|e| e.id()).collect();
        edges.reverse();
        edges.into_iter()
    }

    pub fn node_indices(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.inner.node_indices()
    }

    /// True if `anc` is `node` itself or a transitive parent of `node`.
    pub fn is_ancestor(&self, anc: NodeId, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(n) = cur {
            if n == anc {
                return true;
            }
            cur = self.inner[n].parent;
        }
        false
    }

    /// Least common ancestor of two nodes, found by walking both parent
    /// chains up to equal depth and then together. Runs in O(depth) given
    /// the depth assignment performed by [`Self::assign_depths`].
    pub fn lca(&self, a: NodeId, b: NodeId) -> NodeId {
        let (mut x, mut y) = (a, b);
        let mut dx = self.inner[x].depth;
        let mut dy = self.inner[y].depth;
        while dx > dy {
            x = self.inner[x].parent.expect("depth > 0 implies a parent");
            dx -= 1;
        }
        while dy > dx {
            y = self.inner[y].parent.expect("depth > 0 implies a parent");
            dy -= 1;
        }
        while x != y {
            x = self.inner[x].parent.expect("root is shared ancestor");
            y = self.inner[y].parent.expect("root is shared ancestor");
        }
        x
    }

    /// Path from `node` up to (and including) `ancestor`, ancestor last.
    pub fn path_to(&self, node: NodeId, ancestor: NodeId) -> Vec<NodeId> {
        let mut path = vec![node];
        let mut cur = node;
        while cur != ancestor {
            cur = self.inner[cur].parent.expect("ancestor must be a real ancestor");
            path.push(cur);
        }
        path
    }

    /// Depth assignment, run once before the first instance starts:
    /// depth(root) = 0, depth(child) = depth(parent) + 1.
    pub(crate) fn assign_depths(&mut self) {
        let root = self.root;
        let mut stack = vec![(root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            self.inner[id].depth = depth;
            for &child in &self.inner[id].children.clone() {
                stack.push((child, depth + 1));
            }
        }
    }

    /// Pre-order walk of the subtree rooted at `id`, used by deep-history
    /// snapshot/restore.
    pub fn preorder(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            out.push(n);
            for &child in self.inner[n].children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    pub fn name_index(&self) -> HashMap<String, NodeId> {
        self.inner
            .node_indices()
            .filter_map(|id| self.inner[id].name.clone().map(|n| (n, id)))
            .collect()
    }
}

use petgraph::visit::EdgeRef;
