//! Programmatic graph construction and validation.
//!
//! Machines are declared with an explicit, ordinary builder API: nodes and
//! transitions are added one at a time (optionally via the `chain`
//! convenience below for wiring a simple sequence of siblings), and
//! `compose` deep-copies a previously built subtree under a fresh parent,
//! for composing or extending machine definitions out of shared pieces.

use crate::error::IllFormed;
use crate::graph::{Graph, Node, NodeId, NodeKind, Transition, TransitionId, TransitionKind};
use petgraph::graph::DiGraph;
use std::collections::HashMap;

/// Maps node ids from a source graph to their freshly minted ids in the
/// builder being composed into. Exposed so multiple `compose` calls in one
/// build can share a context and therefore only copy shared sub-structure
/// once.
#[derive(Default)]
pub struct BuildContext {
    remap: HashMap<NodeId, NodeId>,
}

pub struct GraphBuilder<E> {
    graph: DiGraph<Node<E>, Transition<E>>,
    root: Option<NodeId>,
}

impl<E> Default for GraphBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> GraphBuilder<E> {
    pub fn new() -> Self {
        GraphBuilder {
            graph: DiGraph::new(),
            root: None,
        }
    }

    pub fn add_node(&mut self, kind: NodeKind) -> NodeId {
        self.graph.add_node(Node::new(kind))
    }

    pub fn add_named_node(&mut self, kind: NodeKind, name: impl Into<String>) -> NodeId {
        let id = self.add_node(kind);
        self.graph[id].name = Some(name.into());
        id
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    /// Attach `child` under `parent`. If `initial` is set, `child` becomes
    /// `parent`'s initial substate (at most one per parent).
    pub fn set_parent(
        &mut self,
        child: NodeId,
        parent: NodeId,
        initial: bool,
    ) -> Result<(), IllFormed> {
        self.graph[child].parent = Some(parent);
        self.graph[parent].children.push(child);
        if initial {
            if self.graph[parent].initial_child.is_some() {
                return Err(IllFormed::DuplicateInitial(parent));
            }
            self.graph[parent].initial_child = Some(child);
        }
        Ok(())
    }

    pub fn add_transition(
        &mut self,
        source: NodeId,
        target: Option<NodeId>,
        kind: TransitionKind,
        trigger: crate::graph::Trigger<E>,
    ) -> TransitionId {
        let mut t = Transition::new(kind, trigger);
        t.target = target;
        let edge_target = target.unwrap_or(source);
        self.graph.add_edge(source, edge_target, t)
    }

    pub fn transition_mut(&mut self, id: TransitionId) -> &mut Transition<E> {
        self.graph.edge_weight_mut(id).expect("valid transition id")
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node<E> {
        &mut self.graph[id]
    }

    /// Chain a sequence of sibling node ids under a common `parent` by
    /// wiring an unconditional (`Trigger::Any`) external transition from
    /// each to the next, in order, given the nodes already exist and share
    /// a parent.
    pub fn chain(&mut self, parent: NodeId, nodes: &[NodeId])
    where
        E: Clone,
    {
        for pair in nodes.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            debug_assert_eq!(self.graph[a].parent, Some(parent));
            debug_assert_eq!(self.graph[b].parent, Some(parent));
            self.add_transition(a, Some(b), TransitionKind::External, crate::graph::Trigger::Any);
        }
    }

    /// Deep-copy the subtree rooted at `src_root` (within `src`) into this
    /// builder, parenting the copy under `new_parent`. Node names listed in
    /// `ignore` are skipped (along with their subtrees), for partially
    /// overriding an inherited machine definition. Returns the new id of
    /// the copied root.
    ///
    /// Requires `E: Clone` because `Trigger::Equals` holds an event value;
    /// hooks/guards/actions need no such bound since they are `Arc`-wrapped
    /// and are shared, not deep-copied.
    pub fn compose(
        &mut self,
        ctx: &mut BuildContext,
        src: &Graph<E>,
        src_root: NodeId,
        new_parent: Option<NodeId>,
        ignore: &std::collections::HashSet<String>,
    ) -> NodeId
    where
        E: Clone,
    {
        let new_root = self.copy_node_rec(ctx, src, src_root, ignore);
        if let Some(parent) = new_parent {
            let initial = src.parent(src_root).map_or(false, |p| src.node(p).initial_child == Some(src_root));
            self.set_parent(new_root, parent, initial).expect("fresh copy cannot duplicate initial");
        }
        self.copy_transitions_rec(ctx, src, src_root, ignore);
        new_root
    }

    fn copy_node_rec(
        &mut self,
        ctx: &mut BuildContext,
        src: &Graph<E>,
        id: NodeId,
        ignore: &std::collections::HashSet<String>,
    ) -> NodeId
    where
        E: Clone,
    {
        if let Some(&already) = ctx.remap.get(&id) {
            return already;
        }
        let new_id = self.graph.add_node(src.node(id).clone());
        ctx.remap.insert(id, new_id);
        let children: Vec<NodeId> = src
            .children(id)
            .iter()
            .copied()
            .filter(|c| {
                src.node(*c)
                    .name
                    .as_ref()
                    .map_or(true, |n| !ignore.contains(n))
            })
            .collect();
        self.graph[new_id].children.clear();
        self.graph[new_id].initial_child = None;
        for child in children {
            let new_child = self.copy_node_rec(ctx, src, child, ignore);
            let initial = src.node(id).initial_child == Some(child);
            self.graph[new_child].parent = Some(new_id);
            self.graph[new_id].children.push(new_child);
            if initial {
                self.graph[new_id].initial_child = Some(new_child);
            }
        }
        new_id
    }

    fn copy_transitions_rec(
        &mut self,
        ctx: &mut BuildContext,
        src: &Graph<E>,
        id: NodeId,
        ignore: &std::collections::HashSet<String>,
    ) where
        E: Clone,
    {
        let new_source = ctx.remap[&id];
        for tid in src.transitions_from(id) {
            let t = src.transition(tid);
            let new_target = t.target.and_then(|tgt| ctx.remap.get(&tgt).copied());
            // Skip transitions that would point outside the copied subtree
            // (their target was excluded via `ignore` or lies outside it).
            if t.target.is_some() && new_target.is_none() {
                continue;
            }
            let mut copy = t.clone();
            copy.target = new_target;
            let edge_target = new_target.unwrap_or(new_source);
            self.graph.add_edge(new_source, edge_target, copy);
        }
        for child in src.children(id).to_vec() {
            if ctx.remap.contains_key(&child) {
                self.copy_transitions_rec(ctx, src, child, ignore);
            }
        }
    }

    /// Validate structural invariants and, if they hold, assign depths and
    /// freeze the graph.
    pub fn build(mut self) -> Result<Graph<E>, IllFormed> {
        let root = self.root.ok_or_else(|| IllFormed::Other("graph has no root".into()))?;
        validate(&self.graph, root)?;
        let mut g = Graph {
            inner: self.graph,
            root,
        };
        g.assign_depths();
        Ok(g)
    }
}

fn validate<E>(graph: &DiGraph<Node<E>, Transition<E>>, root: NodeId) -> Result<(), IllFormed> {
    use petgraph::visit::EdgeRef;

    for id in graph.node_indices() {
        let node = &graph[id];

        if node.kind.is_composite() && !node.children.is_empty() {
            if node.kind == NodeKind::State && node.initial_child.is_none() {
                return Err(IllFormed::MissingInitial(id));
            }
        }

        if node.kind == NodeKind::Parallel {
            if node.initial_child.is_some() {
                return Err(IllFormed::ParallelHasInitial(id));
            }
            for &child in &node.children {
                let ck = graph[child].kind;
                if ck.is_pseudo() && ck != NodeKind::DeepHistory {
                    return Err(IllFormed::IllegalParallelChild(id, child));
                }
            }
        }

        if node.kind.is_sink() && graph.edges(id).next().is_some() {
            return Err(IllFormed::SinkHasOutgoing(id));
        }

        if node.kind == NodeKind::Initial && graph.edges(id).count() > 1 {
            return Err(IllFormed::InitialHasMultipleOutgoing(id));
        }

        if node.kind == NodeKind::Junction && graph.edges(id).next().is_none() {
            return Err(IllFormed::DeadCompoundTransition(id));
        }

        if node.kind.is_history() {
            if let Some(parent) = node.parent {
                if graph[parent].kind == NodeKind::Parallel {
                    return Err(IllFormed::HistoryUnderParallel(id));
                }
            }
        }

        for edge in graph.edges(id) {
            let t = edge.weight();
            if let Some(target) = t.target {
                if crosses_orthogonal_boundary(graph, id, target) {
                    return Err(IllFormed::OrthogonalRegionCrossing(id, target));
                }
            }
            if node.kind.is_pseudo() && t.timeout_duration().is_some() {
                return Err(IllFormed::TimeoutOnPseudoState(id));
            }
        }
    }

    let mut seen = std::collections::HashSet::new();
    let mut cur = Some(root);
    while let Some(n) = cur {
        if !seen.insert(n) {
            return Err(IllFormed::ParentCycle(n));
        }
        cur = graph[n].parent;
    }

    Ok(())
}

/// A transition crosses an orthogonal region boundary if its source and
/// target both descend from the same `Parallel` ancestor but through
/// different direct-child regions.
fn crosses_orthogonal_boundary<E>(
    graph: &DiGraph<Node<E>, Transition<E>>,
    source: NodeId,
    target: NodeId,
) -> bool {
    let region_root = |mut n: NodeId, ancestor: NodeId| -> Option<NodeId> {
        loop {
            let p = graph[n].parent?;
            if p == ancestor {
                return Some(n);
            }
            n = p;
        }
    };

    let mut anc = graph[source].parent;
    while let Some(a) = anc {
        if graph[a].kind == NodeKind::Parallel {
            let is_target_descendant = {
                let mut cur = Some(target);
                let mut found = false;
                while let Some(n) = cur {
                    if n == a {
                        found = true;
                        break;
                    }
                    cur = graph[n].parent;
                }
                found
            };
            if is_target_descendant {
                let rs = region_root(source, a);
                let rt = region_root(target, a);
                if rs != rt {
                    return true;
                }
            }
        }
        anc = graph[a].parent;
    }
    false
}
