//! A serializable snapshot of a built graph's structure, for an external
//! emitter to walk and render (spec §4.1/§6's visualization interface —
//! the crate itself renders nothing, `toysm/fsm.py`'s `StateMachine.graph()`
//! / graphviz integration is explicitly out of scope). Grounded in
//! `bpmn-lite-core/src/authoring/dto.rs`'s `WorkflowGraphDto`/`NodeDto`/
//! `EdgeDto` shape: plain, `serde`-derived, id-indexed structs rather than
//! anything tied to the live arena's lifetime.

use crate::graph::{Graph, NodeKind};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeKindSummary {
    State,
    Parallel,
    Initial,
    Junction,
    History,
    DeepHistory,
    Final,
    Terminate,
    Entry,
    Exit,
}

impl From<NodeKind> for NodeKindSummary {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::State => NodeKindSummary::State,
            NodeKind::Parallel => NodeKindSummary::Parallel,
            NodeKind::Initial => NodeKindSummary::Initial,
            NodeKind::Junction => NodeKindSummary::Junction,
            NodeKind::History => NodeKindSummary::History,
            NodeKind::DeepHistory => NodeKindSummary::DeepHistory,
            NodeKind::Final => NodeKindSummary::Final,
            NodeKind::Terminate => NodeKindSummary::Terminate,
            NodeKind::Entry => NodeKindSummary::Entry,
            NodeKind::Exit => NodeKindSummary::Exit,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeSummary {
    pub id: usize,
    pub name: Option<String>,
    pub kind: NodeKindSummary,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub attrs: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeSummary {
    pub from: usize,
    pub to: usize,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphSnapshot {
    pub root: usize,
    pub nodes: Vec<NodeSummary>,
    pub edges: Vec<EdgeSummary>,
}

/// Walk the whole structure once and flatten it into a plain, serializable
/// value (spec §4.1: "node_indices(), children_of, transitions_from, and
/// label/attribute accessors sufficient for an external emitter").
pub fn snapshot<E>(graph: &Graph<E>) -> GraphSnapshot {
    let nodes = graph
        .node_indices()
        .map(|id| {
            let n = graph.node(id);
            NodeSummary {
                id: id.index(),
                name: n.name.clone(),
                kind: n.kind.into(),
                parent: n.parent.map(|p| p.index()),
                children: n.children.iter().map(|c| c.index()).collect(),
                attrs: n.attrs.clone(),
            }
        })
        .collect();

    let mut edges = Vec::new();
    for id in graph.node_indices() {
        for tid in graph.transitions_from(id) {
            let t = graph.transition(tid);
            edges.push(EdgeSummary {
                from: id.index(),
                to: t.target.unwrap_or(id).index(),
                label: t.label.clone(),
            });
        }
    }

    GraphSnapshot {
        root: graph.root().index(),
        nodes,
        edges,
    }
}
