//! Firer / Step Engine: exits the proper state sub-path from the LCA, runs
//! the transition's action/hooks, enters the destination sub-path, and
//! enforces kind semantics (internal/local/external/entry). Expressed as
//! free functions over an explicit [`Ctx`] rather than methods on implicit
//! module-level state.

use crate::graph::{Graph, NodeId, NodeKind, TransitionId, TransitionKind};
use crate::hooks::{HookCtx, Phase};
use crate::machine::{Instance, InstanceKey, Shared};
use crate::queue::Poster;
use crate::selector::{active_states, resolve_compound};
use crate::store::HistorySnapshot;

/// Everything one firing step needs, bundled so call sites don't thread
/// six separate arguments through every helper.
pub(crate) struct Ctx<'a, E> {
    pub shared: &'a Shared<E>,
    pub instance_key: &'a InstanceKey,
    pub inst: &'a Instance,
    pub poster: &'a Poster<E>,
}

impl<'a, E> Ctx<'a, E> {
    fn graph(&self) -> &'a Graph<E> {
        &self.shared.graph
    }
}

/// Run every transition in `chain` in order, each against the optional
/// triggering event. A chain comes either from the selector (an event or
/// a completion pulse) or a single directly-armed `Timeout` transition
/// from the run loop.
pub(crate) fn fire_all<E>(ctx: &Ctx<'_, E>, chain: &[TransitionId], evt: Option<&E>)
where
    E: Clone + PartialEq + Send + 'static,
{
    for &tid in chain {
        fire_one(ctx, tid, evt);
        if ctx.inst.stopped.load(std::sync::atomic::Ordering::SeqCst) {
            break;
        }
    }
}

fn fire_one<E>(ctx: &Ctx<'_, E>, tid: TransitionId, evt: Option<&E>)
where
    E: Clone + PartialEq + Send + 'static,
{
    let graph = ctx.graph();
    let source = graph.source(tid);
    let kind = graph.transition(tid).kind;
    tracing::trace!(instance = %ctx.instance_key, ?tid, ?kind, "firing transition");

    if kind == TransitionKind::Internal {
        run_hooks_and_action(ctx, tid, evt);
        return;
    }

    let target = graph.transition(tid).target.unwrap_or(source);
    let lca = graph.lca(source, target);
    let self_loop = kind == TransitionKind::External && (source == lca || target == lca);

    let mut src_path = graph.path_to(source, lca); // [source, ..., lca]
    let mut tgt_path = graph.path_to(target, lca); // [target, ..., lca]
    tgt_path.reverse(); // [lca, ..., target]

    if self_loop {
        // Exit the outermost element of src_path: for a genuine self-loop
        // (source == target == lca) that is `source` itself, exiting and
        // (via the prepended `None` below) re-entering the LCA.
        let outermost = *src_path.last().expect("path_to always non-empty");
        exit_state(ctx, outermost);
        tgt_path.insert(0, lca); // placeholder so the walk below re-enters lca as if freshly arrived at from "no parent"
        run_hooks_and_action(ctx, tid, evt);
        enter_path(ctx, &tgt_path, true);
        return;
    }

    if src_path.len() > 1 {
        // one below the LCA — exits the whole active sub-path under it
        exit_state(ctx, src_path[src_path.len() - 2]);
    }

    run_hooks_and_action(ctx, tid, evt);
    enter_path(ctx, &tgt_path, false);
}

fn run_hooks_and_action<E>(ctx: &Ctx<'_, E>, tid: TransitionId, evt: Option<&E>) {
    let graph = ctx.graph();
    let t = graph.transition(tid);
    for hook in &t.hooks {
        let hctx = HookCtx::new(ctx.instance_key, None, None, evt, ctx.poster);
        hook(&hctx);
    }
    if let Some(action) = &t.action {
        let hctx = HookCtx::new(ctx.instance_key, Some(ctx.graph().source(tid)), None, evt, ctx.poster);
        action(&hctx);
    }
}

/// Walk `path` (starting at the LCA) downward, entering each element in
/// turn. `skip_first_parent_link` is set only for the self-loop case,
/// where the leading element is the LCA being re-entered rather than an
/// already-active ancestor whose child mapping should be (re)written.
fn enter_path<E>(ctx: &Ctx<'_, E>, path: &[NodeId], skip_first_parent_link: bool)
where
    E: Clone + PartialEq + Send + 'static,
{
    let len = path.windows(2).count();
    let mut iter = path.windows(2).enumerate();
    if path.len() == 1 {
        // Degenerate tgt_path (target == lca, e.g. a LOCAL self-transition):
        // nothing below the LCA to (re)enter.
        if skip_first_parent_link {
            enter_state(ctx, None, path[0]);
        }
        return;
    }
    while let Some((i, pair)) = iter.next() {
        let (a, b) = (pair[0], pair[1]);
        let parent = if i == 0 && skip_first_parent_link { None } else { Some(a) };
        // Every element of `path` except the last is a pass-through
        // ancestor on the way to the real target: it gets bookkeeping and
        // hooks but must NOT also resolve its own default initial child
        // (or, for a parallel state, its own regions) — the path itself
        // already says where execution is headed. Only the final element
        // gets the full, self-descending `enter_state_inner`.
        enter_state_inner(ctx, parent, b, i + 1 == len);
    }
}

/// Enter `node`, recursively descending into its default (or, for a
/// parallel state, every region's) initial configuration. `parent` is
/// `None` only when there is no real ancestor link to record (top-level
/// INIT entry, or the artificial re-entry step of an EXTERNAL self-loop).
pub(crate) fn enter_state<E>(ctx: &Ctx<'_, E>, parent: Option<NodeId>, node: NodeId)
where
    E: Clone + PartialEq + Send + 'static,
{
    enter_state_inner(ctx, parent, node, true)
}

/// `terminal = false` marks `node` as an intermediate hop on a compound
/// transition's path to a deeper target (e.g. the composite ancestor of a
/// history pseudo-state reached from outside it): bookkeeping and hooks
/// run, but the node's own default-entry resolution is skipped, since the
/// path continues explicitly rather than falling back to a resting
/// configuration.
fn enter_state_inner<E>(ctx: &Ctx<'_, E>, parent: Option<NodeId>, node: NodeId, terminal: bool)
where
    E: Clone + PartialEq + Send + 'static,
{
    let graph = ctx.graph();
    let kind = graph.node(node).kind;
    tracing::debug!(instance = %ctx.instance_key, ?node, name = ?graph.node(node).name, "entering state");

    if kind.is_history() {
        restore_history(ctx, node);
        return;
    }

    if !kind.is_pseudo() {
        if let Some(p) = parent {
            ctx.inst.store.set_active_substate(p, node);
        }
    }

    enter_node_bare(ctx, node);

    if !terminal {
        return;
    }

    match kind {
        NodeKind::State => {
            let children = graph.children(node);
            if !children.is_empty() {
                let initial = graph.node(node).initial_child.expect(
                    "build() validates every non-parallel composite has an initial child",
                );
                let target = resolve_entry_target(ctx, initial);
                enter_state(ctx, Some(node), target);
            }
        }
        NodeKind::Parallel => {
            let regions: Vec<NodeId> = graph.children(node).to_vec();
            {
                let running = ctx.inst.store.still_running(node);
                let mut running = running;
                running.extend(regions.iter().copied());
                ctx.inst.store.set_still_running(node, running);
            }
            for region in regions {
                enter_state(ctx, Some(node), region);
            }
        }
        NodeKind::Final => {
            if let Some(p) = graph.parent(node) {
                ctx.poster.post_completion(ctx.instance_key.clone(), p);
            }
        }
        NodeKind::Terminate => {
            ctx.inst.stopped.store(true, std::sync::atomic::Ordering::SeqCst);
        }
        _ => {}
    }
}

/// The per-node entry actions common to every concrete (non-pseudo, or
/// sink-pseudo) node: hooks, `mark_active`, do-activity spawn, armed
/// timers, and (for a childless, activity-less `State`) self-completion.
fn enter_node_bare<E>(ctx: &Ctx<'_, E>, node: NodeId)
where
    E: Clone + PartialEq + Send + 'static,
{
    let graph = ctx.graph();
    run_hook_list(ctx, node, Phase::PreEntry, &graph.node(node).hooks.pre_entry);

    ctx.inst.store.mark_active(node);

    let n = graph.node(node);
    if n.kind == NodeKind::State {
        if let Some(activity) = n.do_activity.clone() {
            crate::activity::spawn(ctx, node, activity);
        } else if n.children.is_empty() {
            ctx.poster.post_completion(ctx.instance_key.clone(), node);
        }
    }

    for tid in graph.transitions_from(node) {
        if let Some(delay) = graph.transition(tid).timeout_duration() {
            let handle = ctx.shared.timers.schedule(delay, ctx.instance_key.clone(), tid);
            ctx.inst.store.arm_timer(node, handle);
        }
    }

    run_hook_list(ctx, node, Phase::PostEntry, &graph.node(node).hooks.post_entry);
}

/// Exit `node`: snapshot history for any direct `History`/`DeepHistory`
/// children first (while the configuration below is still fully active),
/// then recurse into whatever is still active beneath `node` bottom-up,
/// then this node's own hooks/teardown.
pub(crate) fn exit_state<E>(ctx: &Ctx<'_, E>, node: NodeId)
where
    E: Clone + PartialEq,
{
    tracing::debug!(instance = %ctx.instance_key, ?node, "exiting state");
    save_history_snapshots(ctx, node);

    let graph = ctx.graph();
    let kind = graph.node(node).kind;
    match kind {
        NodeKind::State => {
            if let Some(child) = ctx.inst.store.active_substate(node) {
                exit_state(ctx, child);
            }
        }
        NodeKind::Parallel => {
            for region in ctx.inst.store.still_running(node) {
                exit_state(ctx, region);
            }
        }
        _ => {}
    }

    run_hook_list(ctx, node, Phase::PreExit, &ctx.graph().node(node).hooks.pre_exit);

    ctx.inst.store.stop_activity(node);
    for handle in ctx.inst.store.take_armed_timers(node) {
        ctx.shared.timers.cancel(handle);
    }

    run_hook_list(ctx, node, Phase::PostExit, &ctx.graph().node(node).hooks.post_exit);

    ctx.inst.store.mark_inactive(node);
    ctx.inst.store.clear_active_substate(node);
}

fn save_history_snapshots<E>(ctx: &Ctx<'_, E>, node: NodeId) {
    let graph = ctx.graph();
    for &child in graph.children(node) {
        match graph.node(child).kind {
            NodeKind::History => {
                if let Some(active) = ctx.inst.store.active_substate(node) {
                    ctx.inst
                        .store
                        .save_history(child, HistorySnapshot::Shallow(active));
                }
            }
            NodeKind::DeepHistory => {
                let nested = active_states(graph, &ctx.inst.store, node);
                // drop `node` itself: the snapshot is just the parent's
                // active descendants.
                let nested: Vec<NodeId> = nested.into_iter().skip(1).collect();
                if !nested.is_empty() {
                    ctx.inst
                        .store
                        .save_history(child, HistorySnapshot::Deep(nested));
                }
            }
            _ => {}
        }
    }
}

/// Resolve an `Initial`/`Junction`/`Entry`/`Exit` pseudo-state down to the
/// concrete (or `History`) node it should enter, by walking its outgoing
/// transitions as an unconditional compound chain: initial transitions
/// carry no event, so only guard-less hops are eligible — the same rule
/// [`crate::selector::resolve_compound`] applies under a
/// [`crate::queue::Pulse::Completion`] pulse. A concrete node is returned
/// unchanged.
pub(crate) fn resolve_entry_target<E: PartialEq>(ctx: &Ctx<'_, E>, node: NodeId) -> NodeId {
    let graph = ctx.graph();
    let kind = graph.node(node).kind;
    if !kind.is_pseudo() || kind.is_history() || kind.is_sink() {
        return node;
    }
    let pulse = crate::queue::Pulse::Completion {
        instance: ctx.instance_key.clone(),
        state: node,
    };
    match resolve_compound(graph, &ctx.inst.store, node, &pulse) {
        Some(chain) => {
            let last = *chain.last().expect("non-empty compound chain");
            graph.transition(last).target.unwrap_or(node)
        }
        None => node,
    }
}

/// Restore a `History`/`DeepHistory` pseudo-state on entry.
fn restore_history<E>(ctx: &Ctx<'_, E>, history_node: NodeId)
where
    E: Clone + PartialEq + Send + 'static,
{
    let graph = ctx.graph();
    let parent = graph
        .parent(history_node)
        .expect("history pseudo-states always have a parent");
    let kind = graph.node(history_node).kind;

    match ctx.inst.store.take_history(history_node) {
        Some(HistorySnapshot::Shallow(child)) if kind == NodeKind::History => {
            enter_state(ctx, Some(parent), child);
        }
        Some(HistorySnapshot::Deep(nodes)) if kind == NodeKind::DeepHistory => {
            restore_deep(ctx, &nodes);
        }
        _ => default_history_entry(ctx, history_node, parent),
    }
}

/// No snapshot yet recorded: follow the history state's own default
/// outgoing transition if it has one, else delegate to the parent's
/// ordinary default entry.
fn default_history_entry<E>(ctx: &Ctx<'_, E>, history_node: NodeId, parent: NodeId)
where
    E: Clone + PartialEq + Send + 'static,
{
    let graph = ctx.graph();
    if let Some(tid) = graph.transitions_from(history_node).next() {
        if let Some(target) = graph.transition(tid).target {
            let resolved = resolve_entry_target(ctx, target);
            enter_state(ctx, Some(parent), resolved);
            return;
        }
    }
    let initial = graph
        .node(parent)
        .initial_child
        .expect("a history state's parent is a non-parallel composite with an initial child");
    let resolved = resolve_entry_target(ctx, initial);
    enter_state(ctx, Some(parent), resolved);
}

/// Re-enter every node in a deep-history snapshot directly, in saved
/// (pre-order, parent-before-child) order, bypassing each composite's
/// normal initial-child resolution entirely: restore the top-level
/// mapping in one step, then enter each nested state in the saved order.
fn restore_deep<E>(ctx: &Ctx<'_, E>, nodes: &[NodeId])
where
    E: Clone + PartialEq + Send + 'static,
{
    let graph = ctx.graph();
    for &node in nodes {
        let parent = graph.parent(node).expect("snapshot nodes are never the root");
        let kind = graph.node(node).kind;
        if !kind.is_pseudo() {
            if graph.node(parent).kind == NodeKind::Parallel {
                let mut running = ctx.inst.store.still_running(parent);
                running.insert(node);
                ctx.inst.store.set_still_running(parent, running);
            } else {
                ctx.inst.store.set_active_substate(parent, node);
            }
        }
        enter_node_bare(ctx, node);
    }
}

fn run_hook_list<E>(ctx: &Ctx<'_, E>, node: NodeId, phase: Phase, hooks: &[crate::graph::NodeHook<E>])
where
    E: Clone + PartialEq,
{
    for hook in hooks {
        let hctx = HookCtx::new(ctx.instance_key, Some(node), Some(phase), None, ctx.poster);
        hook(&hctx);
    }
}
