//! Error taxonomy for the runtime: structural ("ill-formed") errors raised at
//! build/first-use, usage errors from the caller-facing API, and runtime
//! errors captured from guards/actions/hooks/do-activities.

use crate::graph::NodeId;

/// A statechart graph that violates one of the structural invariants.
///
/// `IllFormed` errors are raised synchronously, either while the graph is
/// being built or on first `start()` of a machine whose graph has not yet
/// been validated. They never occur mid-run: once a machine starts, the
/// graph is frozen.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IllFormed {
    #[error("composite state {0:?} has no initial child")]
    MissingInitial(NodeId),

    #[error("composite state {0:?} already has an initial child")]
    DuplicateInitial(NodeId),

    #[error("pseudo-state {0:?} cannot be the source of more than one transition")]
    InitialHasMultipleOutgoing(NodeId),

    #[error("sink pseudo-state {0:?} cannot be the source of a transition")]
    SinkHasOutgoing(NodeId),

    #[error("transition from {0:?} to {1:?} crosses into a sibling orthogonal region")]
    OrthogonalRegionCrossing(NodeId, NodeId),

    #[error("history pseudo-state {0:?} must be a direct child of a non-parallel composite state")]
    HistoryUnderParallel(NodeId),

    #[error("parallel state {0:?} cannot have an initial child")]
    ParallelHasInitial(NodeId),

    #[error("parallel state {0:?} cannot have non-history pseudo-state child {1:?}")]
    IllegalParallelChild(NodeId, NodeId),

    #[error("compound transition starting at {0:?} has no transition-terminal target")]
    DeadCompoundTransition(NodeId),

    #[error("node {0:?} has a parent cycle")]
    ParentCycle(NodeId),

    #[error("pseudo-state {0:?} cannot be the source of a Timeout transition")]
    TimeoutOnPseudoState(NodeId),

    #[error("{0}")]
    Other(String),
}

/// Errors raised directly by the public API in response to caller misuse.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    #[error("start() called on a machine that is already running")]
    AlreadyStarted,

    #[error("post() cannot be called with a null event outside the internal completion path")]
    NullEvent,

    #[error("stop() called on a machine that was never started")]
    NotStarted,
}

/// Top-level error returned by fallible public operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    IllFormed(#[from] IllFormed),

    #[error(transparent)]
    Usage(#[from] UsageError),
}

pub type Result<T> = std::result::Result<T, Error>;
