use thiserror::Error;

pub use lacquer_engine::EngineError;

/// Ways a bridged callback can fail to produce a host value.
///
/// Faults are posted into the waiting worker exactly like results: the
/// worker always wakes with either a value or one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeFault {
    #[error("callback is already servicing a call")]
    Overlap,

    #[error("callback deferred its completion during a synchronous render")]
    DeferredInSync,

    #[error("callback handler panicked: {0}")]
    HandlerPanicked(String),

    #[error("callback was dropped without completing")]
    Abandoned,

    #[error("callback did not complete within the configured timeout")]
    TimedOut,

    #[error("{0}")]
    Rejected(String),

    #[error("coordinator loop is no longer running")]
    LoopClosed,
}

/// Errors surfaced to render callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("failed to spawn render worker: {0}")]
    Spawn(String),

    #[error("render worker died before posting an outcome: {0}")]
    Worker(String),

    #[error("invalid function signature: {0}")]
    Signature(String),
}
