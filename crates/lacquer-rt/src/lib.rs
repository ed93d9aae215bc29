//! Coordinator-thread runtime for the Lacquer compiler.
//!
//! The engine in `lacquer-engine` is blocking and knows nothing about
//! threads. This crate runs it off-thread and carries its callbacks back
//! to host code safely:
//!
//! * a [`Host`] pins one coordinator thread, accepts renders and drives a
//!   notice loop;
//! * each asynchronous render runs on its own worker thread as a job,
//!   tracked from [`JobState::Created`] to [`JobState::Completed`];
//! * when the engine hits an `@import` or a custom function, the worker
//!   stages the call on a bridge, wakes the coordinator and blocks until
//!   host code settles it, with panics, abandonment and timeouts all
//!   surfacing as ordinary errors rather than hangs.
//!
//! Handlers can settle calls inside the callback or keep a completion
//! token ([`FunctionDone`], [`ImportDone`]) and settle it later from any
//! thread. The synchronous entry points reuse the same machinery with
//! inline dispatch, so a stylesheet renders identically either way.

pub mod bridge;
pub mod error;
mod event_loop;
pub mod handlers;
pub mod host;
pub mod job;
pub mod options;
pub mod registry;

pub use bridge::{BridgeMode, CallResult, Responder};
pub use error::{BridgeFault, RenderError};
pub use handlers::{FunctionDone, FunctionHandler, HostError, ImportRequest, ImporterHandler};
pub use host::Host;
pub use job::{JobId, JobState};
pub use options::{RenderOptions, RenderOutput, RenderStats};
pub use registry::ImportDone;

// Engine types hosts deal in directly.
pub use lacquer_engine::{EngineError, ImportEntry, OutputStyle, Separator, Value};
