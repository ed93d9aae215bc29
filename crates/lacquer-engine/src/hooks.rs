//! Host-pluggable callback slots.
//!
//! The engine itself is synchronous and thread-agnostic: while a compile is
//! running it calls straight into these traits and blocks until they return.
//! How an implementation produces its answer (direct computation, or a trip
//! to another thread) is entirely the host's business.

use std::path::PathBuf;

use lacquer_value::Value;

use crate::error::HookError;

/// Resolves `@import` urls to zero or more inputs.
pub trait ImportHook: Send + Sync {
    /// Resolves `url` as written in the source, imported from the file (or
    /// label) `from`. Every returned entry is compiled in place, in order.
    fn resolve(&self, url: &str, from: &str) -> Result<Vec<ImportEntry>, HookError>;
}

/// Supplies custom functions callable from declaration values.
pub trait FunctionHost: Send + Sync {
    /// Whether `name` is handled by the host. Unrecognized calls are passed
    /// through to the output verbatim, like any plain CSS function.
    fn recognizes(&self, name: &str) -> bool;

    /// Invokes the function. Only called when [`recognizes`] returned true
    /// for `name`.
    ///
    /// [`recognizes`]: FunctionHost::recognizes
    fn call(&self, name: &str, args: &[Value]) -> Result<Value, HookError>;
}

/// One resolved import.
///
/// - `contents` present: compile that text; `file` (when given) labels it
///   and anchors any nested imports.
/// - only `file` present: load and compile that path.
/// - neither present: fall back to the engine's own resolution of the
///   original url.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImportEntry {
    pub file: Option<PathBuf>,
    pub contents: Option<String>,
}

impl ImportEntry {
    pub fn contents(text: impl Into<String>) -> Self {
        ImportEntry { file: None, contents: Some(text.into()) }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        ImportEntry { file: Some(path.into()), contents: None }
    }

    pub fn labelled(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        ImportEntry { file: Some(path.into()), contents: Some(text.into()) }
    }
}
