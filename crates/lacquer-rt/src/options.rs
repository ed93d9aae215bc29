//! Host-facing render options and results.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use lacquer_engine::{OutputStyle, DEFAULT_PRECISION};

use crate::handlers::{FunctionHandler, ImporterHandler};

/// Options for one render: the engine settings plus the host callback
/// declarations the render should honor.
#[derive(Clone)]
pub struct RenderOptions {
    pub style: OutputStyle,
    /// Digits kept after the decimal point when rendering numbers.
    pub precision: usize,
    /// Emit a `/* line N, file */ ` comment above each rule.
    pub source_comments: bool,
    /// Directories searched for `@import`s the importer does not claim.
    pub include_paths: Vec<PathBuf>,
    /// Label reported for the entry input. Defaults to the file path, or
    /// `data` when rendering from a string.
    pub input_label: Option<String>,
    /// Custom functions, declared as `(signature, handler)` pairs.
    pub functions: Vec<(String, FunctionHandler)>,
    /// Importer consulted for every `@import` before the filesystem.
    pub importer: Option<ImporterHandler>,
    /// How long a worker may wait on a single callback. `None` waits
    /// forever.
    pub callback_timeout: Option<Duration>,
}

impl Default for RenderOptions {
    fn default() -> RenderOptions {
        RenderOptions {
            style: OutputStyle::default(),
            precision: DEFAULT_PRECISION,
            source_comments: false,
            include_paths: Vec::new(),
            input_label: None,
            functions: Vec::new(),
            importer: None,
            callback_timeout: None,
        }
    }
}

impl fmt::Debug for RenderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderOptions")
            .field("style", &self.style)
            .field("precision", &self.precision)
            .field("source_comments", &self.source_comments)
            .field("include_paths", &self.include_paths)
            .field("input_label", &self.input_label)
            .field("functions", &self.functions.len())
            .field("importer", &self.importer.is_some())
            .field("callback_timeout", &self.callback_timeout)
            .finish()
    }
}

/// Timing recorded around one render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderStats {
    /// Label of the entry input.
    pub entry: String,
    /// Wall-clock start, in milliseconds since the unix epoch.
    pub start_ms: u64,
    /// Wall-clock end, in milliseconds since the unix epoch.
    pub end_ms: u64,
    /// Elapsed render time in milliseconds, measured monotonically.
    pub duration_ms: u64,
}

/// A finished render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutput {
    pub css: String,
    /// Files pulled in by `@import`, deduplicated, in first-load order.
    pub included_files: Vec<PathBuf>,
    pub stats: RenderStats,
}
