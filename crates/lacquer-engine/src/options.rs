use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::hooks::{FunctionHost, ImportHook};

/// Default number of fractional digits in rendered numbers.
pub const DEFAULT_PRECISION: usize = 5;

/// Output formatting for compiled CSS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputStyle {
    #[default]
    Nested,
    Expanded,
    Compact,
    Compressed,
}

impl OutputStyle {
    /// Parses the conventional lowercase style names host option layers use.
    pub fn from_name(name: &str) -> Option<OutputStyle> {
        match name {
            "nested" => Some(OutputStyle::Nested),
            "expanded" => Some(OutputStyle::Expanded),
            "compact" => Some(OutputStyle::Compact),
            "compressed" => Some(OutputStyle::Compressed),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            OutputStyle::Nested => "nested",
            OutputStyle::Expanded => "expanded",
            OutputStyle::Compact => "compact",
            OutputStyle::Compressed => "compressed",
        }
    }
}

/// Per-compile configuration.
///
/// `input_label` names string input in diagnostics and import requests
/// (file input is labelled by its path instead). The two hook slots are the
/// host's windows into the compile; how they answer is up to the host.
#[derive(Clone)]
pub struct EngineOptions {
    pub style: OutputStyle,
    pub precision: usize,
    pub source_comments: bool,
    pub include_paths: Vec<PathBuf>,
    pub input_label: String,
    pub functions: Option<Arc<dyn FunctionHost>>,
    pub importer: Option<Arc<dyn ImportHook>>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            style: OutputStyle::default(),
            precision: DEFAULT_PRECISION,
            source_comments: false,
            include_paths: Vec::new(),
            input_label: "data".to_string(),
            functions: None,
            importer: None,
        }
    }
}

impl fmt::Debug for EngineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineOptions")
            .field("style", &self.style)
            .field("precision", &self.precision)
            .field("source_comments", &self.source_comments)
            .field("include_paths", &self.include_paths)
            .field("input_label", &self.input_label)
            .field("functions", &self.functions.is_some())
            .field("importer", &self.importer.is_some())
            .finish()
    }
}
