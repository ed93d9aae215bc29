use thiserror::Error;

/// A compilation failure, located in the source that produced it.
///
/// `file` is the label of the failing input: the path of the file being
/// compiled, or the caller-supplied label (conventionally `data`) when the
/// source arrived as a string. Lines and columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{file}:{line}:{column}: {message}")]
pub struct EngineError {
    pub message: String,
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl EngineError {
    pub fn new(
        message: impl Into<String>,
        file: impl Into<String>,
        line: usize,
        column: usize,
    ) -> Self {
        EngineError { message: message.into(), file: file.into(), line, column }
    }
}

/// Failure reported by a host hook. Hooks have no notion of source
/// location; the engine attaches the position of the construct that
/// triggered the call when it converts this into an [`EngineError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HookError(pub String);

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        HookError(message.into())
    }
}
