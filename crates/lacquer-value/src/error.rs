use thiserror::Error;

/// Raised when a value is read as the wrong kind or built from malformed
/// input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("value is not a number")]
    NotANumber,
    #[error("value is not a string")]
    NotAString,
    #[error("value is not a boolean")]
    NotABoolean,
    #[error("value is not a color")]
    NotAColor,
    #[error("value is not a list")]
    NotAList,
    #[error("value is not a map")]
    NotAMap,
    #[error("invalid color literal `{0}`")]
    InvalidColor(String),
    #[error("invalid number literal `{0}`")]
    InvalidNumber(String),
    #[error("a {0} is not a valid CSS value")]
    NotRepresentable(&'static str),
}
