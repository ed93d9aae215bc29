//! Exchange values for the lacquer engine and its host.
//!
//! Both sides of the callback boundary speak this vocabulary: the engine
//! hands argument lists to host functions as [`Value`]s and receives one
//! back, and the compiler renders any value into CSS text. Everything here
//! is plain owned data and `Send`, so handing a value to another thread is
//! a move, not a translation step.

mod error;
mod parse;
mod render;

pub use error::ValueError;
pub use parse::{parse_hex_color, parse_literal, parse_number};

/// How the items of a [`Value::List`] are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    Space,
    Comma,
}

impl Separator {
    pub fn as_str(self) -> &'static str {
        match self {
            Separator::Space => " ",
            Separator::Comma => ", ",
        }
    }
}

/// A single engine value.
///
/// `Number` keeps its unit as written (`1px`, `33%`). `Str` keeps track of
/// whether it was quoted so string values round-trip through host callbacks
/// unchanged. `Color` is 8-bit RGB with fractional alpha.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Number { value: f64, unit: String },
    Str { text: String, quoted: bool },
    Color { r: u8, g: u8, b: u8, a: f64 },
    List { items: Vec<Value>, separator: Separator },
    Map(Vec<(Value, Value)>),
}

impl Value {
    pub fn number(value: f64, unit: impl Into<String>) -> Self {
        Value::Number { value, unit: unit.into() }
    }

    /// A quoted string value.
    pub fn string(text: impl Into<String>) -> Self {
        Value::Str { text: text.into(), quoted: true }
    }

    /// An unquoted identifier-like string value.
    pub fn ident(text: impl Into<String>) -> Self {
        Value::Str { text: text.into(), quoted: false }
    }

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Value::Color { r, g, b, a: 1.0 }
    }

    pub fn space_list(items: Vec<Value>) -> Self {
        Value::List { items, separator: Separator::Space }
    }

    pub fn comma_list(items: Vec<Value>) -> Self {
        Value::List { items, separator: Separator::Comma }
    }

    /// The kind of this value, as used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Number { .. } => "number",
            Value::Str { .. } => "string",
            Value::Color { .. } => "color",
            Value::List { .. } => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn as_number(&self) -> Result<(f64, &str), ValueError> {
        match self {
            Value::Number { value, unit } => Ok((*value, unit.as_str())),
            _ => Err(ValueError::NotANumber),
        }
    }

    pub fn as_str(&self) -> Result<&str, ValueError> {
        match self {
            Value::Str { text, .. } => Ok(text.as_str()),
            _ => Err(ValueError::NotAString),
        }
    }

    pub fn as_boolean(&self) -> Result<bool, ValueError> {
        match self {
            Value::Boolean(b) => Ok(*b),
            _ => Err(ValueError::NotABoolean),
        }
    }

    pub fn as_color(&self) -> Result<(u8, u8, u8, f64), ValueError> {
        match self {
            Value::Color { r, g, b, a } => Ok((*r, *g, *b, *a)),
            _ => Err(ValueError::NotAColor),
        }
    }

    pub fn as_list(&self) -> Result<&[Value], ValueError> {
        match self {
            Value::List { items, .. } => Ok(items.as_slice()),
            _ => Err(ValueError::NotAList),
        }
    }

    pub fn as_map(&self) -> Result<&[(Value, Value)], ValueError> {
        match self {
            Value::Map(pairs) => Ok(pairs.as_slice()),
            _ => Err(ValueError::NotAMap),
        }
    }

    /// Renders this value as CSS text, formatting numbers with at most
    /// `precision` fractional digits. Maps have no CSS form and fail.
    pub fn to_css(&self, precision: usize) -> Result<String, ValueError> {
        render::render_value(self, precision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors_match_kinds() -> Result<(), ValueError> {
        let n = Value::number(1.5, "px");
        assert_eq!(n.as_number()?, (1.5, "px"));
        assert_eq!(n.as_str(), Err(ValueError::NotAString));

        let s = Value::string("hello");
        assert_eq!(s.as_str()?, "hello");
        assert_eq!(s.as_number(), Err(ValueError::NotANumber));

        let c = Value::rgb(255, 0, 16);
        assert_eq!(c.as_color()?, (255, 0, 16, 1.0));
        Ok(())
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(Value::Null.kind(), "null");
        assert_eq!(Value::Map(vec![]).kind(), "map");
        assert_eq!(Value::space_list(vec![]).kind(), "list");
    }

    #[test]
    fn test_quoted_and_unquoted_strings_differ() {
        assert_ne!(Value::string("a"), Value::ident("a"));
        assert_eq!(Value::string("a").as_str(), Value::ident("a").as_str());
    }
}
