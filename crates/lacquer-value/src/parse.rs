//! Literal parsing shared by the engine's term scanner and host-side
//! signature defaults.

use crate::{Value, ValueError};

/// Splits a numeric literal like `1px`, `-0.5em`, `.25` or `33%` into its
/// value and unit. Returns `None` when the text is not a number.
pub fn parse_number(text: &str) -> Option<(f64, String)> {
    let mut digits_seen = false;
    let mut dot_seen = false;
    let mut split = text.len();
    for (i, ch) in text.char_indices() {
        match ch {
            '-' | '+' if i == 0 => {}
            '0'..='9' => digits_seen = true,
            '.' if !dot_seen => dot_seen = true,
            _ => {
                split = i;
                break;
            }
        }
    }
    if !digits_seen {
        return None;
    }
    let (number, unit) = text.split_at(split);
    if !unit.is_empty() && !unit.chars().all(|c| c.is_ascii_alphabetic() || c == '%') {
        return None;
    }
    number.parse::<f64>().ok().map(|value| (value, unit.to_string()))
}

/// Parses a hex color literal: `#rgb`, `#rrggbb` or `#rrggbbaa`.
pub fn parse_hex_color(text: &str) -> Result<Value, ValueError> {
    let bad = || ValueError::InvalidColor(text.to_string());
    let digits = text.strip_prefix('#').ok_or_else(bad)?;
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(bad());
    }
    let byte = |s: &str| u8::from_str_radix(s, 16).map_err(|_| bad());
    match digits.len() {
        3 => {
            let mut channels = [0u8; 3];
            for (i, ch) in digits.chars().enumerate() {
                let repeated: String = [ch, ch].iter().collect();
                channels[i] = byte(&repeated)?;
            }
            Ok(Value::rgb(channels[0], channels[1], channels[2]))
        }
        6 | 8 => {
            let r = byte(&digits[0..2])?;
            let g = byte(&digits[2..4])?;
            let b = byte(&digits[4..6])?;
            let a = if digits.len() == 8 {
                f64::from(byte(&digits[6..8])?) / 255.0
            } else {
                1.0
            };
            Ok(Value::Color { r, g, b, a })
        }
        _ => Err(bad()),
    }
}

/// Parses a single self-contained literal: keyword, number, hex color or
/// quoted string. Bare identifiers become unquoted strings. Returns `None`
/// for anything that is not one literal (empty text, operators, calls).
pub fn parse_literal(text: &str) -> Option<Value> {
    let text = text.trim();
    match text {
        "" => return None,
        "null" => return Some(Value::Null),
        "true" => return Some(Value::Boolean(true)),
        "false" => return Some(Value::Boolean(false)),
        _ => {}
    }
    if text.starts_with('#') {
        return parse_hex_color(text).ok();
    }
    if let Some((value, unit)) = parse_number(text) {
        return Some(Value::number(value, unit));
    }
    for quote in ['"', '\''] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            let inner = &text[1..text.len() - 1];
            if !inner.contains(quote) {
                return Some(Value::string(inner));
            }
        }
    }
    if is_identifier(text) {
        return Some(Value::ident(text));
    }
    None
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '-' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
