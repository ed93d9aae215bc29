//! CSS rendering for values.

use crate::{Separator, Value, ValueError};

/// Formats a number with at most `precision` fractional digits, trimming
/// trailing zeros the way stylesheet output expects (`1.50` -> `1.5`,
/// `2.0` -> `2`).
pub fn format_number(value: f64, precision: usize) -> String {
    let mut text = format!("{:.*}", precision, value);
    if text.contains('.') {
        while text.ends_with('0') {
            text.pop();
        }
        if text.ends_with('.') {
            text.pop();
        }
    }
    if text == "-0" {
        text = "0".to_string();
    }
    text
}

pub(crate) fn render_value(value: &Value, precision: usize) -> Result<String, ValueError> {
    let mut out = String::new();
    write_value(value, precision, &mut out)?;
    Ok(out)
}

fn write_value(value: &Value, precision: usize, out: &mut String) -> Result<(), ValueError> {
    match value {
        // Null renders to nothing; declarations whose value is empty are
        // dropped by the compiler.
        Value::Null => {}
        Value::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number { value, unit } => {
            out.push_str(&format_number(*value, precision));
            out.push_str(unit);
        }
        Value::Str { text, quoted } => {
            if *quoted {
                out.push('"');
                for ch in text.chars() {
                    if ch == '"' || ch == '\\' {
                        out.push('\\');
                    }
                    out.push(ch);
                }
                out.push('"');
            } else {
                out.push_str(text);
            }
        }
        Value::Color { r, g, b, a } => {
            if *a >= 1.0 {
                out.push_str(&format!("#{:02x}{:02x}{:02x}", r, g, b));
            } else {
                out.push_str(&format!(
                    "rgba({}, {}, {}, {})",
                    r,
                    g,
                    b,
                    format_number(*a, precision)
                ));
            }
        }
        Value::List { items, separator } => {
            let mut first = true;
            for item in items {
                if !first {
                    out.push_str(separator.as_str());
                }
                write_value(item, precision, out)?;
                first = false;
            }
        }
        Value::Map(_) => return Err(ValueError::NotRepresentable("map")),
    }
    Ok(())
}
