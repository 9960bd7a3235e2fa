//! Conversions between Lua values and host types.

use mlua::{MultiValue, Value};

/// Render a value the way Lua's `tostring` would for plain data.
pub(crate) fn display(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => format_number(*n),
        Value::String(s) => String::from_utf8_lossy(&s.as_bytes()).into_owned(),
        Value::Table(_) | Value::Function(_) | Value::Thread(_) | Value::UserData(_) => {
            format!("{}: {:p}", value.type_name(), value.to_pointer())
        }
        other => other.type_name().to_string(),
    }
}

/// Space-joined rendering of every argument, as `console.log` prints them.
pub(crate) fn join(args: &MultiValue) -> String {
    args.iter().map(display).collect::<Vec<_>>().join(" ")
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 {
        format!("{n:.1}")
    } else {
        n.to_string()
    }
}

/// Accept a byte table (`{0x48, 0x69}`), a Lua string or `nil`.
///
/// Table elements are masked to their low byte.
pub(crate) fn bytes_from_value(value: Value) -> mlua::Result<Vec<u8>> {
    match value {
        Value::Nil => Ok(Vec::new()),
        Value::String(s) => Ok(s.as_bytes().to_vec()),
        Value::Table(table) => table
            .sequence_values::<i64>()
            .map(|item| item.map(low_byte))
            .collect(),
        other => Err(mlua::Error::runtime(format!(
            "expected a byte table, got {}",
            other.type_name()
        ))),
    }
}

/// Whether `value` is a table holding only integers in `0..=255`.
pub(crate) fn is_byte_table(value: &Value) -> bool {
    let Value::Table(table) = value else {
        return false;
    };
    table
        .sequence_values::<Value>()
        .all(|item| matches!(item, Ok(Value::Integer(i)) if (0..=255).contains(&i)))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn low_byte(value: i64) -> u8 {
    (value & 0xff) as u8
}
