use crate::Value;

pub fn separated_by<T, F>(
    out: &mut String,
    values: impl IntoIterator<Item = T>,
    mut f: F,
    separator: &str,
) where
    F: FnMut(&mut String, T),
{
    let mut len = out.len();
    for v in values {
        if out.len() > len {
            out.push_str(separator);
        }
        len = out.len();
        f(out, v);
    }
}

/// Longest prefix of `text` within `max` bytes that ends on a char boundary.
pub fn char_prefix(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[macro_export]
macro_rules! truncate_long {
    ($query:expr) => {
        format_args!(
            "{}{}",
            $crate::char_prefix(&$query, 497).trim_end(),
            if $query.len() > 497 { "..." } else { "" },
        )
    };
}

macro_rules! write_integer {
    ($out:ident, $value:expr) => {{
        let mut buffer = itoa::Buffer::new();
        $out.push_str(buffer.format($value));
    }};
}

macro_rules! write_float {
    ($out:ident, $value:expr) => {{
        let value = $value;
        if value.is_finite() {
            let mut buffer = ryu::Buffer::new();
            $out.push_str(buffer.format(value));
        } else {
            $out.push_str("NULL");
        }
    }};
}

/// Render a value as inline SQL text for the literal-substitution pass.
/// Strings interpolate raw, exactly as written in the template.
pub fn write_value_literal(out: &mut String, value: &Value) {
    if value.is_null() {
        out.push_str("NULL");
        return;
    }
    match value {
        Value::Boolean(Some(v)) => out.push_str(if *v { "TRUE" } else { "FALSE" }),
        Value::Int8(Some(v)) => write_integer!(out, *v),
        Value::Int16(Some(v)) => write_integer!(out, *v),
        Value::Int32(Some(v)) => write_integer!(out, *v),
        Value::Int64(Some(v)) => write_integer!(out, *v),
        Value::Float32(Some(v)) => write_float!(out, *v),
        Value::Float64(Some(v)) => write_float!(out, *v),
        Value::Decimal(Some(v)) => {
            let _ = std::fmt::Write::write_fmt(out, format_args!("{v}"));
        }
        Value::Varchar(Some(v)) => out.push_str(v),
        Value::Blob(Some(v)) => {
            out.push_str("x'");
            out.push_str(&hex::encode(v));
            out.push('\'');
        }
        Value::List(Some(items)) => {
            separated_by(out, items, |out, v| write_value_literal(out, v), ", ");
        }
        other => {
            let _ = std::fmt::Write::write_fmt(out, format_args!("{other}"));
        }
    }
}
