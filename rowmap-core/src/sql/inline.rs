use crate::{
    DataObject, Error, ParameterMapping, ParameterMode, Result, TypeHandlerRegistry, ValueKind,
    write_value_literal,
};
use anyhow::Context;

/// Delimiter for bound placeholders: `#prop#` or `#prop,attr=value,...#`.
pub const PARAMETER_TOKEN: char = '#';
/// Delimiter for direct literal substitution: `$prop$`.
pub const SUBSTITUTION_TOKEN: char = '$';

/// Flattened SQL with positional placeholders plus the parameter mappings in
/// left-to-right placeholder order.
pub struct ParsedSql {
    pub sql: String,
    pub mappings: Vec<ParameterMapping>,
}

fn unterminated(delimiter: char, fragment: &str) -> Error {
    let fragment = &fragment[..fragment.len().min(40)];
    Error::msg(format!(
        "Unterminated `{delimiter}` token in SQL fragment starting at `{fragment}`"
    ))
}

/// Parse one `name,attr=value,...` descriptor into a parameter mapping.
fn parse_descriptor(body: &str, registry: &dyn TypeHandlerRegistry) -> Result<ParameterMapping> {
    let mut parts = body.split(',');
    let property = parts.next().unwrap_or_default().trim();
    if property.is_empty() {
        return Err(Error::msg(format!(
            "Empty property name in inline parameter `#{body}#`"
        )));
    }
    let mut kind = None;
    let mut column_type = None;
    let mut mode = ParameterMode::In;
    let mut null_value = None;
    let mut handler_alias = None;
    let mut numeric_scale = None;
    for attribute in parts {
        let (name, value) = attribute.split_once('=').ok_or_else(|| {
            Error::msg(format!(
                "Malformed attribute `{attribute}` in inline parameter `#{body}#` (expected name=value)"
            ))
        })?;
        let (name, value) = (name.trim(), value.trim());
        match name {
            "type" => {
                kind = Some(ValueKind::from_alias(value).ok_or_else(|| {
                    Error::msg(format!(
                        "Unknown type alias `{value}` in inline parameter `#{body}#`"
                    ))
                })?);
            }
            "columnType" => column_type = Some(value.to_string()),
            "mode" => {
                mode = ParameterMode::from_tag(value)
                    .with_context(|| format!("In inline parameter `#{body}#`"))?;
            }
            "nullValue" => null_value = Some(value.to_string()),
            "handler" => handler_alias = Some(value.to_string()),
            "numericScale" => {
                numeric_scale = Some(value.parse::<u32>().map_err(|_| {
                    Error::msg(format!(
                        "Invalid numeric scale `{value}` in inline parameter `#{body}#` \
                         (must be a non-negative integer)"
                    ))
                })?);
            }
            other => {
                return Err(Error::msg(format!(
                    "Unknown attribute `{other}` in inline parameter `#{body}#`"
                )));
            }
        }
    }
    let type_handler = match handler_alias {
        Some(alias) => registry.by_alias(&alias).ok_or_else(|| {
            Error::msg(format!(
                "Unknown type handler alias `{alias}` in inline parameter `#{body}#`"
            ))
        })?,
        None => registry.resolve(kind, column_type.as_deref()),
    };
    let mut mapping = ParameterMapping::new(property, type_handler);
    mapping.kind = kind;
    mapping.column_type = column_type;
    mapping.mode = mode;
    mapping.null_value = null_value;
    mapping.numeric_scale = numeric_scale;
    Ok(mapping)
}

/// Replace `#...#` tokens with positional placeholders, collecting their
/// mappings in placeholder order. A doubled delimiter emits one literal
/// delimiter character.
pub fn parse_inline(sql: &str, registry: &dyn TypeHandlerRegistry) -> Result<ParsedSql> {
    let mut out = String::with_capacity(sql.len());
    let mut mappings = Vec::new();
    let mut rest = sql;
    while let Some(open) = rest.find(PARAMETER_TOKEN) {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        if let Some(tail) = after.strip_prefix(PARAMETER_TOKEN) {
            out.push(PARAMETER_TOKEN);
            rest = tail;
            continue;
        }
        let close = after
            .find(PARAMETER_TOKEN)
            .ok_or_else(|| unterminated(PARAMETER_TOKEN, &rest[open..]))?;
        mappings.push(parse_descriptor(&after[..close], registry)?);
        out.push('?');
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Ok(ParsedSql { sql: out, mappings })
}

/// Interpolate `$...$` tokens as literal text from the parameter object.
/// Runs after the tag tree is fully flattened; `$$` emits one `$`.
pub fn substitute(sql: &str, param: &DataObject) -> Result<String> {
    if !sql.contains(SUBSTITUTION_TOKEN) {
        return Ok(sql.to_string());
    }
    let mut out = String::with_capacity(sql.len());
    let mut rest = sql;
    while let Some(open) = rest.find(SUBSTITUTION_TOKEN) {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        if let Some(tail) = after.strip_prefix(SUBSTITUTION_TOKEN) {
            out.push(SUBSTITUTION_TOKEN);
            rest = tail;
            continue;
        }
        let close = after
            .find(SUBSTITUTION_TOKEN)
            .ok_or_else(|| unterminated(SUBSTITUTION_TOKEN, &rest[open..]))?;
        let property = &after[..close];
        let value = param
            .get_path(property)?
            .as_value()
            .with_context(|| format!("While substituting `${property}$`"))?;
        write_value_literal(&mut out, &value);
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
