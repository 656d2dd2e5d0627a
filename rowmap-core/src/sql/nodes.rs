use crate::{
    DataObject, DefaultTypeHandler, Error, Result, TypeHandler, Value,
    sql::inline::{PARAMETER_TOKEN, SUBSTITUTION_TOKEN},
};
use anyhow::Context;
use std::cmp::Ordering;

/// One node of a dynamic SQL template: literal text or a conditional tag.
#[derive(Debug, Clone)]
pub enum SqlNode {
    Text(String),
    Tag(SqlTag),
}

impl SqlNode {
    pub fn text(text: impl Into<String>) -> Self {
        SqlNode::Text(text.into())
    }
}

/// The value an inclusion predicate compares against: either a literal parsed
/// to the tested property's kind, or another property of the parameter object.
#[derive(Debug, Clone)]
pub enum Operand {
    Literal(String),
    Property(String),
}

/// Inclusion predicate of a tag. `Iterate` repeats its body once per element
/// of a list-valued property and passes only when that list is non-empty.
#[derive(Debug, Clone)]
pub enum TagCheck {
    Always,
    IsPropertyAvailable(String),
    IsNull(String),
    IsNotNull(String),
    IsEmpty(String),
    IsNotEmpty(String),
    IsEqual(String, Operand),
    IsNotEqual(String, Operand),
    IsGreaterThan(String, Operand),
    IsGreaterEqual(String, Operand),
    IsLessThan(String, Operand),
    IsLessEqual(String, Operand),
    Iterate(IterateSpec),
}

#[derive(Debug, Clone, Default)]
pub struct IterateSpec {
    /// List-valued property to iterate; `None` iterates the parameter object
    /// itself.
    pub property: Option<String>,
    pub open: String,
    pub close: String,
    pub conjunction: String,
}

/// A conditional fragment: a predicate, an optional prepended keyword, and a
/// child list rendered only when the predicate passes.
#[derive(Debug, Clone)]
pub struct SqlTag {
    pub check: TagCheck,
    pub prepend: Option<String>,
    /// Suppress the prepend of the first child tag that emits text, so a
    /// wrapping `WHERE` can absorb the leading `AND`/`OR`.
    pub remove_first_prepend: bool,
    pub children: Vec<SqlNode>,
}

impl SqlTag {
    pub fn new(check: TagCheck) -> Self {
        Self {
            check,
            prepend: None,
            remove_first_prepend: false,
            children: Vec::new(),
        }
    }

    pub fn prepend(mut self, keyword: impl Into<String>) -> Self {
        self.prepend = Some(keyword.into());
        self
    }

    pub fn remove_first_prepend(mut self) -> Self {
        self.remove_first_prepend = true;
        self
    }

    pub fn child(mut self, node: impl Into<SqlNode>) -> Self {
        self.children.push(node.into());
        self
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.child(SqlNode::text(text))
    }
}

impl From<SqlTag> for SqlNode {
    fn from(tag: SqlTag) -> Self {
        SqlNode::Tag(tag)
    }
}

/// One active `Iterate` level while rendering. `prefix` is the property as it
/// reads after any enclosing iterations were applied, so nested levels
/// compose.
struct Iteration {
    prefix: Option<String>,
    index: usize,
}

/// Flatten a template against a parameter object. The output still carries
/// `#...#` and `$...$` tokens, with iterated properties rewritten to indexed
/// form.
pub fn render(nodes: &[SqlNode], param: &DataObject) -> Result<String> {
    let mut out = String::new();
    let mut iterations = Vec::new();
    render_children(nodes, param, &mut iterations, false, &mut out)?;
    Ok(out)
}

fn render_children(
    nodes: &[SqlNode],
    param: &DataObject,
    iterations: &mut Vec<Iteration>,
    remove_first_prepend: bool,
    out: &mut String,
) -> Result<()> {
    let mut first_pending = remove_first_prepend;
    for node in nodes {
        match node {
            SqlNode::Text(text) => push_text(out, &rewrite_tokens(text, iterations)?),
            SqlNode::Tag(tag) => {
                if !check_passes(&tag.check, param, iterations)? {
                    continue;
                }
                let mut body = String::new();
                match &tag.check {
                    TagCheck::Iterate(spec) => {
                        render_iterate(tag, spec, param, iterations, &mut body)?;
                    }
                    _ => render_children(
                        &tag.children,
                        param,
                        iterations,
                        tag.remove_first_prepend,
                        &mut body,
                    )?,
                }
                // A tag whose body collapsed to whitespace contributes
                // nothing, prepend included.
                if body.trim().is_empty() {
                    continue;
                }
                if first_pending {
                    first_pending = false;
                } else if let Some(prepend) = &tag.prepend {
                    push_text(out, prepend);
                }
                push_text(out, body.trim());
            }
        }
    }
    Ok(())
}

fn render_iterate(
    tag: &SqlTag,
    spec: &IterateSpec,
    param: &DataObject,
    iterations: &mut Vec<Iteration>,
    out: &mut String,
) -> Result<()> {
    let prefix = match &spec.property {
        Some(property) => Some(rewrite_property(property, iterations)),
        None => None,
    };
    let len = iterated_len(param, prefix.as_deref())?;
    let mut body = String::new();
    for index in 0..len {
        iterations.push(Iteration {
            prefix: prefix.clone(),
            index,
        });
        let mut element = String::new();
        let rendered = render_children(&tag.children, param, iterations, false, &mut element);
        iterations.pop();
        rendered?;
        if element.trim().is_empty() {
            continue;
        }
        if !body.is_empty() {
            push_text(&mut body, &spec.conjunction);
        }
        push_text(&mut body, element.trim());
    }
    if body.is_empty() {
        return Ok(());
    }
    push_text(out, &spec.open);
    push_text(out, &body);
    push_text(out, &spec.close);
    Ok(())
}

fn push_text(out: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    if !out.is_empty() && !out.ends_with(char::is_whitespace) && !text.starts_with(char::is_whitespace)
    {
        out.push(' ');
    }
    out.push_str(text);
}

fn iterated_len(param: &DataObject, prefix: Option<&str>) -> Result<usize> {
    let target = match prefix {
        Some(property) => param.get_path(property)?,
        None => param.clone(),
    };
    match target {
        DataObject::Null => Ok(0),
        DataObject::List(items) => Ok(items.len()),
        DataObject::Scalar(Value::List(items)) => Ok(items.map_or(0, |items| items.len())),
        other => Err(Error::msg(format!(
            "Cannot iterate over {} value at `{}`",
            other.category_name(),
            prefix.unwrap_or("<parameter>"),
        ))),
    }
}

/// Apply active iterations to a property name: `items` becomes `items[2]`,
/// `items.id` becomes `items[2].id`. Already-indexed references pass through.
fn rewrite_property(property: &str, iterations: &[Iteration]) -> String {
    let mut property = property.to_string();
    for iteration in iterations {
        let indexed = match &iteration.prefix {
            Some(prefix) => {
                let tail = match property.strip_prefix(prefix.as_str()) {
                    Some(tail) => tail,
                    None => continue,
                };
                if !(tail.is_empty() || tail.starts_with('.')) {
                    continue;
                }
                format!("{}[{}]{}", prefix, iteration.index, tail)
            }
            None => match property.strip_prefix("[]") {
                Some(tail) => format!("[{}]{}", iteration.index, tail),
                None => continue,
            },
        };
        property = indexed;
    }
    property
}

/// Rewrite `#...#` and `$...$` token properties inside literal text to their
/// indexed forms. Unterminated tokens pass through untouched and fail later
/// in the inline parsing pass, which reports them.
fn rewrite_tokens(text: &str, iterations: &[Iteration]) -> Result<String> {
    if iterations.is_empty() {
        return Ok(text.to_string());
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find([PARAMETER_TOKEN, SUBSTITUTION_TOKEN]) {
        let delimiter = rest[open..]
            .chars()
            .next()
            .ok_or_else(|| Error::msg("Token scan out of bounds"))?;
        out.push_str(&rest[..=open]);
        let after = &rest[open + 1..];
        if let Some(tail) = after.strip_prefix(delimiter) {
            out.push(delimiter);
            rest = tail;
            continue;
        }
        let Some(close) = after.find(delimiter) else {
            rest = after;
            break;
        };
        let body = &after[..close];
        // Only the property part of `#prop,attr=value#` is rewritten.
        let (property, attributes) = match body.split_once(',') {
            Some((property, attributes)) => (property, Some(attributes)),
            None => (body, None),
        };
        out.push_str(&rewrite_property(property, iterations));
        if let Some(attributes) = attributes {
            out.push(',');
            out.push_str(attributes);
        }
        out.push(delimiter);
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn check_passes(
    check: &TagCheck,
    param: &DataObject,
    iterations: &[Iteration],
) -> Result<bool> {
    let resolve = |property: &str| -> Result<DataObject> {
        param.get_path(&rewrite_property(property, iterations))
    };
    match check {
        TagCheck::Always => Ok(true),
        TagCheck::IsPropertyAvailable(property) => {
            Ok(property_available(param, &rewrite_property(property, iterations)))
        }
        TagCheck::IsNull(property) => Ok(resolve(property)?.is_null()),
        TagCheck::IsNotNull(property) => Ok(!resolve(property)?.is_null()),
        TagCheck::IsEmpty(property) => Ok(is_empty(&resolve(property)?)),
        TagCheck::IsNotEmpty(property) => Ok(!is_empty(&resolve(property)?)),
        TagCheck::IsEqual(property, operand) => {
            Ok(compare(param, property, operand, iterations)? == Some(Ordering::Equal))
        }
        TagCheck::IsNotEqual(property, operand) => {
            Ok(compare(param, property, operand, iterations)? != Some(Ordering::Equal))
        }
        TagCheck::IsGreaterThan(property, operand) => {
            Ok(compare(param, property, operand, iterations)? == Some(Ordering::Greater))
        }
        TagCheck::IsGreaterEqual(property, operand) => Ok(matches!(
            compare(param, property, operand, iterations)?,
            Some(Ordering::Greater | Ordering::Equal)
        )),
        TagCheck::IsLessThan(property, operand) => {
            Ok(compare(param, property, operand, iterations)? == Some(Ordering::Less))
        }
        TagCheck::IsLessEqual(property, operand) => Ok(matches!(
            compare(param, property, operand, iterations)?,
            Some(Ordering::Less | Ordering::Equal)
        )),
        TagCheck::Iterate(spec) => {
            let prefix = spec
                .property
                .as_deref()
                .map(|property| rewrite_property(property, iterations));
            Ok(iterated_len(param, prefix.as_deref())? > 0)
        }
    }
}

fn property_available(param: &DataObject, property: &str) -> bool {
    if property.contains(['.', '[']) {
        return param.get_path(property).is_ok();
    }
    match param {
        DataObject::Map(entries) => entries.contains_key(property),
        DataObject::Document(serde_json::Value::Object(entries)) => entries.contains_key(property),
        DataObject::Bean(_) => param.get_path(property).is_ok(),
        _ => false,
    }
}

fn is_empty(object: &DataObject) -> bool {
    match object {
        DataObject::Null => true,
        DataObject::Scalar(Value::Varchar(Some(text))) => text.is_empty(),
        DataObject::Scalar(Value::List(Some(items))) => items.is_empty(),
        DataObject::Scalar(value) => value.is_null(),
        DataObject::List(items) => items.is_empty(),
        DataObject::Map(entries) => entries.is_empty(),
        DataObject::Document(serde_json::Value::Null) => true,
        DataObject::Document(serde_json::Value::String(text)) => text.is_empty(),
        DataObject::Document(serde_json::Value::Array(items)) => items.is_empty(),
        DataObject::Document(serde_json::Value::Object(entries)) => entries.is_empty(),
        _ => false,
    }
}

fn compare(
    param: &DataObject,
    property: &str,
    operand: &Operand,
    iterations: &[Iteration],
) -> Result<Option<Ordering>> {
    let lhs = param
        .get_path(&rewrite_property(property, iterations))?
        .as_value()
        .with_context(|| format!("While evaluating a comparison on `{property}`"))?;
    let rhs = match operand {
        Operand::Property(other) => param
            .get_path(&rewrite_property(other, iterations))?
            .as_value()
            .with_context(|| format!("While evaluating a comparison against `{other}`"))?,
        Operand::Literal(literal) => DefaultTypeHandler.value_of(literal, lhs.kind())?,
    };
    Ok(compare_values(&lhs, &rhs))
}

/// Order two values of comparable kinds. Integers compare widened, floats as
/// floats, everything else only within its own kind.
fn compare_values(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    if lhs.is_null() || rhs.is_null() {
        return None;
    }
    if let (Some(a), Some(b)) = (as_i64(lhs), as_i64(rhs)) {
        return Some(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (as_f64(lhs), as_f64(rhs)) {
        return a.partial_cmp(&b);
    }
    match (lhs, rhs) {
        (Value::Boolean(Some(a)), Value::Boolean(Some(b))) => Some(a.cmp(b)),
        (Value::Decimal(Some(a)), Value::Decimal(Some(b))) => Some(a.cmp(b)),
        (Value::Varchar(Some(a)), Value::Varchar(Some(b))) => Some(a.cmp(b)),
        (Value::Date(Some(a)), Value::Date(Some(b))) => Some(a.cmp(b)),
        (Value::Time(Some(a)), Value::Time(Some(b))) => Some(a.cmp(b)),
        (Value::Timestamp(Some(a)), Value::Timestamp(Some(b))) => Some(a.cmp(b)),
        (Value::Uuid(Some(a)), Value::Uuid(Some(b))) => Some(a.cmp(b)),
        _ => None,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Int8(Some(v)) => Some(i64::from(*v)),
        Value::Int16(Some(v)) => Some(i64::from(*v)),
        Value::Int32(Some(v)) => Some(i64::from(*v)),
        Value::Int64(Some(v)) => Some(*v),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Float32(Some(v)) => Some(f64::from(*v)),
        Value::Float64(Some(v)) => Some(*v),
        _ => as_i64(value).map(|v| v as f64),
    }
}
