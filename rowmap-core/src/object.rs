use crate::{BeanBox, ClassInfo, Error, Result, Value};
use anyhow::Context;
use parking_lot::Mutex;
use std::{collections::BTreeMap, fmt, sync::Arc};

/// A parameter or result object, dispatched by category rather than through
/// inheritance: bean, map, positional list, document, or a directly handled
/// scalar. `Deferred` is the explicit lazy-association cell standing in for
/// a transparent proxy.
#[derive(Debug, Clone, Default)]
pub enum DataObject {
    #[default]
    Null,
    Scalar(Value),
    Bean(BeanBox),
    Map(BTreeMap<String, DataObject>),
    List(Vec<DataObject>),
    Document(serde_json::Value),
    Deferred(Deferred),
}

/// Runs a named statement on behalf of a nested association; implemented by
/// the engine facade over the current session and connection.
pub trait StatementRunner {
    fn run_for_object(&mut self, statement_id: &str, param: DataObject) -> Result<DataObject>;
    fn run_for_list(&mut self, statement_id: &str, param: DataObject) -> Result<Vec<DataObject>>;
}

/// Deferred-value cell for a lazily loaded single-valued association.
///
/// Resolution runs the captured statement once on first access; subsequent
/// reads return the cached object. A resolved NULL is replaced by an empty
/// stand-in so callers never observe a raw null where an association object
/// is expected.
#[derive(Clone)]
pub struct Deferred(Arc<DeferredInner>);

struct DeferredInner {
    statement: String,
    param: DataObject,
    cell: Mutex<Option<DataObject>>,
}

impl Deferred {
    pub fn new(statement: impl Into<String>, param: DataObject) -> Self {
        Self(Arc::new(DeferredInner {
            statement: statement.into(),
            param,
            cell: Mutex::new(None),
        }))
    }

    pub fn statement(&self) -> &str {
        &self.0.statement
    }

    pub fn is_resolved(&self) -> bool {
        self.0.cell.lock().is_some()
    }

    pub fn get(&self, runner: &mut dyn StatementRunner) -> Result<DataObject> {
        let mut cell = self.0.cell.lock();
        if let Some(resolved) = cell.as_ref() {
            return Ok(resolved.clone());
        }
        let loaded = runner
            .run_for_object(&self.0.statement, self.0.param.clone())
            .with_context(|| {
                format!(
                    "While lazily resolving association via statement `{}`",
                    self.0.statement
                )
            })?;
        let loaded = match loaded {
            DataObject::Null => DataObject::Map(BTreeMap::new()),
            other => other,
        };
        *cell = Some(loaded.clone());
        Ok(loaded)
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("statement", &self.0.statement)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// One step of a dotted property path: a name and any number of `[i]`
/// indexes, or bare indexes applied to the object itself.
struct PathSegment<'a> {
    name: Option<&'a str>,
    indexes: Vec<usize>,
}

fn parse_segment<'a>(segment: &'a str, full_path: &str) -> Result<PathSegment<'a>> {
    let (name, mut rest) = match segment.find('[') {
        Some(open) => (&segment[..open], &segment[open..]),
        None => (segment, ""),
    };
    let mut indexes = Vec::new();
    while !rest.is_empty() {
        let Some(close) = rest.find(']') else {
            return Err(Error::msg(format!(
                "Malformed index access in property path `{full_path}` at `{segment}`"
            )));
        };
        let index: usize = rest[1..close].parse().with_context(|| {
            format!("Invalid index in property path `{full_path}` at `{segment}`")
        })?;
        indexes.push(index);
        rest = &rest[close + 1..];
        if !rest.is_empty() && !rest.starts_with('[') {
            return Err(Error::msg(format!(
                "Malformed index access in property path `{full_path}` at `{segment}`"
            )));
        }
    }
    Ok(PathSegment {
        name: (!name.is_empty()).then_some(name),
        indexes,
    })
}

impl DataObject {
    pub fn is_null(&self) -> bool {
        match self {
            DataObject::Null => true,
            DataObject::Scalar(v) => v.is_null(),
            _ => false,
        }
    }

    /// Read a property by dotted path, supporting `name[i]` and bare `[i]`
    /// element access. A null intermediate is reported with the portion of
    /// the path that resolved to it.
    pub fn get_path(&self, path: &str) -> Result<DataObject> {
        let mut current = self.clone();
        let mut consumed = String::new();
        for segment in path.split('.') {
            let parsed = parse_segment(segment, path)?;
            if let Some(name) = parsed.name {
                if current.is_null() {
                    return Err(Error::msg(format!(
                        "Property path `{path}` reads through NULL at `{consumed}`"
                    )));
                }
                current = current.get_named(name, path)?;
                if !consumed.is_empty() {
                    consumed.push('.');
                }
                consumed.push_str(name);
            }
            for index in parsed.indexes {
                current = current.get_indexed(index, path)?;
                consumed.push_str(&format!("[{index}]"));
            }
        }
        Ok(current)
    }

    /// Write a property by dotted path, creating intermediate maps for
    /// missing steps of map-typed objects.
    pub fn set_path(&mut self, path: &str, value: DataObject) -> Result<()> {
        let Some((head, rest)) = path.split_once('.') else {
            return self.set_segment(path, value, path);
        };
        let parsed = parse_segment(head, path)?;
        // Read-modify-write keeps bean accessors as the only mutation seam.
        let mut intermediate = match self.get_path(head) {
            Ok(found) if !found.is_null() => found,
            _ => {
                if parsed.indexes.is_empty() {
                    DataObject::Map(BTreeMap::new())
                } else {
                    return Err(Error::msg(format!(
                        "Property path `{path}` writes through NULL at `{head}`"
                    )));
                }
            }
        };
        intermediate.set_path(rest, value)?;
        self.set_segment(head, intermediate, path)
    }

    fn set_segment(&mut self, segment: &str, value: DataObject, full_path: &str) -> Result<()> {
        let parsed = parse_segment(segment, full_path)?;
        match (parsed.name, parsed.indexes.as_slice()) {
            (Some(name), []) => self.set_named(name, value, full_path),
            (None, [index]) => self.set_indexed(*index, value, full_path),
            (Some(name), indexes) => {
                let mut container = self.get_named(name, full_path)?;
                let (last, outer) = indexes.split_last().ok_or_else(|| {
                    Error::msg(format!("Empty property path segment in `{full_path}`"))
                })?;
                let mut target = &mut container;
                for index in outer {
                    target = target.get_indexed_mut(*index, full_path)?;
                }
                target.set_indexed(*last, value, full_path)?;
                self.set_named(name, container, full_path)
            }
            (None, indexes) => {
                let (last, outer) = indexes.split_last().ok_or_else(|| {
                    Error::msg(format!("Empty property path segment in `{full_path}`"))
                })?;
                let mut target = self;
                for index in outer {
                    target = target.get_indexed_mut(*index, full_path)?;
                }
                target.set_indexed(*last, value, full_path)
            }
        }
    }

    fn get_named(&self, name: &str, full_path: &str) -> Result<DataObject> {
        match self {
            DataObject::Bean(bean) => {
                let info = ClassInfo::for_bean(bean.as_ref())?;
                let accessor = info.property(name).ok_or_else(|| {
                    Error::msg(format!(
                        "Class `{}` has no property `{name}` (path `{full_path}`)",
                        info.name
                    ))
                })?;
                let get = accessor.get.ok_or_else(|| {
                    Error::msg(format!(
                        "Property `{name}` on class `{}` is not readable (path `{full_path}`)",
                        info.name
                    ))
                })?;
                Ok(get(bean.as_ref()))
            }
            DataObject::Map(map) => Ok(map.get(name).cloned().unwrap_or(DataObject::Null)),
            DataObject::Document(doc) => Ok(doc
                .get(name)
                .map(|v| DataObject::Document(v.clone()))
                .unwrap_or(DataObject::Null)),
            other => Err(Error::msg(format!(
                "Cannot read property `{name}` of a {} (path `{full_path}`)",
                other.category_name()
            ))),
        }
    }

    fn set_named(&mut self, name: &str, value: DataObject, full_path: &str) -> Result<()> {
        match self {
            DataObject::Bean(bean) => {
                let info = ClassInfo::for_bean(bean.as_ref())?;
                let accessor = info.property(name).ok_or_else(|| {
                    Error::msg(format!(
                        "Class `{}` has no property `{name}` (path `{full_path}`)",
                        info.name
                    ))
                })?;
                let set = accessor.set.ok_or_else(|| {
                    Error::msg(format!(
                        "Property `{name}` on class `{}` is not writable (path `{full_path}`)",
                        info.name
                    ))
                })?;
                set(bean.as_mut(), value)
            }
            DataObject::Map(map) => {
                map.insert(name.to_string(), value);
                Ok(())
            }
            DataObject::Document(doc) => {
                if doc.is_null() {
                    *doc = serde_json::Value::Object(Default::default());
                }
                let object = doc.as_object_mut().ok_or_else(|| {
                    Error::msg(format!(
                        "Cannot write property `{name}` of a non-object document (path `{full_path}`)"
                    ))
                })?;
                object.insert(name.to_string(), value.into_json()?);
                Ok(())
            }
            other => Err(Error::msg(format!(
                "Cannot write property `{name}` of a {} (path `{full_path}`)",
                other.category_name()
            ))),
        }
    }

    fn get_indexed(&self, index: usize, full_path: &str) -> Result<DataObject> {
        match self {
            DataObject::List(items) => items.get(index).cloned().ok_or_else(|| {
                Error::msg(format!(
                    "Index {index} out of bounds ({} elements) in property path `{full_path}`",
                    items.len()
                ))
            }),
            DataObject::Scalar(Value::List(Some(items))) => items
                .get(index)
                .map(|v| DataObject::Scalar(v.clone()))
                .ok_or_else(|| {
                    Error::msg(format!(
                        "Index {index} out of bounds ({} elements) in property path `{full_path}`",
                        items.len()
                    ))
                }),
            DataObject::Document(serde_json::Value::Array(items)) => items
                .get(index)
                .map(|v| DataObject::Document(v.clone()))
                .ok_or_else(|| {
                    Error::msg(format!(
                        "Index {index} out of bounds ({} elements) in property path `{full_path}`",
                        items.len()
                    ))
                }),
            other => Err(Error::msg(format!(
                "Cannot index into a {} in property path `{full_path}`",
                other.category_name()
            ))),
        }
    }

    fn get_indexed_mut(&mut self, index: usize, full_path: &str) -> Result<&mut DataObject> {
        match self {
            DataObject::List(items) => {
                let len = items.len();
                items.get_mut(index).ok_or_else(|| {
                    Error::msg(format!(
                        "Index {index} out of bounds ({len} elements) in property path `{full_path}`"
                    ))
                })
            }
            other => Err(Error::msg(format!(
                "Cannot index into a {} in property path `{full_path}`",
                other.category_name()
            ))),
        }
    }

    fn set_indexed(&mut self, index: usize, value: DataObject, full_path: &str) -> Result<()> {
        match self {
            DataObject::List(items) => {
                if index >= items.len() {
                    items.resize(index + 1, DataObject::Null);
                }
                items[index] = value;
                Ok(())
            }
            other => Err(Error::msg(format!(
                "Cannot index into a {} in property path `{full_path}`",
                other.category_name()
            ))),
        }
    }

    pub fn category_name(&self) -> &'static str {
        match self {
            DataObject::Null => "null",
            DataObject::Scalar(..) => "scalar",
            DataObject::Bean(..) => "bean",
            DataObject::Map(..) => "map",
            DataObject::List(..) => "list",
            DataObject::Document(..) => "document",
            DataObject::Deferred(..) => "deferred value",
        }
    }

    /// Collapse into a single bindable [`Value`]. Beans and unresolved
    /// deferred cells have no value form.
    pub fn as_value(&self) -> Result<Value> {
        match self {
            DataObject::Null => Ok(Value::Null),
            DataObject::Scalar(v) => Ok(v.clone()),
            DataObject::Map(map) => Ok(Value::Map(Some(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), v.as_value()?)))
                    .collect::<Result<_>>()?,
            ))),
            DataObject::List(items) => Ok(Value::List(Some(
                items.iter().map(DataObject::as_value).collect::<Result<_>>()?,
            ))),
            DataObject::Document(doc) => json_to_value(doc),
            other => Err(Error::msg(format!(
                "A {} cannot be bound as a single value",
                other.category_name()
            ))),
        }
    }

    pub fn from_value(value: Value) -> DataObject {
        match value {
            Value::Null => DataObject::Null,
            other => DataObject::Scalar(other),
        }
    }

    fn into_json(self) -> Result<serde_json::Value> {
        match self {
            DataObject::Document(doc) => Ok(doc),
            other => value_to_json(&other.as_value()?),
        }
    }
}

impl PartialEq for DataObject {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DataObject::Null, DataObject::Null) => true,
            (DataObject::Scalar(l), DataObject::Scalar(r)) => l == r,
            (DataObject::Map(l), DataObject::Map(r)) => l == r,
            (DataObject::List(l), DataObject::List(r)) => l == r,
            (DataObject::Document(l), DataObject::Document(r)) => l == r,
            _ => false,
        }
    }
}

pub fn json_to_value(json: &serde_json::Value) -> Result<Value> {
    Ok(match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(v) => Value::Boolean(Some(*v)),
        serde_json::Value::Number(v) => {
            if let Some(i) = v.as_i64() {
                Value::Int64(Some(i))
            } else if let Some(f) = v.as_f64() {
                Value::Float64(Some(f))
            } else {
                return Err(Error::msg(format!("Unrepresentable JSON number `{v}`")));
            }
        }
        serde_json::Value::String(v) => Value::Varchar(Some(v.clone())),
        serde_json::Value::Array(items) => {
            Value::List(Some(items.iter().map(json_to_value).collect::<Result<_>>()?))
        }
        serde_json::Value::Object(map) => Value::Map(Some(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), json_to_value(v)?)))
                .collect::<Result<_>>()?,
        )),
    })
}

pub fn value_to_json(value: &Value) -> Result<serde_json::Value> {
    Ok(match value {
        v if v.is_null() => serde_json::Value::Null,
        Value::Boolean(Some(v)) => serde_json::Value::Bool(*v),
        Value::Int8(Some(v)) => serde_json::Value::from(*v),
        Value::Int16(Some(v)) => serde_json::Value::from(*v),
        Value::Int32(Some(v)) => serde_json::Value::from(*v),
        Value::Int64(Some(v)) => serde_json::Value::from(*v),
        Value::Float32(Some(v)) => serde_json::Value::from(*v),
        Value::Float64(Some(v)) => serde_json::Value::from(*v),
        Value::List(Some(items)) => serde_json::Value::Array(
            items.iter().map(value_to_json).collect::<Result<_>>()?,
        ),
        Value::Map(Some(map)) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), value_to_json(v)?)))
                .collect::<Result<_>>()?,
        ),
        other => serde_json::Value::String(other.to_string()),
    })
}
