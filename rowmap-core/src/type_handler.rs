use crate::{Error, Result, Value, ValueKind};
use rust_decimal::Decimal;
use std::{fmt::Debug, str::FromStr, sync::Arc};
use uuid::Uuid;

/// Converts one column value to/from a property's semantic type. The engine
/// calls handlers at the parameter-binding and row-mapping seams; per-type
/// conversion rules live with the registry supplied by the configuration
/// layer, not here.
pub trait TypeHandler: Send + Sync + Debug {
    /// Property value, ready to bind into a statement slot.
    fn to_column(&self, value: Value, kind: Option<ValueKind>) -> Result<Value>;
    /// Column value, converted for assignment to a property.
    fn to_property(&self, value: Value, kind: Option<ValueKind>) -> Result<Value>;
    /// Parse a literal (e.g. a null-value sentinel) into a comparable value.
    fn value_of(&self, literal: &str, kind: Option<ValueKind>) -> Result<Value>;
}

/// Resolves the handler for a declared kind and external type tag. Supplied
/// fully built by the configuration layer; the default resolves everything
/// to the pass-through handler.
pub trait TypeHandlerRegistry: Send + Sync {
    fn resolve(&self, kind: Option<ValueKind>, column_type: Option<&str>) -> Arc<dyn TypeHandler>;
    fn by_alias(&self, alias: &str) -> Option<Arc<dyn TypeHandler>>;
}

/// Pass-through handler: values cross the boundary unchanged apart from
/// widening to the declared kind where that is lossless.
#[derive(Debug, Default)]
pub struct DefaultTypeHandler;

fn widen(value: Value, kind: ValueKind) -> Value {
    let widened = match (&value, kind) {
        (Value::Int8(Some(v)), ValueKind::Int16) => Value::Int16(Some(*v as i16)),
        (Value::Int8(Some(v)), ValueKind::Int32) => Value::Int32(Some(*v as i32)),
        (Value::Int16(Some(v)), ValueKind::Int32) => Value::Int32(Some(*v as i32)),
        (Value::Int8(Some(v)), ValueKind::Int64) => Value::Int64(Some(*v as i64)),
        (Value::Int16(Some(v)), ValueKind::Int64) => Value::Int64(Some(*v as i64)),
        (Value::Int32(Some(v)), ValueKind::Int64) => Value::Int64(Some(*v as i64)),
        (Value::Float32(Some(v)), ValueKind::Float64) => Value::Float64(Some(*v as f64)),
        _ => return value,
    };
    widened
}

impl TypeHandler for DefaultTypeHandler {
    fn to_column(&self, value: Value, kind: Option<ValueKind>) -> Result<Value> {
        Ok(match kind {
            Some(kind) if value.is_null() => kind.empty_value(),
            Some(kind) => widen(value, kind),
            None => value,
        })
    }

    fn to_property(&self, value: Value, kind: Option<ValueKind>) -> Result<Value> {
        Ok(match kind {
            Some(kind) => widen(value, kind),
            None => value,
        })
    }

    fn value_of(&self, literal: &str, kind: Option<ValueKind>) -> Result<Value> {
        fn parse<T: FromStr>(literal: &str, kind: &str) -> Result<T> {
            literal.parse().map_err(|_| {
                Error::msg(format!("Cannot parse literal `{literal}` as {kind}"))
            })
        }
        Ok(match kind {
            Some(ValueKind::Boolean) => Value::Boolean(Some(parse(literal, "boolean")?)),
            Some(ValueKind::Int8) => Value::Int8(Some(parse(literal, "i8")?)),
            Some(ValueKind::Int16) => Value::Int16(Some(parse(literal, "i16")?)),
            Some(ValueKind::Int32) => Value::Int32(Some(parse(literal, "i32")?)),
            Some(ValueKind::Int64) => Value::Int64(Some(parse(literal, "i64")?)),
            Some(ValueKind::Float32) => Value::Float32(Some(parse(literal, "f32")?)),
            Some(ValueKind::Float64) => Value::Float64(Some(parse(literal, "f64")?)),
            Some(ValueKind::Decimal) => Value::Decimal(Some(
                Decimal::from_str(literal)
                    .map_err(|e| Error::msg(format!("Cannot parse literal `{literal}` as decimal: {e}")))?,
            )),
            Some(ValueKind::Uuid) => Value::Uuid(Some(
                Uuid::parse_str(literal)
                    .map_err(|e| Error::msg(format!("Cannot parse literal `{literal}` as uuid: {e}")))?,
            )),
            Some(ValueKind::Varchar) | None => Value::Varchar(Some(literal.to_string())),
            Some(other) => {
                return Err(Error::msg(format!(
                    "No literal form for values of kind {other:?} (literal `{literal}`)"
                )));
            }
        })
    }
}

/// Minimal registry resolving every request to [`DefaultTypeHandler`].
#[derive(Default)]
pub struct DefaultTypeHandlerRegistry {
    handler: OnceHandler,
}

struct OnceHandler(Arc<dyn TypeHandler>);

impl Default for OnceHandler {
    fn default() -> Self {
        Self(Arc::new(DefaultTypeHandler))
    }
}

impl TypeHandlerRegistry for DefaultTypeHandlerRegistry {
    fn resolve(&self, _kind: Option<ValueKind>, _column_type: Option<&str>) -> Arc<dyn TypeHandler> {
        self.handler.0.clone()
    }

    fn by_alias(&self, _alias: &str) -> Option<Arc<dyn TypeHandler>> {
        None
    }
}
