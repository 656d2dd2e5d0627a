use crate::{Error, Result, Value};
use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};
use std::{any, collections::BTreeMap};
use time::{Date, PrimitiveDateTime, Time};
use uuid::Uuid;

/// Conversion between native Rust types and the dynamically typed [`Value`]
/// representation that backs query parameters and row decoding.
///
/// `try_from_value` accepts the canonical variant for the type and performs
/// checked widening from narrower numeric variants; the error message names
/// both the offending value and the target type.
pub trait AsValue {
    /// A NULL-like value variant for this type, used when representing absent
    /// optional data.
    fn as_empty_value() -> Value;
    /// Convert this value into its owned [`Value`] representation.
    fn as_value(self) -> Value;
    /// Attempt to convert a dynamic [`Value`] into `Self`.
    fn try_from_value(value: Value) -> Result<Self>
    where
        Self: Sized;
}

fn mismatch<T>(value: &Value) -> Error {
    Error::msg(format!(
        "Cannot convert `{:?}` into {}",
        value,
        any::type_name::<T>()
    ))
}

macro_rules! impl_as_value_int {
    ($source:ty, $into:path) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $into(None)
            }
            fn as_value(self) -> Value {
                $into(Some(self))
            }
            fn try_from_value(value: Value) -> Result<Self> {
                let widened: Option<i64> = match value {
                    Value::Int8(Some(v)) => Some(v as i64),
                    Value::Int16(Some(v)) => Some(v as i64),
                    Value::Int32(Some(v)) => Some(v as i64),
                    Value::Int64(Some(v)) => Some(v),
                    _ => None,
                };
                widened
                    .and_then(|v| <$source>::try_from(v).ok())
                    .ok_or_else(|| mismatch::<$source>(&value))
            }
        }
    };
}
impl_as_value_int!(i8, Value::Int8);
impl_as_value_int!(i16, Value::Int16);
impl_as_value_int!(i32, Value::Int32);
impl_as_value_int!(i64, Value::Int64);

macro_rules! impl_as_value {
    ($source:ty, $into:path $(, $accept:pat => $produce:expr)* $(,)?) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $into(None)
            }
            fn as_value(self) -> Value {
                $into(Some(self.into()))
            }
            fn try_from_value(value: Value) -> Result<Self> {
                match value {
                    $into(Some(v)) => Ok(v.into()),
                    $($accept => $produce,)*
                    other => Err(mismatch::<$source>(&other)),
                }
            }
        }
    };
}

impl_as_value!(bool, Value::Boolean);
impl_as_value!(
    f32,
    Value::Float32,
    Value::Decimal(Some(v)) => v.to_f32().ok_or_else(|| mismatch::<f32>(&Value::Decimal(Some(v)))),
);
impl_as_value!(
    f64,
    Value::Float64,
    Value::Float32(Some(v)) => Ok(v as f64),
    Value::Decimal(Some(v)) => v.to_f64().ok_or_else(|| mismatch::<f64>(&Value::Decimal(Some(v)))),
);
impl_as_value!(
    Decimal,
    Value::Decimal,
    Value::Int32(Some(v)) => Ok(Decimal::from(v)),
    Value::Int64(Some(v)) => Ok(Decimal::from(v)),
    Value::Float64(Some(v)) => {
        Decimal::from_f64(v).ok_or_else(|| mismatch::<Decimal>(&Value::Float64(Some(v))))
    },
);
impl_as_value!(String, Value::Varchar);
impl_as_value!(Box<[u8]>, Value::Blob);
impl_as_value!(Date, Value::Date);
impl_as_value!(Time, Value::Time);
impl_as_value!(PrimitiveDateTime, Value::Timestamp);
impl_as_value!(Uuid, Value::Uuid);
impl_as_value!(Vec<Value>, Value::List);
impl_as_value!(BTreeMap<String, Value>, Value::Map);

impl<T: AsValue> AsValue for Option<T> {
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }
    fn as_value(self) -> Value {
        match self {
            Some(v) => v.as_value(),
            None => T::as_empty_value(),
        }
    }
    fn try_from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            return Ok(None);
        }
        T::try_from_value(value).map(Some)
    }
}

impl<T: AsValue> From<T> for Value {
    fn from(value: T) -> Self {
        value.as_value()
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Varchar(Some(value.into()))
    }
}
