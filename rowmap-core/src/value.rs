use rust_decimal::Decimal;
use std::{
    collections::BTreeMap,
    fmt::{self, Display},
    hash::{DefaultHasher, Hash, Hasher},
    mem::discriminant,
};
use time::{Date, PrimitiveDateTime, Time};
use uuid::Uuid;

/// Dynamically typed column/parameter value.
///
/// Each variant carries `Option<..>` so a NULL can still advertise its
/// declared type (a typed null), which parameter binding and result mapping
/// rely on when no value is present.
#[derive(Default, Debug, Clone)]
pub enum Value {
    #[default]
    Null,
    Boolean(Option<bool>),
    Int8(Option<i8>),
    Int16(Option<i16>),
    Int32(Option<i32>),
    Int64(Option<i64>),
    Float32(Option<f32>),
    Float64(Option<f64>),
    Decimal(Option<Decimal>),
    Varchar(Option<String>),
    Blob(Option<Box<[u8]>>),
    Date(Option<Date>),
    Time(Option<Time>),
    Timestamp(Option<PrimitiveDateTime>),
    Uuid(Option<Uuid>),
    List(Option<Vec<Value>>),
    Map(Option<BTreeMap<String, Value>>),
}

/// Type tag of a [`Value`], independent of whether data is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Decimal,
    Varchar,
    Blob,
    Date,
    Time,
    Timestamp,
    Uuid,
    List,
    Map,
}

impl ValueKind {
    /// Resolve a declared type alias as used in inline parameter descriptors.
    pub fn from_alias(alias: &str) -> Option<ValueKind> {
        Some(match alias {
            "bool" | "boolean" => ValueKind::Boolean,
            "i8" | "byte" => ValueKind::Int8,
            "i16" | "short" => ValueKind::Int16,
            "i32" | "int" | "integer" => ValueKind::Int32,
            "i64" | "long" => ValueKind::Int64,
            "f32" | "float" => ValueKind::Float32,
            "f64" | "double" => ValueKind::Float64,
            "decimal" => ValueKind::Decimal,
            "string" | "varchar" => ValueKind::Varchar,
            "blob" | "bytes" => ValueKind::Blob,
            "date" => ValueKind::Date,
            "time" => ValueKind::Time,
            "timestamp" | "datetime" => ValueKind::Timestamp,
            "uuid" => ValueKind::Uuid,
            "list" => ValueKind::List,
            "map" => ValueKind::Map,
            _ => return None,
        })
    }

    /// The typed null of this kind.
    pub fn empty_value(&self) -> Value {
        match self {
            ValueKind::Boolean => Value::Boolean(None),
            ValueKind::Int8 => Value::Int8(None),
            ValueKind::Int16 => Value::Int16(None),
            ValueKind::Int32 => Value::Int32(None),
            ValueKind::Int64 => Value::Int64(None),
            ValueKind::Float32 => Value::Float32(None),
            ValueKind::Float64 => Value::Float64(None),
            ValueKind::Decimal => Value::Decimal(None),
            ValueKind::Varchar => Value::Varchar(None),
            ValueKind::Blob => Value::Blob(None),
            ValueKind::Date => Value::Date(None),
            ValueKind::Time => Value::Time(None),
            ValueKind::Timestamp => Value::Timestamp(None),
            ValueKind::Uuid => Value::Uuid(None),
            ValueKind::List => Value::List(None),
            ValueKind::Map => Value::Map(None),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Boolean(l), Self::Boolean(r)) => l == r,
            (Self::Int8(l), Self::Int8(r)) => l == r,
            (Self::Int16(l), Self::Int16(r)) => l == r,
            (Self::Int32(l), Self::Int32(r)) => l == r,
            (Self::Int64(l), Self::Int64(r)) => l == r,
            (Self::Float32(l), Self::Float32(r)) => l == r,
            (Self::Float64(l), Self::Float64(r)) => l == r,
            (Self::Decimal(l), Self::Decimal(r)) => l == r,
            (Self::Varchar(l), Self::Varchar(r)) => l == r,
            (Self::Blob(l), Self::Blob(r)) => l == r,
            (Self::Date(l), Self::Date(r)) => l == r,
            (Self::Time(l), Self::Time(r)) => l == r,
            (Self::Timestamp(l), Self::Timestamp(r)) => l == r,
            (Self::Uuid(l), Self::Uuid(r)) => l == r,
            (Self::List(l), Self::List(r)) => l == r,
            (Self::Map(l), Self::Map(r)) => l == r,
            _ => discriminant(self) == discriminant(other),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(v) => v.hash(state),
            Value::Int8(v) => v.hash(state),
            Value::Int16(v) => v.hash(state),
            Value::Int32(v) => v.hash(state),
            Value::Int64(v) => v.hash(state),
            Value::Float32(v) => v.map(f32::to_bits).hash(state),
            Value::Float64(v) => v.map(f64::to_bits).hash(state),
            Value::Decimal(v) => v.hash(state),
            Value::Varchar(v) => v.hash(state),
            Value::Blob(v) => v.hash(state),
            Value::Date(v) => v.hash(state),
            Value::Time(v) => v.hash(state),
            Value::Timestamp(v) => v.hash(state),
            Value::Uuid(v) => v.hash(state),
            Value::List(v) => v.hash(state),
            Value::Map(v) => v.hash(state),
        }
    }
}

impl Value {
    pub fn same_type(&self, other: &Self) -> bool {
        discriminant(self) == discriminant(other)
    }

    /// Whether no data is present, regardless of the declared type.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Boolean(v) => v.is_none(),
            Value::Int8(v) => v.is_none(),
            Value::Int16(v) => v.is_none(),
            Value::Int32(v) => v.is_none(),
            Value::Int64(v) => v.is_none(),
            Value::Float32(v) => v.is_none(),
            Value::Float64(v) => v.is_none(),
            Value::Decimal(v) => v.is_none(),
            Value::Varchar(v) => v.is_none(),
            Value::Blob(v) => v.is_none(),
            Value::Date(v) => v.is_none(),
            Value::Time(v) => v.is_none(),
            Value::Timestamp(v) => v.is_none(),
            Value::Uuid(v) => v.is_none(),
            Value::List(v) => v.is_none(),
            Value::Map(v) => v.is_none(),
        }
    }

    pub fn kind(&self) -> Option<ValueKind> {
        Some(match self {
            Value::Null => return None,
            Value::Boolean(..) => ValueKind::Boolean,
            Value::Int8(..) => ValueKind::Int8,
            Value::Int16(..) => ValueKind::Int16,
            Value::Int32(..) => ValueKind::Int32,
            Value::Int64(..) => ValueKind::Int64,
            Value::Float32(..) => ValueKind::Float32,
            Value::Float64(..) => ValueKind::Float64,
            Value::Decimal(..) => ValueKind::Decimal,
            Value::Varchar(..) => ValueKind::Varchar,
            Value::Blob(..) => ValueKind::Blob,
            Value::Date(..) => ValueKind::Date,
            Value::Time(..) => ValueKind::Time,
            Value::Timestamp(..) => ValueKind::Timestamp,
            Value::Uuid(..) => ValueKind::Uuid,
            Value::List(..) => ValueKind::List,
            Value::Map(..) => ValueKind::Map,
        })
    }

    /// Stable per-process hash used by the cache fingerprint arithmetic.
    pub fn hash_code(&self) -> i64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish() as i64
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return write!(f, "NULL");
        }
        match self {
            Value::Boolean(Some(v)) => write!(f, "{v}"),
            Value::Int8(Some(v)) => write!(f, "{v}"),
            Value::Int16(Some(v)) => write!(f, "{v}"),
            Value::Int32(Some(v)) => write!(f, "{v}"),
            Value::Int64(Some(v)) => write!(f, "{v}"),
            Value::Float32(Some(v)) => write!(f, "{v}"),
            Value::Float64(Some(v)) => write!(f, "{v}"),
            Value::Decimal(Some(v)) => write!(f, "{v}"),
            Value::Varchar(Some(v)) => write!(f, "{v}"),
            Value::Blob(Some(v)) => write!(f, "x'{}'", hex::encode(v)),
            Value::Date(Some(v)) => write!(f, "{v}"),
            Value::Time(Some(v)) => write!(f, "{v}"),
            Value::Timestamp(Some(v)) => write!(f, "{v}"),
            Value::Uuid(Some(v)) => write!(f, "{v}"),
            Value::List(Some(v)) => {
                write!(f, "[")?;
                for (i, item) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(Some(v)) => {
                write!(f, "{{")?;
                for (i, (key, item)) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {item}")?;
                }
                write!(f, "}}")
            }
            _ => unreachable!(),
        }
    }
}
