use std::any::Any;
use std::borrow::Cow;

use bytes::Bytes;

use crate::core::raw;
use crate::types::TypeRef;
use crate::{Object, Result, Transfer, TransferError, TransferType};

/// Borrowed elements of an array or collection.
pub type Elements<'a> = Box<dyn ExactSizeIterator<Item = &'a dyn Transfer> + 'a>;

/// Borrowed key/value pairs of a map.
pub type Pairs<'a> = Box<dyn ExactSizeIterator<Item = (&'a dyn Transfer, &'a dyn Transfer)> + 'a>;

/// Boxes an iterator of concrete elements as [`Elements`].
pub fn elements<'a, T, I>(items: I) -> Elements<'a>
where
    T: Transfer,
    I: ExactSizeIterator<Item = &'a T> + 'a,
{
    Box::new(items.map(|item| item as &dyn Transfer))
}

/// A structural, borrowed view of a value, read by the built-in serializers.
pub enum View<'a> {
    Null,
    Bool(bool),
    Number(i64),
    Float(f32),
    Double(f64),
    Str(Cow<'a, str>),
    Bytes(&'a [u8]),
    /// Milliseconds since the Unix epoch.
    DateTime(i64),
    Array(Elements<'a>),
    Collection(Elements<'a>),
    Map(Pairs<'a>),
    Entry(&'a dyn Transfer, &'a dyn Transfer),
    /// Ordinal of an enum constant.
    Enum(u32),
    /// Fields are read through the registered class info.
    Object,
    /// Written as the wrapped value.
    Proxy(&'a dyn Transfer),
    /// No structural view; needs a custom codec.
    Opaque,
}

impl View<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            View::Null => "null",
            View::Bool(_) => "boolean",
            View::Number(_) => "number",
            View::Float(_) => "float",
            View::Double(_) => "double",
            View::Str(_) => "string",
            View::Bytes(_) => "byte array",
            View::DateTime(_) => "date-time",
            View::Array(_) => "array",
            View::Collection(_) => "collection",
            View::Map(_) => "map",
            View::Entry(_, _) => "map entry",
            View::Enum(_) => "enum",
            View::Object => "object",
            View::Proxy(_) => "proxy",
            View::Opaque => "opaque value",
        }
    }
}

/// A decoded value before it is narrowed to a Rust type.
#[derive(Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(i64),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Bytes),
    DateTime(i64),
    Array(Vec<Value>),
    Collection(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Entry(Box<(Value, Value)>),
    Enum(Box<dyn Object>),
    Object(Box<dyn Object>),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Bytes(_) => "byte array",
            Value::DateTime(_) => "date-time",
            Value::Array(_) => "array",
            Value::Collection(_) => "collection",
            Value::Map(_) => "map",
            Value::Entry(_) => "map entry",
            Value::Enum(_) => "enum",
            Value::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(f64::from(*value)),
            Value::Double(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    /// Borrows a decoded object or enum constant as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Object(object) | Value::Enum(object) => object.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Elements of a decoded array or collection.
    pub fn into_elements(self, expected: &'static str) -> Result<Vec<Value>> {
        match self {
            Value::Array(items) | Value::Collection(items) => Ok(items),
            other => Err(other.mismatch(expected)),
        }
    }

    /// Pairs of a decoded map.
    pub fn into_pairs(self, expected: &'static str) -> Result<Vec<(Value, Value)>> {
        match self {
            Value::Map(pairs) => Ok(pairs),
            other => Err(other.mismatch(expected)),
        }
    }

    /// Moves a decoded object or enum constant out as `T`.
    pub fn into_object<T: Object>(self) -> Result<T> {
        match self {
            Value::Object(object) | Value::Enum(object) => {
                let found = object.runtime_type().to_string();
                object
                    .into_any()
                    .downcast::<T>()
                    .map(|object| *object)
                    .map_err(|_| TransferError::TypeMismatch {
                        expected: std::any::type_name::<T>(),
                        found,
                    })
            }
            other => Err(other.mismatch(std::any::type_name::<T>())),
        }
    }

    pub(crate) fn mismatch(&self, expected: &'static str) -> TransferError {
        let found = match self {
            Value::Object(object) | Value::Enum(object) => object.runtime_type().to_string(),
            other => other.kind_name().to_string(),
        };
        TransferError::TypeMismatch { expected, found }
    }
}

impl Transfer for Value {
    fn runtime_type(&self) -> TypeRef {
        match self {
            Value::Null => TypeRef::Any,
            Value::Bool(_) => bool::declared_type(),
            Value::Number(_) => i64::declared_type(),
            Value::Float(_) => f32::declared_type(),
            Value::Double(_) => f64::declared_type(),
            Value::String(_) => String::declared_type(),
            Value::Bytes(_) => Bytes::declared_type(),
            Value::DateTime(_) => std::time::SystemTime::declared_type(),
            Value::Array(_) => TypeRef::parameterized(raw::array(), vec![TypeRef::Any]),
            Value::Collection(_) => TypeRef::parameterized(raw::vec(), vec![TypeRef::Any]),
            Value::Map(_) => {
                TypeRef::parameterized(raw::hash_map(), vec![TypeRef::Any, TypeRef::Any])
            }
            Value::Entry(_) => TypeRef::parameterized(raw::entry(), vec![TypeRef::Any, TypeRef::Any]),
            Value::Enum(object) | Value::Object(object) => object.runtime_type(),
        }
    }

    fn view(&self) -> View<'_> {
        match self {
            Value::Null => View::Null,
            Value::Bool(value) => View::Bool(*value),
            Value::Number(value) => View::Number(*value),
            Value::Float(value) => View::Float(*value),
            Value::Double(value) => View::Double(*value),
            Value::String(value) => View::Str(Cow::Borrowed(value)),
            Value::Bytes(value) => View::Bytes(value),
            Value::DateTime(millis) => View::DateTime(*millis),
            Value::Array(items) => View::Array(elements(items.iter())),
            Value::Collection(items) => View::Collection(elements(items.iter())),
            Value::Map(pairs) => View::Map(Box::new(
                pairs
                    .iter()
                    .map(|(key, value)| (key as &dyn Transfer, value as &dyn Transfer)),
            )),
            Value::Entry(entry) => View::Entry(&entry.0, &entry.1),
            Value::Enum(object) | Value::Object(object) => object.view(),
        }
    }

    fn as_any(&self) -> &dyn Any {
        match self {
            Value::Enum(object) | Value::Object(object) => object.as_any(),
            _ => self,
        }
    }

    fn is_null(&self) -> bool {
        Value::is_null(self)
    }
}

impl TransferType for Value {
    fn declared_type() -> TypeRef {
        TypeRef::Any
    }

    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}
