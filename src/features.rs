#[cfg(feature = "chrono")]
use chrono::{DateTime, NaiveDateTime, Utc};
#[cfg(feature = "indexmap")]
use indexmap::{IndexMap, IndexSet};
#[cfg(feature = "bigdecimal")]
use bigdecimal::BigDecimal;
#[cfg(feature = "bigdecimal")]
use num_bigint::BigInt;
#[cfg(feature = "rust_decimal")]
use rust_decimal::Decimal;
#[cfg(any(feature = "rust_decimal", feature = "bigdecimal"))]
use std::borrow::Cow;

#[allow(unused_imports)]
use crate::*;
#[allow(unused_imports)]
use std::any::{Any, TypeId};

/// Arbitrary-precision number types, all served by [`codec::BigNumberCodec`].
#[allow(unused_mut)]
pub(crate) fn big_number_types() -> Vec<TypeRef> {
    let mut types = Vec::new();
    #[cfg(feature = "rust_decimal")]
    types.push(Decimal::declared_type());
    #[cfg(feature = "bigdecimal")]
    types.extend([BigDecimal::declared_type(), BigInt::declared_type()]);
    types
}

#[cfg(any(feature = "rust_decimal", feature = "bigdecimal"))]
fn big_number_view<'a>(exact: Option<i64>, text: impl FnOnce() -> String) -> View<'a> {
    match exact {
        Some(number) => View::Number(number),
        None => View::Str(Cow::Owned(text())),
    }
}

#[cfg(any(feature = "rust_decimal", feature = "bigdecimal"))]
fn parse_big_number<T>(value: Value, expected: &'static str, from_number: fn(i64) -> T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let text = match value {
        Value::Number(number) => return Ok(from_number(number)),
        Value::String(text) => text,
        Value::Float(float) => float.to_string(),
        Value::Double(double) => double.to_string(),
        other => return Err(other.mismatch(expected)),
    };
    text.parse()
        .map_err(|e| TransferError::InvalidData(format!("{:?} is not a valid {}: {}", text, expected, e)))
}

#[cfg(feature = "chrono")]
fn from_millis(value: Value, expected: &'static str) -> Result<DateTime<Utc>> {
    match value {
        Value::DateTime(millis) => DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| TransferError::InvalidData(format!("timestamp {} out of range", millis))),
        other => Err(other.mismatch(expected)),
    }
}

// --- DateTime<Utc> ---
/// Written as DATE_TIME milliseconds; sub-millisecond precision is dropped.
#[cfg(feature = "chrono")]
impl Transfer for DateTime<Utc> {
    fn runtime_type(&self) -> TypeRef {
        Self::declared_type()
    }

    fn view(&self) -> View<'_> {
        View::DateTime(self.timestamp_millis())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
#[cfg(feature = "chrono")]
impl TransferType for DateTime<Utc> {
    fn declared_type() -> TypeRef {
        TypeRef::Class(TypeKey::of::<DateTime<Utc>>(Kind::DateTime))
    }

    fn from_value(value: Value) -> Result<Self> {
        from_millis(value, "DateTime<Utc>")
    }
}

// --- NaiveDateTime ---
/// Interpreted as UTC.
#[cfg(feature = "chrono")]
impl Transfer for NaiveDateTime {
    fn runtime_type(&self) -> TypeRef {
        Self::declared_type()
    }

    fn view(&self) -> View<'_> {
        View::DateTime(self.and_utc().timestamp_millis())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
#[cfg(feature = "chrono")]
impl TransferType for NaiveDateTime {
    fn declared_type() -> TypeRef {
        TypeRef::Class(TypeKey::of::<NaiveDateTime>(Kind::DateTime))
    }

    fn from_value(value: Value) -> Result<Self> {
        from_millis(value, "NaiveDateTime").map(|time| time.naive_utc())
    }
}

// --- IndexSet ---
#[cfg(feature = "indexmap")]
impl<T: TransferType + Eq + std::hash::Hash> Transfer for IndexSet<T> {
    fn runtime_type(&self) -> TypeRef {
        Self::declared_type()
    }

    fn view(&self) -> View<'_> {
        View::Collection(elements(self.iter()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
#[cfg(feature = "indexmap")]
impl<T: TransferType + Eq + std::hash::Hash> TransferType for IndexSet<T> {
    fn declared_type() -> TypeRef {
        let raw = TypeKey::new(TypeId::of::<IndexSet<()>>(), "IndexSet", Kind::Collection);
        TypeRef::parameterized(raw, vec![T::declared_type()])
    }

    fn from_value(value: Value) -> Result<Self> {
        value
            .into_elements("IndexSet")?
            .into_iter()
            .map(T::from_value)
            .collect()
    }
}

// --- IndexMap ---
/// Entry order is preserved on the wire.
#[cfg(feature = "indexmap")]
impl<K: TransferType + Eq + std::hash::Hash, V: TransferType> Transfer for IndexMap<K, V> {
    fn runtime_type(&self) -> TypeRef {
        Self::declared_type()
    }

    fn view(&self) -> View<'_> {
        View::Map(Box::new(
            self.iter()
                .map(|(key, value)| (key as &dyn Transfer, value as &dyn Transfer)),
        ))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
#[cfg(feature = "indexmap")]
impl<K: TransferType + Eq + std::hash::Hash, V: TransferType> TransferType for IndexMap<K, V> {
    fn declared_type() -> TypeRef {
        let raw = TypeKey::new(TypeId::of::<IndexMap<(), ()>>(), "IndexMap", Kind::Map);
        TypeRef::parameterized(raw, vec![K::declared_type(), V::declared_type()])
    }

    fn from_value(value: Value) -> Result<Self> {
        value
            .into_pairs("IndexMap")?
            .into_iter()
            .map(|(key, value)| Ok((K::from_value(key)?, V::from_value(value)?)))
            .collect()
    }
}

// --- Decimal ---
/// Integral values with scale 0 that fit `i64` are written as NUMBER. Anything
/// else is written as its decimal text, which keeps the scale.
#[cfg(feature = "rust_decimal")]
impl Transfer for Decimal {
    fn runtime_type(&self) -> TypeRef {
        Self::declared_type()
    }

    fn view(&self) -> View<'_> {
        let exact = match self.scale() {
            0 => i64::try_from(self.mantissa()).ok(),
            _ => None,
        };
        big_number_view(exact, || self.to_string())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
#[cfg(feature = "rust_decimal")]
impl TransferType for Decimal {
    fn declared_type() -> TypeRef {
        TypeRef::Class(TypeKey::of::<Decimal>(Kind::Number))
    }

    fn from_value(value: Value) -> Result<Self> {
        parse_big_number(value, "Decimal", Decimal::from)
    }
}

// --- BigDecimal ---
#[cfg(feature = "bigdecimal")]
impl Transfer for BigDecimal {
    fn runtime_type(&self) -> TypeRef {
        Self::declared_type()
    }

    fn view(&self) -> View<'_> {
        let (digits, scale) = self.as_bigint_and_exponent();
        let exact = match scale {
            0 => i64::try_from(&digits).ok(),
            _ => None,
        };
        big_number_view(exact, || self.to_string())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
#[cfg(feature = "bigdecimal")]
impl TransferType for BigDecimal {
    fn declared_type() -> TypeRef {
        TypeRef::Class(TypeKey::of::<BigDecimal>(Kind::Number))
    }

    fn from_value(value: Value) -> Result<Self> {
        parse_big_number(value, "BigDecimal", BigDecimal::from)
    }
}

// --- BigInt ---
#[cfg(feature = "bigdecimal")]
impl Transfer for BigInt {
    fn runtime_type(&self) -> TypeRef {
        Self::declared_type()
    }

    fn view(&self) -> View<'_> {
        big_number_view(i64::try_from(self).ok(), || self.to_string())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
#[cfg(feature = "bigdecimal")]
impl TransferType for BigInt {
    fn declared_type() -> TypeRef {
        TypeRef::Class(TypeKey::of::<BigInt>(Kind::Number))
    }

    fn from_value(value: Value) -> Result<Self> {
        parse_big_number(value, "BigInt", BigInt::from)
    }
}
