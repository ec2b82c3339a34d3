use crate::*;
use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Tag bytes of the transfer wire format.
///
/// The high nibble of every tag names the wire category, the low nibble carries
/// category-specific detail (`extra`). Tags are stable and part of the wire format.
/// Most users do not need to use these directly.

pub const TYPE_MASK: u8 = 0xF0;
pub const EXTRA_MASK: u8 = 0x0F;

///< Absent value, no payload
pub const TAG_NULL: u8 = 0x00;
///< Registered type: compact class id, then fields in declaration order
pub const TAG_OBJECT: u8 = 0x10;
///< Fixed-size array: compact length, then elements
pub const TAG_ARRAY: u8 = 0x20;
///< Vec, VecDeque, sets: compact length, then elements
pub const TAG_COLLECTION: u8 = 0x30;
///< Raw bytes: compact length, then the bytes
pub const TAG_BYTE_ARRAY: u8 = 0x40;
///< Maps: compact entry count, then key/value pairs
pub const TAG_MAP: u8 = 0x50;
///< Integer, extra = byte width - 1
pub const TAG_NUMBER: u8 = 0x60;
///< IEEE-754 float, extra selects the width
pub const TAG_DECIMAL: u8 = 0x70;
///< UTF-8 string, extra selects the length encoding
pub const TAG_STRING: u8 = 0x80;
///< Boolean, the value is the extra nibble
pub const TAG_BOOLEAN: u8 = 0x90;
///< Enum constant: compact class id, then compact ordinal
pub const TAG_ENUM: u8 = 0xA0;
///< Milliseconds since the Unix epoch, extra = byte width - 1
pub const TAG_DATE_TIME: u8 = 0xB0;
///< Standalone key/value pair
pub const TAG_MAP_ENTRY: u8 = 0xC0;

pub const DECIMAL_FLOAT: u8 = 0x00;
pub const DECIMAL_DOUBLE: u8 = 0x01;

///< One length byte follows
pub const STRING_SHORT: u8 = 0x00;
///< A compact number length follows
pub const STRING_LONG: u8 = 0x01;
pub const SHORT_STRING_MAX: usize = u8::MAX as usize;

/// Wire category of a tag.
#[inline]
pub fn major(tag: u8) -> u8 {
    tag & TYPE_MASK
}

/// Category-specific detail of a tag.
#[inline]
pub fn extra(tag: u8) -> u8 {
    tag & EXTRA_MASK
}

pub fn major_name(tag: u8) -> &'static str {
    match major(tag) {
        TAG_NULL => "NULL",
        TAG_OBJECT => "OBJECT",
        TAG_ARRAY => "ARRAY",
        TAG_COLLECTION => "COLLECTION",
        TAG_BYTE_ARRAY => "BYTE_ARRAY",
        TAG_MAP => "MAP",
        TAG_NUMBER => "NUMBER",
        TAG_DECIMAL => "DECIMAL",
        TAG_STRING => "STRING",
        TAG_BOOLEAN => "BOOLEAN",
        TAG_ENUM => "ENUM",
        TAG_DATE_TIME => "DATE_TIME",
        TAG_MAP_ENTRY => "MAP_ENTRY",
        _ => "UNKNOWN",
    }
}

/// Raw keys of the generic containers. Parameterized declared types use these as
/// their raw type so codecs can be found without knowing the arguments.
pub(crate) mod raw {
    use super::*;

    pub fn array() -> TypeKey {
        TypeKey::new(TypeId::of::<[(); 0]>(), "array", Kind::Array)
    }

    pub fn vec() -> TypeKey {
        TypeKey::new(TypeId::of::<Vec<()>>(), "Vec", Kind::Collection)
    }

    pub fn vec_deque() -> TypeKey {
        TypeKey::new(TypeId::of::<VecDeque<()>>(), "VecDeque", Kind::Collection)
    }

    pub fn hash_set() -> TypeKey {
        TypeKey::new(TypeId::of::<HashSet<()>>(), "HashSet", Kind::Collection)
    }

    pub fn btree_set() -> TypeKey {
        TypeKey::new(TypeId::of::<BTreeSet<()>>(), "BTreeSet", Kind::Collection)
    }

    pub fn hash_map() -> TypeKey {
        TypeKey::new(TypeId::of::<HashMap<(), ()>>(), "HashMap", Kind::Map)
    }

    pub fn btree_map() -> TypeKey {
        TypeKey::new(TypeId::of::<BTreeMap<(), ()>>(), "BTreeMap", Kind::Map)
    }

    pub fn entry() -> TypeKey {
        TypeKey::new(TypeId::of::<((), ())>(), "Entry", Kind::MapEntry)
    }
}

// --- bool ---
impl Transfer for bool {
    fn runtime_type(&self) -> TypeRef {
        Self::declared_type()
    }

    fn view(&self) -> View<'_> {
        View::Bool(*self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
impl TransferType for bool {
    fn declared_type() -> TypeRef {
        TypeRef::Class(TypeKey::of::<bool>(Kind::Bool))
    }

    fn from_value(value: Value) -> Result<Self> {
        value.as_bool().ok_or_else(|| value.mismatch("bool"))
    }
}

// --- integers ---
/// Integers are written through the numeric compactor. Out-of-range values fail
/// narrowing on decode instead of wrapping.
macro_rules! impl_number {
    ($($ty:ty),*) => { $(
        impl Transfer for $ty {
            fn runtime_type(&self) -> TypeRef {
                Self::declared_type()
            }

            fn view(&self) -> View<'_> {
                View::Number(*self as i64)
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }
        impl TransferType for $ty {
            fn declared_type() -> TypeRef {
                TypeRef::Class(TypeKey::of::<$ty>(Kind::Number))
            }

            fn from_value(value: Value) -> Result<Self> {
                match value {
                    Value::Number(number) => <$ty>::try_from(number).map_err(|_| {
                        TransferError::TypeMismatch {
                            expected: stringify!($ty),
                            found: format!("number {}", number),
                        }
                    }),
                    other => Err(other.mismatch(stringify!($ty))),
                }
            }
        }
    )* };
}
impl_number!(i8, i16, i32, i64, isize, u8, u16, u32);

/// `u64` and `usize` share the signed 64-bit payload: values above `i64::MAX` are
/// written as their two's-complement bit pattern and restored on decode.
macro_rules! impl_unsigned_wide {
    ($($ty:ty),*) => { $(
        impl Transfer for $ty {
            fn runtime_type(&self) -> TypeRef {
                Self::declared_type()
            }

            fn view(&self) -> View<'_> {
                View::Number(*self as u64 as i64)
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }
        impl TransferType for $ty {
            fn declared_type() -> TypeRef {
                TypeRef::Class(TypeKey::of::<$ty>(Kind::Number))
            }

            fn from_value(value: Value) -> Result<Self> {
                match value {
                    Value::Number(number) => <$ty>::try_from(number as u64).map_err(|_| {
                        TransferError::TypeMismatch {
                            expected: stringify!($ty),
                            found: format!("number {}", number as u64),
                        }
                    }),
                    other => Err(other.mismatch(stringify!($ty))),
                }
            }
        }
    )* };
}
impl_unsigned_wide!(u64, usize);

// --- atomics ---
macro_rules! impl_atomic {
    ($($ty:ty => $inner:ty, $kind:expr, $view:expr);* $(;)?) => { $(
        impl Transfer for $ty {
            fn runtime_type(&self) -> TypeRef {
                Self::declared_type()
            }

            fn view(&self) -> View<'_> {
                $view(self.load(Ordering::SeqCst))
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }
        impl TransferType for $ty {
            fn declared_type() -> TypeRef {
                TypeRef::Class(TypeKey::of::<$ty>($kind))
            }

            fn from_value(value: Value) -> Result<Self> {
                <$inner>::from_value(value).map(<$ty>::new)
            }
        }
    )* };
}
impl_atomic! {
    AtomicBool => bool, Kind::Bool, View::Bool;
    AtomicI32 => i32, Kind::Number, |v: i32| View::Number(v as i64);
    AtomicI64 => i64, Kind::Number, View::Number;
    AtomicU32 => u32, Kind::Number, |v: u32| View::Number(v as i64);
    AtomicU64 => u64, Kind::Number, |v: u64| View::Number(v as i64);
}

// --- f32, f64 ---
impl Transfer for f32 {
    fn runtime_type(&self) -> TypeRef {
        Self::declared_type()
    }

    fn view(&self) -> View<'_> {
        View::Float(*self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
impl TransferType for f32 {
    fn declared_type() -> TypeRef {
        TypeRef::Class(TypeKey::of::<f32>(Kind::Decimal))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(value) => Ok(value),
            Value::Double(value) => {
                let narrowed = value as f32;
                // NaN never equals itself but narrows without loss.
                if f64::from(narrowed) == value || value.is_nan() {
                    Ok(narrowed)
                } else {
                    Err(TransferError::TypeMismatch {
                        expected: "f32",
                        found: format!("f64 {} with no exact f32", value),
                    })
                }
            }
            other => Err(other.mismatch("f32")),
        }
    }
}
impl Transfer for f64 {
    fn runtime_type(&self) -> TypeRef {
        Self::declared_type()
    }

    fn view(&self) -> View<'_> {
        View::Double(*self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
impl TransferType for f64 {
    fn declared_type() -> TypeRef {
        TypeRef::Class(TypeKey::of::<f64>(Kind::Decimal))
    }

    fn from_value(value: Value) -> Result<Self> {
        value.as_f64().ok_or_else(|| value.mismatch("f64"))
    }
}

// --- strings ---
impl Transfer for String {
    fn runtime_type(&self) -> TypeRef {
        Self::declared_type()
    }

    fn view(&self) -> View<'_> {
        View::Str(Cow::Borrowed(self))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
impl TransferType for String {
    fn declared_type() -> TypeRef {
        TypeRef::Class(TypeKey::of::<String>(Kind::String))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(value) => Ok(value),
            other => Err(other.mismatch("String")),
        }
    }
}
/// Encode-only; decodes as `String`.
impl Transfer for &'static str {
    fn runtime_type(&self) -> TypeRef {
        String::declared_type()
    }

    fn view(&self) -> View<'_> {
        View::Str(Cow::Borrowed(self))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
impl Transfer for Box<str> {
    fn runtime_type(&self) -> TypeRef {
        String::declared_type()
    }

    fn view(&self) -> View<'_> {
        View::Str(Cow::Borrowed(self))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
impl TransferType for Box<str> {
    fn declared_type() -> TypeRef {
        String::declared_type()
    }

    fn from_value(value: Value) -> Result<Self> {
        String::from_value(value).map(String::into_boxed_str)
    }
}
impl Transfer for char {
    fn runtime_type(&self) -> TypeRef {
        Self::declared_type()
    }

    fn view(&self) -> View<'_> {
        View::Str(Cow::Owned(self.to_string()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
impl TransferType for char {
    fn declared_type() -> TypeRef {
        TypeRef::Class(TypeKey::of::<char>(Kind::String))
    }

    fn from_value(value: Value) -> Result<Self> {
        let text = String::from_value(value)?;
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(TransferError::TypeMismatch {
                expected: "char",
                found: format!("string of {} chars", text.chars().count()),
            }),
        }
    }
}

// --- bytes ---
impl Transfer for Bytes {
    fn runtime_type(&self) -> TypeRef {
        Self::declared_type()
    }

    fn view(&self) -> View<'_> {
        View::Bytes(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
impl TransferType for Bytes {
    fn declared_type() -> TypeRef {
        TypeRef::Class(TypeKey::of::<Bytes>(Kind::ByteArray))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bytes(bytes) => Ok(bytes),
            other => Err(other.mismatch("Bytes")),
        }
    }
}

// --- SystemTime ---
impl Transfer for SystemTime {
    fn runtime_type(&self) -> TypeRef {
        Self::declared_type()
    }

    fn view(&self) -> View<'_> {
        // Saturates at the ends of the i64 millisecond range.
        let millis = match self.duration_since(UNIX_EPOCH) {
            Ok(after) => i64::try_from(after.as_millis()).unwrap_or(i64::MAX),
            Err(before) => i64::try_from(before.duration().as_millis()).map_or(i64::MIN, |millis| -millis),
        };
        View::DateTime(millis)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
impl TransferType for SystemTime {
    fn declared_type() -> TypeRef {
        TypeRef::Class(TypeKey::of::<SystemTime>(Kind::DateTime))
    }

    fn from_value(value: Value) -> Result<Self> {
        let millis = match value {
            Value::DateTime(millis) => millis,
            other => return Err(other.mismatch("SystemTime")),
        };
        let offset = Duration::from_millis(millis.unsigned_abs());
        let time = if millis >= 0 {
            UNIX_EPOCH.checked_add(offset)
        } else {
            UNIX_EPOCH.checked_sub(offset)
        };
        time.ok_or_else(|| TransferError::InvalidData(format!("timestamp {} out of range", millis)))
    }
}

// --- Option ---
/// `None` is written as NULL. `Some` is written exactly like the wrapped value.
impl<T: TransferType> Transfer for Option<T> {
    fn runtime_type(&self) -> TypeRef {
        match self {
            Some(value) => value.runtime_type(),
            None => T::declared_type(),
        }
    }

    fn view(&self) -> View<'_> {
        match self {
            Some(value) => value.view(),
            None => View::Null,
        }
    }

    fn as_any(&self) -> &dyn Any {
        match self {
            Some(value) => value.as_any(),
            None => self,
        }
    }

    fn is_null(&self) -> bool {
        match self {
            Some(value) => value.is_null(),
            None => true,
        }
    }
}
impl<T: TransferType> TransferType for Option<T> {
    fn declared_type() -> TypeRef {
        T::declared_type()
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            value => T::from_value(value).map(Some),
        }
    }
}

// --- Box, Arc ---
macro_rules! impl_pointer {
    ($($ptr:ident),*) => { $(
        impl<T: TransferType> Transfer for $ptr<T> {
            fn runtime_type(&self) -> TypeRef {
                (**self).runtime_type()
            }

            fn view(&self) -> View<'_> {
                (**self).view()
            }

            fn as_any(&self) -> &dyn Any {
                (**self).as_any()
            }

            fn is_null(&self) -> bool {
                (**self).is_null()
            }
        }
        impl<T: TransferType> TransferType for $ptr<T> {
            fn declared_type() -> TypeRef {
                T::declared_type()
            }

            fn from_value(value: Value) -> Result<Self> {
                T::from_value(value).map($ptr::new)
            }
        }
    )* };
}
impl_pointer!(Box, Arc);

/// A registered object whose concrete type is only known on the wire.
impl Transfer for Box<dyn Object> {
    fn runtime_type(&self) -> TypeRef {
        (**self).runtime_type()
    }

    fn view(&self) -> View<'_> {
        (**self).view()
    }

    fn as_any(&self) -> &dyn Any {
        (**self).as_any()
    }
}
impl TransferType for Box<dyn Object> {
    fn declared_type() -> TypeRef {
        TypeRef::Any
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(object) | Value::Enum(object) => Ok(object),
            other => Err(other.mismatch("registered object")),
        }
    }
}

// --- collections ---
fn collect_elements<T, C>(value: Value, expected: &'static str) -> Result<C>
where
    T: TransferType,
    C: FromIterator<T>,
{
    value
        .into_elements(expected)?
        .into_iter()
        .map(T::from_value)
        .collect()
}

fn collect_pairs<K, V, C>(value: Value, expected: &'static str) -> Result<C>
where
    K: TransferType,
    V: TransferType,
    C: FromIterator<(K, V)>,
{
    value
        .into_pairs(expected)?
        .into_iter()
        .map(|(key, value)| Ok((K::from_value(key)?, V::from_value(value)?)))
        .collect()
}

/// `Vec<u8>` is a byte array on the wire; every other `Vec` is a collection.
impl<T: TransferType> Transfer for Vec<T> {
    fn runtime_type(&self) -> TypeRef {
        Self::declared_type()
    }

    fn view(&self) -> View<'_> {
        match (self as &dyn Any).downcast_ref::<Vec<u8>>() {
            Some(bytes) => View::Bytes(bytes),
            None => View::Collection(elements(self.iter())),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
impl<T: TransferType> TransferType for Vec<T> {
    fn declared_type() -> TypeRef {
        if TypeId::of::<T>() == TypeId::of::<u8>() {
            TypeRef::Class(TypeKey::of::<Vec<u8>>(Kind::ByteArray))
        } else {
            TypeRef::parameterized(raw::vec(), vec![T::declared_type()])
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bytes(bytes) => {
                let found = format!("{} bytes", bytes.len());
                let boxed: Box<dyn Any> = Box::new(bytes.to_vec());
                boxed
                    .downcast::<Vec<T>>()
                    .map(|items| *items)
                    .map_err(|_| TransferError::TypeMismatch {
                        expected: "Vec",
                        found,
                    })
            }
            value => collect_elements(value, "Vec"),
        }
    }
}

macro_rules! impl_collection {
    ($($coll:ident < T $(: $bound:ident $(+ $more:ident)*)? > => $raw:ident),*) => { $(
        impl<T: TransferType $(+ $bound $(+ $more)*)?> Transfer for $coll<T> {
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
        impl<T: TransferType $(+ $bound $(+ $more)*)?> TransferType for $coll<T> {
            fn declared_type() -> TypeRef {
                TypeRef::parameterized(raw::$raw(), vec![T::declared_type()])
            }

            fn from_value(value: Value) -> Result<Self> {
                collect_elements(value, stringify!($coll))
            }
        }
    )* };
}
impl_collection!(
    VecDeque<T> => vec_deque,
    HashSet<T: Eq + Hash> => hash_set,
    BTreeSet<T: Ord> => btree_set
);

impl<T: TransferType, const N: usize> Transfer for [T; N] {
    fn runtime_type(&self) -> TypeRef {
        Self::declared_type()
    }

    fn view(&self) -> View<'_> {
        View::Array(elements(self.iter()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
impl<T: TransferType, const N: usize> TransferType for [T; N] {
    fn declared_type() -> TypeRef {
        TypeRef::parameterized(raw::array(), vec![T::declared_type()])
    }

    fn from_value(value: Value) -> Result<Self> {
        let items: Vec<T> = collect_elements(value, "array")?;
        let len = items.len();
        items.try_into().map_err(|_| TransferError::TypeMismatch {
            expected: "array",
            found: format!("{} elements where {} were expected", len, N),
        })
    }
}

// --- maps ---
macro_rules! impl_map {
    ($($map:ident < K: $bound:ident $(+ $more:ident)* > => $raw:ident),*) => { $(
        impl<K, V> Transfer for $map<K, V>
        where
            K: TransferType + $bound $(+ $more)*,
            V: TransferType,
        {
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
        impl<K, V> TransferType for $map<K, V>
        where
            K: TransferType + $bound $(+ $more)*,
            V: TransferType,
        {
            fn declared_type() -> TypeRef {
                TypeRef::parameterized(raw::$raw(), vec![K::declared_type(), V::declared_type()])
            }

            fn from_value(value: Value) -> Result<Self> {
                collect_pairs(value, stringify!($map))
            }
        }
    )* };
}
impl_map!(HashMap<K: Eq + Hash> => hash_map, BTreeMap<K: Ord> => btree_map);

// --- map entry ---
/// A pair is a standalone MAP_ENTRY value.
impl<K: TransferType, V: TransferType> Transfer for (K, V) {
    fn runtime_type(&self) -> TypeRef {
        Self::declared_type()
    }

    fn view(&self) -> View<'_> {
        View::Entry(&self.0, &self.1)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
impl<K: TransferType, V: TransferType> TransferType for (K, V) {
    fn declared_type() -> TypeRef {
        TypeRef::parameterized(raw::entry(), vec![K::declared_type(), V::declared_type()])
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Entry(entry) => {
                let (key, value) = *entry;
                Ok((K::from_value(key)?, V::from_value(value)?))
            }
            other => Err(other.mismatch("map entry")),
        }
    }
}
