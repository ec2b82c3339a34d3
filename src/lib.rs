//! # transfer-codec
//!
//! A compact, self-describing binary object codec.
//!
//! - Every value starts with a one-byte tag: the high nibble names the wire category
//!   (object, array, collection, map, number, string, ...), the low nibble carries
//!   category-specific detail such as the byte width of a compacted integer.
//! - Application types are bound to small integer ids in a [`Registry`] and written
//!   field by field in declaration order, without per-field names.
//! - Polymorphic containers (`Vec<Value>`, `Vec<Box<dyn Object>>`) decode by the tag
//!   and type id found on the wire.
//! - Large encoded collections can be walked lazily with [`iterator`].
//!
//! ## Derive Macro
//!
//! `#[derive(Transferable)]` implements the codec traits for structs and unit-only enums.
//!
//! - `#[transfer(id = N)]` on the type declares its wire id. Declared types are registered
//!   automatically the first time they are encoded or decoded.
//! - `#[transfer(transient)]` / `#[transfer(ignore)]` on a field leaves it out of the wire
//!   format. On decode the field keeps its `Default` value.
//!
//! ## Feature Flags
//!
//! - `chrono` (default): `chrono::DateTime<Utc>` and `NaiveDateTime` as DATE_TIME values.
//! - `indexmap`: `IndexMap` and `IndexSet` as MAP and COLLECTION values.
//! - `rust_decimal`: `Decimal` as a NUMBER, or as decimal text when it has a scale or exceeds `i64`.
//! - `bigdecimal`: `BigDecimal` and `num_bigint::BigInt`, written the same way.

extern crate self as transfer_codec;

pub mod codec;
mod compiled;
mod config;
mod context;
pub mod core;
mod features;
mod iter;
mod meta;
pub mod number;
mod registry;
mod types;
mod value;

pub use crate::codec::{Deserializer, Serializer};
pub use crate::config::TransferConfig;
pub use crate::context::{ReadContext, WriteContext};
pub use crate::iter::TransferIter;
pub use crate::meta::{
    ClassDesc, ClassInfo, EnumDesc, EnumInfo, FieldAccess, FieldDesc, FieldInfo, Modifier,
};
pub use crate::registry::Registry;
pub use crate::types::{ClassBinding, Kind, Shape, TypeKey, TypeRef};
pub use crate::value::{elements, Elements, Pairs, Value, View};
pub use transfer_codec_derive::Transferable;

use bytes::Bytes;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Errors that can occur during encoding, decoding or type resolution.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// No codec can be resolved for the type, and it cannot be registered automatically.
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),
    /// The tag byte does not name any known wire category or variant.
    #[error("Unsupported tag: 0x{0:02X}")]
    UnsupportedTag(u8),
    /// The tag is valid but not the one the resolved codec reads.
    #[error("Unexpected tag 0x{found:02X}, expected {expected}")]
    UnexpectedTag { expected: &'static str, found: u8 },
    /// The decoded type id is not bound in the registry.
    #[error("Unregistered class id: {0}")]
    UnregisteredClassId(u32),
    /// A lazy iterator was advanced past its last element.
    #[error("Iterator exhausted after {count} elements")]
    IteratorExhausted { count: usize },
    /// Reading would move the cursor past the end of the buffer.
    #[error("Malformed buffer: needed {needed} bytes, {remaining} remaining")]
    MalformedBuffer { needed: usize, remaining: usize },
    /// The decoded value cannot be converted into the requested Rust type.
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: &'static str, found: String },
    /// The object graph is nested deeper than [`TransferConfig::max_depth`].
    #[error("Nesting depth exceeds the configured limit of {limit}")]
    DepthLimitExceeded { limit: usize },
    /// The payload is structurally readable but its content is invalid.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// The result type used throughout this crate.
pub type Result<T> = std::result::Result<T, TransferError>;

/// A value the engine can write.
///
/// Codecs never see concrete Rust types: they receive `&dyn Transfer`, pick a codec from
/// [`Transfer::runtime_type`] and read the payload through [`Transfer::view`].
/// Most users should use `#[derive(Transferable)]` or the built-in implementations.
pub trait Transfer: Any + Send + Sync {
    /// The type used to resolve this value's serializer.
    fn runtime_type(&self) -> TypeRef;

    /// A borrowed, structural view of the value.
    fn view(&self) -> View<'_>;

    /// The concrete value, used by object codecs and custom codecs to downcast.
    fn as_any(&self) -> &dyn Any;

    /// Returns true if the value is absent. Absent values are always written as NULL.
    fn is_null(&self) -> bool {
        false
    }
}

/// A [`Transfer`] type that can be rebuilt from a decoded [`Value`].
pub trait TransferType: Transfer + Sized {
    /// The declared type used to resolve a deserializer for this type.
    fn declared_type() -> TypeRef;

    /// Narrows a decoded value into this type.
    ///
    /// # Errors
    /// Returns [`TransferError::TypeMismatch`] if the value has the wrong shape or range.
    fn from_value(value: Value) -> Result<Self>;
}

/// A registered object or enum held behind a trait object.
pub trait Object: Transfer + fmt::Debug {
    fn as_transfer(&self) -> &dyn Transfer;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

/// A type that can be bound to a wire id in a [`Registry`].
///
/// Implemented by `#[derive(Transferable)]`.
pub trait Registrable: Object + TransferType {
    /// The id from `#[transfer(id = N)]`, if the type declares one.
    const TRANSFER_ID: Option<u32>;

    /// Describes how the type is scanned and instantiated.
    fn binding() -> ClassBinding;

    /// The key this type is registered under.
    fn key() -> TypeKey;
}

/// Encodes a value using the process-wide registry.
///
/// # Example
/// ```rust
/// use transfer_codec::{decode, encode, Transferable};
///
/// #[derive(Transferable, Default, Debug, PartialEq)]
/// #[transfer(id = 7)]
/// struct Point {
///     x: i32,
///     y: i32,
/// }
///
/// let bytes = encode(&Point { x: 3, y: -1 }).unwrap();
/// let decoded: Point = decode(bytes).unwrap();
/// assert_eq!(decoded, Point { x: 3, y: -1 });
/// ```
pub fn encode<T: Transfer>(value: &T) -> Result<Bytes> {
    Registry::global().encode(value)
}

/// Decodes a value of type `T` using the process-wide registry.
pub fn decode<T: TransferType>(bytes: impl Into<Bytes>) -> Result<T> {
    Registry::global().decode(bytes)
}

/// Decodes a value against an explicit declared type using the process-wide registry.
pub fn decode_value(bytes: impl Into<Bytes>, declared: &TypeRef) -> Result<Value> {
    Registry::global().decode_value(bytes, declared)
}

/// Opens a lazy iterator over an encoded array or collection of `T`.
pub fn iterator<T: TransferType>(bytes: impl Into<Bytes>) -> Result<TransferIter<'static, T>> {
    Registry::global().iterator(bytes)
}

/// Binds `T` to `id` in the process-wide registry.
pub fn register_type<T: Registrable>(id: u32) {
    Registry::global().register_type::<T>(id)
}

/// Installs a custom codec pair for `T` in the process-wide registry.
pub fn register_codec<T: TransferType>(
    serializer: Arc<dyn Serializer>,
    deserializer: Arc<dyn Deserializer>,
) {
    Registry::global().register_codec::<T>(serializer, deserializer)
}
