//! Codecs turn one wire category into bytes and back.
//!
//! Built-in codecs are stateless unit structs shared by every [`Registry`](crate::Registry).
//! Custom codecs implement [`Serializer`] and [`Deserializer`] and are installed with
//! [`Registry::register_codec`](crate::Registry::register_codec).

mod container;
mod object;
mod scalar;

pub use container::{ArrayCodec, CollectionCodec, EntryCodec, MapCodec};
pub use object::{EnumCodec, ObjectCodec, ProxyCodec, TaggedObjectCodec};
pub use scalar::{
    BigNumberCodec, BoolCodec, ByteArrayCodec, DateTimeCodec, DecimalCodec, NullCodec, NumberCodec,
    StringCodec,
};

pub(crate) use object::read_fields;

use crate::core::{major, major_name};
use crate::{ReadContext, Result, Transfer, TransferError, TypeRef, Value, View, WriteContext};

/// Writes values of one or more types.
pub trait Serializer: Send + Sync {
    /// Writes `value`, tag included.
    fn serialize(&self, ctx: &mut WriteContext<'_>, value: &dyn Transfer) -> Result<()>;
}

/// Reads values of one wire category.
pub trait Deserializer: Send + Sync {
    /// Reads the payload that follows `tag`. `declared` is the type the caller
    /// expects and supplies element types for containers.
    fn deserialize(&self, ctx: &mut ReadContext<'_>, tag: u8, declared: &TypeRef) -> Result<Value>;
}

pub(crate) fn expect_major(tag: u8, expected: u8) -> Result<()> {
    if major(tag) != expected {
        return Err(TransferError::UnexpectedTag {
            expected: major_name(expected),
            found: tag,
        });
    }
    Ok(())
}

pub(crate) fn unexpected_view(value: &dyn Transfer, view: &View<'_>, category: u8) -> TransferError {
    TransferError::UnsupportedType(format!(
        "{} presents a {} view and cannot be written as {}",
        value.runtime_type(),
        view.name(),
        major_name(category)
    ))
}
