use bytes::BufMut;

use super::{expect_major, unexpected_view, Deserializer, Serializer};
use crate::core::*;
use crate::number::{read_compact, write_compact};
use crate::{Elements, Pairs, ReadContext, Result, Transfer, TypeRef, Value, View, WriteContext};

fn write_elements(ctx: &mut WriteContext<'_>, category: u8, items: Elements<'_>) -> Result<()> {
    let writer = ctx.writer();
    writer.put_u8(category);
    write_compact(writer, items.len());
    for item in items {
        ctx.write(item)?;
    }
    Ok(())
}

fn write_pairs(ctx: &mut WriteContext<'_>, pairs: Pairs<'_>) -> Result<()> {
    let writer = ctx.writer();
    writer.put_u8(TAG_MAP);
    write_compact(writer, pairs.len());
    for (key, value) in pairs {
        ctx.write(key)?;
        ctx.write(value)?;
    }
    Ok(())
}

/// Reads `count` elements typed by the first argument of `declared`.
///
/// The preallocation is bounded by the remaining input so a corrupt count cannot
/// reserve more than the buffer could ever hold.
fn read_elements(ctx: &mut ReadContext<'_>, declared: &TypeRef) -> Result<Vec<Value>> {
    let count = read_compact(ctx.reader())?;
    let element = declared.arg(0);
    let mut items = Vec::with_capacity(count.min(ctx.remaining()));
    for _ in 0..count {
        items.push(ctx.read(&element)?);
    }
    Ok(items)
}

/// `[ARRAY][compact len][element]*`
pub struct ArrayCodec;

impl Serializer for ArrayCodec {
    fn serialize(&self, ctx: &mut WriteContext<'_>, value: &dyn Transfer) -> Result<()> {
        match value.view() {
            View::Array(items) => write_elements(ctx, TAG_ARRAY, items),
            view => Err(unexpected_view(value, &view, TAG_ARRAY)),
        }
    }
}

impl Deserializer for ArrayCodec {
    fn deserialize(&self, ctx: &mut ReadContext<'_>, tag: u8, declared: &TypeRef) -> Result<Value> {
        expect_major(tag, TAG_ARRAY)?;
        read_elements(ctx, declared).map(Value::Array)
    }
}

/// `[COLLECTION][compact len][element]*`
pub struct CollectionCodec;

impl Serializer for CollectionCodec {
    fn serialize(&self, ctx: &mut WriteContext<'_>, value: &dyn Transfer) -> Result<()> {
        match value.view() {
            View::Collection(items) => write_elements(ctx, TAG_COLLECTION, items),
            view => Err(unexpected_view(value, &view, TAG_COLLECTION)),
        }
    }
}

impl Deserializer for CollectionCodec {
    fn deserialize(&self, ctx: &mut ReadContext<'_>, tag: u8, declared: &TypeRef) -> Result<Value> {
        expect_major(tag, TAG_COLLECTION)?;
        read_elements(ctx, declared).map(Value::Collection)
    }
}

/// `[MAP][compact count]([key][value])*`
pub struct MapCodec;

impl Serializer for MapCodec {
    fn serialize(&self, ctx: &mut WriteContext<'_>, value: &dyn Transfer) -> Result<()> {
        match value.view() {
            View::Map(pairs) => write_pairs(ctx, pairs),
            view => Err(unexpected_view(value, &view, TAG_MAP)),
        }
    }
}

impl Deserializer for MapCodec {
    fn deserialize(&self, ctx: &mut ReadContext<'_>, tag: u8, declared: &TypeRef) -> Result<Value> {
        expect_major(tag, TAG_MAP)?;
        let count = read_compact(ctx.reader())?;
        let (key_type, value_type) = (declared.arg(0), declared.arg(1));
        let mut pairs = Vec::with_capacity(count.min(ctx.remaining()));
        for _ in 0..count {
            let key = ctx.read(&key_type)?;
            let value = ctx.read(&value_type)?;
            pairs.push((key, value));
        }
        Ok(Value::Map(pairs))
    }
}

/// `[MAP_ENTRY][key][value]`
pub struct EntryCodec;

impl Serializer for EntryCodec {
    fn serialize(&self, ctx: &mut WriteContext<'_>, value: &dyn Transfer) -> Result<()> {
        match value.view() {
            View::Entry(key, entry_value) => {
                ctx.writer().put_u8(TAG_MAP_ENTRY);
                ctx.write(key)?;
                ctx.write(entry_value)
            }
            view => Err(unexpected_view(value, &view, TAG_MAP_ENTRY)),
        }
    }
}

impl Deserializer for EntryCodec {
    fn deserialize(&self, ctx: &mut ReadContext<'_>, tag: u8, declared: &TypeRef) -> Result<Value> {
        expect_major(tag, TAG_MAP_ENTRY)?;
        let key = ctx.read(&declared.arg(0))?;
        let value = ctx.read(&declared.arg(1))?;
        Ok(Value::Entry(Box::new((key, value))))
    }
}
