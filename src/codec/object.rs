use std::sync::Arc;

use bytes::BufMut;

use super::{expect_major, unexpected_view, Deserializer, Serializer};
use crate::core::*;
use crate::number::{read_compact, read_id, write_compact};
use crate::{ClassInfo, ReadContext, Result, Transfer, TransferError, TypeRef, Value, View, WriteContext};

/// Writes `[OBJECT][compact id]` followed by every serializable field in order.
pub(crate) fn write_fields(ctx: &mut WriteContext<'_>, info: &ClassInfo, value: &dyn Transfer) -> Result<()> {
    let owner = value.as_any();
    let writer = ctx.writer();
    writer.put_u8(TAG_OBJECT);
    write_compact(writer, info.id() as usize);
    for field in info.fields() {
        ctx.write(field.get(owner)?)?;
    }
    Ok(())
}

/// Instantiates the class and fills its fields in order. The tag and id are
/// already consumed.
pub(crate) fn read_fields(ctx: &mut ReadContext<'_>, info: &ClassInfo) -> Result<Value> {
    let mut object = info.instantiate();
    for field in info.fields() {
        let value = ctx.read(field.declared())?;
        field.set(object.as_any_mut(), value)?;
    }
    Ok(Value::Object(object))
}

/// Generic codec of one registered object type.
///
/// Every use is counted on the class, and the registry installs a compiled
/// codec once the configured threshold is reached. Decoded uses only count
/// when the whole decode succeeds.
pub struct TaggedObjectCodec {
    info: Arc<ClassInfo>,
}

impl TaggedObjectCodec {
    pub(crate) fn new(info: Arc<ClassInfo>) -> Self {
        Self { info }
    }

    pub fn info(&self) -> &Arc<ClassInfo> {
        &self.info
    }
}

impl Serializer for TaggedObjectCodec {
    fn serialize(&self, ctx: &mut WriteContext<'_>, value: &dyn Transfer) -> Result<()> {
        ctx.registry().note_uses(&self.info, 1);
        write_fields(ctx, &self.info, value)
    }
}

impl Deserializer for TaggedObjectCodec {
    fn deserialize(&self, ctx: &mut ReadContext<'_>, tag: u8, _declared: &TypeRef) -> Result<Value> {
        expect_major(tag, TAG_OBJECT)?;
        ctx.note_use(self.info.key());
        let id = read_id(ctx.reader())?;
        if id == self.info.id() {
            read_fields(ctx, &self.info)
        } else {
            let info = ctx.class_info_by_id(id)?;
            read_fields(ctx, &info)
        }
    }
}

/// Decodes any OBJECT value by the class id found on the wire.
pub struct ObjectCodec;

impl Deserializer for ObjectCodec {
    fn deserialize(&self, ctx: &mut ReadContext<'_>, tag: u8, _declared: &TypeRef) -> Result<Value> {
        expect_major(tag, TAG_OBJECT)?;
        let id = read_id(ctx.reader())?;
        let info = ctx.class_info_by_id(id)?;
        read_fields(ctx, &info)
    }
}

/// `[ENUM][compact id][compact ordinal]`
pub struct EnumCodec;

impl Serializer for EnumCodec {
    fn serialize(&self, ctx: &mut WriteContext<'_>, value: &dyn Transfer) -> Result<()> {
        let ordinal = match value.view() {
            View::Enum(ordinal) => ordinal,
            view => return Err(unexpected_view(value, &view, TAG_ENUM)),
        };
        let runtime = value.runtime_type();
        let id = runtime
            .raw()
            .and_then(|key| ctx.registry().class_id(&key))
            .ok_or_else(|| TransferError::UnsupportedType(format!("{} is not a registered enum", runtime)))?;
        let writer = ctx.writer();
        writer.put_u8(TAG_ENUM);
        write_compact(writer, id as usize);
        write_compact(writer, ordinal as usize);
        Ok(())
    }
}

impl Deserializer for EnumCodec {
    fn deserialize(&self, ctx: &mut ReadContext<'_>, tag: u8, _declared: &TypeRef) -> Result<Value> {
        expect_major(tag, TAG_ENUM)?;
        let id = read_id(ctx.reader())?;
        let info = ctx.enum_info_by_id(id)?;
        let ordinal = read_compact(ctx.reader())?;
        let ordinal = u32::try_from(ordinal)
            .map_err(|_| TransferError::InvalidData(format!("ordinal {} out of range", ordinal)))?;
        info.constant(ordinal).map(Value::Enum)
    }
}

/// Writes a wrapper as the value it stands for.
pub struct ProxyCodec;

impl Serializer for ProxyCodec {
    fn serialize(&self, ctx: &mut WriteContext<'_>, value: &dyn Transfer) -> Result<()> {
        match value.view() {
            View::Proxy(target) => ctx.write(target),
            view => Err(TransferError::UnsupportedType(format!(
                "{} presents a {} view and is not a proxy",
                value.runtime_type(),
                view.name()
            ))),
        }
    }
}
