use std::sync::Arc;

use bytes::BufMut;

use crate::codec::{expect_major, read_fields, Deserializer, Serializer};
use crate::core::TAG_OBJECT;
use crate::meta::{ClassInfo, FieldInfo};
use crate::number::{read_id, write_compact};
use crate::{ReadContext, Registry, Result, Transfer, TypeRef, Value, WriteContext};

/// A field together with the codecs its declared type resolved to when the
/// class was compiled. `None` keeps per-value resolution.
struct Slot {
    field: FieldInfo,
    serializer: Option<Arc<dyn Serializer>>,
    deserializer: Option<Arc<dyn Deserializer>>,
}

/// Object codec with field codecs resolved once, up front.
///
/// Writes exactly the bytes of the generic object codec: a field whose declared
/// type fixes its codec is written with that codec, every other field goes
/// through ordinary resolution.
pub(crate) struct CompiledObjectCodec {
    info: Arc<ClassInfo>,
    slots: Vec<Slot>,
}

impl CompiledObjectCodec {
    pub(crate) fn build(registry: &Registry, info: Arc<ClassInfo>) -> Result<Self> {
        let slots = info
            .fields()
            .iter()
            .map(|field| {
                let declared = field.declared();
                let deserializer = registry.typed_deserializer(declared, None)?;
                // Only a declared type that fixes the decoder fixes the encoder too.
                let serializer = match deserializer {
                    Some(_) => Some(registry.resolve_serializer(declared)?),
                    None => None,
                };
                Ok(Slot {
                    field: field.clone(),
                    serializer,
                    deserializer,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { info, slots })
    }
}

impl Serializer for CompiledObjectCodec {
    fn serialize(&self, ctx: &mut WriteContext<'_>, value: &dyn Transfer) -> Result<()> {
        let owner = value.as_any();
        let writer = ctx.writer();
        writer.put_u8(TAG_OBJECT);
        write_compact(writer, self.info.id() as usize);
        for slot in &self.slots {
            let field = slot.field.get(owner)?;
            match &slot.serializer {
                Some(serializer) => ctx.write_with(field, serializer.as_ref())?,
                None => ctx.write(field)?,
            }
        }
        Ok(())
    }
}

impl Deserializer for CompiledObjectCodec {
    fn deserialize(&self, ctx: &mut ReadContext<'_>, tag: u8, _declared: &TypeRef) -> Result<Value> {
        expect_major(tag, TAG_OBJECT)?;
        let id = read_id(ctx.reader())?;
        if id != self.info.id() {
            let info = ctx.class_info_by_id(id)?;
            return read_fields(ctx, &info);
        }
        let mut object = self.info.instantiate();
        for slot in &self.slots {
            let declared = slot.field.declared();
            let value = match &slot.deserializer {
                Some(deserializer) => ctx.read_with(declared, deserializer.as_ref())?,
                None => ctx.read(declared)?,
            };
            slot.field.set(object.as_any_mut(), value)?;
        }
        Ok(Value::Object(object))
    }
}
