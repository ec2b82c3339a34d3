use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codec::{Deserializer, Serializer};
use crate::core::{major, TAG_NULL};
use crate::meta::{ClassInfo, EnumInfo};
use crate::registry::Staged;
use crate::{Registry, Result, Transfer, TransferError, TransferType, TypeKey, TypeRef, Value};

/// Fails with [`TransferError::MalformedBuffer`] unless `needed` bytes remain.
#[inline]
pub(crate) fn ensure(reader: &Bytes, needed: usize) -> Result<()> {
    if reader.remaining() < needed {
        return Err(TransferError::MalformedBuffer {
            needed,
            remaining: reader.remaining(),
        });
    }
    Ok(())
}

/// State of one encode call: the output buffer, the registry used to resolve
/// nested codecs and the current nesting depth.
pub struct WriteContext<'r> {
    registry: &'r Registry,
    writer: BytesMut,
    depth: usize,
}

impl<'r> WriteContext<'r> {
    pub(crate) fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            writer: BytesMut::new(),
            depth: 0,
        }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn writer(&mut self) -> &mut BytesMut {
        &mut self.writer
    }

    /// Writes a nested value with the serializer resolved from its runtime type.
    pub fn write(&mut self, value: &dyn Transfer) -> Result<()> {
        if value.is_null() {
            self.writer.put_u8(TAG_NULL);
            return Ok(());
        }
        let serializer = self.registry.resolve_serializer(&value.runtime_type())?;
        self.write_with(value, serializer.as_ref())
    }

    /// Writes a nested value with a serializer the caller already resolved.
    pub fn write_with(&mut self, value: &dyn Transfer, serializer: &dyn Serializer) -> Result<()> {
        if value.is_null() {
            self.writer.put_u8(TAG_NULL);
            return Ok(());
        }
        self.descend()?;
        let result = serializer.serialize(self, value);
        self.depth -= 1;
        result
    }

    fn descend(&mut self) -> Result<()> {
        let limit = self.registry.config().max_depth;
        if self.depth >= limit {
            return Err(TransferError::DepthLimitExceeded { limit });
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn finish(self) -> Bytes {
        self.writer.freeze()
    }
}

/// State of one decode call: the input cursor, the registry and the nesting depth.
///
/// Registrations, cache fills and use counts made while decoding are staged here
/// and only reach the registry once the top-level value decodes, so a decode
/// that fails leaves the registry as it found it.
pub struct ReadContext<'r> {
    registry: &'r Registry,
    reader: Bytes,
    depth: usize,
    staged: Staged,
}

impl<'r> ReadContext<'r> {
    pub(crate) fn new(registry: &'r Registry, reader: Bytes) -> Self {
        Self {
            registry,
            reader,
            depth: 0,
            staged: Staged::default(),
        }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn reader(&mut self) -> &mut Bytes {
        &mut self.reader
    }

    pub fn remaining(&self) -> usize {
        self.reader.remaining()
    }

    pub fn read_tag(&mut self) -> Result<u8> {
        ensure(&self.reader, 1)?;
        Ok(self.reader.get_u8())
    }

    /// Reads a tag and decodes the value with the deserializer resolved from the
    /// declared type and that tag.
    pub fn read(&mut self, declared: &TypeRef) -> Result<Value> {
        let tag = self.read_tag()?;
        let deserializer = self
            .registry
            .resolve_deserializer_staged(declared, tag, Some(&mut self.staged))?;
        self.read_tagged(tag, declared, deserializer.as_ref())
    }

    /// Reads a tag and decodes the value with a deserializer the caller already
    /// resolved. NULL tags short-circuit to [`Value::Null`].
    pub fn read_with(&mut self, declared: &TypeRef, deserializer: &dyn Deserializer) -> Result<Value> {
        let tag = self.read_tag()?;
        if major(tag) == TAG_NULL {
            return Ok(Value::Null);
        }
        self.read_tagged(tag, declared, deserializer)
    }

    /// Reads a nested value and narrows it to `T`.
    pub fn read_as<T: TransferType>(&mut self) -> Result<T> {
        let value = self.read(&T::declared_type())?;
        T::from_value(value)
    }

    /// The object class bound to `id`, including classes first seen by this decode.
    pub fn class_info_by_id(&self, id: u32) -> Result<Arc<ClassInfo>> {
        match self.staged.class_info_by_id(id) {
            Some(found) => found,
            None => self.registry.class_info_by_id(id),
        }
    }

    /// The enum bound to `id`, including enums first seen by this decode.
    pub fn enum_info_by_id(&self, id: u32) -> Result<Arc<EnumInfo>> {
        match self.staged.enum_info_by_id(id) {
            Some(found) => found,
            None => self.registry.enum_info_by_id(id),
        }
    }

    /// Counts one decoded use of a class, applied on commit.
    pub fn note_use(&mut self, key: TypeKey) {
        if self.registry.config().compile_threshold.is_some() {
            *self.staged.uses.entry(key).or_default() += 1;
        }
    }

    /// Publishes what this decode staged. Called once the value is complete.
    pub(crate) fn commit(&mut self) {
        self.registry.commit(std::mem::take(&mut self.staged));
    }

    /// Drops what the current value staged.
    pub(crate) fn discard(&mut self) {
        self.staged = Staged::default();
    }

    fn read_tagged(&mut self, tag: u8, declared: &TypeRef, deserializer: &dyn Deserializer) -> Result<Value> {
        let limit = self.registry.config().max_depth;
        if self.depth >= limit {
            return Err(TransferError::DepthLimitExceeded { limit });
        }
        self.depth += 1;
        let result = deserializer.deserialize(self, tag, declared);
        self.depth -= 1;
        result
    }
}
