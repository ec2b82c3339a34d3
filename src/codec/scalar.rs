use bytes::{Buf, BufMut};

use super::{expect_major, unexpected_view, Deserializer, Serializer};
use crate::context::ensure;
use crate::core::*;
use crate::number::{get_sized, put_sized, read_compact, write_compact};
use crate::{ReadContext, Result, Transfer, TransferError, TypeRef, Value, View, WriteContext};

/// Absent values. Decoding any NULL tag yields [`Value::Null`].
pub struct NullCodec;

impl Serializer for NullCodec {
    fn serialize(&self, ctx: &mut WriteContext<'_>, _value: &dyn Transfer) -> Result<()> {
        ctx.writer().put_u8(TAG_NULL);
        Ok(())
    }
}

impl Deserializer for NullCodec {
    fn deserialize(&self, _ctx: &mut ReadContext<'_>, tag: u8, _declared: &TypeRef) -> Result<Value> {
        expect_major(tag, TAG_NULL)?;
        Ok(Value::Null)
    }
}

/// `[BOOLEAN | value]`
pub struct BoolCodec;

impl Serializer for BoolCodec {
    fn serialize(&self, ctx: &mut WriteContext<'_>, value: &dyn Transfer) -> Result<()> {
        match value.view() {
            View::Bool(flag) => {
                ctx.writer().put_u8(TAG_BOOLEAN | flag as u8);
                Ok(())
            }
            view => Err(unexpected_view(value, &view, TAG_BOOLEAN)),
        }
    }
}

impl Deserializer for BoolCodec {
    fn deserialize(&self, _ctx: &mut ReadContext<'_>, tag: u8, _declared: &TypeRef) -> Result<Value> {
        expect_major(tag, TAG_BOOLEAN)?;
        match extra(tag) {
            0 => Ok(Value::Bool(false)),
            1 => Ok(Value::Bool(true)),
            _ => Err(TransferError::UnsupportedTag(tag)),
        }
    }
}

/// `[NUMBER | width-1][payload]`, see [`crate::number`].
pub struct NumberCodec;

impl Serializer for NumberCodec {
    fn serialize(&self, ctx: &mut WriteContext<'_>, value: &dyn Transfer) -> Result<()> {
        match value.view() {
            View::Number(number) => {
                put_sized(ctx.writer(), TAG_NUMBER, number);
                Ok(())
            }
            view => Err(unexpected_view(value, &view, TAG_NUMBER)),
        }
    }
}

impl Deserializer for NumberCodec {
    fn deserialize(&self, ctx: &mut ReadContext<'_>, tag: u8, _declared: &TypeRef) -> Result<Value> {
        expect_major(tag, TAG_NUMBER)?;
        get_sized(ctx.reader(), tag).map(Value::Number)
    }
}

/// `[DECIMAL | FLOAT][4 bytes]` or `[DECIMAL | DOUBLE][8 bytes]`, big-endian IEEE-754.
pub struct DecimalCodec;

impl Serializer for DecimalCodec {
    fn serialize(&self, ctx: &mut WriteContext<'_>, value: &dyn Transfer) -> Result<()> {
        match value.view() {
            View::Float(float) => {
                let writer = ctx.writer();
                writer.put_u8(TAG_DECIMAL | DECIMAL_FLOAT);
                writer.put_f32(float);
                Ok(())
            }
            View::Double(double) => {
                let writer = ctx.writer();
                writer.put_u8(TAG_DECIMAL | DECIMAL_DOUBLE);
                writer.put_f64(double);
                Ok(())
            }
            view => Err(unexpected_view(value, &view, TAG_DECIMAL)),
        }
    }
}

impl Deserializer for DecimalCodec {
    fn deserialize(&self, ctx: &mut ReadContext<'_>, tag: u8, _declared: &TypeRef) -> Result<Value> {
        expect_major(tag, TAG_DECIMAL)?;
        let reader = ctx.reader();
        match extra(tag) {
            DECIMAL_FLOAT => {
                ensure(reader, 4)?;
                Ok(Value::Float(reader.get_f32()))
            }
            DECIMAL_DOUBLE => {
                ensure(reader, 8)?;
                Ok(Value::Double(reader.get_f64()))
            }
            _ => Err(TransferError::UnsupportedTag(tag)),
        }
    }
}

/// UTF-8 text.
///
/// Up to [`SHORT_STRING_MAX`] bytes: `[STRING | SHORT][len: u8][bytes]`.
/// Longer: `[STRING | LONG][compact len][bytes]`.
pub struct StringCodec;

impl Serializer for StringCodec {
    fn serialize(&self, ctx: &mut WriteContext<'_>, value: &dyn Transfer) -> Result<()> {
        let view = value.view();
        let text = match &view {
            View::Str(text) => text,
            view => return Err(unexpected_view(value, view, TAG_STRING)),
        };
        let bytes = text.as_bytes();
        let writer = ctx.writer();
        if bytes.len() <= SHORT_STRING_MAX {
            writer.put_u8(TAG_STRING | STRING_SHORT);
            writer.put_u8(bytes.len() as u8);
        } else {
            writer.put_u8(TAG_STRING | STRING_LONG);
            write_compact(writer, bytes.len());
        }
        writer.put_slice(bytes);
        Ok(())
    }
}

impl Deserializer for StringCodec {
    fn deserialize(&self, ctx: &mut ReadContext<'_>, tag: u8, _declared: &TypeRef) -> Result<Value> {
        expect_major(tag, TAG_STRING)?;
        let reader = ctx.reader();
        let len = match extra(tag) {
            STRING_SHORT => {
                ensure(reader, 1)?;
                reader.get_u8() as usize
            }
            STRING_LONG => read_compact(reader)?,
            _ => return Err(TransferError::UnsupportedTag(tag)),
        };
        ensure(reader, len)?;
        let bytes = reader.split_to(len);
        String::from_utf8(bytes.to_vec())
            .map(Value::String)
            .map_err(|e| TransferError::InvalidData(e.to_string()))
    }
}

/// Arbitrary-precision numbers. A value that fits `i64` is written as NUMBER,
/// any other value as its decimal text in STRING form. Reads NUMBER, STRING
/// and DECIMAL.
pub struct BigNumberCodec;

impl Serializer for BigNumberCodec {
    fn serialize(&self, ctx: &mut WriteContext<'_>, value: &dyn Transfer) -> Result<()> {
        match value.view() {
            View::Number(number) => {
                put_sized(ctx.writer(), TAG_NUMBER, number);
                Ok(())
            }
            View::Str(_) => StringCodec.serialize(ctx, value),
            view => Err(unexpected_view(value, &view, TAG_NUMBER)),
        }
    }
}

impl Deserializer for BigNumberCodec {
    fn deserialize(&self, ctx: &mut ReadContext<'_>, tag: u8, declared: &TypeRef) -> Result<Value> {
        match major(tag) {
            TAG_NUMBER => NumberCodec.deserialize(ctx, tag, declared),
            TAG_STRING => StringCodec.deserialize(ctx, tag, declared),
            TAG_DECIMAL => DecimalCodec.deserialize(ctx, tag, declared),
            _ => Err(TransferError::UnexpectedTag {
                expected: "NUMBER, STRING or DECIMAL",
                found: tag,
            }),
        }
    }
}

/// `[BYTE_ARRAY][compact len][bytes]`. Decoding shares the input buffer.
pub struct ByteArrayCodec;

impl Serializer for ByteArrayCodec {
    fn serialize(&self, ctx: &mut WriteContext<'_>, value: &dyn Transfer) -> Result<()> {
        match value.view() {
            View::Bytes(bytes) => {
                let writer = ctx.writer();
                writer.put_u8(TAG_BYTE_ARRAY);
                write_compact(writer, bytes.len());
                writer.put_slice(bytes);
                Ok(())
            }
            view => Err(unexpected_view(value, &view, TAG_BYTE_ARRAY)),
        }
    }
}

impl Deserializer for ByteArrayCodec {
    fn deserialize(&self, ctx: &mut ReadContext<'_>, tag: u8, _declared: &TypeRef) -> Result<Value> {
        expect_major(tag, TAG_BYTE_ARRAY)?;
        let reader = ctx.reader();
        let len = read_compact(reader)?;
        ensure(reader, len)?;
        Ok(Value::Bytes(reader.split_to(len)))
    }
}

/// `[DATE_TIME | width-1][payload]` holding epoch milliseconds.
pub struct DateTimeCodec;

impl Serializer for DateTimeCodec {
    fn serialize(&self, ctx: &mut WriteContext<'_>, value: &dyn Transfer) -> Result<()> {
        match value.view() {
            View::DateTime(millis) => {
                put_sized(ctx.writer(), TAG_DATE_TIME, millis);
                Ok(())
            }
            view => Err(unexpected_view(value, &view, TAG_DATE_TIME)),
        }
    }
}

impl Deserializer for DateTimeCodec {
    fn deserialize(&self, ctx: &mut ReadContext<'_>, tag: u8, _declared: &TypeRef) -> Result<Value> {
        expect_major(tag, TAG_DATE_TIME)?;
        get_sized(ctx.reader(), tag).map(Value::DateTime)
    }
}
