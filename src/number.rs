//! Minimal-width integer encoding.
//!
//! An integer is written as a tag whose low nibble is `width - 1`, followed by the
//! low `width` bytes of its two's-complement form, most significant first. The width
//! is the smallest byte count whose range covers the value:
//!
//! | value range                  | width |
//! |------------------------------|-------|
//! | `-128 ..= 127`               | 1     |
//! | `-32768 ..= 32767`           | 2     |
//! | `-2^23 ..= 2^23 - 1`         | 3     |
//! | ...                          | ...   |
//! | everything else              | 8     |
//!
//! Decoding sign-extends from the top bit of the first byte.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::context::ensure;
use crate::core::{extra, major, TAG_NUMBER};
use crate::{Result, TransferError};

pub const MAX_WIDTH: usize = 8;

/// Number of bytes needed to hold `value` in two's complement.
pub fn width_of(value: i64) -> usize {
    let significant = if value < 0 {
        64 - value.leading_ones() as usize
    } else {
        64 - value.leading_zeros() as usize
    };
    // one extra bit for the sign
    (significant + 1).div_ceil(8).clamp(1, MAX_WIDTH)
}

/// Writes `major | (width - 1)` followed by the minimal big-endian payload.
pub fn put_sized(writer: &mut BytesMut, major: u8, value: i64) {
    let width = width_of(value);
    writer.put_u8(major | (width - 1) as u8);
    writer.put_slice(&value.to_be_bytes()[MAX_WIDTH - width..]);
}

/// Reads the payload announced by `tag`, whose low nibble must be a width of 1 to 8.
pub fn get_sized(reader: &mut Bytes, tag: u8) -> Result<i64> {
    let width = extra(tag) as usize + 1;
    if width > MAX_WIDTH {
        return Err(TransferError::UnsupportedTag(tag));
    }
    ensure(reader, width)?;
    let first = reader.get_u8();
    let mut value = first as i8 as i64;
    for _ in 1..width {
        value = (value << 8) | reader.get_u8() as i64;
    }
    Ok(value)
}

/// Writes a complete NUMBER value.
pub fn write_number(writer: &mut BytesMut, value: i64) {
    put_sized(writer, TAG_NUMBER, value);
}

/// Reads a complete NUMBER value, tag included.
pub fn read_number(reader: &mut Bytes) -> Result<i64> {
    ensure(reader, 1)?;
    let tag = reader.get_u8();
    if major(tag) != TAG_NUMBER {
        return Err(TransferError::UnexpectedTag {
            expected: "NUMBER",
            found: tag,
        });
    }
    get_sized(reader, tag)
}

/// Writes a length, count or id as a NUMBER value.
pub fn write_compact(writer: &mut BytesMut, value: usize) {
    write_number(writer, value as i64);
}

/// Reads a length, count or id written by [`write_compact`].
pub fn read_compact(reader: &mut Bytes) -> Result<usize> {
    let value = read_number(reader)?;
    usize::try_from(value)
        .map_err(|_| TransferError::InvalidData(format!("negative length or id {}", value)))
}

/// Reads a class id written by [`write_compact`].
pub fn read_id(reader: &mut Bytes) -> Result<u32> {
    let value = read_number(reader)?;
    u32::try_from(value).map_err(|_| TransferError::InvalidData(format!("class id {} out of range", value)))
}
