//! Tagged binary wire format used by RPC-style applications on top of a
//! raw TCP connection. Every value is preceded by a one-byte type tag and
//! multi-byte scalars travel big-endian. The frame header (version and
//! request code) is untagged.

use crate::error::{AppError, Error, Result};
use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

pub const TAG_INT8: u8 = b'c';
pub const TAG_UINT8: u8 = b'C';
pub const TAG_INT16: u8 = b'h';
pub const TAG_UINT16: u8 = b'H';
pub const TAG_INT32: u8 = b'i';
pub const TAG_UINT32: u8 = b'I';
pub const TAG_INT64: u8 = b'l';
pub const TAG_UINT64: u8 = b'L';
pub const TAG_FLOAT: u8 = b'f';
pub const TAG_DOUBLE: u8 = b'd';
pub const TAG_DATETIME: u8 = b'D';
pub const TAG_BOOL: u8 = b'b';
pub const TAG_NULL: u8 = b'Z';
pub const TAG_STRING: u8 = b'Q';
pub const TAG_BLOB: u8 = b'X';
pub const TAG_ARRAY_START: u8 = b'[';
pub const TAG_ARRAY_END: u8 = b']';
pub const TAG_OBJECT_START: u8 = b'{';
pub const TAG_OBJECT_END: u8 = b'}';

/// Protocol version carried in every frame header.
pub const FRAME_VERSION: u16 = 0x01;

/// Request codes used by the user-directory application.
pub const USER_ADD: u16 = 1;
pub const USER_DEL: u16 = 2;
pub const USER_UPD: u16 = 3;
pub const USER_GET: u16 = 4;

/// Field limits of the user-directory application, in bytes.
pub const NAME_MAX: usize = 50;
pub const NICKNAME_MAX: usize = 50;
pub const EMAIL_MAX: usize = 500;
pub const TEXT_MAX: usize = 1023;

/// Untagged frame header: protocol version plus request code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: u16,
    pub request: u16,
}

/// An outgoing frame under construction. The buffer has a logical size
/// limit; when `can_grow` is set the limit doubles on demand, otherwise
/// writers fail once it is reached.
#[derive(Debug)]
pub struct WriteBuf {
    buf: Vec<u8>,
    limit: usize,
    can_grow: bool,
}

impl WriteBuf {
    pub fn new(initial_size: usize, can_grow: bool) -> Self {
        WriteBuf {
            buf: Vec::with_capacity(initial_size),
            limit: initial_size,
            can_grow,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    fn make_room(&mut self, required: usize) -> Result<()> {
        if self.limit == 0 {
            if !self.can_grow {
                return Err(Error::App(AppError::Overflow));
            }
            self.limit = 1;
        }
        while self.limit - self.buf.len() < required {
            if !self.can_grow {
                return Err(Error::App(AppError::Overflow));
            }
            self.limit *= 2;
        }
        Ok(())
    }

    pub fn write_header(&mut self, header: &FrameHeader) -> Result<()> {
        self.make_room(4)?;
        let _ = self.buf.write_u16::<BigEndian>(header.version);
        let _ = self.buf.write_u16::<BigEndian>(header.request);
        Ok(())
    }

    pub fn write_int8(&mut self, val: i8) -> Result<()> {
        self.make_room(2)?;
        self.buf.push(TAG_INT8);
        let _ = self.buf.write_i8(val);
        Ok(())
    }

    pub fn write_uint8(&mut self, val: u8) -> Result<()> {
        self.make_room(2)?;
        self.buf.push(TAG_UINT8);
        self.buf.push(val);
        Ok(())
    }

    pub fn write_int16(&mut self, val: i16) -> Result<()> {
        self.make_room(3)?;
        self.buf.push(TAG_INT16);
        let _ = self.buf.write_i16::<BigEndian>(val);
        Ok(())
    }

    pub fn write_uint16(&mut self, val: u16) -> Result<()> {
        self.make_room(3)?;
        self.buf.push(TAG_UINT16);
        let _ = self.buf.write_u16::<BigEndian>(val);
        Ok(())
    }

    pub fn write_int32(&mut self, val: i32) -> Result<()> {
        self.make_room(5)?;
        self.buf.push(TAG_INT32);
        let _ = self.buf.write_i32::<BigEndian>(val);
        Ok(())
    }

    pub fn write_uint32(&mut self, val: u32) -> Result<()> {
        self.make_room(5)?;
        self.buf.push(TAG_UINT32);
        let _ = self.buf.write_u32::<BigEndian>(val);
        Ok(())
    }

    pub fn write_int64(&mut self, val: i64) -> Result<()> {
        self.make_room(9)?;
        self.buf.push(TAG_INT64);
        let _ = self.buf.write_i64::<BigEndian>(val);
        Ok(())
    }

    pub fn write_uint64(&mut self, val: u64) -> Result<()> {
        self.make_room(9)?;
        self.buf.push(TAG_UINT64);
        let _ = self.buf.write_u64::<BigEndian>(val);
        Ok(())
    }

    pub fn write_float(&mut self, val: f32) -> Result<()> {
        self.make_room(5)?;
        self.buf.push(TAG_FLOAT);
        let _ = self.buf.write_u32::<BigEndian>(val.to_bits());
        Ok(())
    }

    pub fn write_double(&mut self, val: f64) -> Result<()> {
        self.make_room(9)?;
        self.buf.push(TAG_DOUBLE);
        let _ = self.buf.write_u64::<BigEndian>(val.to_bits());
        Ok(())
    }

    /// Seconds since the epoch.
    pub fn write_datetime(&mut self, val: i64) -> Result<()> {
        self.make_room(9)?;
        self.buf.push(TAG_DATETIME);
        let _ = self.buf.write_i64::<BigEndian>(val);
        Ok(())
    }

    pub fn write_bool(&mut self, val: bool) -> Result<()> {
        self.make_room(2)?;
        self.buf.push(TAG_BOOL);
        self.buf.push(if val { b't' } else { b'f' });
        Ok(())
    }

    pub fn write_null(&mut self) -> Result<()> {
        self.make_room(1)?;
        self.buf.push(TAG_NULL);
        Ok(())
    }

    pub fn write_string(&mut self, val: &str) -> Result<()> {
        let bytes = val.as_bytes();
        self.make_room(bytes.len() + 5)?;
        self.buf.push(TAG_STRING);
        let _ = self.buf.write_u32::<BigEndian>(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    pub fn write_blob(&mut self, val: &[u8]) -> Result<()> {
        self.make_room(val.len() + 5)?;
        self.buf.push(TAG_BLOB);
        let _ = self.buf.write_u32::<BigEndian>(val.len() as u32);
        self.buf.extend_from_slice(val);
        Ok(())
    }

    pub fn write_array_start(&mut self) -> Result<()> {
        self.make_room(1)?;
        self.buf.push(TAG_ARRAY_START);
        Ok(())
    }

    pub fn write_array_end(&mut self) -> Result<()> {
        self.make_room(1)?;
        self.buf.push(TAG_ARRAY_END);
        Ok(())
    }

    pub fn write_object_start(&mut self) -> Result<()> {
        self.make_room(1)?;
        self.buf.push(TAG_OBJECT_START);
        Ok(())
    }

    pub fn write_object_end(&mut self) -> Result<()> {
        self.make_room(1)?;
        self.buf.push(TAG_OBJECT_END);
        Ok(())
    }
}

/// Cursor over a received frame. Every reader checks the type tag first
/// and refuses mismatches without consuming anything.
#[derive(Debug)]
pub struct ReadBuf<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ReadBuf<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        ReadBuf { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn expect_tag(&mut self, tag: u8) -> Result<()> {
        if self.remaining() < 1 || self.buf[self.pos] != tag {
            return Err(Error::App(AppError::Invalid));
        }
        self.pos += 1;
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::App(AppError::Invalid));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_header(&mut self) -> Result<FrameHeader> {
        let bytes = self.take(4)?;
        Ok(FrameHeader {
            version: BigEndian::read_u16(&bytes[0..2]),
            request: BigEndian::read_u16(&bytes[2..4]),
        })
    }

    pub fn read_int8(&mut self) -> Result<i8> {
        self.expect_tag(TAG_INT8)?;
        Ok(self.take(1)?[0] as i8)
    }

    pub fn read_uint8(&mut self) -> Result<u8> {
        self.expect_tag(TAG_UINT8)?;
        Ok(self.take(1)?[0])
    }

    pub fn read_int16(&mut self) -> Result<i16> {
        self.expect_tag(TAG_INT16)?;
        Ok(BigEndian::read_i16(self.take(2)?))
    }

    pub fn read_uint16(&mut self) -> Result<u16> {
        self.expect_tag(TAG_UINT16)?;
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    pub fn read_int32(&mut self) -> Result<i32> {
        self.expect_tag(TAG_INT32)?;
        Ok(BigEndian::read_i32(self.take(4)?))
    }

    pub fn read_uint32(&mut self) -> Result<u32> {
        self.expect_tag(TAG_UINT32)?;
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    pub fn read_int64(&mut self) -> Result<i64> {
        self.expect_tag(TAG_INT64)?;
        Ok(BigEndian::read_i64(self.take(8)?))
    }

    pub fn read_uint64(&mut self) -> Result<u64> {
        self.expect_tag(TAG_UINT64)?;
        Ok(BigEndian::read_u64(self.take(8)?))
    }

    pub fn read_float(&mut self) -> Result<f32> {
        self.expect_tag(TAG_FLOAT)?;
        Ok(f32::from_bits(BigEndian::read_u32(self.take(4)?)))
    }

    pub fn read_double(&mut self) -> Result<f64> {
        self.expect_tag(TAG_DOUBLE)?;
        Ok(f64::from_bits(BigEndian::read_u64(self.take(8)?)))
    }

    pub fn read_datetime(&mut self) -> Result<i64> {
        self.expect_tag(TAG_DATETIME)?;
        Ok(BigEndian::read_i64(self.take(8)?))
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        self.expect_tag(TAG_BOOL)?;
        match self.take(1)?[0] {
            b't' => Ok(true),
            b'f' => Ok(false),
            _ => Err(Error::App(AppError::Invalid)),
        }
    }

    pub fn read_null(&mut self) -> Result<()> {
        self.expect_tag(TAG_NULL)
    }

    /// Read a length-prefixed string of at most `max_len` bytes.
    pub fn read_string(&mut self, max_len: usize) -> Result<String> {
        self.expect_tag(TAG_STRING)?;
        let len = BigEndian::read_u32(self.take(4)?) as usize;
        if len > max_len {
            return Err(Error::App(AppError::Overflow));
        }
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| Error::App(AppError::Invalid))
    }

    /// Read a length-prefixed blob into `dest`; refuses lengths that would
    /// overflow it. Returns the payload length.
    pub fn read_blob(&mut self, dest: &mut [u8]) -> Result<usize> {
        self.expect_tag(TAG_BLOB)?;
        let len = BigEndian::read_u32(self.take(4)?) as usize;
        if len > dest.len() {
            return Err(Error::App(AppError::Overflow));
        }
        let bytes = self.take(len)?;
        dest[..len].copy_from_slice(bytes);
        Ok(len)
    }

    pub fn read_array_start(&mut self) -> Result<()> {
        self.expect_tag(TAG_ARRAY_START)
    }

    pub fn read_array_end(&mut self) -> Result<()> {
        self.expect_tag(TAG_ARRAY_END)
    }

    pub fn read_object_start(&mut self) -> Result<()> {
        self.expect_tag(TAG_OBJECT_START)
    }

    pub fn read_object_end(&mut self) -> Result<()> {
        self.expect_tag(TAG_OBJECT_END)
    }
}
