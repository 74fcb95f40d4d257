//! Endianness-aware primitive codecs over in-memory byte images.
//!
//! Everything multi-byte in the format goes through this module: fixed-width
//! integers and floats (each family governed by its own endianness flag),
//! booleans, null-terminated byte strings, length-prefixed text with an
//! auto-selected 8/16-bit character width, and length-prefixed raw blocks.
//!
//! Encoding assembles the whole document into a [`ByteImage`] before a single
//! write to the caller's stream; decoding reads from a borrowed `&[u8]`
//! through [`ByteReader`], which bounds-checks every access and reports
//! truncation as [`ObjectoidError::MalformedData`]. No buffer is ever
//! reinterpreted in place; all conversions go through fixed-size arrays.

use crate::error::{ObjectoidError, Result};

/// Byte order selector for one family of fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    /// Least-significant byte first.
    Little,
    /// Most-significant byte first.
    Big,
}

impl Endian {
    /// Maps a flag bit (true = little-endian) to a selector.
    pub fn from_flag(little: bool) -> Self {
        if little { Self::Little } else { Self::Big }
    }

    /// Returns true for [`Endian::Little`].
    pub fn is_little(self) -> bool {
        matches!(self, Self::Little)
    }
}

/// Sign bit of the text header, set when every character fits in 8 bits.
const TEXT_NARROW_FLAG: i32 = i32::MIN;

macro_rules! reader_int {
    ($($name:ident: $ty:ty),* $(,)?) => {
        $(
            #[doc = concat!("Reads one `", stringify!($ty), "` in the given byte order.")]
            pub fn $name(&mut self, endian: Endian) -> Result<$ty> {
                const N: usize = std::mem::size_of::<$ty>();
                let bytes = self.take(N)?;
                let mut buf = [0u8; N];
                buf.copy_from_slice(bytes);
                Ok(match endian {
                    Endian::Little => <$ty>::from_le_bytes(buf),
                    Endian::Big => <$ty>::from_be_bytes(buf),
                })
            }
        )*
    };
}

macro_rules! image_int {
    ($($name:ident: $ty:ty),* $(,)?) => {
        $(
            #[doc = concat!("Appends one `", stringify!($ty), "` in the given byte order.")]
            pub fn $name(&mut self, value: $ty, endian: Endian) {
                let bytes = match endian {
                    Endian::Little => value.to_le_bytes(),
                    Endian::Big => value.to_be_bytes(),
                };
                self.buf.extend_from_slice(&bytes);
            }
        )*
    };
}

/// A bounds-checked cursor over a borrowed byte image.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Creates a cursor at the start of the image.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Creates a cursor at an absolute offset, validating that the offset
    /// lands inside the image.
    pub fn at(data: &'a [u8], offset: usize) -> Result<Self> {
        if offset >= data.len() {
            return Err(ObjectoidError::MalformedData(format!(
                "address {offset} is outside the stream ({} bytes)",
                data.len()
            )));
        }
        Ok(Self { data, pos: offset })
    }

    /// Current absolute position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left before the end of the image.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(ObjectoidError::MalformedData(format!(
                "truncated stream: need {n} bytes at offset {}, {} remain",
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Reads one byte.
    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Reads one signed byte.
    pub fn i8(&mut self) -> Result<i8> {
        Ok(self.u8()? as i8)
    }

    /// Reads one boolean byte; any nonzero value is `true`.
    pub fn bool(&mut self) -> Result<bool> {
        Ok(self.u8()? != 0)
    }

    reader_int! {
        u16: u16, i16: i16, u32: u32, i32: i32, u64: u64, i64: i64,
    }

    /// Reads one `f32` in the given byte order.
    pub fn f32(&mut self, endian: Endian) -> Result<f32> {
        let bits = self.u32(endian)?;
        Ok(f32::from_bits(bits))
    }

    /// Reads one `f64` in the given byte order.
    pub fn f64(&mut self, endian: Endian) -> Result<f64> {
        let bits = self.u64(endian)?;
        Ok(f64::from_bits(bits))
    }

    /// Reads bytes up to (and consuming) the 0x00 terminator.
    pub fn nt_bytes(&mut self) -> Result<&'a [u8]> {
        let rest = &self.data[self.pos..];
        let terminator = rest.iter().position(|b| *b == 0).ok_or_else(|| {
            ObjectoidError::MalformedData(format!(
                "unterminated NT string at offset {}",
                self.pos
            ))
        })?;
        let slice = &rest[..terminator];
        self.pos += terminator + 1;
        Ok(slice)
    }

    /// Reads a length-prefixed text payload: an `i32` whose low 31 bits are
    /// the UTF-16 code-unit count and whose sign bit marks 8-bit characters,
    /// then that many 1- or 2-byte units.
    pub fn text(&mut self, int_endian: Endian) -> Result<String> {
        let header = self.i32(int_endian)?;
        let narrow = header < 0;
        let count = (header & i32::MAX) as usize;
        let width = if narrow { 1 } else { 2 };
        if count.saturating_mul(width) > self.remaining() {
            return Err(ObjectoidError::MalformedData(format!(
                "text of {count} units does not fit in the remaining {} bytes",
                self.remaining()
            )));
        }
        let mut units = Vec::with_capacity(count);
        if narrow {
            for byte in self.take(count)? {
                units.push(u16::from(*byte));
            }
        } else {
            for _ in 0..count {
                units.push(self.u16(int_endian)?);
            }
        }
        String::from_utf16(&units)
            .map_err(|_| ObjectoidError::MalformedData("text is not valid UTF-16".into()))
    }

    /// Reads a length-prefixed raw block.
    pub fn raw_block(&mut self, int_endian: Endian) -> Result<&'a [u8]> {
        let length = self.i32(int_endian)?;
        if length < 0 {
            return Err(ObjectoidError::MalformedData(format!(
                "negative raw block length {length}"
            )));
        }
        self.take(length as usize)
    }
}

/// A growable, append-only byte image with in-place patching.
///
/// The current length doubles as the stream position, so a value's address
/// is simply the image length at the moment its encoding begins.
#[derive(Debug, Default)]
pub struct ByteImage {
    buf: Vec<u8>,
}

impl ByteImage {
    /// Creates an empty image.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current stream position (equals the number of bytes written).
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    /// Appends one byte.
    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Appends one signed byte.
    pub fn put_i8(&mut self, value: i8) {
        self.buf.push(value as u8);
    }

    /// Appends one boolean byte.
    pub fn put_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    image_int! {
        put_u16: u16, put_i16: i16, put_u32: u32, put_i32: i32,
        put_u64: u64, put_i64: i64,
    }

    /// Appends one `f32` in the given byte order.
    pub fn put_f32(&mut self, value: f32, endian: Endian) {
        self.put_u32(value.to_bits(), endian);
    }

    /// Appends one `f64` in the given byte order.
    pub fn put_f64(&mut self, value: f64, endian: Endian) {
        self.put_u64(value.to_bits(), endian);
    }

    /// Overwrites a previously written `i32` at an absolute position.
    pub fn patch_i32(&mut self, at: usize, value: i32, endian: Endian) -> Result<()> {
        let bytes = match endian {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        };
        let slot = self.buf.get_mut(at..at + 4).ok_or_else(|| {
            ObjectoidError::Internal(format!("patch position {at} outside the image"))
        })?;
        slot.copy_from_slice(&bytes);
        Ok(())
    }

    /// Overwrites a previously written `u16` at an absolute position.
    pub fn patch_u16(&mut self, at: usize, value: u16, endian: Endian) -> Result<()> {
        let bytes = match endian {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        };
        let slot = self.buf.get_mut(at..at + 2).ok_or_else(|| {
            ObjectoidError::Internal(format!("patch position {at} outside the image"))
        })?;
        slot.copy_from_slice(&bytes);
        Ok(())
    }

    /// Appends a null-terminated byte string. The content is guaranteed free
    /// of zero bytes by [`NtString`](crate::NtString) construction.
    pub fn put_nt_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        self.buf.push(0);
    }

    /// Appends a length-prefixed text payload, choosing the 8-bit character
    /// width when every UTF-16 unit fits in one byte.
    pub fn put_text(&mut self, text: &str, int_endian: Endian) -> Result<()> {
        let units: Vec<u16> = text.encode_utf16().collect();
        if units.len() > i32::MAX as usize {
            return Err(ObjectoidError::InvalidArgument(format!(
                "text of {} UTF-16 units exceeds the 31-bit count field",
                units.len()
            )));
        }
        let narrow = units.iter().all(|unit| *unit <= 0xFF);
        let mut header = units.len() as i32;
        if narrow {
            header |= TEXT_NARROW_FLAG;
        }
        self.put_i32(header, int_endian);
        for unit in units {
            if narrow {
                self.put_u8(unit as u8);
            } else {
                self.put_u16(unit, int_endian);
            }
        }
        Ok(())
    }

    /// Appends a length-prefixed raw block.
    pub fn put_raw_block(&mut self, bytes: &[u8], int_endian: Endian) -> Result<()> {
        if bytes.len() > i32::MAX as usize {
            return Err(ObjectoidError::InvalidArgument(format!(
                "raw block of {} bytes exceeds the 31-bit length field",
                bytes.len()
            )));
        }
        self.put_i32(bytes.len() as i32, int_endian);
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Consumes the image, yielding the finished byte vector.
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }

    /// Borrows the bytes written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}
