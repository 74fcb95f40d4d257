//! Defines the physical binary layout of Objectoid documents.
//!
//! # Layout Strategy
//! A document is written dependencies-first: everything an encoded node
//! refers to by address already exists earlier in the stream, except for the
//! root pointer in the header, which is patched once the root collection has
//! been written.
//!
//! File: `[Flag Byte] [Root Address] [Metadata Block?] [Name Table] [Raw
//! Bytes] [Value Table] [Collections]`
//!
//! ## Node references
//! Wherever a collection entry refers to a node, it writes one type-tag byte
//! followed by either an absolute `i32` address (addressable types), the
//! value itself (inline scalars), or nothing (`Null`).
//!
//! ## Metadata block
//! `[u16 block length] [i32 identifier offset] [future fields...] [payloads]`
//!
//! The block length counts from the length field itself, so a reader that
//! recognizes only the identifier field can still skip fields appended by
//! newer writers. A zero identifier offset means the field is absent.

use crate::error::{ObjectoidError, Result};

/// Byte length of the fixed header: flag byte plus root address.
pub const HEADER_SIZE: usize = 5;

/// Stream offset of the root-address field inside the header.
pub const ROOT_ADDRESS_OFFSET: usize = 1;

/// The largest stream offset an address field can represent. Addresses are
/// stored as `i32` with the sign bit unavailable.
pub const MAX_ADDRESS: u64 = i32::MAX as u64;

/// Converts a stream position into an address, failing with
/// [`ObjectoidError::Overflow`] once the position leaves the 31-bit range.
pub fn address_of(position: usize) -> Result<u32> {
    let position = position as u64;
    if position > MAX_ADDRESS {
        return Err(ObjectoidError::Overflow(position));
    }
    Ok(position as u32)
}

/// Document-wide configuration flags, stored in the first byte of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagByte(u8);

impl FlagByte {
    const INT_LITTLE_ENDIAN_MASK: u8 = 0b0000_0001; // Bit 0
    const FLOAT_LITTLE_ENDIAN_MASK: u8 = 0b0000_0010; // Bit 1
    const HAS_METADATA_MASK: u8 = 0b0000_0100; // Bit 2

    /// Creates a new FlagByte.
    pub fn new(int_little_endian: bool, float_little_endian: bool, has_metadata: bool) -> Self {
        let mut byte = 0;
        if int_little_endian {
            byte |= Self::INT_LITTLE_ENDIAN_MASK;
        }
        if float_little_endian {
            byte |= Self::FLOAT_LITTLE_ENDIAN_MASK;
        }
        if has_metadata {
            byte |= Self::HAS_METADATA_MASK;
        }
        Self(byte)
    }

    /// Decodes the byte.
    pub fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    /// Returns true if integer-width fields are little-endian.
    pub fn int_little_endian(&self) -> bool {
        (self.0 & Self::INT_LITTLE_ENDIAN_MASK) != 0
    }

    /// Returns true if floating-point fields are little-endian.
    pub fn float_little_endian(&self) -> bool {
        (self.0 & Self::FLOAT_LITTLE_ENDIAN_MASK) != 0
    }

    /// Returns true if the document carries a metadata block.
    pub fn has_metadata(&self) -> bool {
        (self.0 & Self::HAS_METADATA_MASK) != 0
    }

    /// Returns the raw byte representation.
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

/// The one-byte discriminator preceding every node reference.
///
/// This is a closed, versioned set: a byte outside it is a hard decode
/// error, never silently skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum TypeTag {
    /// No payload; never addressed.
    Null = 0x00,
    /// Insertion-ordered mapping from property names to child nodes.
    Object = 0x01,
    /// Ordered sequence of child nodes.
    List = 0x02,
    /// Null-terminated byte string; deduplicated by content.
    NtString = 0x03,
    /// UTF-16-range text; deduplicated by content.
    Text = 0x04,
    /// Unsigned 8-bit scalar, inlined.
    U8 = 0x05,
    /// Signed 8-bit scalar, inlined.
    I8 = 0x06,
    /// Unsigned 16-bit scalar, inlined.
    U16 = 0x07,
    /// Signed 16-bit scalar, inlined.
    I16 = 0x08,
    /// Unsigned 32-bit scalar, inlined.
    U32 = 0x09,
    /// Signed 32-bit scalar, inlined.
    I32 = 0x0A,
    /// Unsigned 64-bit scalar, inlined.
    U64 = 0x0B,
    /// Signed 64-bit scalar, inlined.
    I64 = 0x0C,
    /// Single-precision float, inlined.
    F32 = 0x0D,
    /// Double-precision float, inlined.
    F64 = 0x0E,
    /// Boolean scalar, inlined.
    Bool = 0x0F,
    /// Length-prefixed byte blob; addressed by identity, never merged.
    RawBytes = 0x10,
}

impl TypeTag {
    /// Decodes a tag byte, rejecting anything outside the closed set.
    pub fn from_byte(byte: u8) -> Result<Self> {
        Ok(match byte {
            0x00 => Self::Null,
            0x01 => Self::Object,
            0x02 => Self::List,
            0x03 => Self::NtString,
            0x04 => Self::Text,
            0x05 => Self::U8,
            0x06 => Self::I8,
            0x07 => Self::U16,
            0x08 => Self::I16,
            0x09 => Self::U32,
            0x0A => Self::I32,
            0x0B => Self::U64,
            0x0C => Self::I64,
            0x0D => Self::F32,
            0x0E => Self::F64,
            0x0F => Self::Bool,
            0x10 => Self::RawBytes,
            other => {
                return Err(ObjectoidError::MalformedData(format!(
                    "unknown type tag 0x{other:02X}"
                )));
            }
        })
    }

    /// Returns the raw byte value.
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Returns true for types written once at an address and referenced by
    /// it, as opposed to being inlined at the reference site.
    pub fn is_addressable(&self) -> bool {
        matches!(
            self,
            Self::Object | Self::List | Self::NtString | Self::Text | Self::RawBytes
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn flag_bits_are_independent() {
        let flags = FlagByte::new(true, false, true);
        assert!(flags.int_little_endian());
        assert!(!flags.float_little_endian());
        assert!(flags.has_metadata());
        assert_eq!(flags.as_u8(), 0b0000_0101);
        assert_eq!(FlagByte::from_byte(flags.as_u8()), flags);
    }

    #[test]
    fn tag_roundtrip_covers_closed_set() {
        for byte in 0x00..=0x10u8 {
            let tag = TypeTag::from_byte(byte).unwrap();
            assert_eq!(tag.as_u8(), byte);
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert!(TypeTag::from_byte(0x11).is_err());
        assert!(TypeTag::from_byte(0xFF).is_err());
    }

    #[test]
    fn address_overflow_detected() {
        assert_eq!(address_of(0).unwrap(), 0);
        assert_eq!(address_of(i32::MAX as usize).unwrap(), i32::MAX as u32);
        assert!(matches!(
            address_of(i32::MAX as usize + 1),
            Err(ObjectoidError::Overflow(_))
        ));
    }
}
