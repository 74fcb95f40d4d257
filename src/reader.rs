//! The read-side engine.
//!
//! Handles memory-mapping (or buffering) the stream, validating the global
//! preamble, and rehydrating the node tree by recursive tag dispatch.
//!
//! Decoding always builds into fresh state: each collection's entries are
//! decoded into a temporary structure and committed only after the whole
//! payload succeeds, and `decode` as a whole returns a brand-new
//! [`Document`]. A failure at any depth therefore leaves the caller's data
//! exactly as it was.
//!
//! Every address and count is validated against the stream bounds before it
//! is followed or allocated for; recursion is capped at
//! [`crate::constants::MAX_DECODE_DEPTH`] so a crafted file with aliased
//! collection addresses terminates with an error instead of exhausting the
//! stack.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use memmap2::Mmap;
use tracing::trace;

use crate::codec::{ByteReader, Endian};
use crate::constants::MAX_DECODE_DEPTH;
use crate::error::{ObjectoidError, Result};
use crate::format::{FlagByte, TypeTag, HEADER_SIZE, ROOT_ADDRESS_OFFSET};
use crate::tree::{Document, NodeId, NtString, Value};

/// Byte length of the metadata fields this reader understands: the block
/// length plus the identifier offset. Anything past them is a newer
/// writer's business and is skipped.
const KNOWN_METADATA_FIELDS: usize = 6;

/// The main handle for reading an Objectoid file.
///
/// Holds the complete byte image of the document: a memory map for
/// [`ObjectoidReader::open`], an owned buffer otherwise.
#[derive(Debug)]
pub struct ObjectoidReader {
    data: ReaderData,
}

#[derive(Debug)]
enum ReaderData {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl ObjectoidReader {
    /// Opens a document file via memory mapping.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE as u64 {
            return Err(ObjectoidError::MalformedData(format!(
                "stream of {file_size} bytes is smaller than the header"
            )));
        }

        // Safety: mapping assumes no concurrent modification of the file;
        // exclusive access for the duration of a load is part of the
        // documented resource model.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };

        Ok(Self {
            data: ReaderData::Mapped(mmap),
        })
    }

    /// Buffers a document from any readable stream.
    ///
    /// The stream is borrowed and left open; closing it remains the
    /// caller's business.
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        Ok(Self::from_bytes(buffer))
    }

    /// Wraps an already-materialized byte image.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            data: ReaderData::Owned(bytes),
        }
    }

    /// The complete byte image.
    pub fn bytes(&self) -> &[u8] {
        match &self.data {
            ReaderData::Owned(buffer) => buffer,
            ReaderData::Mapped(mmap) => mmap,
        }
    }

    /// Decodes the image into a fresh document.
    pub fn decode(&self) -> Result<Document> {
        decode_document(self.bytes())
    }
}

/// Decodes a complete byte image into a fresh [`Document`].
pub fn decode_document(data: &[u8]) -> Result<Document> {
    if data.len() < HEADER_SIZE {
        return Err(ObjectoidError::MalformedData(format!(
            "stream of {} bytes is smaller than the header",
            data.len()
        )));
    }

    let flags = FlagByte::from_byte(data[0]);
    let decoder = Decoder {
        data,
        int_endian: Endian::from_flag(flags.int_little_endian()),
        float_endian: Endian::from_flag(flags.float_little_endian()),
    };

    let mut header = ByteReader::at(data, ROOT_ADDRESS_OFFSET)?;
    let root_address = decoder.read_address(&mut header)?;

    let mut doc = Document::new();
    if flags.has_metadata() {
        decoder.read_metadata_block(&mut doc)?;
    }

    let root = doc.root();
    decoder.decode_object_into(&mut doc, root, root_address, 0)?;
    Ok(doc)
}

/// Decodes a document from any readable stream.
pub fn load_from_reader<R: Read>(reader: &mut R) -> Result<Document> {
    ObjectoidReader::from_reader(reader)?.decode()
}

struct Decoder<'a> {
    data: &'a [u8],
    int_endian: Endian,
    float_endian: Endian,
}

impl<'a> Decoder<'a> {
    /// Reads an `i32` address field and validates it lands in the stream.
    fn read_address(&self, reader: &mut ByteReader<'a>) -> Result<usize> {
        let raw = reader.i32(self.int_endian)?;
        if raw < 0 {
            return Err(ObjectoidError::MalformedData(format!(
                "negative address {raw}"
            )));
        }
        let address = raw as usize;
        if address >= self.data.len() {
            return Err(ObjectoidError::MalformedData(format!(
                "address {address} is outside the stream ({} bytes)",
                self.data.len()
            )));
        }
        Ok(address)
    }

    /// Reads the metadata block: a length-prefixed offset table whose
    /// unknown trailing fields are skipped, keeping old readers compatible
    /// with files written by newer code.
    fn read_metadata_block(&self, doc: &mut Document) -> Result<()> {
        let mut reader = ByteReader::at(self.data, HEADER_SIZE)?;
        let block_length = reader.u16(self.int_endian)? as usize;
        if block_length < KNOWN_METADATA_FIELDS {
            return Err(ObjectoidError::MalformedData(format!(
                "metadata block of {block_length} bytes is smaller than its own offset table"
            )));
        }
        if HEADER_SIZE + block_length > self.data.len() {
            return Err(ObjectoidError::MalformedData(format!(
                "metadata block of {block_length} bytes does not fit in the stream"
            )));
        }

        let identifier_offset = reader.i32(self.int_endian)?;
        if identifier_offset != 0 {
            if identifier_offset < 0 {
                return Err(ObjectoidError::MalformedData(format!(
                    "negative metadata field offset {identifier_offset}"
                )));
            }
            let mut payload = ByteReader::at(self.data, identifier_offset as usize)?;
            doc.set_identifier(Some(payload.text(self.int_endian)?));
        }

        if block_length > KNOWN_METADATA_FIELDS {
            trace!(
                unknown_bytes = block_length - KNOWN_METADATA_FIELDS,
                "skipping unrecognized metadata fields"
            );
        }
        Ok(())
    }

    /// Decodes an object payload at `address` into the (empty) `object`
    /// node. Entries are gathered into a temporary list and committed only
    /// once the whole payload has decoded.
    fn decode_object_into(
        &self,
        doc: &mut Document,
        object: NodeId,
        address: usize,
        depth: usize,
    ) -> Result<()> {
        self.check_depth(depth)?;
        let mut reader = ByteReader::at(self.data, address)?;
        // name address + tag byte is the smallest possible entry
        let count = self.read_count(&mut reader, 5)?;

        let mut entries: Vec<(NtString, NodeId)> = Vec::with_capacity(count);
        for _ in 0..count {
            let name_address = self.read_address(&mut reader)?;
            let mut name_reader = ByteReader::at(self.data, name_address)?;
            let name = NtString::new(name_reader.nt_bytes()?.to_vec())?;
            let child = self.decode_reference(doc, &mut reader, depth)?;
            entries.push((name, child));
        }

        for (name, child) in entries {
            doc.object_insert(object, name, child).map_err(|err| match err {
                ObjectoidError::InvalidArgument(reason) => ObjectoidError::MalformedData(format!(
                    "object payload at {address}: {reason}"
                )),
                other => other,
            })?;
        }
        Ok(())
    }

    /// Decodes a list payload at `address` into the (empty) `list` node.
    fn decode_list_into(
        &self,
        doc: &mut Document,
        list: NodeId,
        address: usize,
        depth: usize,
    ) -> Result<()> {
        self.check_depth(depth)?;
        let mut reader = ByteReader::at(self.data, address)?;
        // a lone tag byte is the smallest possible entry
        let count = self.read_count(&mut reader, 1)?;

        let mut children = Vec::with_capacity(count);
        for _ in 0..count {
            children.push(self.decode_reference(doc, &mut reader, depth)?);
        }

        for child in children {
            doc.list_push(list, child)?;
        }
        Ok(())
    }

    /// Decodes one node reference: a tag byte, then an address to follow or
    /// an inline payload. Every reference yields a fresh, independently
    /// owned node, even when several references share one interned address.
    fn decode_reference(
        &self,
        doc: &mut Document,
        reader: &mut ByteReader<'a>,
        depth: usize,
    ) -> Result<NodeId> {
        let tag = TypeTag::from_byte(reader.u8()?)?;
        let value = match tag {
            TypeTag::Null => Value::Null,
            TypeTag::Object => {
                let address = self.read_address(reader)?;
                let object = doc.new_object();
                self.decode_object_into(doc, object, address, depth + 1)?;
                return Ok(object);
            }
            TypeTag::List => {
                let address = self.read_address(reader)?;
                let list = doc.new_list();
                self.decode_list_into(doc, list, address, depth + 1)?;
                return Ok(list);
            }
            TypeTag::NtString => {
                let address = self.read_address(reader)?;
                let mut payload = ByteReader::at(self.data, address)?;
                Value::NtString(NtString::new(payload.nt_bytes()?.to_vec())?)
            }
            TypeTag::Text => {
                let address = self.read_address(reader)?;
                let mut payload = ByteReader::at(self.data, address)?;
                Value::Text(payload.text(self.int_endian)?)
            }
            TypeTag::RawBytes => {
                let address = self.read_address(reader)?;
                let mut payload = ByteReader::at(self.data, address)?;
                Value::RawBytes(payload.raw_block(self.int_endian)?.to_vec())
            }
            TypeTag::U8 => Value::U8(reader.u8()?),
            TypeTag::I8 => Value::I8(reader.i8()?),
            TypeTag::U16 => Value::U16(reader.u16(self.int_endian)?),
            TypeTag::I16 => Value::I16(reader.i16(self.int_endian)?),
            TypeTag::U32 => Value::U32(reader.u32(self.int_endian)?),
            TypeTag::I32 => Value::I32(reader.i32(self.int_endian)?),
            TypeTag::U64 => Value::U64(reader.u64(self.int_endian)?),
            TypeTag::I64 => Value::I64(reader.i64(self.int_endian)?),
            TypeTag::F32 => Value::F32(reader.f32(self.float_endian)?),
            TypeTag::F64 => Value::F64(reader.f64(self.float_endian)?),
            TypeTag::Bool => Value::Bool(reader.bool()?),
        };
        Ok(doc.add_node(value))
    }

    /// Reads a collection entry count and rejects counts that could not
    /// possibly fit in the remaining bytes, so a corrupt count fails before
    /// any allocation is sized from it.
    fn read_count(&self, reader: &mut ByteReader<'a>, min_entry_size: usize) -> Result<usize> {
        let raw = reader.i32(self.int_endian)?;
        if raw < 0 {
            return Err(ObjectoidError::MalformedData(format!(
                "negative entry count {raw}"
            )));
        }
        let count = raw as usize;
        if count.saturating_mul(min_entry_size) > reader.remaining() {
            return Err(ObjectoidError::MalformedData(format!(
                "entry count {count} does not fit in the remaining {} bytes",
                reader.remaining()
            )));
        }
        Ok(count)
    }

    fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > MAX_DECODE_DEPTH {
            return Err(ObjectoidError::MalformedData(format!(
                "collection nesting exceeds {MAX_DECODE_DEPTH} levels"
            )));
        }
        Ok(())
    }
}
