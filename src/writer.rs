//! The encode engine.
//!
//! Encoding runs in three phases over a stable snapshot of the tree:
//!
//! 1. **Discovery**: one depth-first walk from the root collects the
//!    distinct collections in child-before-parent order, the deduplicated
//!    value-typed nodes and property names in canonical sorted order, and
//!    the identity-addressed raw-byte nodes in discovery order.
//! 2. **Write**: sections are emitted dependencies-first — name table, raw
//!    bytes, value table, then collections — so every address a collection
//!    entry resolves already exists. Addresses register against the intern
//!    tables the moment each encoding begins.
//! 3. **Patch**: the root pointer in the header is the single true forward
//!    reference; it is rewritten once the root collection has been written.
//!
//! The same logical document therefore always produces byte-identical
//! output for a given flag configuration, independent of the order nodes
//! were attached.

use std::collections::BTreeSet;
use std::io::Write;

use tracing::{debug, trace};

use crate::codec::{ByteImage, Endian};
use crate::error::{ObjectoidError, Result};
use crate::format::{self, FlagByte, ROOT_ADDRESS_OFFSET};
use crate::intern::{AddressTable, ValueKey};
use crate::tree::{Document, NodeId, NtString, Value};

/// Encoding configuration: byte order for the integer-width and the
/// floating-point field families, selected independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// Byte order of every integer-width field, including addresses and
    /// counts.
    pub int_endian: Endian,
    /// Byte order of every floating-point field.
    pub float_endian: Endian,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            int_endian: Endian::Little,
            float_endian: Endian::Little,
        }
    }
}

/// Encodes a document into its complete byte image.
pub fn encode_document(doc: &Document, options: &SaveOptions) -> Result<Vec<u8>> {
    let discovery = discover(doc);
    debug!(
        collections = discovery.collections.len(),
        values = discovery.values.len(),
        names = discovery.names.len(),
        raw_blocks = discovery.misc.len(),
        "discovery walk complete"
    );
    let mut encoder = Encoder {
        doc,
        image: ByteImage::new(),
        int_endian: options.int_endian,
        float_endian: options.float_endian,
        values: AddressTable::new("value"),
        names: AddressTable::new("name"),
        identities: AddressTable::new("identity"),
    };
    encoder.run(&discovery)?;
    Ok(encoder.image.into_vec())
}

/// Encodes a document and writes the finished image to `writer`.
///
/// The stream is borrowed, flushed, and left open; closing it remains the
/// caller's business. On error nothing further is written.
pub fn save_to_writer<W: Write>(doc: &Document, writer: &mut W, options: &SaveOptions) -> Result<()> {
    let image = encode_document(doc, options)?;
    writer.write_all(&image)?;
    writer.flush()?;
    Ok(())
}

/// Everything the write phase needs to know, gathered in one walk.
struct Discovery {
    /// Collections in child-before-parent order; the root is last.
    collections: Vec<NodeId>,
    /// Deduplicated value-typed content in canonical table order.
    values: BTreeSet<ValueKey>,
    /// Deduplicated property names in canonical table order.
    names: BTreeSet<NtString>,
    /// Identity-addressed raw-byte nodes in discovery order.
    misc: Vec<NodeId>,
}

fn discover(doc: &Document) -> Discovery {
    let mut discovery = Discovery {
        collections: Vec::new(),
        values: BTreeSet::new(),
        names: BTreeSet::new(),
        misc: Vec::new(),
    };
    walk(doc, doc.root(), &mut discovery);
    discovery
}

fn walk(doc: &Document, id: NodeId, out: &mut Discovery) {
    match doc.value(id) {
        Value::Object(slots) => {
            for (name, child) in slots.iter() {
                out.names.insert(name.clone());
                walk(doc, child, out);
            }
            out.collections.push(id);
        }
        Value::List(slots) => {
            for child in slots.iter() {
                walk(doc, child, out);
            }
            out.collections.push(id);
        }
        value @ (Value::NtString(_) | Value::Text(_)) => {
            if let Some(key) = ValueKey::of(value) {
                out.values.insert(key);
            }
        }
        Value::RawBytes(_) => out.misc.push(id),
        _ => {}
    }
}

struct Encoder<'doc> {
    doc: &'doc Document,
    image: ByteImage,
    int_endian: Endian,
    float_endian: Endian,
    values: AddressTable<ValueKey>,
    names: AddressTable<NtString>,
    identities: AddressTable<NodeId>,
}

impl<'doc> Encoder<'doc> {
    fn run(&mut self, discovery: &Discovery) -> Result<()> {
        let has_metadata = self.doc.identifier().is_some();
        let flags = FlagByte::new(
            self.int_endian.is_little(),
            self.float_endian.is_little(),
            has_metadata,
        );
        self.image.put_u8(flags.as_u8());

        // Root address: the one forward reference, patched last.
        self.image.put_i32(0, self.int_endian);

        if let Some(identifier) = self.doc.identifier() {
            self.write_metadata_block(identifier)?;
        }

        trace!(position = self.image.position(), "writing name table");
        for name in &discovery.names {
            let address = self.current_address()?;
            self.names.register(name.clone(), address);
            self.image.put_nt_bytes(name.as_bytes());
        }

        trace!(position = self.image.position(), "writing raw-byte blocks");
        for id in &discovery.misc {
            let address = self.current_address()?;
            self.identities.register(*id, address);
            if let Value::RawBytes(bytes) = self.doc.value(*id) {
                self.image.put_raw_block(bytes, self.int_endian)?;
            }
        }

        trace!(position = self.image.position(), "writing value table");
        for key in &discovery.values {
            let address = self.current_address()?;
            self.values.register(key.clone(), address);
            match key {
                ValueKey::Text(text) => self.image.put_text(text, self.int_endian)?,
                ValueKey::NtString(nt) => self.image.put_nt_bytes(nt.as_bytes()),
            }
        }

        trace!(position = self.image.position(), "writing collections");
        for id in &discovery.collections {
            let address = self.current_address()?;
            self.identities.register(*id, address);
            self.write_collection_payload(*id)?;
        }

        let root_address = self.identities.resolve(&self.doc.root())?;
        self.image
            .patch_i32(ROOT_ADDRESS_OFFSET, root_address as i32, self.int_endian)?;
        Ok(())
    }

    /// Metadata block: a length-prefixed offset table followed by the field
    /// payloads, each offset patched once its payload's position is known.
    fn write_metadata_block(&mut self, identifier: &str) -> Result<()> {
        let block_start = self.image.position();
        self.image.put_u16(0, self.int_endian);
        let identifier_slot = self.image.position();
        self.image.put_i32(0, self.int_endian);

        let payload_address = self.current_address()?;
        self.image.put_text(identifier, self.int_endian)?;
        self.image
            .patch_i32(identifier_slot, payload_address as i32, self.int_endian)?;

        let block_length = self.image.position() - block_start;
        let block_length = u16::try_from(block_length).map_err(|_| {
            ObjectoidError::InvalidArgument(format!(
                "metadata block of {block_length} bytes exceeds the 16-bit length field"
            ))
        })?;
        self.image
            .patch_u16(block_start, block_length, self.int_endian)?;
        Ok(())
    }

    fn write_collection_payload(&mut self, id: NodeId) -> Result<()> {
        match self.doc.value(id) {
            Value::Object(slots) => {
                self.put_count(slots.len())?;
                for (name, child) in slots.iter() {
                    let name_address = self.names.resolve(name)?;
                    self.image.put_i32(name_address as i32, self.int_endian);
                    self.write_reference(child)?;
                }
            }
            Value::List(slots) => {
                self.put_count(slots.len())?;
                for child in slots.iter() {
                    self.write_reference(child)?;
                }
            }
            other => {
                return Err(ObjectoidError::Internal(format!(
                    "{:?} collected as a collection",
                    other.tag()
                )));
            }
        }
        Ok(())
    }

    /// One encoded child reference: the tag byte, then the resolved address
    /// for addressable types, the value itself for inline scalars, or
    /// nothing for `Null`.
    fn write_reference(&mut self, child: NodeId) -> Result<()> {
        let value = self.doc.value(child);
        self.image.put_u8(value.tag().as_u8());
        match value {
            Value::Null => {}
            Value::Object(_) | Value::List(_) | Value::RawBytes(_) => {
                let address = self.identities.resolve(&child)?;
                self.image.put_i32(address as i32, self.int_endian);
            }
            Value::NtString(nt) => {
                let address = self.values.resolve(&ValueKey::NtString(nt.clone()))?;
                self.image.put_i32(address as i32, self.int_endian);
            }
            Value::Text(text) => {
                let address = self.values.resolve(&ValueKey::Text(text.clone()))?;
                self.image.put_i32(address as i32, self.int_endian);
            }
            Value::U8(v) => self.image.put_u8(*v),
            Value::I8(v) => self.image.put_i8(*v),
            Value::U16(v) => self.image.put_u16(*v, self.int_endian),
            Value::I16(v) => self.image.put_i16(*v, self.int_endian),
            Value::U32(v) => self.image.put_u32(*v, self.int_endian),
            Value::I32(v) => self.image.put_i32(*v, self.int_endian),
            Value::U64(v) => self.image.put_u64(*v, self.int_endian),
            Value::I64(v) => self.image.put_i64(*v, self.int_endian),
            Value::F32(v) => self.image.put_f32(*v, self.float_endian),
            Value::F64(v) => self.image.put_f64(*v, self.float_endian),
            Value::Bool(v) => self.image.put_bool(*v),
        }
        Ok(())
    }

    fn put_count(&mut self, count: usize) -> Result<()> {
        let count = i32::try_from(count).map_err(|_| {
            ObjectoidError::InvalidArgument(format!(
                "collection of {count} entries exceeds the 31-bit count field"
            ))
        })?;
        self.image.put_i32(count, self.int_endian);
        Ok(())
    }

    fn current_address(&self) -> Result<u32> {
        format::address_of(self.image.position())
    }
}
