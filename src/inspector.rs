//! Tools for inspecting the physical structure of Objectoid files.
//! Useful for debugging deduplication behavior and verification.
//!
//! The inspector walks references the way the decoder does, but instead of
//! materializing a [`Document`](crate::Document) it gathers layout facts:
//! how many distinct interned entries each table holds versus how many
//! references point at them, where the root sits, and the shape of the
//! collection tree.

use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;

use crate::codec::{ByteReader, Endian};
use crate::constants::MAX_DECODE_DEPTH;
use crate::error::{ObjectoidError, Result};
use crate::format::{FlagByte, TypeTag, HEADER_SIZE, ROOT_ADDRESS_OFFSET};
use crate::reader::ObjectoidReader;

/// A structural report of an Objectoid file.
#[derive(Debug, Serialize)]
pub struct DebugReport {
    /// Total size of the byte image.
    pub file_size: u64,
    /// Byte order of integer-width fields.
    pub int_little_endian: bool,
    /// Byte order of floating-point fields.
    pub float_little_endian: bool,
    /// Whether a metadata block is present.
    pub has_metadata: bool,
    /// The metadata identifier, if present.
    pub identifier: Option<String>,
    /// Offset where the root object's payload starts.
    pub root_offset: u64,
    /// Distinct interned text payloads.
    pub distinct_text_values: usize,
    /// Distinct interned NT-string payloads.
    pub distinct_nt_values: usize,
    /// Distinct interned property names.
    pub distinct_names: usize,
    /// Total references to interned string values (≥ the distinct counts
    /// whenever deduplication collapsed anything).
    pub string_references: usize,
    /// Raw-byte blocks; identity-addressed, so equal content still counts
    /// once per node.
    pub raw_blocks: usize,
    /// Collection payloads reached from the root.
    pub collections: usize,
    /// The hierarchical layout of the document tree.
    pub tree: NodeInfo,
}

/// Layout facts for a single node reference.
#[derive(Debug, Serialize)]
pub struct NodeInfo {
    /// Wire type of the node (e.g. "Object", "Text", "U32").
    pub kind: String,
    /// Property name, when the node sits under an object.
    pub name: Option<String>,
    /// Payload address for addressable nodes.
    pub offset: Option<u64>,
    /// Entry count for collections.
    pub entry_count: Option<u32>,
    /// Child nodes, in entry order.
    pub children: Vec<NodeInfo>,
}

/// The Objectoid inspector tool.
#[derive(Debug)]
pub struct ObjectoidInspector;

impl ObjectoidInspector {
    /// Analyzes a file and returns a structural report.
    pub fn inspect<P: AsRef<Path>>(path: P) -> Result<DebugReport> {
        let reader = ObjectoidReader::open(path)?;
        Self::inspect_bytes(reader.bytes())
    }

    /// Analyzes an in-memory byte image.
    pub fn inspect_bytes(data: &[u8]) -> Result<DebugReport> {
        if data.len() < HEADER_SIZE {
            return Err(ObjectoidError::MalformedData(format!(
                "stream of {} bytes is smaller than the header",
                data.len()
            )));
        }
        let flags = FlagByte::from_byte(data[0]);
        let int_endian = Endian::from_flag(flags.int_little_endian());

        let mut walker = Walker {
            data,
            int_endian,
            text_addresses: HashSet::new(),
            nt_addresses: HashSet::new(),
            name_addresses: HashSet::new(),
            string_references: 0,
            raw_blocks: 0,
            collections: 0,
        };

        let mut header = ByteReader::at(data, ROOT_ADDRESS_OFFSET)?;
        let root_offset = walker.address(&mut header)?;

        let identifier = if flags.has_metadata() {
            walker.identifier()?
        } else {
            None
        };

        let tree = walker.collection_info(TypeTag::Object, None, root_offset, 0)?;

        Ok(DebugReport {
            file_size: data.len() as u64,
            int_little_endian: flags.int_little_endian(),
            float_little_endian: flags.float_little_endian(),
            has_metadata: flags.has_metadata(),
            identifier,
            root_offset: root_offset as u64,
            distinct_text_values: walker.text_addresses.len(),
            distinct_nt_values: walker.nt_addresses.len(),
            distinct_names: walker.name_addresses.len(),
            string_references: walker.string_references,
            raw_blocks: walker.raw_blocks,
            collections: walker.collections,
            tree,
        })
    }
}

struct Walker<'a> {
    data: &'a [u8],
    int_endian: Endian,
    text_addresses: HashSet<usize>,
    nt_addresses: HashSet<usize>,
    name_addresses: HashSet<usize>,
    string_references: usize,
    raw_blocks: usize,
    collections: usize,
}

impl<'a> Walker<'a> {
    fn address(&self, reader: &mut ByteReader<'a>) -> Result<usize> {
        let raw = reader.i32(self.int_endian)?;
        if raw < 0 || raw as usize >= self.data.len() {
            return Err(ObjectoidError::MalformedData(format!(
                "address {raw} is outside the stream ({} bytes)",
                self.data.len()
            )));
        }
        Ok(raw as usize)
    }

    fn identifier(&self) -> Result<Option<String>> {
        let mut reader = ByteReader::at(self.data, HEADER_SIZE)?;
        let _block_length = reader.u16(self.int_endian)?;
        let offset = reader.i32(self.int_endian)?;
        if offset <= 0 {
            return Ok(None);
        }
        let mut payload = ByteReader::at(self.data, offset as usize)?;
        Ok(Some(payload.text(self.int_endian)?))
    }

    fn collection_info(
        &mut self,
        tag: TypeTag,
        name: Option<String>,
        address: usize,
        depth: usize,
    ) -> Result<NodeInfo> {
        if depth > MAX_DECODE_DEPTH {
            return Err(ObjectoidError::MalformedData(format!(
                "collection nesting exceeds {MAX_DECODE_DEPTH} levels"
            )));
        }
        self.collections += 1;

        let mut reader = ByteReader::at(self.data, address)?;
        let count = reader.i32(self.int_endian)?;
        if count < 0 {
            return Err(ObjectoidError::MalformedData(format!(
                "negative entry count {count}"
            )));
        }

        let mut children = Vec::new();
        for _ in 0..count {
            let child_name = if tag == TypeTag::Object {
                let name_address = self.address(&mut reader)?;
                self.name_addresses.insert(name_address);
                let mut name_reader = ByteReader::at(self.data, name_address)?;
                Some(String::from_utf8_lossy(name_reader.nt_bytes()?).into_owned())
            } else {
                None
            };
            children.push(self.reference_info(&mut reader, child_name, depth)?);
        }

        Ok(NodeInfo {
            kind: format!("{tag:?}"),
            name,
            offset: Some(address as u64),
            entry_count: Some(count as u32),
            children,
        })
    }

    fn reference_info(
        &mut self,
        reader: &mut ByteReader<'a>,
        name: Option<String>,
        depth: usize,
    ) -> Result<NodeInfo> {
        let tag = TypeTag::from_byte(reader.u8()?)?;
        match tag {
            TypeTag::Object | TypeTag::List => {
                let address = self.address(reader)?;
                self.collection_info(tag, name, address, depth + 1)
            }
            TypeTag::NtString | TypeTag::Text => {
                let address = self.address(reader)?;
                self.string_references += 1;
                if tag == TypeTag::Text {
                    self.text_addresses.insert(address);
                } else {
                    self.nt_addresses.insert(address);
                }
                Ok(NodeInfo {
                    kind: format!("{tag:?}"),
                    name,
                    offset: Some(address as u64),
                    entry_count: None,
                    children: Vec::new(),
                })
            }
            TypeTag::RawBytes => {
                let address = self.address(reader)?;
                self.raw_blocks += 1;
                Ok(NodeInfo {
                    kind: format!("{tag:?}"),
                    name,
                    offset: Some(address as u64),
                    entry_count: None,
                    children: Vec::new(),
                })
            }
            inline => {
                self.skip_inline(reader, inline)?;
                Ok(NodeInfo {
                    kind: format!("{inline:?}"),
                    name,
                    offset: None,
                    entry_count: None,
                    children: Vec::new(),
                })
            }
        }
    }

    fn skip_inline(&self, reader: &mut ByteReader<'a>, tag: TypeTag) -> Result<()> {
        match tag {
            TypeTag::Null => {}
            TypeTag::U8 | TypeTag::I8 | TypeTag::Bool => {
                reader.u8()?;
            }
            TypeTag::U16 | TypeTag::I16 => {
                reader.u16(self.int_endian)?;
            }
            TypeTag::U32 | TypeTag::I32 | TypeTag::F32 => {
                reader.u32(self.int_endian)?;
            }
            TypeTag::U64 | TypeTag::I64 | TypeTag::F64 => {
                reader.u64(self.int_endian)?;
            }
            other => {
                return Err(ObjectoidError::Internal(format!(
                    "{other:?} is not an inline tag"
                )));
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for DebugReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== OBJECTOID INSPECTOR REPORT ===")?;
        writeln!(f, "File Size:      {} bytes", self.file_size)?;
        writeln!(f, "Root Offset:    {}", self.root_offset)?;
        writeln!(
            f,
            "Byte Order:     int {} / float {}",
            if self.int_little_endian { "LE" } else { "BE" },
            if self.float_little_endian { "LE" } else { "BE" },
        )?;
        if let Some(identifier) = &self.identifier {
            writeln!(f, "Identifier:     {identifier:?}")?;
        }
        writeln!(
            f,
            "Interning:      {} text + {} NT values shared by {} references; {} names",
            self.distinct_text_values,
            self.distinct_nt_values,
            self.string_references,
            self.distinct_names,
        )?;
        writeln!(f, "\n[DOCUMENT LAYOUT]")?;
        self.tree.fmt_recursive(f, "", true)
    }
}

impl NodeInfo {
    fn fmt_recursive(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        prefix: &str,
        is_last: bool,
    ) -> std::fmt::Result {
        let connector = if is_last { "└── " } else { "├── " };
        let label = self
            .name
            .as_deref()
            .map(|name| format!("{name}: "))
            .unwrap_or_default();
        let location = self
            .offset
            .map(|offset| format!(" @{offset}"))
            .unwrap_or_default();
        let entries = self
            .entry_count
            .map(|count| format!(" | Entries: {count}"))
            .unwrap_or_default();

        writeln!(f, "{prefix}{connector}{label}[{}{location}]{entries}", self.kind)?;

        for (i, child) in self.children.iter().enumerate() {
            let is_last_child = i == self.children.len() - 1;
            let child_prefix = if is_last { "    " } else { "│   " };
            child.fmt_recursive(f, &format!("{prefix}{child_prefix}"), is_last_child)?;
        }
        Ok(())
    }
}
