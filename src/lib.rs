//! # Objectoid
//!
//! A tree-shaped, self-describing document model with a binary codec whose
//! distinguishing feature is **structural deduplication**: values that are
//! equal by content are written to the file at most once and referenced by
//! every owner via address indirection, while still decoding back into
//! independent, fully-owned tree nodes.
//!
//! ## Overview
//!
//! An Objectoid document is a tree of typed nodes: objects with named
//! properties, ordered lists, two string flavors, fixed-width scalars, byte
//! blobs, and null. The codec serializes that tree into a compact binary
//! layout in which every shared string exists exactly once.
//!
//! ### Key Properties
//!
//! *   **Structural Deduplication:** equal text and NT-string content is
//!     interned into a single physical encoding, no matter how many nodes
//!     carry it. Raw-byte blobs are deliberately exempt: they are addressed
//!     by identity and never merged.
//! *   **Deterministic Output:** the deduplicated tables are written in a
//!     canonical sorted order, so the same logical document always produces
//!     byte-identical files for a given flag configuration.
//! *   **Single-Owner Trees:** every non-root node has at most one owning
//!     collection, enforced at attach time. Cycles cannot be constructed
//!     through the attach API.
//! *   **Transactional Decode:** collections are rebuilt into fresh state
//!     and committed only on success; a malformed file yields an error, not
//!     a half-populated document.
//! *   **Forward-Compatible Metadata:** document-level fields live in an
//!     offset-table block that old readers can skip past unknown entries of.
//!
//! ## Architecture
//!
//! Encoding is a two-phase pipeline. A discovery walk first visits the tree
//! child-before-parent, collecting collections in dependency order and the
//! deduplicated value and name sets in canonical order. The write phase then
//! emits each section strictly before anything that references it, leaving
//! the root pointer in the header as the single forward reference, patched
//! last. Decoding reads the flag byte (integer and floating-point byte
//! order are independently configurable), validates the root address, and
//! recursively rehydrates nodes by tag dispatch, following addresses through
//! a bounds-checked cursor.
//!
//! ## Usage
//!
//! ```rust
//! use objectoid::{Document, Objectoid, Value};
//!
//! # fn main() -> objectoid::Result<()> {
//! let mut doc = Document::new();
//! let root = doc.root();
//! let a = doc.add_node(Value::from("hello"));
//! let b = doc.add_node(Value::from("hello"));
//! doc.object_insert(root, "a", a)?;
//! doc.object_insert(root, "b", b)?;
//!
//! # let dir = tempfile::tempdir().map_err(objectoid::ObjectoidError::from)?;
//! # let path = dir.path().join("doc.obd");
//! // "hello" is written once; both properties reference it.
//! Objectoid::save(&path, &doc)?;
//! let loaded = Objectoid::load(&path)?;
//! assert_eq!(loaded, doc);
//! # Ok(())
//! # }
//! ```
//!
//! ## Safety and Error Handling
//!
//! *   **Encapsulated Unsafe:** `unsafe` appears only at the single
//!     memory-mapping site in the reader, with the usual exclusive-access
//!     assumption documented there.
//! *   **No Panics:** no `unwrap()` or `panic!()` on user-reachable input
//!     (enforced by clippy lints). Misusing a [`NodeId`] from another
//!     document is the one documented panic class.
//! *   **Comprehensive Errors:** all failures surface as an
//!     [`ObjectoidError`]; `save` and `load` are all-or-nothing.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

// --- PUBLIC API MODULES ---
pub mod api;
pub mod codec;
pub mod error;
pub mod format;
pub mod inspector;
pub mod reader;
pub mod tree;
pub mod writer;

// --- INTERNAL IMPLEMENTATION MODULES ---
pub(crate) mod intern;

// --- RE-EXPORTS ---

pub use api::Objectoid;
pub use codec::Endian;
pub use error::{ObjectoidError, Result};
pub use inspector::{DebugReport, ObjectoidInspector};
pub use reader::{decode_document, load_from_reader, ObjectoidReader};
pub use tree::{Document, IntoNtString, NodeId, NtString, Value};
pub use writer::{encode_document, save_to_writer, SaveOptions};

/// Constants used throughout the library.
pub mod constants {
    /// Maximum collection nesting depth the decoder will follow before
    /// treating the stream as malformed.
    pub const MAX_DECODE_DEPTH: usize = 512;
}
