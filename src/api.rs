use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::error::Result;
use crate::reader::ObjectoidReader;
use crate::tree::Document;
use crate::writer::{save_to_writer, SaveOptions};

/// The main entry point for saving and loading documents on disk.
///
/// Both operations are all-or-nothing transactions over the file: a failed
/// save may leave a truncated file behind (write to a temporary path and
/// rename if atomicity matters), but never a partially-updated `Document`.
#[derive(Debug)]
pub struct Objectoid;

impl Objectoid {
    /// Saves a document with the default flags (everything little-endian).
    ///
    /// # Arguments
    /// * `path`: destination file path; truncated if it exists.
    /// * `doc`: the document to encode.
    pub fn save<P: AsRef<Path>>(path: P, doc: &Document) -> Result<()> {
        Self::save_with(path, doc, &SaveOptions::default())
    }

    /// Saves a document with explicit endianness settings.
    pub fn save_with<P: AsRef<Path>>(path: P, doc: &Document, options: &SaveOptions) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        save_to_writer(doc, &mut writer, options)
    }

    /// Loads a document from a file via memory mapping.
    ///
    /// The returned tree is entirely fresh; decoding failures surface as
    /// errors without producing a half-populated document.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Document> {
        ObjectoidReader::open(path)?.decode()
    }
}
