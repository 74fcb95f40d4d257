//! Metadata block behavior: identifier round trips and forward-compatible
//! skipping of fields this reader does not know about.

use objectoid::codec::ByteImage;
use objectoid::{
    decode_document, encode_document, Document, Endian, Objectoid, SaveOptions, Value,
};

#[test]
fn identifier_roundtrips_exactly() {
    let mut doc = Document::new();
    doc.set_identifier(Some("MyDoc"));
    let root = doc.root();
    let node = doc.add_node(Value::from(1u8));
    doc.object_insert(root, "n", node).unwrap();

    let bytes = encode_document(&doc, &SaveOptions::default()).unwrap();
    let loaded = decode_document(&bytes).unwrap();
    assert_eq!(loaded.identifier(), Some("MyDoc"));
    assert_eq!(loaded, doc);
}

#[test]
fn identifier_with_wide_characters_roundtrips() {
    let mut doc = Document::new();
    doc.set_identifier(Some("Δocument — ✓"));
    let bytes = encode_document(&doc, &SaveOptions::default()).unwrap();
    let loaded = decode_document(&bytes).unwrap();
    assert_eq!(loaded.identifier(), Some("Δocument — ✓"));
}

#[test]
fn documents_without_identifier_carry_no_metadata_block() {
    let doc = Document::new();
    let bytes = encode_document(&doc, &SaveOptions::default()).unwrap();
    assert_eq!(bytes[0] & 0b0000_0100, 0, "metadata flag must be clear");

    let loaded = decode_document(&bytes).unwrap();
    assert_eq!(loaded.identifier(), None);
}

#[test]
fn metadata_survives_endianness_changes() {
    let mut doc = Document::new();
    doc.set_identifier(Some("MyDoc"));
    let options = SaveOptions {
        int_endian: Endian::Big,
        float_endian: Endian::Big,
    };
    let bytes = encode_document(&doc, &options).unwrap();
    let loaded = decode_document(&bytes).unwrap();
    assert_eq!(loaded.identifier(), Some("MyDoc"));
}

#[test]
fn unknown_trailing_metadata_fields_are_skipped() {
    // Hand-built file from a hypothetical newer writer that appended one
    // extra offset-table field after the identifier offset.
    let mut image = ByteImage::new();
    image.put_u8(0b0000_0111); // int LE, float LE, metadata present
    image.put_i32(24, Endian::Little); // root payload address

    // metadata block, 19 bytes counted from the length field:
    // length(2) + identifier offset(4) + unknown field(4) + payload(9)
    image.put_u16(19, Endian::Little);
    image.put_i32(15, Endian::Little); // identifier payload offset
    image.put_i32(0x5EED, Endian::Little); // future field this reader skips

    // identifier payload at offset 15: "MyDoc", narrow characters
    image.put_i32(5i32 | i32::MIN, Endian::Little);
    for ch in *b"MyDoc" {
        image.put_u8(ch);
    }

    // root object payload at offset 24: zero entries
    image.put_i32(0, Endian::Little);

    let loaded = decode_document(image.as_slice()).unwrap();
    assert_eq!(loaded.identifier(), Some("MyDoc"));
    assert_eq!(loaded.object_len(loaded.root()).unwrap(), 0);
}

#[test]
fn absent_identifier_offset_reads_as_none() {
    // A metadata block whose identifier offset is zero: flagged present,
    // field absent.
    let mut image = ByteImage::new();
    image.put_u8(0b0000_0111);
    image.put_i32(11, Endian::Little);
    image.put_u16(6, Endian::Little);
    image.put_i32(0, Endian::Little);
    image.put_i32(0, Endian::Little); // empty root object at offset 11

    let loaded = decode_document(image.as_slice()).unwrap();
    assert_eq!(loaded.identifier(), None);
}

#[test]
fn identifier_roundtrips_through_the_facade() {
    let mut doc = Document::new();
    doc.set_identifier(Some("on-disk"));
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("meta.obd");
    Objectoid::save(&path, &doc).unwrap();
    assert_eq!(Objectoid::load(&path).unwrap().identifier(), Some("on-disk"));
}
