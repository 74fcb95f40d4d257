//! Deduplication behavior: equal string content is written once, raw-byte
//! blobs never merge, and output stays canonical.

use objectoid::{
    decode_document, encode_document, Document, NtString, ObjectoidInspector, SaveOptions, Value,
};

fn encode(doc: &Document) -> Vec<u8> {
    encode_document(doc, &SaveOptions::default()).unwrap()
}

#[test]
fn equal_text_is_encoded_once_and_decoded_twice() {
    let mut doc = Document::new();
    let root = doc.root();
    let a = doc.add_node(Value::from("hello"));
    let b = doc.add_node(Value::from("hello"));
    doc.object_insert(root, "a", a).unwrap();
    doc.object_insert(root, "b", b).unwrap();

    let bytes = encode(&doc);
    let report = ObjectoidInspector::inspect_bytes(&bytes).unwrap();
    assert_eq!(report.distinct_text_values, 1);
    assert_eq!(report.string_references, 2);

    let loaded = decode_document(&bytes).unwrap();
    let a = loaded.object_get(loaded.root(), "a").unwrap().unwrap();
    let b = loaded.object_get(loaded.root(), "b").unwrap().unwrap();
    assert_ne!(a, b, "decoding yields independent node instances");
    assert!(matches!(loaded.value(a), Value::Text(t) if t == "hello"));
    assert!(matches!(loaded.value(b), Value::Text(t) if t == "hello"));
}

#[test]
fn decoded_duplicates_are_independently_mutable() {
    let mut doc = Document::new();
    let root = doc.root();
    let a = doc.add_node(Value::from("shared"));
    let b = doc.add_node(Value::from("shared"));
    doc.object_insert(root, "a", a).unwrap();
    doc.object_insert(root, "b", b).unwrap();

    let mut loaded = decode_document(&encode(&doc)).unwrap();
    let a = loaded.object_get(loaded.root(), "a").unwrap().unwrap();
    let b = loaded.object_get(loaded.root(), "b").unwrap().unwrap();
    loaded.set_value(a, Value::from("changed")).unwrap();
    assert!(matches!(loaded.value(b), Value::Text(t) if t == "shared"));
}

#[test]
fn repeated_references_cost_only_the_reference() {
    // Lists of N equal strings: every entry past the first adds exactly one
    // reference (tag byte + address), never another payload.
    let sized = |n: usize| {
        let mut doc = Document::new();
        let root = doc.root();
        let list = doc.new_list();
        doc.object_insert(root, "items", list).unwrap();
        for _ in 0..n {
            let node = doc.add_node(Value::from("repeated-content"));
            doc.list_push(list, node).unwrap();
        }
        encode(&doc).len()
    };

    let reference_size = 1 + 4;
    assert_eq!(sized(10), sized(2) + 8 * reference_size);
}

#[test]
fn property_names_are_interned_across_objects() {
    let mut doc = Document::new();
    let root = doc.root();
    for object_name in ["first", "second", "third"] {
        let object = doc.new_object();
        doc.object_insert(root, object_name, object).unwrap();
        let value = doc.add_node(Value::from(1u8));
        doc.object_insert(object, "shared_name", value).unwrap();
    }

    let report = ObjectoidInspector::inspect_bytes(&encode(&doc)).unwrap();
    // "first", "second", "third", and one copy of "shared_name".
    assert_eq!(report.distinct_names, 4);
}

#[test]
fn equal_nt_strings_share_one_payload() {
    let mut doc = Document::new();
    let root = doc.root();
    let a = doc.add_node(Value::from(NtString::try_from("twin").unwrap()));
    let b = doc.add_node(Value::from(NtString::try_from("twin").unwrap()));
    doc.object_insert(root, "a", a).unwrap();
    doc.object_insert(root, "b", b).unwrap();

    let report = ObjectoidInspector::inspect_bytes(&encode(&doc)).unwrap();
    assert_eq!(report.distinct_nt_values, 1);
    assert_eq!(report.string_references, 2);
}

#[test]
fn raw_bytes_with_equal_content_are_not_merged() {
    let mut doc = Document::new();
    let root = doc.root();
    let a = doc.add_node(Value::RawBytes(vec![9, 9, 9, 9]));
    let b = doc.add_node(Value::RawBytes(vec![9, 9, 9, 9]));
    doc.object_insert(root, "a", a).unwrap();
    doc.object_insert(root, "b", b).unwrap();

    let report = ObjectoidInspector::inspect_bytes(&encode(&doc)).unwrap();
    assert_eq!(report.raw_blocks, 2);

    let offsets: Vec<u64> = report
        .tree
        .children
        .iter()
        .filter(|child| child.kind == "RawBytes")
        .map(|child| child.offset.unwrap())
        .collect();
    assert_eq!(offsets.len(), 2);
    assert_ne!(offsets[0], offsets[1], "identity keying keeps two payloads");
}

#[test]
fn output_is_independent_of_construction_order() {
    // Same logical document, arena populated in opposite orders.
    let build = |reversed: bool| {
        let mut doc = Document::new();
        let root = doc.root();
        let (x, y) = if reversed {
            let y = doc.add_node(Value::from("y"));
            let x = doc.add_node(Value::from("x"));
            (x, y)
        } else {
            let x = doc.add_node(Value::from("x"));
            let y = doc.add_node(Value::from("y"));
            (x, y)
        };
        doc.object_insert(root, "x", x).unwrap();
        doc.object_insert(root, "y", y).unwrap();
        encode(&doc)
    };
    assert_eq!(build(false), build(true));
}

#[test]
fn saving_twice_is_byte_identical() {
    let mut doc = Document::new();
    let root = doc.root();
    let list = doc.new_list();
    doc.object_insert(root, "items", list).unwrap();
    for i in 0..16u8 {
        let node = doc.add_node(Value::from(format!("item-{}", i % 4)));
        doc.list_push(list, node).unwrap();
    }
    assert_eq!(encode(&doc), encode(&doc));
}
