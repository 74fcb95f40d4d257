//! Ownership invariants across the save/load boundary.

use objectoid::{decode_document, encode_document, Document, ObjectoidError, SaveOptions, Value};

#[test]
fn reattached_nodes_save_in_their_new_home() {
    let mut doc = Document::new();
    let root = doc.root();
    let movable = doc.add_node(Value::from("movable"));
    doc.object_insert(root, "old_home", movable).unwrap();

    let movable = doc.object_remove(root, "old_home").unwrap();
    let list = doc.new_list();
    doc.object_insert(root, "new_home", list).unwrap();
    doc.list_push(list, movable).unwrap();

    let loaded = decode_document(&encode_document(&doc, &SaveOptions::default()).unwrap()).unwrap();
    assert_eq!(loaded.object_get(loaded.root(), "old_home").unwrap(), None);
    let list = loaded.object_get(loaded.root(), "new_home").unwrap().unwrap();
    let item = loaded.list_get(list, 0).unwrap().unwrap();
    assert!(matches!(loaded.value(item), Value::Text(t) if t == "movable"));
}

#[test]
fn failed_attach_does_not_disturb_a_saveable_tree() {
    let mut doc = Document::new();
    let root = doc.root();
    let child = doc.add_node(Value::from(5u8));
    doc.object_insert(root, "owned", child).unwrap();

    let list = doc.new_list();
    doc.object_insert(root, "list", list).unwrap();
    assert!(matches!(
        doc.list_push(list, child),
        Err(ObjectoidError::AlreadyOwned)
    ));
    assert!(matches!(
        doc.list_push(list, root),
        Err(ObjectoidError::NotCollectible)
    ));

    let loaded = decode_document(&encode_document(&doc, &SaveOptions::default()).unwrap()).unwrap();
    assert_eq!(loaded.object_len(loaded.root()).unwrap(), 2);
    let list = loaded.object_get(loaded.root(), "list").unwrap().unwrap();
    assert_eq!(loaded.list_len(list).unwrap(), 0);
}

#[test]
fn loaded_trees_enforce_the_same_invariants() {
    let mut doc = Document::new();
    let root = doc.root();
    let item = doc.add_node(Value::from("item"));
    let list = doc.new_list();
    doc.object_insert(root, "list", list).unwrap();
    doc.list_push(list, item).unwrap();

    let mut loaded =
        decode_document(&encode_document(&doc, &SaveOptions::default()).unwrap()).unwrap();
    let list = loaded.object_get(loaded.root(), "list").unwrap().unwrap();
    let item = loaded.list_get(list, 0).unwrap().unwrap();
    assert!(matches!(
        loaded.object_insert(loaded.root(), "again", item),
        Err(ObjectoidError::AlreadyOwned)
    ));

    let item = loaded.list_remove(list, 0).unwrap();
    loaded.object_insert(loaded.root(), "again", item).unwrap();
    assert_eq!(loaded.parent(item), Some(loaded.root()));
}

#[test]
fn detached_subtrees_are_not_saved() {
    let mut doc = Document::new();
    let root = doc.root();
    let kept = doc.add_node(Value::from("kept"));
    doc.object_insert(root, "kept", kept).unwrap();

    // Never attached to the tree; discovery must not find it.
    let orphan_list = doc.new_list();
    let orphan = doc.add_node(Value::from("orphan"));
    doc.list_push(orphan_list, orphan).unwrap();

    let loaded = decode_document(&encode_document(&doc, &SaveOptions::default()).unwrap()).unwrap();
    assert_eq!(loaded.object_len(loaded.root()).unwrap(), 1);
    assert_eq!(loaded.node_count(), 2, "root plus the one kept node");
}
