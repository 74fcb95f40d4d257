//! The `Document` arena and its tree operations.
//!
//! Nodes live in a flat arena and are referred to by [`NodeId`]. Each node
//! records its owning collection as a parent back-reference; attach and
//! detach maintain the single-owner invariant transactionally, so a failed
//! attach leaves both the node and the prospective parent untouched.

use crate::error::{ObjectoidError, Result};
use crate::tree::id::NodeId;
use crate::tree::value::{IntoNtString, NtString, Value};

/// A single node in the arena: its value plus the owning collection, if any.
#[derive(Debug)]
struct NodeRecord {
    value: Value,
    parent: Option<NodeId>,
}

/// A tree-shaped, self-describing document.
///
/// Every document owns exactly one root object, created with the document
/// itself. The root is not collectible: it can never be attached into
/// another collection. All other nodes are created detached and become part
/// of the tree by being attached to exactly one collection at a time.
///
/// Acts as an arena allocator for nodes; [`NodeId`] handles index into it.
///
/// ```rust
/// use objectoid::{Document, Value};
///
/// let mut doc = Document::new();
/// let root = doc.root();
/// let greeting = doc.add_node(Value::from("hello"));
/// doc.object_insert(root, "greeting", greeting)?;
/// assert_eq!(doc.object_len(root)?, 1);
/// # Ok::<(), objectoid::ObjectoidError>(())
/// ```
#[derive(Debug)]
pub struct Document {
    nodes: Vec<NodeRecord>,
    identifier: Option<String>,
}

// Manual Default impl so an empty document still owns its root object.
impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates an empty document: a root object with no properties and no
    /// metadata identifier.
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeRecord {
                value: Value::empty_object(),
                parent: None,
            }],
            identifier: None,
        }
    }

    /// The root object. Always present, never collectible.
    pub fn root(&self) -> NodeId {
        NodeId::new(0)
    }

    /// The free-text metadata identifier, if set.
    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// Sets or clears the metadata identifier.
    pub fn set_identifier(&mut self, identifier: Option<impl Into<String>>) {
        self.identifier = identifier.map(Into::into);
    }

    /// Adds a detached node to the arena and returns its handle.
    ///
    /// Returns the `NodeId` of the newly created node. The node joins the
    /// tree once attached to a collection via [`Self::object_insert`],
    /// [`Self::list_push`], or [`Self::list_insert`].
    pub fn add_node(&mut self, value: Value) -> NodeId {
        let id = NodeId::new(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(NodeRecord {
            value,
            parent: None,
        });
        id
    }

    /// Convenience for `add_node(Value::empty_object())`.
    pub fn new_object(&mut self) -> NodeId {
        self.add_node(Value::empty_object())
    }

    /// Convenience for `add_node(Value::empty_list())`.
    pub fn new_list(&mut self) -> NodeId {
        self.add_node(Value::empty_list())
    }

    /// Retrieves a node's value by its handle.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this document. This is considered an
    /// invariant violation by the caller, not a data condition.
    pub fn value(&self, id: NodeId) -> &Value {
        &self.record(id).value
    }

    /// Replaces a node's value in place.
    ///
    /// Collections cannot be replaced (that would orphan their children),
    /// and a node cannot become a collection this way; use the attach and
    /// detach operations to reshape the tree instead.
    pub fn set_value(&mut self, id: NodeId, value: Value) -> Result<()> {
        if self.record(id).value.is_collection() || value.is_collection() {
            return Err(ObjectoidError::InvalidArgument(
                "collections cannot be replaced in place".into(),
            ));
        }
        self.record_mut(id).value = value;
        Ok(())
    }

    /// The collection currently owning `id`, if any.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.record(id).parent
    }

    /// Number of nodes in the arena, including detached ones.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // --- Object operations ---

    /// Attaches `child` to `object` under `name`.
    ///
    /// Fails with [`ObjectoidError::NotCollectible`] if `child` is the root,
    /// [`ObjectoidError::AlreadyOwned`] if `child` already has an owner, and
    /// [`ObjectoidError::InvalidArgument`] if `object` is not an object node
    /// or already has a property called `name`. On any failure both nodes
    /// are left unchanged.
    pub fn object_insert<N: IntoNtString>(&mut self, object: NodeId, name: N, child: NodeId) -> Result<()> {
        let name = name.into_nt()?;
        self.check_collectible(child)?;
        {
            let slots = self.object_slots(object)?;
            if slots.index.contains_key(&name) {
                return Err(ObjectoidError::InvalidArgument(format!(
                    "object already has a property named \"{name}\""
                )));
            }
        }
        self.record_mut(child).parent = Some(object);
        if let Value::Object(slots) = &mut self.record_mut(object).value {
            let slot = slots.entries.len();
            slots.entries.push((name.clone(), child));
            slots.index.insert(name, slot);
        }
        Ok(())
    }

    /// Detaches and returns the property `name`, clearing the child's
    /// back-reference so it can be attached elsewhere.
    pub fn object_remove<N: IntoNtString>(&mut self, object: NodeId, name: N) -> Result<NodeId> {
        let name = name.into_nt()?;
        let slot = {
            let slots = self.object_slots(object)?;
            *slots.index.get(&name).ok_or_else(|| {
                ObjectoidError::InvalidArgument(format!("object has no property named \"{name}\""))
            })?
        };
        let child = if let Value::Object(slots) = &mut self.record_mut(object).value {
            let (_, child) = slots.entries.remove(slot);
            slots.index.remove(&name);
            for other in slots.index.values_mut() {
                if *other > slot {
                    *other -= 1;
                }
            }
            child
        } else {
            return Err(ObjectoidError::Internal(
                "object slots vanished during remove".into(),
            ));
        };
        self.record_mut(child).parent = None;
        Ok(child)
    }

    /// Looks up a property by name.
    pub fn object_get<N: IntoNtString>(&self, object: NodeId, name: N) -> Result<Option<NodeId>> {
        let name = name.into_nt()?;
        Ok(self.object_slots(object)?.get(&name))
    }

    /// Number of properties on `object`.
    pub fn object_len(&self, object: NodeId) -> Result<usize> {
        Ok(self.object_slots(object)?.len())
    }

    /// Iterates `object`'s properties in insertion order.
    pub fn object_entries(
        &self,
        object: NodeId,
    ) -> Result<impl Iterator<Item = (&NtString, NodeId)>> {
        Ok(self.object_slots(object)?.iter())
    }

    // --- List operations ---

    /// Appends `child` to `list`.
    pub fn list_push(&mut self, list: NodeId, child: NodeId) -> Result<()> {
        let length = self.list_len(list)?;
        self.list_insert(list, length, child)
    }

    /// Inserts `child` into `list` at `index`.
    ///
    /// The same ownership rules as [`Self::object_insert`] apply.
    pub fn list_insert(&mut self, list: NodeId, index: usize, child: NodeId) -> Result<()> {
        self.check_collectible(child)?;
        {
            let slots = self.list_slots(list)?;
            if index > slots.len() {
                return Err(ObjectoidError::InvalidArgument(format!(
                    "list index {index} out of range (length {})",
                    slots.len()
                )));
            }
        }
        self.record_mut(child).parent = Some(list);
        if let Value::List(slots) = &mut self.record_mut(list).value {
            slots.items.insert(index, child);
        }
        Ok(())
    }

    /// Detaches and returns the child at `index`.
    pub fn list_remove(&mut self, list: NodeId, index: usize) -> Result<NodeId> {
        {
            let slots = self.list_slots(list)?;
            if index >= slots.len() {
                return Err(ObjectoidError::InvalidArgument(format!(
                    "list index {index} out of range (length {})",
                    slots.len()
                )));
            }
        }
        let child = if let Value::List(slots) = &mut self.record_mut(list).value {
            slots.items.remove(index)
        } else {
            return Err(ObjectoidError::Internal(
                "list slots vanished during remove".into(),
            ));
        };
        self.record_mut(child).parent = None;
        Ok(child)
    }

    /// Returns the child at `index`, if any.
    pub fn list_get(&self, list: NodeId, index: usize) -> Result<Option<NodeId>> {
        Ok(self.list_slots(list)?.get(index))
    }

    /// Number of children in `list`.
    pub fn list_len(&self, list: NodeId) -> Result<usize> {
        Ok(self.list_slots(list)?.len())
    }

    /// Iterates `list`'s children in order.
    pub fn list_items(&self, list: NodeId) -> Result<impl Iterator<Item = NodeId> + '_> {
        Ok(self.list_slots(list)?.iter())
    }

    // --- Internals ---

    fn record(&self, id: NodeId) -> &NodeRecord {
        self.nodes
            .get(id.index())
            .expect("Document invariant violated: NodeId out of bounds")
    }

    fn record_mut(&mut self, id: NodeId) -> &mut NodeRecord {
        self.nodes
            .get_mut(id.index())
            .expect("Document invariant violated: NodeId out of bounds")
    }

    fn check_collectible(&self, child: NodeId) -> Result<()> {
        if child == self.root() {
            return Err(ObjectoidError::NotCollectible);
        }
        if self.record(child).parent.is_some() {
            return Err(ObjectoidError::AlreadyOwned);
        }
        Ok(())
    }

    fn object_slots(&self, object: NodeId) -> Result<&crate::tree::value::ObjectSlots> {
        match &self.record(object).value {
            Value::Object(slots) => Ok(slots),
            other => Err(ObjectoidError::InvalidArgument(format!(
                "expected an object node, found {:?}",
                other.tag()
            ))),
        }
    }

    fn list_slots(&self, list: NodeId) -> Result<&crate::tree::value::ListSlots> {
        match &self.record(list).value {
            Value::List(slots) => Ok(slots),
            other => Err(ObjectoidError::InvalidArgument(format!(
                "expected a list node, found {:?}",
                other.tag()
            ))),
        }
    }

    fn node_eq(&self, a: NodeId, other: &Document, b: NodeId) -> bool {
        match (self.value(a), other.value(b)) {
            (Value::Null, Value::Null) => true,
            (Value::Object(left), Value::Object(right)) => {
                left.len() == right.len()
                    && left.iter().zip(right.iter()).all(|((ln, lc), (rn, rc))| {
                        ln == rn && self.node_eq(lc, other, rc)
                    })
            }
            (Value::List(left), Value::List(right)) => {
                left.len() == right.len()
                    && left
                        .iter()
                        .zip(right.iter())
                        .all(|(lc, rc)| self.node_eq(lc, other, rc))
            }
            (Value::NtString(left), Value::NtString(right)) => left == right,
            (Value::Text(left), Value::Text(right)) => left == right,
            (Value::U8(left), Value::U8(right)) => left == right,
            (Value::I8(left), Value::I8(right)) => left == right,
            (Value::U16(left), Value::U16(right)) => left == right,
            (Value::I16(left), Value::I16(right)) => left == right,
            (Value::U32(left), Value::U32(right)) => left == right,
            (Value::I32(left), Value::I32(right)) => left == right,
            (Value::U64(left), Value::U64(right)) => left == right,
            (Value::I64(left), Value::I64(right)) => left == right,
            (Value::F32(left), Value::F32(right)) => left.to_bits() == right.to_bits(),
            (Value::F64(left), Value::F64(right)) => left.to_bits() == right.to_bits(),
            (Value::Bool(left), Value::Bool(right)) => left == right,
            (Value::RawBytes(left), Value::RawBytes(right)) => left == right,
            _ => false,
        }
    }
}

/// Structural equality: same identifier and the same tree shape and values
/// under the roots. Detached nodes do not participate; floats compare by
/// bit pattern so equality survives a round trip exactly.
impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier && self.node_eq(self.root(), other, other.root())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn attach_sets_owner_and_detach_clears_it() {
        let mut doc = Document::new();
        let root = doc.root();
        let list = doc.new_list();
        doc.object_insert(root, "items", list).unwrap();
        assert_eq!(doc.parent(list), Some(root));

        let item = doc.add_node(Value::from(1u8));
        doc.list_push(list, item).unwrap();
        assert_eq!(doc.parent(item), Some(list));

        let detached = doc.list_remove(list, 0).unwrap();
        assert_eq!(detached, item);
        assert_eq!(doc.parent(item), None);
    }

    #[test]
    fn attaching_owned_node_fails_and_changes_nothing() {
        let mut doc = Document::new();
        let root = doc.root();
        let child = doc.add_node(Value::from("shared"));
        doc.object_insert(root, "a", child).unwrap();

        let list = doc.new_list();
        doc.object_insert(root, "items", list).unwrap();
        let err = doc.list_push(list, child).unwrap_err();
        assert!(matches!(err, ObjectoidError::AlreadyOwned));
        assert_eq!(doc.list_len(list).unwrap(), 0);
        assert_eq!(doc.parent(child), Some(root));
    }

    #[test]
    fn root_is_not_collectible() {
        let mut doc = Document::new();
        let root = doc.root();
        let list = doc.new_list();
        doc.object_insert(root, "items", list).unwrap();
        let err = doc.list_push(list, root).unwrap_err();
        assert!(matches!(err, ObjectoidError::NotCollectible));
    }

    #[test]
    fn duplicate_property_names_are_rejected() {
        let mut doc = Document::new();
        let root = doc.root();
        let first = doc.add_node(Value::from(1u8));
        let second = doc.add_node(Value::from(2u8));
        doc.object_insert(root, "x", first).unwrap();
        let err = doc.object_insert(root, "x", second).unwrap_err();
        assert!(matches!(err, ObjectoidError::InvalidArgument(_)));
        assert_eq!(doc.parent(second), None);
        assert_eq!(doc.object_len(root).unwrap(), 1);
    }

    #[test]
    fn detached_node_can_be_reattached_elsewhere() {
        let mut doc = Document::new();
        let root = doc.root();
        let child = doc.add_node(Value::from(42u32));
        doc.object_insert(root, "first", child).unwrap();
        let child = doc.object_remove(root, "first").unwrap();

        let list = doc.new_list();
        doc.object_insert(root, "items", list).unwrap();
        doc.list_push(list, child).unwrap();
        assert_eq!(doc.parent(child), Some(list));
    }

    #[test]
    fn property_order_is_insertion_order() {
        let mut doc = Document::new();
        let root = doc.root();
        let b = doc.add_node(Value::from(2u8));
        let a = doc.add_node(Value::from(1u8));
        doc.object_insert(root, "b", b).unwrap();
        doc.object_insert(root, "a", a).unwrap();
        let names: Vec<String> = doc
            .object_entries(root)
            .unwrap()
            .map(|(name, _)| name.to_string())
            .collect();
        assert_eq!(names, ["b", "a"]);
    }

    #[test]
    fn remove_keeps_index_consistent() {
        let mut doc = Document::new();
        let root = doc.root();
        for name in ["a", "b", "c"] {
            let node = doc.add_node(Value::from(name));
            doc.object_insert(root, name, node).unwrap();
        }
        doc.object_remove(root, "a").unwrap();
        let c = doc.object_get(root, "c").unwrap().unwrap();
        assert!(matches!(doc.value(c), Value::Text(t) if t == "c"));
    }
}
