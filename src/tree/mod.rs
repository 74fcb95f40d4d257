//! The element model: documents, nodes, and ownership.
//!
//! This module defines the `Document` arena, the `NodeId` handle, and the
//! closed `Value` variant set that the codec serializes.

/// Defines the `Document` arena and its tree operations.
pub mod core;
/// Defines the `NodeId` type.
pub mod id;
/// Defines the `Value` variant set and the `NtString` byte string.
pub mod value;

pub use core::Document;
pub use id::NodeId;
pub use value::{IntoNtString, ListSlots, NtString, ObjectSlots, Value};
