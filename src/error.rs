//! Centralized error handling for Objectoid.
//!
//! All failure conditions in this crate are surfaced through the [`Result`]
//! type; the library contains no panicking paths on user-reachable input
//! (enforced through `#![deny(clippy::unwrap_used)]` and
//! `#![deny(clippy::panic)]`).
//!
//! ## Design Philosophy
//!
//! 1. **No Panics:** every decode of untrusted bytes and every tree
//!    manipulation returns a `Result`. Arena-handle misuse (passing a
//!    [`NodeId`](crate::NodeId) from one document into another) is the one
//!    documented panic class, consistent with it being a caller bug rather
//!    than a data condition.
//!
//! 2. **Transactional Surface:** `save` and `load` are all-or-nothing. An
//!    error from either leaves the caller's document untouched; there is no
//!    partially-populated intermediate state to observe.
//!
//! 3. **Cloneable Errors:** [`ObjectoidError`] is `Clone` so failures can be
//!    stored or re-reported. I/O errors are wrapped in `Arc` to keep cloning
//!    cheap.
//!
//! ## Usage
//!
//! ```rust
//! use objectoid::{Document, Objectoid, ObjectoidError};
//!
//! let doc = Document::new();
//! match Objectoid::save("/nonexistent-dir/doc.obd", &doc) {
//!     Ok(()) => println!("saved"),
//!     Err(ObjectoidError::Io(e)) => eprintln!("I/O error: {e}"),
//!     Err(e) => eprintln!("other error: {e}"),
//! }
//! ```

use std::fmt;
use std::io;
use std::sync::Arc;

/// A specialized `Result` type for Objectoid operations.
///
/// ```rust
/// use objectoid::Result;
///
/// fn build() -> Result<i32> {
///     Ok(42)
/// }
/// ```
pub type Result<T> = std::result::Result<T, ObjectoidError>;

/// The master error enum covering all failure domains in Objectoid.
///
/// ## Variants by domain
///
/// - **Io:** low-level stream and file failures.
/// - **InvalidArgument:** a call was malformed before any I/O happened.
/// - **AlreadyOwned / NotCollectible:** tree ownership violations; the
///   attach is rejected and both nodes are left unchanged.
/// - **MalformedData:** the byte stream does not conform to the format.
/// - **Overflow:** an encoded address left the 31-bit representable range.
/// - **Internal:** a logic error inside the encoder. This should not occur
///   in production; please report it as a bug.
#[derive(Debug, Clone)]
pub enum ObjectoidError {
    /// Low-level I/O failure (disk full, permissions, truncated read, etc.).
    ///
    /// The underlying `io::Error` is wrapped in an `Arc` to keep the error
    /// `Clone`.
    Io(Arc<io::Error>),

    /// A call was rejected before any I/O or mutation took place: a missing
    /// required argument, a duplicate property name, a value that cannot be
    /// represented (for example an NT string containing a zero byte).
    InvalidArgument(String),

    /// The node being attached already has an owning collection.
    ///
    /// Detach it from its current owner first; the node and the prospective
    /// parent are both unchanged by the failed attach.
    AlreadyOwned,

    /// The node being attached is a document root, which can never be owned
    /// by a collection.
    NotCollectible,

    /// The byte stream is not a valid Objectoid document: an unknown type
    /// tag, an address outside the stream, a truncated field, or a count
    /// that cannot fit in the remaining bytes.
    ///
    /// The string describes the specific violation and, where useful, the
    /// offset at which it was detected.
    MalformedData(String),

    /// A computed address exceeded the 31-bit range the format can store.
    /// The payload is the offending stream offset. Encoding aborts before
    /// any further writes.
    Overflow(u64),

    /// Logic error in the encoder or decoder internals, such as resolving
    /// an address that was never registered.
    ///
    /// This indicates a bug in the library, not bad input. Please report it
    /// with a minimal reproduction case.
    Internal(String),
}

impl fmt::Display for ObjectoidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O Error: {e}"),
            Self::InvalidArgument(s) => write!(f, "Invalid Argument: {s}"),
            Self::AlreadyOwned => write!(f, "Node already has an owning collection"),
            Self::NotCollectible => write!(f, "A document root cannot be attached to a collection"),
            Self::MalformedData(s) => write!(f, "Malformed Data: {s}"),
            Self::Overflow(offset) => {
                write!(f, "Address Overflow: offset {offset} exceeds the 31-bit range")
            }
            Self::Internal(s) => write!(f, "Internal Logic Error: {s}"),
        }
    }
}

impl std::error::Error for ObjectoidError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ObjectoidError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}
