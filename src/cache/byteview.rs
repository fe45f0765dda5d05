//! Immutable byte snapshot shared by every reader of a cached value.

use std::fmt;

use bytes::Bytes;

use super::lru::ByteSize;

/// Read-only view over looked-up bytes.
///
/// Cloning is cheap (refcounted); the backing buffer is never handed out
/// mutably, so cached state cannot be corrupted by a reader.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ByteView {
    b: Bytes,
}

impl ByteView {
    /// Copy `data` into a fresh buffer.
    pub fn copy_from_slice(data: &[u8]) -> Self {
        Self {
            b: Bytes::copy_from_slice(data),
        }
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.b.len()
    }

    pub fn is_empty(&self) -> bool {
        self.b.is_empty()
    }

    /// Defensive copy of the contents.
    pub fn byte_slice(&self) -> Vec<u8> {
        self.b.to_vec()
    }

    /// Refcounted handle to the immutable buffer (no copy).
    pub fn as_bytes(&self) -> Bytes {
        self.b.clone()
    }
}

impl From<Bytes> for ByteView {
    fn from(b: Bytes) -> Self {
        Self { b }
    }
}

impl From<Vec<u8>> for ByteView {
    fn from(v: Vec<u8>) -> Self {
        Self { b: Bytes::from(v) }
    }
}

impl From<&str> for ByteView {
    fn from(s: &str) -> Self {
        Self::copy_from_slice(s.as_bytes())
    }
}

impl ByteSize for ByteView {
    fn byte_len(&self) -> usize {
        self.len()
    }
}

impl fmt::Display for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.b))
    }
}

impl fmt::Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteView").field("b", &self.b).finish()
    }
}
