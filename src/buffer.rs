//! Copy-on-write byte buffers
//!
//! Physical reads can hand out memory that other parts of the host still
//! reference (a memory map, a cached range, a slice of a larger read).
//! [`Buffer`] keeps that distinction explicit: rewriting always works on the
//! [`Buffer::Unique`] variant and converts a [`Buffer::Shared`] one on demand.

use bytes::{Bytes, BytesMut};

/// A byte buffer that is either shared read-only or uniquely owned
#[derive(Debug, Clone)]
pub enum Buffer {
    /// Reference-counted, read-only bytes
    Shared(Bytes),
    /// Exclusively owned, writable bytes
    Unique(BytesMut),
}

impl Buffer {
    /// Create an empty, writable buffer
    pub fn new() -> Self {
        Self::Unique(BytesMut::new())
    }

    /// Number of bytes in the buffer
    pub fn len(&self) -> usize {
        match self {
            Self::Shared(b) => b.len(),
            Self::Unique(b) => b.len(),
        }
    }

    /// Check if the buffer holds no bytes
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if the buffer can be mutated without copying
    pub fn is_writable(&self) -> bool {
        matches!(self, Self::Unique(_))
    }

    /// Take a writable view, copying only when the bytes are still shared
    pub fn into_mut(self) -> BytesMut {
        match self {
            Self::Unique(b) => b,
            Self::Shared(b) => match b.try_into_mut() {
                Ok(unique) => unique,
                Err(shared) => BytesMut::from(&shared[..]),
            },
        }
    }

    /// Convert into immutable, cheaply clonable bytes
    pub fn freeze(self) -> Bytes {
        match self {
            Self::Shared(b) => b,
            Self::Unique(b) => b.freeze(),
        }
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        match self {
            Self::Shared(b) => b,
            Self::Unique(b) => b,
        }
    }
}

impl From<Bytes> for Buffer {
    fn from(bytes: Bytes) -> Self {
        Self::Shared(bytes)
    }
}

impl From<BytesMut> for Buffer {
    fn from(bytes: BytesMut) -> Self {
        Self::Unique(bytes)
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(vec: Vec<u8>) -> Self {
        Self::Unique(BytesMut::from(&vec[..]))
    }
}

impl From<&[u8]> for Buffer {
    fn from(slice: &[u8]) -> Self {
        Self::Unique(BytesMut::from(slice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_clone_on_write() {
        let original = Bytes::from_static(b"hello");
        let held = original.clone();

        let mut writable = Buffer::Shared(original).into_mut();
        writable[0] = b'j';

        assert_eq!(&writable[..], b"jello");
        assert_eq!(&held[..], b"hello", "shared bytes must not be mutated");
    }

    #[test]
    fn test_unique_shared_converts() {
        let bytes = Bytes::from(vec![1u8, 2, 3]);
        let mut writable = Buffer::Shared(bytes).into_mut();
        writable.extend_from_slice(&[4]);
        assert_eq!(&writable[..], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_writable_flag() {
        assert!(Buffer::from(vec![1u8]).is_writable());
        assert!(!Buffer::from(Bytes::from_static(b"x")).is_writable());
        assert!(Buffer::new().is_empty());
    }
}
