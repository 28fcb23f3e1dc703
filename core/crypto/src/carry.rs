//! Boundary carry between stream chunks.
//!
//! A `CarryBuffer` holds the bytes of a chunk that did not form a complete
//! encoding unit (a base64 quantum, a hex digit pair, a UTF-8 sequence) so
//! that the next call of the same kind can prepend them.

use std::fmt;
use zeroize::Zeroize;

/// Leftover bytes from the previous chunk of one carry kind.
///
/// Contents may be plaintext, so they are zeroized when cleared or dropped.
#[derive(Default, Zeroize)]
#[zeroize(drop)]
pub struct CarryBuffer {
    pending: Vec<u8>,
}

impl CarryBuffer {
    /// Create an empty carry buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the pending content.
    pub fn set(&mut self, bytes: &[u8]) {
        self.pending.zeroize();
        self.pending.extend_from_slice(bytes);
    }

    /// Return the pending content and leave the buffer empty.
    ///
    /// Calling this twice returns an empty vector the second time.
    pub fn take_and_clear(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.pending)
    }

    /// Move the pending content in front of `chunk`.
    pub fn prepend_to(&mut self, chunk: &[u8]) -> Vec<u8> {
        let mut combined = self.take_and_clear();
        combined.extend_from_slice(chunk);
        combined
    }

    /// Discard the pending content.
    pub fn clear(&mut self) {
        self.pending.zeroize();
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }
}

impl fmt::Debug for CarryBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CarryBuffer([REDACTED; {} bytes])", self.pending.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_and_clear_idempotent() {
        let mut carry = CarryBuffer::new();
        carry.set(b"ab");
        assert_eq!(carry.take_and_clear(), b"ab");
        assert!(carry.take_and_clear().is_empty());
        assert!(carry.is_empty());
    }

    #[test]
    fn test_set_replaces_content() {
        let mut carry = CarryBuffer::new();
        carry.set(b"abc");
        carry.set(b"z");
        assert_eq!(carry.len(), 1);
        assert_eq!(carry.take_and_clear(), b"z");
    }

    #[test]
    fn test_prepend_to_consumes_carry() {
        let mut carry = CarryBuffer::new();
        carry.set(&[1, 2]);
        assert_eq!(carry.prepend_to(&[3]), vec![1, 2, 3]);
        assert!(carry.is_empty());
        assert_eq!(carry.prepend_to(&[4]), vec![4]);
    }

    #[test]
    fn test_clear_discards() {
        let mut carry = CarryBuffer::new();
        carry.set(b"secret");
        carry.clear();
        assert!(carry.is_empty());
    }
}
