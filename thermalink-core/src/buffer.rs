//! Command buffer
//!
//! # Payload Structure
//!
//! ```text
//! ┌─────────────┬────────────┬────────────┬─────┬──────────────┐
//! │   Header    │ Fragment 1 │ Fragment 2 │ ... │  Terminator  │
//! │  (encoder)  │            │            │     │  (encoder)   │
//! └─────────────┴────────────┴────────────┴─────┴──────────────┘
//! ```
//!
//! Rendering does not consume the fragments: writing the same job twice
//! sends the same bytes twice. Only [`CommandBuffer::clear`] empties it.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::encoder::Encoder;

/// Accumulated, not-yet-transmitted fragments for one connection
#[derive(Debug, Clone, Default)]
pub struct CommandBuffer {
    fragments: Vec<Bytes>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one fragment
    pub fn append(&mut self, fragment: impl Into<Bytes>) {
        let fragment = fragment.into();
        if fragment.is_empty() {
            return;
        }

        trace!(
            len = fragment.len(),
            head = %hex::encode(&fragment[..fragment.len().min(16)]),
            "Appending fragment"
        );
        self.fragments.push(fragment);
    }

    /// Drop every fragment
    pub fn clear(&mut self) {
        self.fragments.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Number of fragments
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// Total size of the buffered fragments in bytes
    pub fn byte_len(&self) -> usize {
        self.fragments.iter().map(Bytes::len).sum()
    }

    /// Concatenated fragments without framing
    pub fn body(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.byte_len());
        for fragment in &self.fragments {
            buf.put_slice(fragment);
        }
        buf.freeze()
    }

    /// Render the framed payload: header ++ fragments ++ terminator
    pub fn render(&self, encoder: &dyn Encoder) -> Bytes {
        let header = encoder.header();
        let terminator = encoder.terminator();

        let mut buf = BytesMut::with_capacity(header.len() + self.byte_len() + terminator.len());
        buf.put_slice(&header);
        for fragment in &self.fragments {
            buf.put_slice(fragment);
        }
        buf.put_slice(&terminator);

        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::MockEncoder;
    use pretty_assertions::assert_eq;

    fn framing_encoder() -> MockEncoder {
        let mut encoder = MockEncoder::new();
        encoder.expect_header().return_const(Bytes::from_static(&[0x1B, 0x40]));
        encoder.expect_terminator().return_const(Bytes::from_static(b"\n\n"));
        encoder
    }

    #[test]
    fn test_empty_buffer_renders_framing_only() {
        let buffer = CommandBuffer::new();
        let payload = buffer.render(&framing_encoder());

        assert_eq!(payload.as_ref(), &[0x1B, 0x40, b'\n', b'\n']);
    }

    #[test]
    fn test_render_keeps_order_and_fragments() {
        let mut buffer = CommandBuffer::new();
        buffer.append(&b"A"[..]);
        buffer.append(vec![0x00, 0xFF]);
        buffer.append(Bytes::from_static(b"B"));

        let encoder = framing_encoder();
        let first = buffer.render(&encoder);
        let second = buffer.render(&encoder);

        assert_eq!(first.as_ref(), &[0x1B, 0x40, b'A', 0x00, 0xFF, b'B', b'\n', b'\n']);
        assert_eq!(first, second);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_empty_fragments_skipped() {
        let mut buffer = CommandBuffer::new();
        buffer.append(Vec::new());

        assert!(buffer.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut buffer = CommandBuffer::new();
        buffer.append(&b"hello"[..]);
        assert_eq!(buffer.byte_len(), 5);
        assert_eq!(buffer.body().as_ref(), b"hello");

        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.byte_len(), 0);
    }
}
