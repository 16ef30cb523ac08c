//! Raw and image payload normalisation
//!
//! Callers hand payloads over as bytes, integer arrays, Base64 or data URLs.
//! Everything is reduced to plain bytes before it reaches a command buffer.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;

use crate::error::{Error, Result};

/// Payload for the `raw` operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawData {
    Bytes(Bytes),

    /// Integer values; each is reduced modulo 256
    Values(Vec<i64>),

    /// Base64 text, optionally a `data:` URL
    Base64(String),
}

impl RawData {
    /// Normalise to bytes
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPayload`] if Base64 text does not decode.
    pub fn into_bytes(self) -> Result<Bytes> {
        match self {
            Self::Bytes(bytes) => Ok(bytes),
            Self::Values(values) => Ok(values
                .into_iter()
                .map(|value| value.rem_euclid(256) as u8)
                .collect::<Vec<u8>>()
                .into()),
            Self::Base64(text) => decode_base64(&text),
        }
    }
}

impl From<Bytes> for RawData {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for RawData {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes.into())
    }
}

impl From<&[u8]> for RawData {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(Bytes::copy_from_slice(bytes))
    }
}

impl From<Vec<i64>> for RawData {
    fn from(values: Vec<i64>) -> Self {
        Self::Values(values)
    }
}

impl From<&str> for RawData {
    fn from(text: &str) -> Self {
        Self::Base64(text.to_string())
    }
}

impl From<String> for RawData {
    fn from(text: String) -> Self {
        Self::Base64(text)
    }
}

/// Payload for the `image` operation
///
/// Holds the encoded image file; decoding pixels is left to the encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageData {
    Bytes(Bytes),

    /// Base64 text, optionally a `data:` URL
    Base64(String),
}

impl ImageData {
    /// Normalise to bytes
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPayload`] if Base64 text does not decode or the
    /// image is empty.
    pub fn into_bytes(self) -> Result<Bytes> {
        let bytes = match self {
            Self::Bytes(bytes) => bytes,
            Self::Base64(text) => decode_base64(&text)?,
        };

        if bytes.is_empty() {
            return Err(Error::InvalidPayload("empty image".into()));
        }
        Ok(bytes)
    }
}

impl From<Bytes> for ImageData {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for ImageData {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes.into())
    }
}

impl From<&str> for ImageData {
    fn from(text: &str) -> Self {
        Self::Base64(text.to_string())
    }
}

impl From<String> for ImageData {
    fn from(text: String) -> Self {
        Self::Base64(text)
    }
}

/// Decode Base64, dropping a `data:...;base64,` prefix if present
fn decode_base64(text: &str) -> Result<Bytes> {
    let encoded = match text.find(',') {
        Some(index) if text.starts_with("data:") => &text[index + 1..],
        _ => text,
    };

    STANDARD
        .decode(encoded.trim())
        .map(Bytes::from)
        .map_err(|e| Error::InvalidPayload(format!("invalid Base64: {e}")))
}
