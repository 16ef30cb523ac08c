//! Encoder seam
//!
//! The printer command language (ESC/POS, StarPRNT, ...) lives behind this
//! trait. The connection pipeline only asks it for fragments and framing.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::format::FormattingState;
use crate::instruction::Instruction;

/// Turns instructions into printer bytes
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Render one instruction with the given formatting
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`](crate::Error::Encoding) when the
    /// instruction cannot be expressed (undecodable image, data the
    /// symbology rejects, ...).
    async fn encode(&self, instruction: &Instruction, state: &FormattingState) -> Result<Bytes>;

    /// Bytes that open every payload (printer initialisation)
    fn header(&self) -> Bytes;

    /// Bytes that close every payload (trailing feeds, print end)
    fn terminator(&self) -> Bytes;
}
