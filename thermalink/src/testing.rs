//! Test helpers shared by the unit tests

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use thermalink_core::{Encoder, FormattingState, Instruction};

/// Encoder producing readable fragments
///
/// Text is emitted verbatim, other instructions as `[name]` and barcodes as
/// `[KIND:data]`. A QR code with empty data fails to encode. Every call is
/// recorded together with the formatting it saw.
#[derive(Clone, Default)]
pub(crate) struct TestEncoder {
    delays: Arc<Mutex<HashMap<String, Duration>>>,
    seen: Arc<Mutex<Vec<(Instruction, FormattingState)>>>,
}

impl TestEncoder {
    /// Delay encoding of this exact text
    pub fn slow(&self, text: &str, delay: Duration) {
        self.delays.lock().insert(text.to_string(), delay);
    }

    pub fn seen(&self) -> Vec<(Instruction, FormattingState)> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl Encoder for TestEncoder {
    async fn encode(
        &self,
        instruction: &Instruction,
        state: &FormattingState,
    ) -> thermalink_core::Result<Bytes> {
        let delay = match instruction {
            Instruction::Text { text, .. } => self.delays.lock().get(text).copied(),
            _ => None,
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.seen.lock().push((instruction.clone(), state.clone()));

        match instruction {
            Instruction::Text { text, .. } => Ok(Bytes::from(text.clone())),
            Instruction::Qr(data) if data.is_empty() => Err(thermalink_core::Error::Encoding {
                instruction: "qr",
                reason: "empty data".into(),
            }),
            Instruction::Barcode { kind, data } => Ok(Bytes::from(format!("[{kind}:{data}]"))),
            other => Ok(Bytes::from(format!("[{}]", other.name()))),
        }
    }

    fn header(&self) -> Bytes {
        Bytes::from_static(b"<")
    }

    fn terminator(&self) -> Bytes {
        Bytes::from_static(b">")
    }
}

/// Let spawned tasks run until they block
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
