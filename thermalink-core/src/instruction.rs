//! Content instructions handed to the encoder

use std::fmt;

use bytes::Bytes;
use thermalink_types::{BarcodeType, TextEncoding};

/// Content instruction
///
/// Each variant is turned into one byte fragment by an [`Encoder`](crate::Encoder),
/// using the formatting state current at the time it was queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Text; a trailing `\n` is required to end the line
    Text {
        text: String,
        encoding: TextEncoding,
    },

    /// Encoded image file (PNG, JPEG, ...), decoded by the encoder
    Image(Bytes),

    Qr(String),

    Barcode {
        kind: BarcodeType,
        data: String,
    },

    /// Print the printer's self-test page
    SelfTest,
    Beep,
    OpenDrawer,

    Cut {
        half: bool,
    },

    /// Line feed followed by a cut
    FeedCut {
        half: bool,
    },
}

impl Instruction {
    /// Check if this instruction prints visible content
    pub fn is_content(&self) -> bool {
        matches!(
            self,
            Self::Text { .. }
                | Self::Image(_)
                | Self::Qr(_)
                | Self::Barcode { .. }
                | Self::SelfTest
        )
    }

    /// Check if printers may silently ignore this instruction
    pub fn may_be_unsupported(&self) -> bool {
        matches!(
            self,
            Self::SelfTest | Self::Beep | Self::OpenDrawer | Self::Cut { half: true } | Self::FeedCut { half: true }
        )
    }

    /// Get instruction name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Image(_) => "image",
            Self::Qr(_) => "qr",
            Self::Barcode { .. } => "barcode",
            Self::SelfTest => "selfTest",
            Self::Beep => "beep",
            Self::OpenDrawer => "openDrawer",
            Self::Cut { .. } => "cutPaper",
            Self::FeedCut { .. } => "feedCutPaper",
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text { text, encoding } => {
                write!(f, "text({} chars, {})", text.chars().count(), encoding.name())
            }
            Self::Image(data) => write!(f, "image({} bytes)", data.len()),
            Self::Qr(data) => write!(f, "qr({} chars)", data.chars().count()),
            Self::Barcode { kind, data } => write!(f, "barcode({kind}, {data:?})"),
            Self::Cut { half } | Self::FeedCut { half } => {
                write!(f, "{}(half={half})", self.name())
            }
            _ => f.write_str(self.name()),
        }
    }
}
