//! Error types for thermalink-core

/// Result type alias for thermalink-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core printing errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Encoder could not produce bytes for an instruction
    #[error("Encoding failed for {instruction}: {reason}")]
    Encoding {
        instruction: &'static str,
        reason: String,
    },

    /// Instruction is not valid for the operation it was given to
    #[error("Unsupported instruction: {0}")]
    UnsupportedInstruction(&'static str),

    /// Payload could not be normalised to bytes
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Connection state transition not allowed
    #[error("Invalid connection state: {0}")]
    InvalidState(String),

    /// Enumerated value not recognised
    #[error(transparent)]
    Types(#[from] thermalink_types::Error),
}

impl Error {
    /// Check if error was caused by caller-supplied input
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedInstruction(_)
                | Self::InvalidPayload(_)
                | Self::Types(_)
        )
    }
}
