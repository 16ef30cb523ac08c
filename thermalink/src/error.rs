//! High-level error types

use thermalink_types::ConnectionId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core error: {0}")]
    Core(#[from] thermalink_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] thermalink_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] thermalink_types::Error),

    /// A connect attempt for this address has not resolved yet
    #[error("Already connecting to {0}")]
    AlreadyConnecting(String),

    #[error("A device scan is already running")]
    AlreadyScanning,

    /// No connection with this id, or no connection at all
    #[error("Unknown connection{}", id_suffix(.0))]
    UnknownConnection(Option<ConnectionId>),

    /// No connection id given and several connections exist
    #[error("Connection id required: {0} connections are open")]
    AmbiguousConnection(usize),

    #[error("Printer not connected")]
    NotConnected,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Check if the error comes from the connection state rather than from
    /// the arguments of the call
    pub fn is_lifecycle(&self) -> bool {
        match self {
            Self::NotConnected
            | Self::UnknownConnection(_)
            | Self::AmbiguousConnection(_)
            | Self::AlreadyConnecting(_) => true,
            Self::Transport(e) => e.is_closed(),
            _ => false,
        }
    }

    /// Wrap a caller-input failure as [`Error::InvalidArgument`]
    pub(crate) fn invalid(error: impl std::fmt::Display) -> Self {
        Self::InvalidArgument(error.to_string())
    }
}

fn id_suffix(id: &Option<ConnectionId>) -> String {
    id.as_ref().map(|id| format!(": {id}")).unwrap_or_default()
}
