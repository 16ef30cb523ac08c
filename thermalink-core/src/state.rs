//! Connection state machine
//!
//! A connection context moves through:
//! - Pending (connect issued, waiting for the transport to confirm)
//! - Active (confirmed, usable for printing)
//! - Closed (torn down; the context is never reused)

use crate::error::{Error, Result};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Connect issued, not yet confirmed
    #[default]
    Pending,

    /// Confirmed by the transport
    Active,

    /// Torn down
    Closed,
}

impl ConnectionState {
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Mark the connection confirmed
    ///
    /// Confirming an already active connection is a no-op, since transports
    /// may report the same connection twice.
    pub fn promote(&mut self) -> Result<()> {
        match *self {
            Self::Pending | Self::Active => {
                *self = Self::Active;
                Ok(())
            }
            Self::Closed => Err(Error::InvalidState(
                "Cannot confirm a closed connection".into(),
            )),
        }
    }

    /// Close the connection; idempotent
    pub fn close(&mut self) {
        *self = Self::Closed;
    }
}
