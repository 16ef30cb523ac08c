//! Asynchronous transport notifications

use thermalink_types::BluetoothDevice;

/// Notification emitted by a transport provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Devices seen so far by the running scan
    Discovered(Vec<BluetoothDevice>),

    /// Session to `address` is open
    Connected {
        address: String,
        name: Option<String>,
    },

    /// Session to `address` is gone
    Disconnected {
        address: String,
    },

    /// Scan ended on the transport side
    ScanFinished,
}

impl TransportEvent {
    /// Address the event refers to, if any
    pub fn address(&self) -> Option<&str> {
        match self {
            Self::Connected { address, .. } | Self::Disconnected { address } => Some(address),
            Self::Discovered(_) | Self::ScanFinished => None,
        }
    }
}
