//! Events surfaced to observers

use thermalink_types::{BluetoothDevice, PrinterConnection};

/// Connectivity event broadcast by a [`PrinterManager`](crate::PrinterManager)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrinterEvent {
    /// Devices found by the running scan
    DevicesDiscovered(Vec<BluetoothDevice>),

    /// The scan ended; emitted once per scan
    DiscoveryFinished,

    /// A connection was confirmed by the transport
    Connected(PrinterConnection),

    /// A confirmed connection was torn down
    Disconnected(PrinterConnection),
}

impl PrinterEvent {
    /// Get event name
    pub fn name(&self) -> &'static str {
        match self {
            Self::DevicesDiscovered(_) => "discoverDevices",
            Self::DiscoveryFinished => "discoveryFinish",
            Self::Connected(_) => "connected",
            Self::Disconnected(_) => "disconnected",
        }
    }
}
