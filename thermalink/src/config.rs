//! Manager configuration

use std::time::Duration;

use thermalink_core::constants::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_DISCONNECT_GRACE, DEFAULT_SCAN_DURATION,
};

/// Timing policy of a [`PrinterManager`](crate::PrinterManager)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// How long a connect attempt waits for the transport to confirm
    pub connect_timeout: Duration,

    /// How long a disconnect waits for the transport to close before checking again
    pub disconnect_grace: Duration,

    /// Length of a discovery scan
    pub scan_duration: Duration,

    /// Capacity of the event channel; slow subscribers lag beyond it
    pub event_capacity: usize,
}

impl Config {
    pub fn new() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT),
            disconnect_grace: Duration::from_secs(DEFAULT_DISCONNECT_GRACE),
            scan_duration: Duration::from_secs(DEFAULT_SCAN_DURATION),
            event_capacity: 64,
        }
    }

    /// Set connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set disconnect grace window
    pub fn with_disconnect_grace(mut self, grace: Duration) -> Self {
        self.disconnect_grace = grace;
        self
    }

    /// Set scan duration
    pub fn with_scan_duration(mut self, duration: Duration) -> Self {
        self.scan_duration = duration;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
