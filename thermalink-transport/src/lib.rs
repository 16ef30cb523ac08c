//! Transport layer for thermal printers
//!
//! A [`TransportProvider`] hands out one [`PrinterLink`] per connection
//! attempt and reports connection changes asynchronously as
//! [`TransportEvent`]s. Confirmation of a connect arrives as an event, not as
//! the return value of [`PrinterLink::connect`].

pub mod error;
pub mod event;
pub mod memory;
pub mod tcp;

pub use error::{Error, Result};
pub use event::TransportEvent;
pub use memory::{MemoryLink, MemoryProvider};
pub use tcp::{TcpLink, TcpProvider};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// One transport session to one printer
///
/// Handles are shared behind an `Arc`, so every method takes `&self`.
#[async_trait]
pub trait PrinterLink: Send + Sync {
    /// Transport address this link targets
    fn address(&self) -> &str;

    /// Begin connecting; success is confirmed by a `Connected` event
    async fn connect(&self) -> Result<()>;

    /// Ask the device to disconnect
    async fn disconnect(&self) -> Result<()>;

    /// Release transport resources without notifying anyone
    async fn close(&self);

    /// Check if the session is open
    fn is_open(&self) -> bool;

    /// Send raw bytes
    async fn write(&self, data: &[u8]) -> Result<()>;
}

/// Factory for links plus device discovery
#[async_trait]
pub trait TransportProvider: Send + Sync {
    /// Create an unconnected link for `address`
    fn open(&self, address: &str) -> Result<Arc<dyn PrinterLink>>;

    /// Start discovering devices
    async fn start_scan(&self, duration: Duration, clear: bool) -> Result<()>;

    async fn stop_scan(&self) -> Result<()>;

    /// Check if `address` was seen by the latest discovery
    fn is_nearby(&self, address: &str) -> bool;

    /// Take the event stream; there is exactly one subscriber
    fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<TransportEvent>>;
}
