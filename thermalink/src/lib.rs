//! # thermalink
//!
//! Connection management and ordered print jobs for wireless thermal printers.
//!
//! ## Features
//!
//! - Connection lifecycle with pending-connect timeouts and disconnect grace
//! - One ordered command queue per connection; jobs never interleave
//! - Typed, clamped formatting state
//! - Pluggable transport ([`TransportProvider`]) and command language ([`Encoder`])
//!
//! ## Quick Start
//!
//! ```no_run
//! use thermalink::{Encoder, PrinterManager};
//! use thermalink_transport::TcpProvider;
//!
//! async fn print(encoder: impl Encoder + 'static) -> thermalink::Result<()> {
//!     let manager = PrinterManager::new(TcpProvider::new(), encoder)?;
//!
//!     // Resolves with None if the printer never confirms
//!     if manager.connect("192.168.1.87:9100").await?.is_none() {
//!         return Ok(());
//!     }
//!
//!     manager
//!         .session()
//!         .begin()
//!         .bold(true)
//!         .text("Hello\n")
//!         .feed_cut_paper(false)
//!         .write()
//!         .await?;
//!
//!     manager.disconnect(None).await
//! }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod manager;
pub mod session;

mod queue;
mod registry;

#[cfg(test)]
mod testing;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use events::PrinterEvent;
pub use manager::PrinterManager;
pub use session::Session;

// Re-export types
pub use thermalink_core::{Encoder, FormattingState, ImageData, Instruction, RawData};
pub use thermalink_transport::{PrinterLink, TransportEvent, TransportProvider};
pub use thermalink_types::{
    Alignment, BarcodeTextPlacement, BarcodeType, BluetoothDevice, ConnectionId, Dpi, Font,
    PrinterConnection, Setting, TextEncoding,
};
