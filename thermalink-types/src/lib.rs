//! Type definitions for thermalink

pub mod connection;
pub mod error;
pub mod printing;

pub use connection::{BluetoothDevice, ConnectionId, PrinterConnection};
pub use error::{Error, Result};
pub use printing::{
    Alignment, BarcodeTextPlacement, BarcodeType, Dpi, Font, Setting, TextEncoding,
};
