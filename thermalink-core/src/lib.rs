//! # thermalink-core
//!
//! Per-connection printing model for thermal printers.
//!
//! This crate provides the pieces a connection owns while a print job is
//! being built:
//! - Formatting state with clamped, typed fields
//! - Command buffer that accumulates encoded fragments
//! - Instruction definitions and the encoder seam
//! - Connection state machine
//! - Normalisation of raw and image payloads

pub mod buffer;
pub mod constants;
pub mod encoder;
pub mod error;
pub mod format;
pub mod instruction;
pub mod payload;
pub mod state;

pub use buffer::CommandBuffer;
pub use encoder::Encoder;
pub use error::{Error, Result};
pub use format::FormattingState;
pub use instruction::Instruction;
pub use payload::{ImageData, RawData};
pub use state::ConnectionState;
