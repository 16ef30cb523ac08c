//! Protocol constants and formatting defaults

/// Pending connect timeout (seconds)
pub const DEFAULT_CONNECT_TIMEOUT: u64 = 5;

/// Delay before a disconnect is forced when the transport has not closed (seconds)
pub const DEFAULT_DISCONNECT_GRACE: u64 = 2;

/// Length of a discovery scan (seconds)
pub const DEFAULT_SCAN_DURATION: u64 = 30;

/// Default raw TCP printing port
pub const DEFAULT_TCP_PORT: u16 = 9100;

/// Formatting defaults applied on `begin` and `clear_formatting`
pub mod defaults {
    /// Character spacing in dots
    pub const CHAR_SPACING: u8 = 1;

    /// Line spacing in dots
    pub const LINE_SPACING: u8 = 30;

    /// Maximum image width in millimeters
    pub const IMAGE_WIDTH_MM: u16 = 48;

    /// Barcode module width
    pub const BARCODE_WIDTH: u8 = 3;

    /// Barcode height in dots
    pub const BARCODE_HEIGHT: u8 = 72;
}

/// Valid ranges for bounded formatting fields
pub mod bounds {
    use std::ops::RangeInclusive;

    pub const CHAR_SPACING: RangeInclusive<i32> = 0..=30;
    pub const LINE_SPACING: RangeInclusive<i32> = 0..=255;
    pub const IMAGE_WIDTH_MM: RangeInclusive<i32> = 1..=880;
    pub const BARCODE_WIDTH: RangeInclusive<i32> = 3..=6;
    pub const BARCODE_HEIGHT: RangeInclusive<i32> = 1..=255;
}
