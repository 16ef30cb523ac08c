//! Per-connection formatting state
//!
//! Formatting operations only mutate this state; content instructions read a
//! snapshot of it when the encoder renders them. Bounded fields are clamped
//! by their setters, so every stored value is always in range.

use thermalink_types::{Alignment, BarcodeTextPlacement, Dpi, Font, Setting};

use crate::constants::{bounds, defaults};

/// Formatting snapshot for one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattingState {
    pub bold: Setting,
    pub underline: Setting,
    pub double_width: Setting,
    pub double_height: Setting,
    pub inverse: Setting,
    pub alignment: Alignment,
    pub font: Font,
    pub barcode_text_placement: BarcodeTextPlacement,

    char_spacing: u8,
    line_spacing: u8,
    dpi: Dpi,
    image_width_mm: u16,
    barcode_width: u8,
    barcode_height: u8,
}

impl FormattingState {
    pub fn new() -> Self {
        Self {
            bold: Setting::Off,
            underline: Setting::Off,
            double_width: Setting::Off,
            double_height: Setting::Off,
            inverse: Setting::Default,
            alignment: Alignment::Left,
            font: Font::A,
            barcode_text_placement: BarcodeTextPlacement::None,
            char_spacing: defaults::CHAR_SPACING,
            line_spacing: defaults::LINE_SPACING,
            dpi: Dpi::Dpi200,
            image_width_mm: defaults::IMAGE_WIDTH_MM,
            barcode_width: defaults::BARCODE_WIDTH,
            barcode_height: defaults::BARCODE_HEIGHT,
        }
    }

    /// Restore every field to its default
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn char_spacing(&self) -> u8 {
        self.char_spacing
    }

    /// Character spacing, clamped to 0..=30
    pub fn set_char_spacing(&mut self, spacing: i32) {
        self.char_spacing = clamp(spacing, bounds::CHAR_SPACING) as u8;
    }

    pub fn line_spacing(&self) -> u8 {
        self.line_spacing
    }

    /// Line spacing, clamped to 0..=255
    pub fn set_line_spacing(&mut self, spacing: i32) {
        self.line_spacing = clamp(spacing, bounds::LINE_SPACING) as u8;
    }

    pub fn dpi(&self) -> Dpi {
        self.dpi
    }

    /// Set print head resolution; anything other than 300 means 200
    pub fn set_dpi(&mut self, dpi: u16) {
        self.dpi = Dpi::from_value(dpi);
    }

    pub fn image_width_mm(&self) -> u16 {
        self.image_width_mm
    }

    /// Maximum image width in millimeters
    ///
    /// Widths below 1mm are ignored; widths above 880mm are capped.
    pub fn set_image_width_mm(&mut self, width: i32) {
        if width < *bounds::IMAGE_WIDTH_MM.start() {
            return;
        }
        self.image_width_mm = clamp(width, bounds::IMAGE_WIDTH_MM) as u16;
    }

    /// Image width cap in printer dots for the current DPI
    pub fn image_width_dots(&self) -> u32 {
        u32::from(self.image_width_mm) * u32::from(self.dpi.dots_per_mm())
    }

    pub fn barcode_width(&self) -> u8 {
        self.barcode_width
    }

    /// Barcode module width, clamped to 3..=6
    pub fn set_barcode_width(&mut self, width: i32) {
        self.barcode_width = clamp(width, bounds::BARCODE_WIDTH) as u8;
    }

    pub fn barcode_height(&self) -> u8 {
        self.barcode_height
    }

    /// Barcode height in dots, clamped to 1..=255
    pub fn set_barcode_height(&mut self, height: i32) {
        self.barcode_height = clamp(height, bounds::BARCODE_HEIGHT) as u8;
    }
}

impl Default for FormattingState {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp(value: i32, range: std::ops::RangeInclusive<i32>) -> i32 {
    value.clamp(*range.start(), *range.end())
}
