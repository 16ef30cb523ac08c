//! Enumerated printing settings
//!
//! Every enumeration parses from the name callers use on the wire
//! (`"left"`, `"A"`, `"CODE128"`, ...) and rejects anything else.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Tri-state flag for text styles
///
/// `Default` leaves the style at whatever the printer uses out of the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Setting {
    On,
    Off,
    #[default]
    Default,
}

impl From<bool> for Setting {
    fn from(enabled: bool) -> Self {
        if enabled { Self::On } else { Self::Off }
    }
}

impl From<Option<bool>> for Setting {
    fn from(enabled: Option<bool>) -> Self {
        enabled.map(Self::from).unwrap_or(Self::Default)
    }
}

impl FromStr for Setting {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "true" | "on" => Ok(Self::On),
            "false" | "off" => Ok(Self::Off),
            "default" => Ok(Self::Default),
            _ => Err(unknown("setting", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

impl Alignment {
    pub fn name(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }
}

impl FromStr for Alignment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "left" => Ok(Self::Left),
            "center" => Ok(Self::Center),
            "right" => Ok(Self::Right),
            _ => Err(unknown("alignment", s)),
        }
    }
}

/// Printer font
///
/// - `A`: 12x24 dots
/// - `B`: 9x24 dots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Font {
    #[default]
    A,
    B,
}

impl Font {
    pub fn name(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

impl FromStr for Font {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            _ => Err(unknown("font", s)),
        }
    }
}

/// Print head resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dpi {
    #[default]
    Dpi200,
    Dpi300,
}

impl Dpi {
    /// Map a raw DPI value; anything but 300 is treated as 200
    pub fn from_value(dpi: u16) -> Self {
        if dpi == 300 { Self::Dpi300 } else { Self::Dpi200 }
    }

    pub fn value(self) -> u16 {
        match self {
            Self::Dpi200 => 200,
            Self::Dpi300 => 300,
        }
    }

    /// Dots per millimeter
    pub fn dots_per_mm(self) -> u16 {
        match self {
            Self::Dpi200 => 8,
            Self::Dpi300 => 12,
        }
    }
}

/// One-dimensional barcode symbologies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarcodeType {
    UpcA,
    Ean8,
    Ean13,
    Code39,
    Itf,
    Codabar,
    Code128,
}

impl BarcodeType {
    pub const ALL: [BarcodeType; 7] = [
        Self::UpcA,
        Self::Ean8,
        Self::Ean13,
        Self::Code39,
        Self::Itf,
        Self::Codabar,
        Self::Code128,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::UpcA => "UPC_A",
            Self::Ean8 => "EAN8",
            Self::Ean13 => "EAN13",
            Self::Code39 => "CODE39",
            Self::Itf => "ITF",
            Self::Codabar => "CODABAR",
            Self::Code128 => "CODE128",
        }
    }
}

impl FromStr for BarcodeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.name() == s)
            .ok_or_else(|| unknown("barcode type", s))
    }
}

impl fmt::Display for BarcodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where the human-readable text of a barcode is printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BarcodeTextPlacement {
    #[default]
    None,
    Above,
    Below,
    Both,
}

impl FromStr for BarcodeTextPlacement {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Self::None),
            "above" => Ok(Self::Above),
            "below" => Ok(Self::Below),
            "both" => Ok(Self::Both),
            _ => Err(unknown("barcode text placement", s)),
        }
    }
}

/// Character set used to encode text instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextEncoding {
    #[default]
    Gbk,
    Utf8,
}

impl TextEncoding {
    pub fn name(self) -> &'static str {
        match self {
            Self::Gbk => "GBK",
            Self::Utf8 => "UTF-8",
        }
    }
}

impl FromStr for TextEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "GBK" => Ok(Self::Gbk),
            "UTF-8" => Ok(Self::Utf8),
            _ => Err(unknown("encoding", s)),
        }
    }
}

fn unknown(kind: &'static str, value: &str) -> Error {
    Error::UnknownVariant {
        kind,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_known_names() {
        assert_eq!("center".parse::<Alignment>().unwrap(), Alignment::Center);
        assert_eq!("B".parse::<Font>().unwrap(), Font::B);
        assert_eq!("UPC_A".parse::<BarcodeType>().unwrap(), BarcodeType::UpcA);
        assert_eq!("both".parse::<BarcodeTextPlacement>().unwrap(), BarcodeTextPlacement::Both);
        assert_eq!("UTF-8".parse::<TextEncoding>().unwrap(), TextEncoding::Utf8);
        assert_eq!("default".parse::<Setting>().unwrap(), Setting::Default);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!("middle".parse::<Alignment>().is_err());
        assert!("a".parse::<Font>().is_err());
        assert!("QR".parse::<BarcodeType>().is_err());

        let err = "sideways".parse::<BarcodeTextPlacement>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown barcode text placement: \"sideways\"");
    }

    #[test]
    fn test_dpi_fallback() {
        assert_eq!(Dpi::from_value(300), Dpi::Dpi300);
        assert_eq!(Dpi::from_value(200), Dpi::Dpi200);
        assert_eq!(Dpi::from_value(600), Dpi::Dpi200);
        assert_eq!(Dpi::Dpi300.dots_per_mm(), 12);
    }

    #[test]
    fn test_setting_from_bool() {
        assert_eq!(Setting::from(true), Setting::On);
        assert_eq!(Setting::from(false), Setting::Off);
        assert_eq!(Setting::from(None), Setting::Default);
    }
}
