//! Print a receipt on a network printer
//!
//! ```text
//! PRINTER_ADDR=192.168.1.87:9100 cargo run --example print_tcp
//! ```

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use thermalink::{
    Alignment, BarcodeType, Encoder, FormattingState, Instruction, PrinterManager, Setting,
};
use thermalink_transport::TcpProvider;
use tracing_subscriber::EnvFilter;

/// Minimal ESC/POS encoder: text styles, barcodes and cuts
struct EscPos;

fn flag(setting: Setting) -> Option<u8> {
    match setting {
        Setting::On => Some(1),
        Setting::Off => Some(0),
        Setting::Default => None,
    }
}

#[async_trait]
impl Encoder for EscPos {
    async fn encode(
        &self,
        instruction: &Instruction,
        state: &FormattingState,
    ) -> thermalink_core::Result<Bytes> {
        let mut buf = BytesMut::new();

        match instruction {
            Instruction::Text { text, .. } => {
                let align = match state.alignment {
                    Alignment::Left => 0,
                    Alignment::Center => 1,
                    Alignment::Right => 2,
                };
                buf.put_slice(&[0x1B, 0x61, align]);
                if let Some(bold) = flag(state.bold) {
                    buf.put_slice(&[0x1B, 0x45, bold]);
                }
                if let Some(underline) = flag(state.underline) {
                    buf.put_slice(&[0x1B, 0x2D, underline]);
                }
                let width = u8::from(state.double_width == Setting::On) << 4;
                let height = u8::from(state.double_height == Setting::On);
                buf.put_slice(&[0x1D, 0x21, width | height]);
                buf.put_slice(&[0x1B, 0x20, state.char_spacing()]);
                buf.put_slice(&[0x1B, 0x33, state.line_spacing()]);
                buf.put_slice(text.as_bytes());
            }
            Instruction::Barcode { kind, data } => {
                let system = match kind {
                    BarcodeType::UpcA => 65,
                    BarcodeType::Ean13 => 67,
                    BarcodeType::Ean8 => 68,
                    BarcodeType::Code39 => 69,
                    BarcodeType::Itf => 70,
                    BarcodeType::Codabar => 71,
                    BarcodeType::Code128 => 73,
                };
                let len = u8::try_from(data.len()).map_err(|_| thermalink_core::Error::Encoding {
                    instruction: "barcode",
                    reason: "data longer than 255 bytes".into(),
                })?;
                buf.put_slice(&[0x1D, 0x77, state.barcode_width()]);
                buf.put_slice(&[0x1D, 0x68, state.barcode_height()]);
                buf.put_slice(&[0x1D, 0x6B, system, len]);
                buf.put_slice(data.as_bytes());
            }
            Instruction::Beep => buf.put_slice(&[0x1B, 0x42, 0x03, 0x02]),
            Instruction::OpenDrawer => buf.put_slice(&[0x1B, 0x70, 0x00, 0x19, 0xFA]),
            Instruction::Cut { half } => buf.put_slice(&[0x1D, 0x56, u8::from(*half)]),
            Instruction::FeedCut { half } => {
                buf.put_slice(&[0x1B, 0x64, 0x04]);
                buf.put_slice(&[0x1D, 0x56, u8::from(*half)]);
            }
            other => return Err(thermalink_core::Error::UnsupportedInstruction(other.name())),
        }

        Ok(buf.freeze())
    }

    fn header(&self) -> Bytes {
        Bytes::from_static(&[0x1B, 0x40])
    }

    fn terminator(&self) -> Bytes {
        Bytes::from_static(b"\n")
    }
}

#[tokio::main]
async fn main() -> thermalink::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Change to your printer address
    let addr = std::env::var("PRINTER_ADDR").unwrap_or_else(|_| "192.168.1.87:9100".to_string());

    let manager = PrinterManager::new(TcpProvider::new(), EscPos)?;

    println!("Connecting to {}...", addr);
    let Some(printer) = manager.connect(&addr).await? else {
        println!("✗ Printer did not answer");
        return Ok(());
    };
    println!("✓ Connected: {}", printer);

    manager
        .session()
        .begin()
        .align(Alignment::Center)
        .double_height(true)
        .bold(true)
        .text("THERMALINK\n")
        .double_height(false)
        .bold(false)
        .text("Order #1042\n")
        .align(Alignment::Left)
        .text("2x Espresso          5.00\n")
        .text("1x Croissant         2.50\n")
        .bold(true)
        .text("Total                7.50\n")
        .bold(false)
        .barcode(BarcodeType::Code128, "1042")
        .feed_cut_paper(false);

    manager.session().write().await?;
    println!("✓ Receipt sent");

    manager.disconnect(None).await?;
    println!("✓ Disconnected");

    Ok(())
}
