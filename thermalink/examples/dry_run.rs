//! Build jobs against the in-memory transport and dump the bytes
//!
//! Shows the event stream and the queue ordering without a printer.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thermalink::{
    BluetoothDevice, Config, Encoder, FormattingState, Instruction, PrinterEvent, PrinterManager,
};
use thermalink_transport::MemoryProvider;
use tracing_subscriber::EnvFilter;

/// Encoder that prints instructions as readable tags
struct Tags;

#[async_trait]
impl Encoder for Tags {
    async fn encode(
        &self,
        instruction: &Instruction,
        state: &FormattingState,
    ) -> thermalink_core::Result<Bytes> {
        Ok(Bytes::from(format!("[{} {}] {}", state.alignment.name(), instruction.name(), instruction)))
    }

    fn header(&self) -> Bytes {
        Bytes::from_static(b"<job>")
    }

    fn terminator(&self) -> Bytes {
        Bytes::from_static(b"</job>")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()))
        .init();

    let provider = MemoryProvider::new();
    provider.set_name("66:22:E2:4D:1A:0F", "MTP-II");

    let config = Config::default().with_scan_duration(Duration::from_secs(1));
    let manager = PrinterManager::with_config(provider.clone(), Tags, config)?;

    let mut events = manager.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            println!("event: {:?}", event);
            if matches!(event, PrinterEvent::Disconnected(_)) {
                break;
            }
        }
    });

    manager.start_scan().await?;
    provider.discover(vec![BluetoothDevice::new(
        Some("MTP-II".into()),
        "66:22:E2:4D:1A:0F",
    )]);
    tokio::time::sleep(Duration::from_millis(1200)).await;

    let printer = manager
        .connect("66:22:E2:4D:1A:0F")
        .await?
        .ok_or_else(|| anyhow::anyhow!("printer did not confirm"))?;

    // Two call sites building one job
    let session = manager.use_connection(&printer.connection_id)?;
    let other = session.clone();
    session.begin().align_str("center").text("Header\n");
    other.align_str("right").text("Body\n");
    session.raw(vec![0x1B_i64, 0x64, 0x02]).cut_paper(false);
    session.write().await?;

    for payload in provider.writes(&printer.address) {
        println!("{}", String::from_utf8_lossy(&payload));
        println!("{}", hex::encode(&payload));
    }

    manager.disconnect(Some(&printer.connection_id)).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    Ok(())
}
