//! In-process transport
//!
//! Records everything written to each link and lets the caller decide when
//! connects are confirmed, when devices vanish and which devices are nearby.
//! Used for tests and dry runs without a printer.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use thermalink_types::BluetoothDevice;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::{PrinterLink, TransportEvent, TransportProvider, error::*};

/// In-memory transport provider
///
/// By default connects are confirmed immediately and disconnects are
/// reported back as `Disconnected` events.
#[derive(Clone)]
pub struct MemoryProvider {
    inner: Arc<ProviderInner>,
}

struct ProviderInner {
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
    links: Mutex<Vec<Arc<MemoryLink>>>,
    names: Mutex<HashMap<String, String>>,
    nearby: Mutex<HashSet<String>>,
    refused: Mutex<HashSet<String>>,
    auto_confirm: AtomicBool,
    report_disconnects: AtomicBool,
    scans: AtomicUsize,
    scanning: AtomicBool,
}

impl MemoryProvider {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(ProviderInner {
                events_tx,
                events_rx: Mutex::new(Some(events_rx)),
                links: Mutex::new(Vec::new()),
                names: Mutex::new(HashMap::new()),
                nearby: Mutex::new(HashSet::new()),
                refused: Mutex::new(HashSet::new()),
                auto_confirm: AtomicBool::new(true),
                report_disconnects: AtomicBool::new(true),
                scans: AtomicUsize::new(0),
                scanning: AtomicBool::new(false),
            }),
        }
    }

    /// Leave connects pending until [`MemoryProvider::confirm`] is called
    pub fn with_manual_confirm(self) -> Self {
        self.inner.auto_confirm.store(false, Ordering::Release);
        self
    }

    /// Do not emit `Disconnected` when a link is asked to disconnect
    pub fn with_silent_disconnects(self) -> Self {
        self.inner.report_disconnects.store(false, Ordering::Release);
        self
    }

    /// Name reported when `address` connects
    pub fn set_name(&self, address: &str, name: &str) {
        self.inner
            .names
            .lock()
            .insert(address.to_string(), name.to_string());
    }

    /// Make connects to `address` fail
    pub fn refuse(&self, address: &str) {
        self.inner.refused.lock().insert(address.to_string());
    }

    pub fn set_nearby(&self, address: &str, nearby: bool) {
        let mut set = self.inner.nearby.lock();
        if nearby {
            set.insert(address.to_string());
        } else {
            set.remove(address);
        }
    }

    /// Latest link opened for `address`
    pub fn link(&self, address: &str) -> Option<Arc<MemoryLink>> {
        self.inner
            .links
            .lock()
            .iter()
            .rev()
            .find(|link| link.address == address)
            .cloned()
    }

    /// Number of links ever opened for `address`
    pub fn link_count(&self, address: &str) -> usize {
        self.inner
            .links
            .lock()
            .iter()
            .filter(|link| link.address == address)
            .count()
    }

    /// Payloads written to the latest link for `address`
    pub fn writes(&self, address: &str) -> Vec<Bytes> {
        self.link(address)
            .map(|link| link.writes())
            .unwrap_or_default()
    }

    /// Confirm the pending connect of the latest link for `address`
    pub fn confirm(&self, address: &str) {
        if let Some(link) = self.link(address) {
            link.open.store(true, Ordering::Release);
            self.emit(TransportEvent::Connected {
                address: address.to_string(),
                name: self.name_of(address),
            });
        }
    }

    /// Simulate the device going away
    pub fn drop_connection(&self, address: &str) {
        if let Some(link) = self.link(address) {
            link.open.store(false, Ordering::Release);
        }
        self.emit(TransportEvent::Disconnected {
            address: address.to_string(),
        });
    }

    /// Simulate a session that died without the transport noticing
    ///
    /// The link keeps reporting open until something is written to it.
    pub fn kill_silently(&self, address: &str) {
        if let Some(link) = self.link(address) {
            link.alive.store(false, Ordering::Release);
        }
    }

    /// Report discovered devices and mark them nearby
    pub fn discover(&self, devices: Vec<BluetoothDevice>) {
        {
            let mut nearby = self.inner.nearby.lock();
            for device in &devices {
                nearby.insert(device.address.clone());
            }
        }
        self.emit(TransportEvent::Discovered(devices));
    }

    /// Inject an arbitrary event
    pub fn emit(&self, event: TransportEvent) {
        trace!("Memory transport event: {:?}", event);
        let _ = self.inner.events_tx.send(event);
    }

    /// Number of scans started
    pub fn scan_count(&self) -> usize {
        self.inner.scans.load(Ordering::Acquire)
    }

    pub fn is_scanning(&self) -> bool {
        self.inner.scanning.load(Ordering::Acquire)
    }

    fn name_of(&self, address: &str) -> Option<String> {
        self.inner.names.lock().get(address).cloned()
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransportProvider for MemoryProvider {
    fn open(&self, address: &str) -> Result<Arc<dyn PrinterLink>> {
        if address.is_empty() {
            return Err(Error::InvalidAddress("empty address".into()));
        }

        let link = Arc::new(MemoryLink {
            address: address.to_string(),
            provider: self.clone(),
            open: AtomicBool::new(false),
            alive: AtomicBool::new(true),
            writes: Mutex::new(Vec::new()),
            connects: AtomicUsize::new(0),
        });
        self.inner.links.lock().push(link.clone());

        Ok(link)
    }

    async fn start_scan(&self, duration: Duration, clear: bool) -> Result<()> {
        debug!(?duration, clear, "Memory transport scan started");
        if clear {
            self.inner.nearby.lock().clear();
        }
        self.inner.scans.fetch_add(1, Ordering::AcqRel);
        self.inner.scanning.store(true, Ordering::Release);
        Ok(())
    }

    async fn stop_scan(&self) -> Result<()> {
        self.inner.scanning.store(false, Ordering::Release);
        Ok(())
    }

    fn is_nearby(&self, address: &str) -> bool {
        self.inner.nearby.lock().contains(address)
    }

    fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<TransportEvent>> {
        self.inner.events_rx.lock().take().ok_or(Error::AlreadySubscribed)
    }
}

/// In-memory link
pub struct MemoryLink {
    address: String,
    provider: MemoryProvider,
    open: AtomicBool,
    alive: AtomicBool,
    writes: Mutex<Vec<Bytes>>,
    connects: AtomicUsize,
}

impl MemoryLink {
    /// Non-empty payloads written so far
    pub fn writes(&self) -> Vec<Bytes> {
        self.writes.lock().clone()
    }

    /// Number of connect calls
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::Acquire)
    }
}

#[async_trait]
impl PrinterLink for MemoryLink {
    fn address(&self) -> &str {
        &self.address
    }

    async fn connect(&self) -> Result<()> {
        self.connects.fetch_add(1, Ordering::AcqRel);

        if self.provider.inner.refused.lock().contains(&self.address) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("{} refused the connection", self.address),
            )));
        }

        if self.provider.inner.auto_confirm.load(Ordering::Acquire) {
            self.open.store(true, Ordering::Release);
            self.provider.emit(TransportEvent::Connected {
                address: self.address.clone(),
                name: self.provider.name_of(&self.address),
            });
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.open.store(false, Ordering::Release);
        if self.provider.inner.report_disconnects.load(Ordering::Acquire) {
            self.provider.emit(TransportEvent::Disconnected {
                address: self.address.clone(),
            });
        }
        Ok(())
    }

    async fn close(&self) {
        self.open.store(false, Ordering::Release);
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    async fn write(&self, data: &[u8]) -> Result<()> {
        if !self.is_open() {
            return Err(Error::NotConnected);
        }

        if !self.alive.load(Ordering::Acquire) {
            self.open.store(false, Ordering::Release);
            return Err(Error::ConnectionClosed);
        }

        if !data.is_empty() {
            self.writes.lock().push(Bytes::copy_from_slice(data));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_auto_confirm() {
        let provider = MemoryProvider::new();
        provider.set_name("AA:BB", "MTP-II");
        let mut events = provider.subscribe().unwrap();

        let link = provider.open("AA:BB").unwrap();
        link.connect().await.unwrap();

        assert!(link.is_open());
        assert_eq!(
            events.recv().await.unwrap(),
            TransportEvent::Connected {
                address: "AA:BB".into(),
                name: Some("MTP-II".into()),
            }
        );
    }

    #[tokio::test]
    async fn test_manual_confirm() {
        let provider = MemoryProvider::new().with_manual_confirm();
        let link = provider.open("AA:BB").unwrap();
        link.connect().await.unwrap();
        assert!(!link.is_open());

        provider.confirm("AA:BB");
        assert!(link.is_open());
    }

    #[tokio::test]
    async fn test_refused_connect() {
        let provider = MemoryProvider::new();
        provider.refuse("AA:BB");

        let link = provider.open("AA:BB").unwrap();
        assert!(link.connect().await.is_err());
        assert!(!link.is_open());
        assert_eq!(provider.link("AA:BB").unwrap().connect_count(), 1);
    }

    #[tokio::test]
    async fn test_writes_recorded() {
        let provider = MemoryProvider::new();
        let link = provider.open("AA:BB").unwrap();

        assert!(matches!(link.write(b"x").await, Err(Error::NotConnected)));

        link.connect().await.unwrap();
        link.write(&[]).await.unwrap();
        link.write(b"abc").await.unwrap();

        assert_eq!(provider.writes("AA:BB"), vec![Bytes::from_static(b"abc")]);
    }

    #[tokio::test]
    async fn test_silent_death_detected_by_write() {
        let provider = MemoryProvider::new();
        let link = provider.open("AA:BB").unwrap();
        link.connect().await.unwrap();

        provider.kill_silently("AA:BB");
        assert!(link.is_open());

        assert!(link.write(&[]).await.is_err());
        assert!(!link.is_open());
    }

    #[tokio::test]
    async fn test_discover_marks_nearby() {
        let provider = MemoryProvider::new();
        provider
            .start_scan(Duration::from_secs(30), true)
            .await
            .unwrap();
        provider.discover(vec![BluetoothDevice::new(None, "AA:BB")]);

        assert!(provider.is_nearby("AA:BB"));
        assert!(provider.is_scanning());
        assert_eq!(provider.scan_count(), 1);
    }
}
