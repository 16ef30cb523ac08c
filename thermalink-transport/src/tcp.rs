//! TCP transport for network printers
//!
//! Wi-Fi and LAN receipt printers accept raw print data on TCP port 9100.
//! Addresses are `host` or `host:port`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use thermalink_core::constants::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_TCP_PORT};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::{PrinterLink, TransportEvent, TransportProvider, error::*};

/// Provider of TCP links
///
/// Discovery is not available over plain TCP, so scanning fails with
/// [`Error::ScanUnsupported`] and no device is ever reported nearby.
pub struct TcpProvider {
    connect_timeout: Duration,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
}

impl TcpProvider {
    /// Create new TCP provider
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for TcpProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransportProvider for TcpProvider {
    fn open(&self, address: &str) -> Result<Arc<dyn PrinterLink>> {
        if address.trim().is_empty() {
            return Err(Error::InvalidAddress("empty address".into()));
        }

        Ok(Arc::new(TcpLink::new(
            address,
            self.connect_timeout,
            self.events_tx.clone(),
        )))
    }

    async fn start_scan(&self, _duration: Duration, _clear: bool) -> Result<()> {
        Err(Error::ScanUnsupported)
    }

    async fn stop_scan(&self) -> Result<()> {
        Ok(())
    }

    fn is_nearby(&self, _address: &str) -> bool {
        false
    }

    fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<TransportEvent>> {
        self.events_rx.lock().take().ok_or(Error::AlreadySubscribed)
    }
}

/// TCP link to one network printer
pub struct TcpLink {
    addr: String,
    stream: AsyncMutex<Option<TcpStream>>,
    open: AtomicBool,
    connect_timeout: Duration,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl TcpLink {
    fn new(
        addr: impl Into<String>,
        connect_timeout: Duration,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        Self {
            addr: addr.into(),
            stream: AsyncMutex::new(None),
            open: AtomicBool::new(false),
            connect_timeout,
            events,
        }
    }

    /// Resolve address to SocketAddr, defaulting the port to 9100
    async fn resolve_addr(&self) -> Result<SocketAddr> {
        let addr_str = if self.addr.contains(':') {
            self.addr.clone()
        } else {
            format!("{}:{}", self.addr, DEFAULT_TCP_PORT)
        };

        let addrs: Vec<SocketAddr> = tokio::net::lookup_host(&addr_str)
            .await
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", addr_str, e)))?
            .collect();

        addrs
            .first()
            .copied()
            .ok_or_else(|| Error::InvalidAddress(format!("No addresses found for {}", addr_str)))
    }

    fn notify(&self, event: TransportEvent) {
        if self.events.send(event).is_err() {
            trace!("No transport event subscriber for {}", self.addr);
        }
    }

    async fn drop_stream(&self) -> bool {
        let stream = self.stream.lock().await.take();
        self.open.store(false, Ordering::Release);

        match stream {
            Some(mut stream) => {
                let _ = stream.shutdown().await;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl PrinterLink for TcpLink {
    fn address(&self) -> &str {
        &self.addr
    }

    async fn connect(&self) -> Result<()> {
        if self.is_open() {
            return Err(Error::AlreadyConnected);
        }

        let addr = self.resolve_addr().await?;

        debug!("Connecting to {}...", addr);

        let stream = timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::ConnectionTimeout)?
            .map_err(Error::Io)?;

        // Print data is small and latency-bound
        stream.set_nodelay(true)?;

        debug!("Connected to {}", addr);

        *self.stream.lock().await = Some(stream);
        self.open.store(true, Ordering::Release);

        self.notify(TransportEvent::Connected {
            address: self.addr.clone(),
            name: None,
        });
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        debug!("Disconnecting from {}...", self.addr);

        if self.drop_stream().await {
            self.notify(TransportEvent::Disconnected {
                address: self.addr.clone(),
            });
        }
        Ok(())
    }

    async fn close(&self) {
        self.drop_stream().await;
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    async fn write(&self, data: &[u8]) -> Result<()> {
        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or(Error::NotConnected)?;

        trace!("Sending {} bytes: {:02X?}", data.len(), &data[..data.len().min(16)]);

        let result = async {
            stream.write_all(data).await?;
            stream.flush().await
        }
        .await;

        if let Err(e) = result {
            warn!("Write to {} failed: {}", self.addr, e);
            guard.take();
            self.open.store(false, Ordering::Release);
            self.notify(TransportEvent::Disconnected {
                address: self.addr.clone(),
            });
            return Err(Error::Io(e));
        }

        Ok(())
    }
}

impl Drop for TcpLink {
    fn drop(&mut self) {
        if self.is_open() {
            warn!("TCP link to {} dropped while still connected", self.addr);
        }
    }
}
