//! Connection lifecycle
//!
//! [`PrinterManager`] drives connects and disconnects against the transport,
//! bounds pending connects with a timeout and reconciles transport events
//! with the registry. All registry changes happen under one short lock that
//! is never held across an `.await`.
//!
//! # Connection states
//!
//! ```text
//!   connect() ──▶ Pending ──confirmed──▶ Active ──disconnect/lost──▶ removed
//!                    │
//!                    └──timeout/lost──▶ removed (caller resolved with None)
//! ```

use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use thermalink_core::Encoder;
use thermalink_transport::{PrinterLink, TransportEvent, TransportProvider};
use thermalink_types::{ConnectionId, PrinterConnection, TextEncoding};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::PrinterEvent;
use crate::queue::CommandQueue;
use crate::registry::{ConnectionContext, Registry};
use crate::session::Session;

#[derive(Default)]
struct ScanState {
    running: bool,
    timer: Option<AbortHandle>,
}

/// State shared by the manager, its sessions, timers and the event listener
pub(crate) struct Shared {
    pub registry: Mutex<Registry>,
    pub queue: CommandQueue,
    pub encoder: Arc<dyn Encoder>,
    provider: Arc<dyn TransportProvider>,
    events: broadcast::Sender<PrinterEvent>,
    scan: Mutex<ScanState>,
    config: Config,
}

/// Thermal printer connection manager
///
/// Owns every printer connection and hands out [`Session`]s for building
/// and sending print jobs.
///
/// # Examples
///
/// ```no_run
/// # use thermalink::{Encoder, PrinterManager};
/// # use thermalink_transport::TcpProvider;
/// # async fn run(encoder: impl Encoder + 'static) -> thermalink::Result<()> {
/// let manager = PrinterManager::new(TcpProvider::new(), encoder)?;
///
/// if let Some(printer) = manager.connect("192.168.1.87").await? {
///     println!("Connected: {}", printer);
///
///     manager
///         .session()
///         .begin()
///         .text("Hello\n")
///         .cut_paper(false)
///         .write()
///         .await?;
///
///     manager.disconnect(None).await?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct PrinterManager {
    shared: Arc<Shared>,
    listener: CancellationToken,
}

impl PrinterManager {
    /// Create a manager with default timings
    ///
    /// Must be called inside a Tokio runtime: the transport event listener is
    /// spawned here.
    ///
    /// # Errors
    ///
    /// Fails if the transport's event stream was already taken.
    pub fn new(
        provider: impl TransportProvider + 'static,
        encoder: impl Encoder + 'static,
    ) -> Result<Self> {
        Self::with_config(provider, encoder, Config::default())
    }

    /// Create a manager with custom timings
    pub fn with_config(
        provider: impl TransportProvider + 'static,
        encoder: impl Encoder + 'static,
        config: Config,
    ) -> Result<Self> {
        let transport_events = provider.subscribe()?;
        let (events, _) = broadcast::channel(config.event_capacity);

        let shared = Arc::new(Shared {
            registry: Mutex::new(Registry::new()),
            queue: CommandQueue::new(),
            encoder: Arc::new(encoder),
            provider: Arc::new(provider),
            events,
            scan: Mutex::new(ScanState::default()),
            config,
        });

        let listener = CancellationToken::new();
        tokio::spawn(listen(
            Arc::downgrade(&shared),
            transport_events,
            listener.clone(),
        ));

        Ok(Self { shared, listener })
    }

    /// Timing policy in use
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Subscribe to connectivity events
    pub fn subscribe(&self) -> broadcast::Receiver<PrinterEvent> {
        self.shared.events.subscribe()
    }

    /// Connect to a printer
    ///
    /// Resolves with the connection once the transport confirms it, or with
    /// `None` if the attempt timed out or the device dropped before
    /// confirming. An already active connection to `address` is returned
    /// as is.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyConnecting`] if an attempt for `address` is pending
    /// - [`Error::Transport`] if the transport refuses to start connecting
    pub async fn connect(&self, address: &str) -> Result<Option<PrinterConnection>> {
        self.shared.connect(address, TextEncoding::default()).await
    }

    /// Connect with a text encoding other than the default GBK
    ///
    /// The encoding applies to a new connection only; an already active
    /// connection keeps its own.
    pub async fn connect_with_encoding(
        &self,
        address: &str,
        encoding: TextEncoding,
    ) -> Result<Option<PrinterConnection>> {
        self.shared.connect(address, encoding).await
    }

    /// Disconnect a printer
    ///
    /// Without an id, the default connection is used. Returns once the
    /// disconnect has been issued; the connection is torn down immediately
    /// when the device is no longer nearby, otherwise after the grace window
    /// if the transport has closed by then.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownConnection`] / [`Error::AmbiguousConnection`] if no
    ///   single target can be picked
    /// - [`Error::NotConnected`] if the link was already closed; the
    ///   connection is removed anyway, without a `Disconnected` event
    pub async fn disconnect(&self, id: Option<&ConnectionId>) -> Result<()> {
        self.shared.disconnect(id).await
    }

    /// Check if a connection is alive
    ///
    /// A zero-length probe write detects sessions the transport has not yet
    /// reported as dropped. Without an id, checks whether any connection is
    /// alive.
    pub async fn is_connected(&self, id: Option<&ConnectionId>) -> bool {
        let links: Vec<Arc<dyn PrinterLink>> = {
            let registry = self.shared.registry.lock();
            match id {
                Some(id) => registry.active(id).map(|c| c.link.clone()).into_iter().collect(),
                None => registry.active_contexts().map(|c| c.link.clone()).collect(),
            }
        };

        for link in links {
            if probe(link.as_ref()).await {
                return true;
            }
        }
        false
    }

    /// Live connections
    ///
    /// Connections that fail the liveness probe are torn down and reported
    /// as disconnected.
    pub async fn list_connections(&self) -> Vec<PrinterConnection> {
        let candidates: Vec<(ConnectionId, Arc<dyn PrinterLink>)> = self
            .shared
            .registry
            .lock()
            .active_contexts()
            .map(|c| (c.id.clone(), c.link.clone()))
            .collect();

        let mut live = Vec::with_capacity(candidates.len());
        for (id, link) in candidates {
            if probe(link.as_ref()).await {
                let view = self.shared.registry.lock().active(&id).map(ConnectionContext::view);
                live.extend(view);
            } else {
                debug!(connection_id = %id, "Reaping dead connection");
                self.shared.teardown(&id, true).await;
            }
        }
        live
    }

    /// Session on the default connection
    ///
    /// The target is resolved when each operation is issued.
    pub fn session(&self) -> Session {
        Session::new(self.shared.clone(), None)
    }

    /// Session bound to one connection
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownConnection`] if `id` is not an active connection.
    pub fn use_connection(&self, id: &ConnectionId) -> Result<Session> {
        self.shared.registry.lock().resolve(Some(id))?;
        Ok(Session::new(self.shared.clone(), Some(id.clone())))
    }

    /// Set the default connection; `None` clears it
    pub fn set_active_connection(&self, id: Option<ConnectionId>) -> Result<()> {
        self.shared.registry.lock().set_default_target(id)
    }

    /// Default connection, if one is set
    pub fn active_connection(&self) -> Option<ConnectionId> {
        self.shared.registry.lock().default_target().cloned()
    }

    /// Start discovering devices
    ///
    /// Found devices are reported as [`PrinterEvent::DevicesDiscovered`]; the
    /// scan ends after the configured duration with a single
    /// [`PrinterEvent::DiscoveryFinished`].
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyScanning`] while a scan is running
    /// - [`Error::Transport`] if the transport cannot scan
    pub async fn start_scan(&self) -> Result<()> {
        self.shared.start_scan().await
    }

    /// Stop the running scan, if any
    pub async fn stop_scan(&self) {
        self.shared.finish_scan(true).await;
    }

    pub fn is_scanning(&self) -> bool {
        self.shared.scan.lock().running
    }

    /// Tear down every connection and stop processing transport events
    ///
    /// Pending connects resolve with `None` and queued operations with
    /// [`Error::NotConnected`].
    pub async fn shutdown(&self) {
        info!("Shutting down printer manager");

        self.listener.cancel();
        self.shared.finish_scan(true).await;

        let ids = self.shared.registry.lock().ids();
        for id in ids {
            let was_active = self.shared.registry.lock().active(&id).is_some();
            self.shared.teardown(&id, was_active).await;
        }
    }
}

impl Drop for PrinterManager {
    fn drop(&mut self) {
        self.listener.cancel();
    }
}

impl Shared {
    fn emit(&self, event: PrinterEvent) {
        trace!(event = event.name(), "Emitting event");
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    async fn connect(
        self: &Arc<Self>,
        address: &str,
        encoding: TextEncoding,
    ) -> Result<Option<PrinterConnection>> {
        let stale = {
            let registry = self.registry.lock();
            if let Some(context) = registry.active_by_address(address) {
                if context.link.is_open() {
                    debug!("Already connected to {}", address);
                    return Ok(Some(context.view()));
                }
                Some(context.id.clone())
            } else if registry.pending_id(address).is_some() {
                return Err(Error::AlreadyConnecting(address.to_string()));
            } else {
                None
            }
        };

        if let Some(id) = stale {
            debug!(connection_id = %id, "Reaping closed connection to {}", address);
            self.teardown(&id, true).await;
        }

        let id = ConnectionId::generate();
        let (call, resolved) = oneshot::channel();

        // Checked again under the lock that inserts, so racing attempts
        // never open a second link
        let link = {
            let mut registry = self.registry.lock();
            if registry.pending_id(address).is_some() {
                return Err(Error::AlreadyConnecting(address.to_string()));
            }
            if let Some(context) = registry.active_by_address(address) {
                return Ok(Some(context.view()));
            }

            let link = self.provider.open(address)?;
            let mut context = ConnectionContext::new(id.clone(), address, link.clone());
            context.encoding = encoding;
            registry.insert_pending(context, call);
            link
        };

        info!(connection_id = %id, "Connecting to {} ({})...", address, encoding.name());

        let weak = Arc::downgrade(self);
        let timeout_id = id.clone();
        self.arm_timer(&id, self.config.connect_timeout, async move {
            if let Some(shared) = weak.upgrade() {
                shared.on_connect_timeout(&timeout_id).await;
            }
        });

        if let Err(e) = link.connect().await {
            warn!(connection_id = %id, "Connect to {} failed: {}", address, e);
            self.teardown(&id, false).await;
            return Err(e.into());
        }

        // Attempt discarded while the transport was still connecting
        let discarded = !self.registry.lock().contains(&id);
        if discarded {
            link.close().await;
        }

        Ok(resolved.await.unwrap_or(None))
    }

    async fn on_connect_timeout(&self, id: &ConnectionId) {
        let expired = {
            let mut registry = self.registry.lock();
            registry.take_timer(id);
            registry.is_pending(id)
        };

        if expired {
            info!(connection_id = %id, "Connect timed out");
            self.teardown(id, false).await;
        }
    }

    async fn disconnect(self: &Arc<Self>, id: Option<&ConnectionId>) -> Result<()> {
        let (id, link, address) = {
            let registry = self.registry.lock();
            let id = registry.resolve(id)?;
            let context = registry
                .get(&id)
                .ok_or_else(|| Error::UnknownConnection(Some(id.clone())))?;
            (id, context.link.clone(), context.address.clone())
        };

        if !link.is_open() {
            self.teardown(&id, false).await;
            return Err(Error::NotConnected);
        }

        self.finish_scan(true).await;

        info!(connection_id = %id, "Disconnecting from {}...", address);
        if let Err(e) = link.disconnect().await {
            warn!(connection_id = %id, "Disconnect from {} failed: {}", address, e);
            self.teardown(&id, true).await;
            return Err(e.into());
        }

        if !self.provider.is_nearby(&address) {
            self.teardown(&id, true).await;
            return Ok(());
        }

        let weak = Arc::downgrade(self);
        let grace_id = id.clone();
        self.arm_timer(&id, self.config.disconnect_grace, async move {
            if let Some(shared) = weak.upgrade() {
                shared.on_disconnect_grace(&grace_id).await;
            }
        });
        Ok(())
    }

    async fn on_disconnect_grace(&self, id: &ConnectionId) {
        let closed = {
            let mut registry = self.registry.lock();
            registry.take_timer(id);
            registry.get(id).map(|context| !context.link.is_open())
        };

        match closed {
            Some(true) => {
                self.teardown(id, true).await;
            }
            Some(false) => debug!(connection_id = %id, "Link still open after grace window"),
            None => {}
        }
    }

    /// Remove a context and release everything it holds
    ///
    /// Resolves a waiting connect with `None`, releases queued operations and
    /// closes the link. Emits `Disconnected` when `notify` is set.
    async fn teardown(&self, id: &ConnectionId, notify: bool) -> Option<PrinterConnection> {
        let context = self.registry.lock().remove(id)?;

        self.queue.release(id);
        context.link.close().await;

        let view = context.view();
        if notify {
            info!(connection_id = %id, "Disconnected from {}", view.address);
            self.emit(PrinterEvent::Disconnected(view.clone()));
        } else {
            debug!(connection_id = %id, "Discarded connection to {}", view.address);
        }
        Some(view)
    }

    /// Spawn a timer owned by the context `id`
    fn arm_timer<F>(&self, id: &ConnectionId, delay: Duration, on_fire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire.await;
        });

        if !self.registry.lock().set_timer(id, task.abort_handle()) {
            task.abort();
        }
    }

    async fn handle_event(&self, event: TransportEvent) {
        trace!("Transport event: {:?}", event);

        match event {
            TransportEvent::Discovered(devices) => {
                self.emit(PrinterEvent::DevicesDiscovered(devices));
            }
            TransportEvent::Connected { address, name } => {
                self.on_connected(&address, name);
            }
            TransportEvent::Disconnected { address } => {
                self.on_disconnected(&address).await;
            }
            TransportEvent::ScanFinished => {
                self.finish_scan(false).await;
            }
        }
    }

    fn on_connected(&self, address: &str, name: Option<String>) {
        let promoted = {
            let mut registry = self.registry.lock();
            let Some(id) = registry
                .pending_id(address)
                .or_else(|| registry.active_id(address))
                .cloned()
            else {
                debug!("Ignoring connect of unknown device {}", address);
                return;
            };
            registry.promote(&id, name)
        };

        match promoted {
            Ok((view, call)) => {
                info!(connection_id = %view.connection_id, "Connected to {}", view);
                if let Some(call) = call {
                    let _ = call.send(Some(view.clone()));
                }
                self.emit(PrinterEvent::Connected(view));
            }
            Err(e) => warn!("Cannot confirm connection to {}: {}", address, e),
        }
    }

    async fn on_disconnected(&self, address: &str) {
        let target = {
            let registry = self.registry.lock();
            if let Some(id) = registry.pending_id(address) {
                Some((id.clone(), false))
            } else {
                registry.active_id(address).map(|id| (id.clone(), true))
            }
        };

        match target {
            Some((id, was_active)) => {
                self.teardown(&id, was_active).await;
            }
            None => debug!("Ignoring disconnect of unknown device {}", address),
        }
    }

    async fn start_scan(self: &Arc<Self>) -> Result<()> {
        {
            let mut scan = self.scan.lock();
            if scan.running {
                return Err(Error::AlreadyScanning);
            }
            scan.running = true;
        }

        let duration = self.config.scan_duration;
        if let Err(e) = self.provider.start_scan(duration, true).await {
            self.scan.lock().running = false;
            return Err(e.into());
        }

        info!(?duration, "Scanning for printers");

        let weak = Arc::downgrade(self);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if let Some(shared) = weak.upgrade() {
                shared.scan.lock().timer = None;
                shared.finish_scan(true).await;
            }
        });

        let mut scan = self.scan.lock();
        if scan.running {
            scan.timer = Some(timer.abort_handle());
        } else {
            timer.abort();
        }
        Ok(())
    }

    /// End the running scan and emit `DiscoveryFinished` once
    async fn finish_scan(&self, stop_transport: bool) {
        let timer = {
            let mut scan = self.scan.lock();
            if !scan.running {
                return;
            }
            scan.running = false;
            scan.timer.take()
        };

        if let Some(timer) = timer {
            timer.abort();
        }

        if stop_transport {
            if let Err(e) = self.provider.stop_scan().await {
                warn!("Failed to stop scan: {}", e);
            }
        }

        debug!("Scan finished");
        self.emit(PrinterEvent::DiscoveryFinished);
    }
}

/// Zero-length write on an open link
async fn probe(link: &dyn PrinterLink) -> bool {
    link.is_open() && link.write(&[]).await.is_ok() && link.is_open()
}

/// Consume transport events in delivery order
async fn listen(
    shared: Weak<Shared>,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    stop: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = stop.cancelled() => break,
            event = events.recv() => event,
        };

        let Some(event) = event else {
            debug!("Transport event stream closed");
            break;
        };

        let Some(shared) = shared.upgrade() else {
            break;
        };
        shared.handle_event(event).await;
    }
}
