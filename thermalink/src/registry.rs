//! Connection registry
//!
//! Owns every connection context, pending or active. Three indexes are kept
//! consistent here: contexts by id, active contexts by address and pending
//! contexts by address. An address is never pending and active at once.

use std::collections::HashMap;
use std::sync::Arc;

use thermalink_core::{CommandBuffer, ConnectionState, FormattingState};
use thermalink_transport::PrinterLink;
use thermalink_types::{ConnectionId, PrinterConnection, TextEncoding};
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::error::{Error, Result};

/// Caller waiting for a connect attempt to resolve
pub(crate) type PendingCall = oneshot::Sender<Option<PrinterConnection>>;

/// Everything one printer connection owns
pub(crate) struct ConnectionContext {
    pub id: ConnectionId,
    pub address: String,
    pub name: Option<String>,
    pub link: Arc<dyn PrinterLink>,
    pub state: ConnectionState,
    pub formatting: FormattingState,
    pub buffer: CommandBuffer,
    pub encoding: TextEncoding,
    timer: Option<AbortHandle>,
}

impl ConnectionContext {
    pub fn new(id: ConnectionId, address: impl Into<String>, link: Arc<dyn PrinterLink>) -> Self {
        Self {
            id,
            address: address.into(),
            name: None,
            link,
            state: ConnectionState::Pending,
            formatting: FormattingState::new(),
            buffer: CommandBuffer::new(),
            encoding: TextEncoding::default(),
            timer: None,
        }
    }

    /// Public view handed to callers and observers
    pub fn view(&self) -> PrinterConnection {
        PrinterConnection {
            connection_id: self.id.clone(),
            address: self.address.clone(),
            name: self.name.clone(),
        }
    }

    /// Arm a timer, aborting the previous one
    fn set_timer(&mut self, timer: AbortHandle) {
        if let Some(previous) = self.timer.replace(timer) {
            previous.abort();
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

#[derive(Default)]
pub(crate) struct Registry {
    contexts: HashMap<ConnectionId, ConnectionContext>,
    active: HashMap<String, ConnectionId>,
    pending: HashMap<String, ConnectionId>,
    calls: HashMap<ConnectionId, PendingCall>,
    default_target: Option<ConnectionId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending context and the caller awaiting it
    pub fn insert_pending(&mut self, context: ConnectionContext, call: PendingCall) {
        debug_assert!(!self.active.contains_key(&context.address));

        let id = context.id.clone();
        self.pending.insert(context.address.clone(), id.clone());
        self.calls.insert(id.clone(), call);
        self.contexts.insert(id, context);
    }

    pub fn pending_id(&self, address: &str) -> Option<&ConnectionId> {
        self.pending.get(address)
    }

    pub fn active_id(&self, address: &str) -> Option<&ConnectionId> {
        self.active.get(address)
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.contexts.contains_key(id)
    }

    pub fn is_pending(&self, id: &ConnectionId) -> bool {
        self.contexts
            .get(id)
            .is_some_and(|context| context.state.is_pending())
    }

    pub fn get(&self, id: &ConnectionId) -> Option<&ConnectionContext> {
        self.contexts.get(id)
    }

    /// Active context with this id
    pub fn active(&self, id: &ConnectionId) -> Option<&ConnectionContext> {
        self.contexts
            .get(id)
            .filter(|context| context.state.is_active())
    }

    pub fn active_mut(&mut self, id: &ConnectionId) -> Option<&mut ConnectionContext> {
        self.contexts
            .get_mut(id)
            .filter(|context| context.state.is_active())
    }

    /// Active context for this address
    pub fn active_by_address(&self, address: &str) -> Option<&ConnectionContext> {
        self.active.get(address).and_then(|id| self.contexts.get(id))
    }

    /// All active contexts
    pub fn active_contexts(&self) -> impl Iterator<Item = &ConnectionContext> {
        self.active.values().filter_map(|id| self.contexts.get(id))
    }

    /// Every registered id, pending ones included
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.contexts.keys().cloned().collect()
    }

    /// Promote a context to active and set its name
    ///
    /// Returns the public view plus the caller waiting on the connect, if
    /// that caller has not been resolved yet. The pending timer is cancelled.
    pub fn promote(
        &mut self,
        id: &ConnectionId,
        name: Option<String>,
    ) -> Result<(PrinterConnection, Option<PendingCall>)> {
        let context = self
            .contexts
            .get_mut(id)
            .ok_or_else(|| Error::UnknownConnection(Some(id.clone())))?;

        context.state.promote()?;
        context.cancel_timer();
        if name.is_some() {
            context.name = name;
        }

        let view = context.view();
        if self.pending.get(&view.address) == Some(id) {
            self.pending.remove(&view.address);
        }
        self.active.insert(view.address.clone(), id.clone());

        if self.default_target.is_none() {
            self.default_target = Some(id.clone());
        }

        Ok((view, self.calls.remove(id)))
    }

    /// Remove a context from every index
    ///
    /// Cancels its timer and resolves its waiting caller with `None`.
    pub fn remove(&mut self, id: &ConnectionId) -> Option<ConnectionContext> {
        let mut context = self.contexts.remove(id)?;

        if self.pending.get(&context.address) == Some(id) {
            self.pending.remove(&context.address);
        }
        if self.active.get(&context.address) == Some(id) {
            self.active.remove(&context.address);
        }
        if let Some(call) = self.calls.remove(id) {
            let _ = call.send(None);
        }
        context.cancel_timer();
        context.state.close();

        if self.default_target.as_ref() == Some(id) {
            self.default_target = self.active.values().next().cloned();
            debug!("Default connection is now {:?}", self.default_target);
        }

        Some(context)
    }

    /// Attach a timer to a context; returns false if the context is gone
    pub fn set_timer(&mut self, id: &ConnectionId, timer: AbortHandle) -> bool {
        match self.contexts.get_mut(id) {
            Some(context) => {
                context.set_timer(timer);
                true
            }
            None => false,
        }
    }

    /// Detach the timer of a context without aborting it
    ///
    /// Called by the timer task itself once it fires.
    pub fn take_timer(&mut self, id: &ConnectionId) {
        if let Some(context) = self.contexts.get_mut(id) {
            context.timer = None;
        }
    }

    pub fn default_target(&self) -> Option<&ConnectionId> {
        self.default_target.as_ref()
    }

    /// Set the preferred target for calls without an explicit id
    pub fn set_default_target(&mut self, id: Option<ConnectionId>) -> Result<()> {
        if let Some(id) = &id {
            if self.active(id).is_none() {
                return Err(Error::UnknownConnection(Some(id.clone())));
            }
        }
        self.default_target = id;
        Ok(())
    }

    /// Pick the connection a call targets
    ///
    /// Order: the explicit id, the default target, the only active
    /// connection. Fails when none of them applies.
    pub fn resolve(&self, explicit: Option<&ConnectionId>) -> Result<ConnectionId> {
        if let Some(id) = explicit {
            return match self.active(id) {
                Some(_) => Ok(id.clone()),
                None => Err(Error::UnknownConnection(Some(id.clone()))),
            };
        }

        if let Some(id) = &self.default_target {
            if self.active(id).is_some() {
                return Ok(id.clone());
            }
        }

        let mut active = self.active.values();
        match (active.next(), self.active.len()) {
            (Some(id), 1) => Ok(id.clone()),
            (None, _) => Err(Error::UnknownConnection(None)),
            (_, count) => Err(Error::AmbiguousConnection(count)),
        }
    }
}
