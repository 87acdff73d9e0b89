//! Scripted wallet backends and selectors for exercising the session manager
//! without a browser.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use async_trait::async_trait;
use chainsession_shared::{
    Address, BackendDescriptor, ChainId, ProviderEvent, ProviderEventKind, SessionError,
};
use futures_channel::oneshot;

use crate::provider::{
    BackendInfo, BackendSelector, ConnectionHandle, EventListener, ListenerId, WalletBackend,
};

/// `0xabc0…00nn`, a recognizable non-zero test address.
pub fn address(n: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[0] = 0xab;
    bytes[1] = 0xc0;
    bytes[19] = n;
    Address::from_bytes(bytes)
}

/// Counts handles that are open and not yet closed or dropped.
#[derive(Debug, Default)]
pub struct LiveTracker {
    live: Cell<usize>,
    peak: Cell<usize>,
}

impl LiveTracker {
    fn opened(&self) {
        let live = self.live.get() + 1;
        self.live.set(live);
        self.peak.set(self.peak.get().max(live));
    }

    fn released(&self) {
        self.live.set(self.live.get().saturating_sub(1));
    }

    pub fn live(&self) -> usize {
        self.live.get()
    }

    pub fn peak(&self) -> usize {
        self.peak.get()
    }
}

struct HandleState {
    descriptor: BackendDescriptor,
    address: Result<Address, SessionError>,
    chain_id: Cell<ChainId>,
    listeners: RefCell<Vec<(ProviderEventKind, ListenerId, EventListener)>>,
    next_listener: Cell<u64>,
    closed: Cell<bool>,
    tracker: Rc<LiveTracker>,
}

impl HandleState {
    fn release(&self) {
        if !self.closed.replace(true) {
            self.tracker.released();
        }
    }
}

pub struct ScriptedHandle {
    state: Rc<HandleState>,
}

impl Drop for ScriptedHandle {
    fn drop(&mut self) {
        self.state.release();
    }
}

#[async_trait(?Send)]
impl ConnectionHandle for ScriptedHandle {
    fn descriptor(&self) -> BackendDescriptor {
        self.state.descriptor.clone()
    }

    async fn get_address(&self) -> Result<Address, SessionError> {
        self.state.address.clone()
    }

    async fn get_chain_id(&self) -> Result<ChainId, SessionError> {
        Ok(self.state.chain_id.get())
    }

    fn on(&self, kind: ProviderEventKind, listener: EventListener) -> ListenerId {
        let id = ListenerId(self.state.next_listener.get());
        self.state.next_listener.set(id.0 + 1);
        self.state.listeners.borrow_mut().push((kind, id, listener));
        id
    }

    fn off(&self, kind: ProviderEventKind, id: ListenerId) {
        self.state
            .listeners
            .borrow_mut()
            .retain(|(k, i, _)| !(*k == kind && *i == id));
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.state.release();
        Ok(())
    }
}

/// Test-side view of a handle that the manager owns.
#[derive(Clone)]
pub struct HandleProbe {
    state: Rc<HandleState>,
}

impl HandleProbe {
    /// Fire `event` at every listener registered for its kind.
    pub fn emit(&self, event: ProviderEvent) {
        if let ProviderEvent::ChainChanged { new, .. } = &event {
            self.state.chain_id.set(*new);
        }
        let listeners: Vec<EventListener> = self
            .state
            .listeners
            .borrow()
            .iter()
            .filter(|(kind, _, _)| *kind == event.kind())
            .map(|(_, _, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(event.clone());
        }
    }

    pub fn listener_count(&self) -> usize {
        self.state.listeners.borrow().len()
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.get()
    }
}

struct BackendState {
    id: String,
    address: Address,
    chain_id: ChainId,
    available: Cell<bool>,
    fail_next: RefCell<Option<SessionError>>,
    fail_next_address: RefCell<Option<SessionError>>,
    connects: Cell<usize>,
    reconnects: Cell<usize>,
    handles: RefCell<Vec<HandleProbe>>,
    tracker: Rc<LiveTracker>,
}

/// A backend whose handles report a fixed account and chain.
#[derive(Clone)]
pub struct ScriptedBackend {
    state: Rc<BackendState>,
}

impl ScriptedBackend {
    pub fn new(id: &str, address: Address, chain_id: ChainId) -> Self {
        Self::tracked(id, address, chain_id, Rc::new(LiveTracker::default()))
    }

    pub fn tracked(id: &str, address: Address, chain_id: ChainId, tracker: Rc<LiveTracker>) -> Self {
        Self {
            state: Rc::new(BackendState {
                id: id.to_string(),
                address,
                chain_id,
                available: Cell::new(true),
                fail_next: RefCell::new(None),
                fail_next_address: RefCell::new(None),
                connects: Cell::new(0),
                reconnects: Cell::new(0),
                handles: RefCell::new(Vec::new()),
                tracker,
            }),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.state.available.set(available);
    }

    /// Make the next connect or reconnect fail with `err`.
    pub fn fail_next_connect(&self, err: SessionError) {
        *self.state.fail_next.borrow_mut() = Some(err);
    }

    /// Make the next handle's address query fail with `err`.
    pub fn fail_next_address(&self, err: SessionError) {
        *self.state.fail_next_address.borrow_mut() = Some(err);
    }

    pub fn connects(&self) -> usize {
        self.state.connects.get()
    }

    pub fn reconnects(&self) -> usize {
        self.state.reconnects.get()
    }

    pub fn last_handle(&self) -> Option<HandleProbe> {
        self.state.handles.borrow().last().cloned()
    }

    fn open(&self) -> Result<Box<dyn ConnectionHandle>, SessionError> {
        if let Some(err) = self.state.fail_next.borrow_mut().take() {
            return Err(err);
        }

        let address = match self.state.fail_next_address.borrow_mut().take() {
            Some(err) => Err(err),
            None => Ok(self.state.address),
        };
        let handle_state = Rc::new(HandleState {
            descriptor: BackendDescriptor::new(self.state.id.clone()),
            address,
            chain_id: Cell::new(self.state.chain_id),
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(0),
            closed: Cell::new(false),
            tracker: self.state.tracker.clone(),
        });
        self.state.tracker.opened();
        self.state.handles.borrow_mut().push(HandleProbe {
            state: handle_state.clone(),
        });
        Ok(Box::new(ScriptedHandle {
            state: handle_state,
        }))
    }
}

#[async_trait(?Send)]
impl WalletBackend for ScriptedBackend {
    fn info(&self) -> BackendInfo {
        BackendInfo {
            id: self.state.id.clone(),
            name: format!("Scripted {}", self.state.id),
        }
    }

    fn is_available(&self) -> bool {
        self.state.available.get()
    }

    async fn connect(&self) -> Result<Box<dyn ConnectionHandle>, SessionError> {
        self.state.connects.set(self.state.connects.get() + 1);
        self.open()
    }

    async fn reconnect(&self) -> Result<Box<dyn ConnectionHandle>, SessionError> {
        self.state.reconnects.set(self.state.reconnects.get() + 1);
        self.open()
    }
}

#[derive(Debug, Clone)]
enum Pick {
    First,
    Id(String),
    Cancel,
}

/// Selector that answers from a script instead of a user.
#[derive(Clone)]
pub struct ScriptedSelector {
    script: Rc<RefCell<VecDeque<Pick>>>,
    fallback: Pick,
    gate: Rc<RefCell<Option<oneshot::Receiver<()>>>>,
    calls: Rc<Cell<usize>>,
}

impl ScriptedSelector {
    fn with_fallback(fallback: Pick) -> Self {
        Self {
            script: Rc::new(RefCell::new(VecDeque::new())),
            fallback,
            gate: Rc::new(RefCell::new(None)),
            calls: Rc::new(Cell::new(0)),
        }
    }

    /// Always picks the first offered backend.
    pub fn first() -> Self {
        Self::with_fallback(Pick::First)
    }

    pub fn choosing(id: &str) -> Self {
        Self::with_fallback(Pick::Id(id.to_string()))
    }

    /// Always dismisses the selection.
    pub fn cancelling() -> Self {
        Self::with_fallback(Pick::Cancel)
    }

    /// Dismisses the next selection, then picks the first backend.
    pub fn cancelling_once() -> Self {
        let selector = Self::first();
        selector.script.borrow_mut().push_back(Pick::Cancel);
        selector
    }

    /// Hold the next selection open until `gate` fires.
    pub fn gated(self, gate: oneshot::Receiver<()>) -> Self {
        *self.gate.borrow_mut() = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

#[async_trait(?Send)]
impl BackendSelector for ScriptedSelector {
    async fn choose(&self, options: &[BackendInfo]) -> Result<String, SessionError> {
        self.calls.set(self.calls.get() + 1);

        let gate = self.gate.borrow_mut().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        let pick = self
            .script
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match pick {
            Pick::First => options
                .first()
                .map(|o| o.id.clone())
                .ok_or(SessionError::UserCancelled),
            Pick::Id(id) => Ok(id),
            Pick::Cancel => Err(SessionError::UserCancelled),
        }
    }
}
