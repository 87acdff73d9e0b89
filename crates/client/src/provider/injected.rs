//! Browser-injected wallet (`window.ethereum`, EIP-1193).

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use async_trait::async_trait;
use chainsession_shared::{
    Address, BackendDescriptor, ChainId, ProviderEvent, ProviderEventKind, SessionError,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::js_sys;

use super::{BackendInfo, ConnectionHandle, EventListener, ListenerId, WalletBackend};

pub const INJECTED_BACKEND_ID: &str = "injected";

/// EIP-1193 error code for a request the user rejected.
const USER_REJECTED: f64 = 4001.0;

fn injected_provider() -> Option<JsValue> {
    let window = web_sys::window()?;
    let provider = js_sys::Reflect::get(&window, &JsValue::from_str("ethereum")).ok()?;
    if provider.is_undefined() || provider.is_null() {
        None
    } else {
        Some(provider)
    }
}

fn js_field(target: &JsValue, name: &str) -> Option<JsValue> {
    js_sys::Reflect::get(target, &JsValue::from_str(name))
        .ok()
        .filter(|v| !v.is_undefined() && !v.is_null())
}

fn method(target: &JsValue, name: &str) -> Result<js_sys::Function, SessionError> {
    js_field(target, name)
        .and_then(|f| f.dyn_into::<js_sys::Function>().ok())
        .ok_or_else(|| SessionError::HandshakeFailed(format!("provider has no {name}()")))
}

fn provider_error(err: JsValue) -> SessionError {
    if js_field(&err, "code").and_then(|c| c.as_f64()) == Some(USER_REJECTED) {
        return SessionError::UserCancelled;
    }
    let message = js_field(&err, "message")
        .and_then(|m| m.as_string())
        .unwrap_or_else(|| format!("{err:?}"));
    SessionError::HandshakeFailed(message)
}

/// `provider.request({ method })`, awaited.
async fn request(provider: &JsValue, name: &str) -> Result<JsValue, SessionError> {
    let args = js_sys::Object::new();
    js_sys::Reflect::set(&args, &JsValue::from_str("method"), &JsValue::from_str(name))
        .map_err(provider_error)?;

    let promise = method(provider, "request")?
        .call1(provider, &args)
        .map_err(provider_error)?
        .dyn_into::<js_sys::Promise>()
        .map_err(|_| SessionError::HandshakeFailed(format!("{name} did not return a promise")))?;

    JsFuture::from(promise).await.map_err(provider_error)
}

fn accounts_from(value: &JsValue) -> Vec<Address> {
    let Some(array) = value.dyn_ref::<js_sys::Array>() else {
        return Vec::new();
    };
    array
        .iter()
        .filter_map(|v| v.as_string())
        .filter_map(|raw| match raw.parse() {
            Ok(address) => Some(address),
            Err(e) => {
                crate::log_warn!("ignoring account {}: {}", raw, e);
                None
            }
        })
        .collect()
}

/// The wallet extension injected into the page, if any.
#[derive(Debug, Clone, Copy, Default)]
pub struct InjectedBackend;

impl InjectedBackend {
    pub fn new() -> Self {
        Self
    }

    fn provider(&self) -> Result<JsValue, SessionError> {
        injected_provider().ok_or(SessionError::NoBackendAvailable)
    }
}

#[async_trait(?Send)]
impl WalletBackend for InjectedBackend {
    fn info(&self) -> BackendInfo {
        BackendInfo {
            id: INJECTED_BACKEND_ID.to_string(),
            name: "Browser Wallet".to_string(),
        }
    }

    fn is_available(&self) -> bool {
        injected_provider().is_some()
    }

    async fn connect(&self) -> Result<Box<dyn ConnectionHandle>, SessionError> {
        let provider = self.provider()?;
        let accounts = accounts_from(&request(&provider, "eth_requestAccounts").await?);
        if accounts.is_empty() {
            return Err(SessionError::HandshakeFailed("wallet exposed no accounts".to_string()));
        }
        Ok(Box::new(InjectedHandle::new(provider)))
    }

    async fn reconnect(&self) -> Result<Box<dyn ConnectionHandle>, SessionError> {
        let provider = self
            .provider()
            .map_err(|_| SessionError::RestoreFailed("no injected wallet".to_string()))?;
        let accounts = accounts_from(&request(&provider, "eth_accounts").await?);
        if accounts.is_empty() {
            return Err(SessionError::RestoreFailed(
                "wallet is locked or no longer authorized".to_string(),
            ));
        }
        Ok(Box::new(InjectedHandle::new(provider)))
    }
}

type Listeners = Rc<RefCell<HashMap<ProviderEventKind, Vec<(ListenerId, EventListener)>>>>;

/// A connection to the injected provider.
///
/// One JS callback is installed per event name while at least one Rust
/// listener is registered for it; it fans out to the Rust listeners.
pub struct InjectedHandle {
    provider: JsValue,
    last_chain: Rc<Cell<Option<ChainId>>>,
    listeners: Listeners,
    installed: RefCell<HashMap<ProviderEventKind, Closure<dyn FnMut(JsValue)>>>,
    next_listener: Cell<u64>,
}

impl InjectedHandle {
    fn new(provider: JsValue) -> Self {
        Self {
            provider,
            last_chain: Rc::new(Cell::new(None)),
            listeners: Rc::new(RefCell::new(HashMap::new())),
            installed: RefCell::new(HashMap::new()),
            next_listener: Cell::new(0),
        }
    }

    fn install(&self, kind: ProviderEventKind) {
        let listeners = self.listeners.clone();
        let last_chain = self.last_chain.clone();

        let callback = Closure::wrap(Box::new(move |payload: JsValue| {
            let Some(event) = decode_event(kind, &payload, &last_chain) else {
                return;
            };
            let targets: Vec<EventListener> = listeners
                .borrow()
                .get(&kind)
                .map(|entries| entries.iter().map(|(_, l)| l.clone()).collect())
                .unwrap_or_default();
            for listener in targets {
                listener(event.clone());
            }
        }) as Box<dyn FnMut(JsValue)>);

        let registered = method(&self.provider, "on").and_then(|on| {
            on.call2(
                &self.provider,
                &JsValue::from_str(kind.as_str()),
                callback.as_ref().unchecked_ref(),
            )
            .map_err(provider_error)
        });
        match registered {
            Ok(_) => {
                self.installed.borrow_mut().insert(kind, callback);
            }
            Err(e) => crate::log_error!("could not subscribe to {}: {}", kind, e),
        }
    }

    fn uninstall(&self, kind: ProviderEventKind) {
        let Some(callback) = self.installed.borrow_mut().remove(&kind) else {
            return;
        };
        let removed = method(&self.provider, "removeListener").and_then(|remove| {
            remove
                .call2(
                    &self.provider,
                    &JsValue::from_str(kind.as_str()),
                    callback.as_ref().unchecked_ref(),
                )
                .map_err(provider_error)
        });
        if let Err(e) = removed {
            crate::log_warn!("could not unsubscribe from {}: {}", kind, e);
        }
    }

    fn uninstall_all(&self) {
        let kinds: Vec<ProviderEventKind> = self.installed.borrow().keys().copied().collect();
        for kind in kinds {
            self.uninstall(kind);
        }
        self.listeners.borrow_mut().clear();
    }
}

fn decode_event(
    kind: ProviderEventKind,
    payload: &JsValue,
    last_chain: &Cell<Option<ChainId>>,
) -> Option<ProviderEvent> {
    match kind {
        ProviderEventKind::ChainChanged => {
            let raw = payload.as_string()?;
            match ChainId::parse_quantity(&raw) {
                Ok(new) => Some(ProviderEvent::ChainChanged {
                    new,
                    old: last_chain.replace(Some(new)),
                }),
                Err(e) => {
                    crate::log_warn!("ignoring chainChanged: {}", e);
                    None
                }
            }
        }
        ProviderEventKind::AccountsChanged => Some(ProviderEvent::AccountsChanged {
            accounts: accounts_from(payload),
        }),
        ProviderEventKind::Disconnect => Some(ProviderEvent::Disconnect {
            code: js_field(payload, "code")
                .and_then(|c| c.as_f64())
                .map(|c| c as i64),
            message: js_field(payload, "message").and_then(|m| m.as_string()),
        }),
    }
}

impl Drop for InjectedHandle {
    fn drop(&mut self) {
        self.uninstall_all();
    }
}

#[async_trait(?Send)]
impl ConnectionHandle for InjectedHandle {
    fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor::new(INJECTED_BACKEND_ID)
    }

    async fn get_address(&self) -> Result<Address, SessionError> {
        let value = request(&self.provider, "eth_accounts").await?;
        let raw = value
            .dyn_ref::<js_sys::Array>()
            .and_then(|accounts| accounts.get(0).as_string())
            .ok_or_else(|| SessionError::HandshakeFailed("wallet exposed no accounts".to_string()))?;
        raw.parse()
    }

    async fn get_chain_id(&self) -> Result<ChainId, SessionError> {
        let value = request(&self.provider, "eth_chainId").await?;
        let raw = value
            .as_string()
            .ok_or_else(|| SessionError::HandshakeFailed("eth_chainId returned no string".to_string()))?;
        let chain_id = ChainId::parse_quantity(&raw)?;
        self.last_chain.set(Some(chain_id));
        Ok(chain_id)
    }

    fn on(&self, kind: ProviderEventKind, listener: EventListener) -> ListenerId {
        let id = ListenerId(self.next_listener.get());
        self.next_listener.set(id.0 + 1);
        self.listeners
            .borrow_mut()
            .entry(kind)
            .or_default()
            .push((id, listener));

        if !self.installed.borrow().contains_key(&kind) {
            self.install(kind);
        }
        id
    }

    fn off(&self, kind: ProviderEventKind, id: ListenerId) {
        let now_empty = {
            let mut listeners = self.listeners.borrow_mut();
            let Some(entries) = listeners.get_mut(&kind) else {
                return;
            };
            entries.retain(|(existing, _)| *existing != id);
            entries.is_empty()
        };
        if now_empty {
            self.uninstall(kind);
        }
    }

    /// Injected wallets cannot be disconnected from the page; closing only
    /// stops listening.
    async fn close(&self) -> Result<(), SessionError> {
        self.uninstall_all();
        Ok(())
    }
}
