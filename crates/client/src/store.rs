//! Session state store.
//!
//! Holds the canonical [`SessionState`] and accepts exactly one transition,
//! [`SessionAction::Connected`], which replaces the whole snapshot at once.
//! Observers therefore see either the previous tuple or the complete new one.

use chainsession_shared::{Address, ChainId, SessionError, SessionState};

/// The only transition the store accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    Connected { address: Address, chain_id: ChainId },
}

/// Pure transition function.
pub fn reduce(_state: &SessionState, action: SessionAction) -> Result<SessionState, SessionError> {
    match action {
        SessionAction::Connected { address, chain_id } => {
            if address.is_zero() {
                return Err(SessionError::InvariantViolation(
                    "connected transition carries the zero address".to_string(),
                ));
            }
            Ok(SessionState::connected(address, chain_id))
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    state: SessionState,
    initial: SessionState,
}

impl SessionStore {
    /// Create a store in the disconnected default for `default_chain`.
    pub fn new(default_chain: ChainId) -> Self {
        let initial = SessionState::disconnected(default_chain);
        Self {
            state: initial,
            initial,
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.state
    }

    /// Apply a transition, returning the new snapshot. A rejected action
    /// leaves the current snapshot untouched.
    pub fn dispatch(&mut self, action: SessionAction) -> Result<SessionState, SessionError> {
        let next = reduce(&self.state, action)?;
        self.state = next;
        Ok(next)
    }

    /// Re-initialize to the disconnected default, as a fresh start would.
    pub(crate) fn reset(&mut self) -> SessionState {
        self.state = self.initial;
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> Address {
        "0xABC0000000000000000000000000000000000001".parse().unwrap()
    }

    #[test]
    fn starts_disconnected_on_default_chain() {
        let store = SessionStore::new(ChainId(137));
        assert_eq!(store.snapshot(), SessionState::disconnected(ChainId(137)));
    }

    #[test]
    fn connected_replaces_whole_tuple() {
        let mut store = SessionStore::new(ChainId::MAINNET);
        let next = store
            .dispatch(SessionAction::Connected {
                address: address(),
                chain_id: ChainId(5),
            })
            .unwrap();

        assert_eq!(next, SessionState::connected(address(), ChainId(5)));
        assert_eq!(store.snapshot(), next);
    }

    #[test]
    fn zero_address_is_rejected_without_mutation() {
        let mut store = SessionStore::new(ChainId::MAINNET);
        let err = store
            .dispatch(SessionAction::Connected {
                address: Address::ZERO,
                chain_id: ChainId(5),
            })
            .unwrap_err();

        assert!(err.is_fatal());
        assert_eq!(store.snapshot(), SessionState::default());
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut store = SessionStore::new(ChainId(1337));
        store
            .dispatch(SessionAction::Connected {
                address: address(),
                chain_id: ChainId(1),
            })
            .unwrap();

        assert_eq!(store.reset(), SessionState::disconnected(ChainId(1337)));
    }
}
