//! Connection lifecycle state machine.
//!
//! ```text
//!                  Data                    Ack
//!  Disconnected ────────► Connecting ────────────► Connected ◄─┐ Data / Ack
//!       ▲                     │                        │  ──────┘
//!       │ Nack                │ Nack                   │ Control
//!       └──────────── Disconnecting ◄──────────────────┘
//! ```
//!
//! The machine is driven by message categories.  Any `(state, category)` pair
//! not drawn above is a protocol violation and leaves the state unchanged.
//!
//! Observers can be attached per target state; one runs synchronously right
//! after the machine enters that state.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use crate::protocol::error::ProtocolError;
use crate::protocol::message::MessageCategory;

/// Lifecycle state of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// A completed state change, passed to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ConnectionState,
    pub category: MessageCategory,
    pub to: ConnectionState,
}

/// Observer run after the machine enters a state.
pub type StateCallback = Box<dyn FnMut(&Transition) + Send>;

/// Looks up the transition table.
pub fn transition_target(
    state: ConnectionState,
    category: MessageCategory,
) -> Option<ConnectionState> {
    use ConnectionState::*;
    use MessageCategory::*;

    match (state, category) {
        (Disconnected, Data) => Some(Connecting),
        (Connecting, Ack) => Some(Connected),
        (Connecting, Nack) => Some(Disconnecting),
        (Connected, Control) => Some(Disconnecting),
        (Connected, Data) | (Connected, Ack) => Some(Connected),
        (Disconnecting, Nack) => Some(Disconnected),
        _ => None,
    }
}

/// Per-session connection state plus its observers.
///
/// Not synchronised; a session owns its machine.
#[derive(Default)]
pub struct ConnectionStateMachine {
    state: ConnectionState,
    callbacks: HashMap<ConnectionState, StateCallback>,
}

impl fmt::Debug for ConnectionStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionStateMachine")
            .field("state", &self.state)
            .field("callbacks", &self.callbacks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ConnectionStateMachine {
    /// A machine in `Disconnected` with no observers.
    pub fn new() -> Self {
        Self::default()
    }

    /// A machine resuming in `state`, e.g. restored after a process restart.
    pub fn starting_in(state: ConnectionState) -> Self {
        Self {
            state,
            callbacks: HashMap::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Where `category` would take the machine, without moving it.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::ProtocolViolation`] if the pair is not in the
    /// transition table.
    pub fn next_state(&self, category: MessageCategory) -> Result<ConnectionState, ProtocolError> {
        transition_target(self.state, category).ok_or_else(|| {
            ProtocolError::ProtocolViolation(format!(
                "{category:?} message not allowed in state {:?}",
                self.state
            ))
        })
    }

    /// Applies `category` and returns the new state.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::ProtocolViolation`] for a pair not in the
    /// table; the state is left unchanged and no observer runs.
    pub fn handle(&mut self, category: MessageCategory) -> Result<ConnectionState, ProtocolError> {
        let next = self.next_state(category).map_err(|e| {
            warn!("{e}");
            e
        })?;
        self.enter(category, next);
        Ok(next)
    }

    /// Starts a connection from `Disconnected`.
    pub fn connect(&mut self) -> Result<ConnectionState, ProtocolError> {
        self.require(ConnectionState::Disconnected, "connect")?;
        self.handle(MessageCategory::Data)
    }

    /// Starts tearing down an established connection.
    pub fn disconnect(&mut self) -> Result<ConnectionState, ProtocolError> {
        self.require(ConnectionState::Connected, "disconnect")?;
        self.handle(MessageCategory::Control)
    }

    /// Records an outbound data message; only allowed while `Connected`.
    pub fn send_data(&mut self) -> Result<ConnectionState, ProtocolError> {
        self.require(ConnectionState::Connected, "send data")?;
        self.handle(MessageCategory::Data)
    }

    /// Attaches `callback` to `state`, replacing any earlier one.
    pub fn register_callback<F>(&mut self, state: ConnectionState, callback: F)
    where
        F: FnMut(&Transition) + Send + 'static,
    {
        self.callbacks.insert(state, Box::new(callback));
    }

    /// Detaches the observer of `state`, returning whether one was attached.
    pub fn remove_callback(&mut self, state: ConnectionState) -> bool {
        self.callbacks.remove(&state).is_some()
    }

    /// Moves to `next` (already looked up for `category`) and notifies.
    pub(crate) fn enter(&mut self, category: MessageCategory, next: ConnectionState) {
        let transition = Transition {
            from: self.state,
            category,
            to: next,
        };
        self.state = next;
        debug!(
            "connection {:?} -> {:?} on {:?}",
            transition.from, transition.to, transition.category
        );
        if let Some(callback) = self.callbacks.get_mut(&next) {
            callback(&transition);
        }
    }

    pub(crate) fn require(
        &self,
        expected: ConnectionState,
        action: &str,
    ) -> Result<(), ProtocolError> {
        if self.state != expected {
            let err = ProtocolError::ProtocolViolation(format!(
                "cannot {action} in state {:?}, requires {expected:?}",
                self.state
            ));
            warn!("{err}");
            return Err(err);
        }
        Ok(())
    }
}
