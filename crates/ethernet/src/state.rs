//! Connection states and the transition table.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Interface connection state (stored as u8 for atomic mirroring).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::EnumIter,
)]
#[repr(u8)]
pub enum ConnectionState {
    #[default]
    Uninitialized = 0,
    PhyStarting = 1,
    LinkDown = 2,
    LinkUp = 3,
    ObtainingAddress = 4,
    Connected = 5,
    Disconnecting = 6,
    ErrorState = 7,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::PhyStarting,
            2 => Self::LinkDown,
            3 => Self::LinkUp,
            4 => Self::ObtainingAddress,
            5 => Self::Connected,
            6 => Self::Disconnecting,
            7 => Self::ErrorState,
            _ => Self::Uninitialized,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "Uninitialized",
            Self::PhyStarting => "PHY Starting",
            Self::LinkDown => "Link Down",
            Self::LinkUp => "Link Up",
            Self::ObtainingAddress => "Obtaining IP",
            Self::Connected => "Connected",
            Self::Disconnecting => "Disconnecting",
            Self::ErrorState => "Error",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Whether the transition table has an edge `self -> to`.
    ///
    /// Self-transitions are not edges; callers treat them as no-ops before
    /// consulting the table.
    pub fn can_transition_to(self, to: Self) -> bool {
        use ConnectionState::*;

        match (self, to) {
            // Teardown and faults are reachable from anywhere
            (_, Disconnecting) | (_, ErrorState) => self != to,
            (Uninitialized, PhyStarting) => true,
            (ErrorState, PhyStarting) => true,
            (PhyStarting, LinkDown | LinkUp) => true,
            (LinkDown, LinkUp) => true,
            (LinkUp, LinkDown | ObtainingAddress) => true,
            (ObtainingAddress, Connected | LinkDown) => true,
            (Connected, LinkDown) => true,
            (Disconnecting, Uninitialized) => true,
            _ => false,
        }
    }

    /// Intermediate states to step through on the way to `Connected`.
    ///
    /// Returns the remaining chain (excluding `self`) or `None` when
    /// `Connected` is not reachable through link events from here.
    pub(crate) fn path_to_connected(self) -> Option<&'static [ConnectionState]> {
        use ConnectionState::*;

        match self {
            PhyStarting | LinkDown => Some(&[LinkUp, ObtainingAddress, Connected]),
            LinkUp => Some(&[ObtainingAddress, Connected]),
            ObtainingAddress => Some(&[Connected]),
            Connected => Some(&[]),
            Uninitialized | Disconnecting | ErrorState => None,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-readable state name.
pub fn state_to_string(state: ConnectionState) -> &'static str {
    state.as_str()
}

/// Lock-free mirror of the current state for unlocked readers.
#[derive(Debug, Default)]
pub(crate) struct AtomicConnectionState(AtomicU8);

impl AtomicConnectionState {
    pub(crate) fn load(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, state: ConnectionState) {
        self.0.store(state as u8, Ordering::Release);
    }
}
