//! Subscription state machine
//!
//! ```text
//!   bind
//!    │
//!    ▼
//!  Empty ──arrival──▶ Full
//!    ▲                 │ arrival (overwrite)
//!    └───take/poll─────┘
//!
//!  Empty | Full ──dispose──▶ Disposed   (terminal)
//! ```

use std::fmt;

/// Observable state of a last-value subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Bound, nothing waiting
    Empty,
    /// Bound, one message waiting
    Full,
    /// Unbound; no further messages arrive
    Disposed,
}

impl SubscriptionState {
    pub fn is_bound(self) -> bool {
        !matches!(self, SubscriptionState::Disposed)
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubscriptionState::Empty => "empty",
            SubscriptionState::Full => "full",
            SubscriptionState::Disposed => "disposed",
        };
        f.write_str(name)
    }
}
