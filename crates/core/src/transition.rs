//! Table-driven state machines.
//!
//! Every status enum in this workspace is a closed tagged-variant type with
//! an explicit transition table `(from, action, to)`. Any pair absent from
//! the table is rejected with [`DomainError::InvalidStateTransition`]; there
//! is no ad-hoc per-call-site status checking.
//!
//! [`StateMachine::apply`] is the only sanctioned way to move a status.
//! Internal code that writes a status directly must hold a transition the
//! table enumerates; writers guard that with `debug_assert!(from.can_become(to))`
//! so a non-enumerated reversal fails loudly in non-production builds.

use crate::error::{DomainError, DomainResult};

/// A status enum driven by a const transition table.
pub trait StateMachine: Copy + Eq + core::fmt::Debug + Sized + 'static {
    /// The actions that may be applied to this status.
    type Action: Copy + Eq + core::fmt::Debug + 'static;

    /// Entity name used in error messages ("plan", "task", ...).
    const ENTITY: &'static str;

    /// The closed transition table. A transition is legal iff it is listed.
    const TABLE: &'static [(Self, Self::Action, Self)];

    /// Terminal states: no table entry leaves them.
    const TERMINAL: &'static [Self] = &[];

    /// Whether `action` is legal from the current state.
    fn allows(self, action: Self::Action) -> bool {
        Self::TABLE
            .iter()
            .any(|(from, act, _)| *from == self && *act == action)
    }

    /// Whether some action moves the current state to `to`.
    fn can_become(self, to: Self) -> bool {
        Self::TABLE
            .iter()
            .any(|(from, _, target)| *from == self && *target == to)
    }

    /// Apply `action`, returning the target state or rejecting the call.
    fn apply(self, action: Self::Action) -> DomainResult<Self> {
        Self::TABLE
            .iter()
            .find(|(from, act, _)| *from == self && *act == action)
            .map(|(_, _, to)| *to)
            .ok_or_else(|| {
                DomainError::invalid_transition(
                    Self::ENTITY,
                    format!("{self:?}"),
                    format!("{action:?}"),
                )
            })
    }
}
