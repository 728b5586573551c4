//! Environment traits injected into the engine services.
//!
//! All external dependencies are abstracted behind traits so services stay
//! deterministic under test: time comes from a [`Clock`], capability checks
//! from an [`AccessPolicy`], and voucher rendering from a
//! [`VoucherRenderer`]. Production wires `SystemClock` and real
//! collaborators; tests wire the mocks from `brokerage-testing`.

use crate::types::{AgentId, ReservationSnapshot};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Clock
// ============================================================================

/// Clock trait - abstracts time operations for testability
///
/// Every deadline and expiry in the engine is evaluated lazily against
/// `clock.now()`; there are no in-process timers.
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock reading the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ============================================================================
// Actors and capabilities
// ============================================================================

/// The authenticated user performing an operation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    /// The acting agent's identifier
    pub agent_id: AgentId,
    /// Display name for logs and audit fields
    pub name: String,
}

impl Actor {
    /// Creates a new `Actor`
    #[must_use]
    pub const fn new(agent_id: AgentId, name: String) -> Self {
        Self { agent_id, name }
    }
}

/// Capabilities the engine checks before privileged operations.
///
/// How an actor comes to hold a capability (roles, grants, org structure)
/// is outside the engine; services only ever ask the injected
/// [`AccessPolicy`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Respond to negotiation approval requests
    ApproveNegotiations,
    /// Create, edit, approve and pay commissions
    ManageCommissions,
    /// Enqueue, convert and cancel waiting-list entries
    ManageWaitingList,
    /// Act on reservations owned by other agents
    OverrideReservationOwnership,
}

/// Capability check boundary.
///
/// The single place authorization enters the engine.
pub trait AccessPolicy: Send + Sync {
    /// Checks whether `actor` holds `capability`
    fn allows(&self, actor: &Actor, capability: Capability) -> bool;
}

/// Policy that grants every capability to every actor.
///
/// For demos and tests that exercise domain logic rather than
/// authorization.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveAccess;

impl AccessPolicy for PermissiveAccess {
    fn allows(&self, _actor: &Actor, _capability: Capability) -> bool {
        true
    }
}

// ============================================================================
// Voucher rendering
// ============================================================================

/// Errors from the voucher rendering collaborator
#[derive(Debug, Error)]
pub enum VoucherError {
    /// The renderer failed to produce a document
    #[error("failed to render voucher: {0}")]
    RenderFailed(String),

    /// The rendered document could not be stored
    #[error("failed to store voucher: {0}")]
    StoreFailed(String),
}

/// Renders a printable reservation voucher from an immutable snapshot.
///
/// Invoked fire-and-forget after a reservation commits; a render failure
/// never rolls the reservation back.
#[async_trait]
pub trait VoucherRenderer: Send + Sync {
    /// Renders a voucher document and returns its storage path.
    ///
    /// # Errors
    ///
    /// Returns [`VoucherError`] when rendering or storing fails; callers
    /// log and continue.
    async fn render(&self, snapshot: &ReservationSnapshot) -> Result<PathBuf, VoucherError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permissive_access_grants_everything() {
        let actor = Actor::new(AgentId::new(), "test agent".to_string());
        let policy = PermissiveAccess;
        assert!(policy.allows(&actor, Capability::ApproveNegotiations));
        assert!(policy.allows(&actor, Capability::OverrideReservationOwnership));
    }

    #[test]
    fn system_clock_advances() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
