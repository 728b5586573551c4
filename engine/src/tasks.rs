//! Periodic maintenance facade for external schedulers.
//!
//! The engine keeps no timers of its own; deadlines are data. Whatever
//! scheduling exists outside (cron, a tokio interval, a one-shot admin
//! command) calls these sweeps at any cadence it likes. Each sweep is a
//! pure function of the current time and persisted state, idempotent, and
//! isolates failures per entry, so overlapping or repeated runs are
//! harmless.

use crate::negotiation::NegotiationService;
use crate::waitlist::WaitingListService;
use std::sync::Arc;

/// Outcome of one maintenance pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Pending approvals flipped to expired
    pub expired_approvals: usize,
    /// Waiting entries flipped to expired
    pub expired_waiting_entries: usize,
}

/// Entry point for scheduled maintenance
pub struct MaintenanceTasks {
    negotiations: Arc<NegotiationService>,
    waiting_list: Arc<WaitingListService>,
}

impl MaintenanceTasks {
    /// Create the maintenance facade over the two sweeping services
    #[must_use]
    pub fn new(
        negotiations: Arc<NegotiationService>,
        waiting_list: Arc<WaitingListService>,
    ) -> Self {
        Self {
            negotiations,
            waiting_list,
        }
    }

    /// Expires pending negotiation approvals past their deadline
    pub async fn expire_overdue_approvals(&self) -> usize {
        self.negotiations.expire_overdue().await
    }

    /// Expires waiting-list entries past their lifetime
    pub async fn mark_expired_waiting_entries(&self) -> usize {
        self.waiting_list.mark_expired().await
    }

    /// Runs every sweep once and reports what changed
    pub async fn run_once(&self) -> SweepReport {
        let expired_approvals = self.expire_overdue_approvals().await;
        let expired_waiting_entries = self.mark_expired_waiting_entries().await;
        SweepReport {
            expired_approvals,
            expired_waiting_entries,
        }
    }
}
