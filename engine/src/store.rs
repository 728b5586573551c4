//! In-memory transactional store and the per-unit lock registry.
//!
//! The store is the single owner of all engine state. A write guard on the
//! inner [`tokio::sync::RwLock`] is the transaction boundary: services run
//! every check+mutate sequence under one acquisition, so partial writes are
//! never observable. The [`UnitLockRegistry`] serializes claim operations
//! per unit on top of that, giving "first writer wins" semantics without
//! blocking unrelated units.

use brokerage_core::error::DomainError;
use brokerage_core::types::{
    ApprovalId, Commission, CommissionDistribution, CommissionId, DistributionId, EntryId,
    NegotiationApproval, Reservation, ReservationId, Unit, UnitId, UnitStatus, WaitingListEntry,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

// ============================================================================
// Unit lock registry
// ============================================================================

/// Hands out one async mutex per unit.
///
/// Claim operations (create, confirm, cancel, conversion) acquire the
/// unit's mutex before touching state, so writers on the same unit queue up
/// while writers on different units proceed in parallel. Locks are created
/// on first use and never removed; units are never deleted, so the registry
/// only grows with the inventory.
#[derive(Debug, Default)]
pub struct UnitLockRegistry {
    locks: Mutex<HashMap<UnitId, Arc<Mutex<()>>>>,
}

impl UnitLockRegistry {
    /// Acquires the exclusive lock for `unit_id`, waiting behind any holder.
    pub(crate) async fn acquire(&self, unit_id: UnitId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut registry = self.locks.lock().await;
            Arc::clone(registry.entry(unit_id).or_default())
        };
        lock.lock_owned().await
    }
}

// ============================================================================
// Engine state
// ============================================================================

/// Every entity table the engine owns.
///
/// Fields are crate-private; services read and mutate them through a store
/// guard. Unit status in particular has exactly one mutation point,
/// [`EngineState::set_unit_status`], so only the reservation state machine
/// (and the sanctioned `Reserved` to `Sold` step in the commission engine)
/// can move it.
#[derive(Debug, Default)]
pub struct EngineState {
    pub(crate) units: HashMap<UnitId, Unit>,
    pub(crate) reservations: HashMap<ReservationId, Reservation>,
    pub(crate) approvals: HashMap<ApprovalId, NegotiationApproval>,
    pub(crate) commissions: HashMap<CommissionId, Commission>,
    pub(crate) distributions: HashMap<DistributionId, CommissionDistribution>,
    pub(crate) entries: HashMap<EntryId, WaitingListEntry>,
    next_sequence: u64,
}

impl EngineState {
    /// The reservation currently claiming `unit_id`, if any.
    ///
    /// At most one exists at any instant; the per-unit lock plus the write
    /// guard maintain that invariant.
    pub(crate) fn active_reservation_for(&self, unit_id: UnitId) -> Option<&Reservation> {
        self.reservations
            .values()
            .find(|reservation| reservation.unit_id == unit_id && reservation.is_active())
    }

    /// The approval owned by `reservation_id`, if one exists (1:1)
    pub(crate) fn approval_for_reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Option<&NegotiationApproval> {
        self.approvals
            .values()
            .find(|approval| approval.reservation_id == reservation_id)
    }

    /// The commission recorded for `unit_id`, if one exists (unique per unit)
    pub(crate) fn commission_for_unit(&self, unit_id: UnitId) -> Option<&Commission> {
        self.commissions
            .values()
            .find(|commission| commission.unit_id == unit_id)
    }

    /// All distributions of one commission, oldest first
    pub(crate) fn distributions_of(
        &self,
        commission_id: CommissionId,
    ) -> Vec<&CommissionDistribution> {
        let mut distributions: Vec<_> = self
            .distributions
            .values()
            .filter(|distribution| distribution.commission_id == commission_id)
            .collect();
        distributions.sort_by_key(|distribution| (distribution.created_at, *distribution.id.as_uuid()));
        distributions
    }

    /// Serviceable waiting entries for one unit in queue order:
    /// priority descending, then submission time, then the submission
    /// counter for equal timestamps.
    pub(crate) fn active_waiting_entries_for(
        &self,
        unit_id: UnitId,
        now: DateTime<Utc>,
    ) -> Vec<&WaitingListEntry> {
        let mut entries: Vec<_> = self
            .entries
            .values()
            .filter(|entry| entry.unit_id == unit_id && entry.is_active(now))
            .collect();
        entries.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.sequence.cmp(&b.sequence))
        });
        entries
    }

    /// The single mutation point for unit status
    pub(crate) fn set_unit_status(&mut self, unit_id: UnitId, status: UnitStatus) {
        if let Some(unit) = self.units.get_mut(&unit_id) {
            unit.status = status;
        }
    }

    /// Next value of the monotonic submission counter
    pub(crate) fn next_sequence(&mut self) -> u64 {
        self.next_sequence += 1;
        self.next_sequence
    }
}

// ============================================================================
// Engine store
// ============================================================================

/// Shared handle over the engine state and the unit lock registry.
///
/// Public methods are the read surface plus unit registration; everything
/// that mutates claims, approvals, commissions or waiting entries goes
/// through the services, which take guards via the crate-private accessors.
#[derive(Debug, Default)]
pub struct EngineStore {
    state: RwLock<EngineState>,
    locks: UnitLockRegistry,
}

impl EngineStore {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a shared read guard over the state
    pub(crate) async fn read(&self) -> RwLockReadGuard<'_, EngineState> {
        self.state.read().await
    }

    /// Takes the exclusive write guard; holding it is the transaction
    pub(crate) async fn write(&self) -> RwLockWriteGuard<'_, EngineState> {
        self.state.write().await
    }

    /// Acquires the per-unit claim lock
    pub(crate) async fn lock_unit(&self, unit_id: UnitId) -> OwnedMutexGuard<()> {
        self.locks.acquire(unit_id).await
    }

    /// Registers a new inventory unit.
    ///
    /// Units always enter as [`UnitStatus::Available`] regardless of the
    /// status on the passed value.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::UnitAlreadyRegistered`] when a unit with the
    /// same id already exists.
    pub async fn register_unit(&self, mut unit: Unit) -> Result<(), DomainError> {
        let mut state = self.write().await;
        if state.units.contains_key(&unit.id) {
            return Err(DomainError::UnitAlreadyRegistered(unit.id));
        }
        unit.status = UnitStatus::Available;
        tracing::info!(
            unit_id = %unit.id,
            project = %unit.project_name,
            unit_number = %unit.unit_number,
            "Unit registered"
        );
        state.units.insert(unit.id, unit);
        Ok(())
    }

    /// Looks up a unit by id
    pub async fn unit(&self, id: UnitId) -> Option<Unit> {
        self.read().await.units.get(&id).cloned()
    }

    /// Looks up a reservation by id
    pub async fn reservation(&self, id: ReservationId) -> Option<Reservation> {
        self.read().await.reservations.get(&id).cloned()
    }

    /// Looks up a negotiation approval by id
    pub async fn approval(&self, id: ApprovalId) -> Option<NegotiationApproval> {
        self.read().await.approvals.get(&id).cloned()
    }

    /// Looks up the approval owned by a reservation
    pub async fn approval_for_reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Option<NegotiationApproval> {
        self.read()
            .await
            .approval_for_reservation(reservation_id)
            .cloned()
    }

    /// Looks up a commission by id
    pub async fn commission(&self, id: CommissionId) -> Option<Commission> {
        self.read().await.commissions.get(&id).cloned()
    }

    /// Looks up the commission recorded for a unit
    pub async fn commission_for_unit(&self, unit_id: UnitId) -> Option<Commission> {
        self.read().await.commission_for_unit(unit_id).cloned()
    }

    /// Looks up a distribution by id
    pub async fn distribution(&self, id: DistributionId) -> Option<CommissionDistribution> {
        self.read().await.distributions.get(&id).cloned()
    }

    /// All distributions of one commission, oldest first
    pub async fn distributions_for(
        &self,
        commission_id: CommissionId,
    ) -> Vec<CommissionDistribution> {
        self.read()
            .await
            .distributions_of(commission_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Looks up a waiting-list entry by id
    pub async fn entry(&self, id: EntryId) -> Option<WaitingListEntry> {
        self.read().await.entries.get(&id).cloned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use brokerage_core::types::Money;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn sample_unit() -> Unit {
        Unit::new(
            UnitId::new(),
            "Palm Heights".to_string(),
            "A-101".to_string(),
            Money::from_major(750_000),
            Decimal::from(140),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn duplicate_registration_is_a_conflict() {
        let store = EngineStore::new();
        let unit = sample_unit();
        let id = unit.id;

        store.register_unit(unit.clone()).await.unwrap();
        let err = store.register_unit(unit).await.unwrap_err();
        assert_eq!(err, DomainError::UnitAlreadyRegistered(id));
    }

    #[tokio::test]
    async fn registration_normalizes_status_to_available() {
        let store = EngineStore::new();
        let mut unit = sample_unit();
        unit.status = UnitStatus::Sold;
        let id = unit.id;

        store.register_unit(unit).await.unwrap();
        assert_eq!(store.unit(id).await.unwrap().status, UnitStatus::Available);
    }

    #[tokio::test]
    async fn unit_lock_serializes_holders() {
        let store = Arc::new(EngineStore::new());
        let unit_id = UnitId::new();

        let guard = store.lock_unit(unit_id).await;

        let contender = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let _guard = store.lock_unit(unit_id).await;
            })
        };

        // The contender cannot finish while the guard is held
        tokio::task::yield_now().await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn sequence_counter_is_monotonic() {
        let store = EngineStore::new();
        let mut state = store.write().await;
        let first = state.next_sequence();
        let second = state.next_sequence();
        assert!(second > first);
    }
}
