//! Negotiation approval workflow.
//!
//! A negotiated claim opens a pending approval with a hard response
//! deadline (48 hours by default). Managers holding
//! [`Capability::ApproveNegotiations`] respond; the deadline is data, not a
//! timer, so an unanswered approval stays `Pending` until the expiry sweep
//! or a read-side check observes that the window has closed.
//!
//! Approving confirms the owning reservation in the same transaction.
//! Rejecting records the manager's reason but leaves the reservation
//! under negotiation, so the requesting agent can revise the price and the
//! claim is not silently dropped. Expiry likewise touches only the
//! approval; releasing the unit always takes an explicit cancel.

use crate::effects;
use crate::store::EngineStore;
use brokerage_core::environment::{AccessPolicy, Actor, Capability, Clock, VoucherRenderer};
use brokerage_core::error::DomainError;
use brokerage_core::events::{DomainEvent, Notification, NotificationFanout, ObserverRole, Recipient};
use brokerage_core::types::{
    ApprovalId, ApprovalStatus, NegotiationApproval, ReservationSnapshot, ReservationStatus,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Manager responses to pending negotiations, plus the expiry sweep
pub struct NegotiationService {
    store: Arc<EngineStore>,
    clock: Arc<dyn Clock>,
    voucher: Arc<dyn VoucherRenderer>,
    fanout: Arc<dyn NotificationFanout>,
    access: Arc<dyn AccessPolicy>,
}

impl NegotiationService {
    /// Create a new negotiation service
    #[must_use]
    pub fn new(
        store: Arc<EngineStore>,
        clock: Arc<dyn Clock>,
        voucher: Arc<dyn VoucherRenderer>,
        fanout: Arc<dyn NotificationFanout>,
        access: Arc<dyn AccessPolicy>,
    ) -> Self {
        Self {
            store,
            clock,
            voucher,
            fanout,
            access,
        }
    }

    /// Approves a pending negotiation before its deadline.
    ///
    /// Flips the approval to `Approved` and the owning reservation to
    /// `Confirmed` under one write guard, then regenerates the voucher and
    /// notifies the requester and the credit department.
    ///
    /// # Errors
    ///
    /// [`DomainError::CapabilityDenied`] without
    /// [`Capability::ApproveNegotiations`],
    /// [`DomainError::ApprovalNotFound`] for an unknown id,
    /// [`DomainError::ApprovalNotPending`] once responded or expired,
    /// [`DomainError::ApprovalDeadlinePassed`] after the window closes,
    /// and [`DomainError::ReservationTransition`] when the owning
    /// reservation was cancelled in the meantime.
    pub async fn approve(
        &self,
        approval_id: ApprovalId,
        manager: &Actor,
        note: Option<String>,
    ) -> Result<NegotiationApproval, DomainError> {
        self.ensure_can_approve(manager)?;

        let unit_id = self
            .store
            .approval(approval_id)
            .await
            .ok_or(DomainError::ApprovalNotFound(approval_id))?
            .unit_id;

        let unit_guard = self.store.lock_unit(unit_id).await;
        let now = self.clock.now();

        let (approval, snapshot) = {
            let mut state = self.store.write().await;

            let reservation_id = {
                let approval = state
                    .approvals
                    .get(&approval_id)
                    .ok_or(DomainError::ApprovalNotFound(approval_id))?;
                Self::ensure_respondable(approval, now)?;
                approval.reservation_id
            };

            let reservation_status = state
                .reservations
                .get(&reservation_id)
                .ok_or(DomainError::ReservationNotFound(reservation_id))?
                .status;
            if reservation_status == ReservationStatus::Cancelled {
                return Err(DomainError::ReservationTransition {
                    id: reservation_id,
                    status: reservation_status,
                    attempted: "confirmed",
                });
            }

            let approval = state
                .approvals
                .get_mut(&approval_id)
                .ok_or(DomainError::ApprovalNotFound(approval_id))?;
            approval.status = ApprovalStatus::Approved;
            approval.responded_by = Some(manager.agent_id);
            approval.responded_at = Some(now);
            approval.response_note = note;
            let approval = approval.clone();

            let reservation = state
                .reservations
                .get_mut(&reservation_id)
                .ok_or(DomainError::ReservationNotFound(reservation_id))?;
            if reservation.status == ReservationStatus::UnderNegotiation {
                reservation.status = ReservationStatus::Confirmed;
                reservation.confirmed_at = Some(now);
            }
            let snapshot = reservation.snapshot.clone();

            (approval, snapshot)
        };
        drop(unit_guard);

        tracing::info!(
            approval_id = %approval_id,
            reservation_id = %approval.reservation_id,
            manager = %manager.agent_id,
            "Negotiation approved"
        );

        effects::render_voucher(&self.voucher, &snapshot).await;
        effects::dispatch(
            &self.fanout,
            Notification::new(
                vec![
                    Recipient::Agent {
                        agent_id: approval.requested_by,
                    },
                    Recipient::Role {
                        role: ObserverRole::CreditDepartment,
                    },
                ],
                format!(
                    "Negotiation for unit {} approved at {}",
                    snapshot.unit_number, approval.proposed_price
                ),
                DomainEvent::NegotiationApproved {
                    approval_id,
                    reservation_id: approval.reservation_id,
                    responded_by: manager.agent_id,
                },
            ),
        )
        .await;

        Ok(approval)
    }

    /// Rejects a pending negotiation before its deadline.
    ///
    /// Records the manager's reason on the approval. The owning
    /// reservation keeps its `UnderNegotiation` status so the requester
    /// can revise the price; the claim is only released by an explicit
    /// cancel.
    ///
    /// # Errors
    ///
    /// [`DomainError::CapabilityDenied`] without
    /// [`Capability::ApproveNegotiations`],
    /// [`DomainError::ApprovalNotFound`] for an unknown id,
    /// [`DomainError::ApprovalNotPending`] once responded or expired, and
    /// [`DomainError::ApprovalDeadlinePassed`] after the window closes.
    pub async fn reject(
        &self,
        approval_id: ApprovalId,
        manager: &Actor,
        reason: String,
    ) -> Result<NegotiationApproval, DomainError> {
        self.ensure_can_approve(manager)?;

        let now = self.clock.now();

        let (approval, snapshot) = {
            let mut state = self.store.write().await;

            {
                let approval = state
                    .approvals
                    .get(&approval_id)
                    .ok_or(DomainError::ApprovalNotFound(approval_id))?;
                Self::ensure_respondable(approval, now)?;
            }

            let approval = state
                .approvals
                .get_mut(&approval_id)
                .ok_or(DomainError::ApprovalNotFound(approval_id))?;
            approval.status = ApprovalStatus::Rejected;
            approval.responded_by = Some(manager.agent_id);
            approval.responded_at = Some(now);
            approval.response_note = Some(reason.clone());
            let approval = approval.clone();

            let snapshot = state
                .reservations
                .get(&approval.reservation_id)
                .map(|reservation| reservation.snapshot.clone());

            (approval, snapshot)
        };

        tracing::info!(
            approval_id = %approval_id,
            reservation_id = %approval.reservation_id,
            manager = %manager.agent_id,
            "Negotiation rejected"
        );

        let unit_label = snapshot
            .as_ref()
            .map_or_else(|| approval.unit_id.to_string(), |s| s.unit_number.clone());
        effects::dispatch(
            &self.fanout,
            Notification::new(
                vec![
                    Recipient::Agent {
                        agent_id: approval.requested_by,
                    },
                    Recipient::Role {
                        role: ObserverRole::CreditDepartment,
                    },
                ],
                format!("Negotiation for unit {unit_label} rejected: {reason}"),
                DomainEvent::NegotiationRejected {
                    approval_id,
                    reservation_id: approval.reservation_id,
                    responded_by: manager.agent_id,
                    reason,
                },
            ),
        )
        .await;

        Ok(approval)
    }

    /// Expires every pending approval whose deadline has passed.
    ///
    /// Candidates are collected under a read guard, then each one is
    /// rechecked and flipped under its own write guard, so a manager
    /// response landing mid-sweep wins and the sweep is idempotent: a
    /// second run over the same state expires nothing and notifies no one.
    /// Returns how many approvals this run expired.
    pub async fn expire_overdue(&self) -> usize {
        let now = self.clock.now();

        let candidates: Vec<ApprovalId> = {
            let state = self.store.read().await;
            state
                .approvals
                .values()
                .filter(|approval| approval.is_overdue(now))
                .map(|approval| approval.id)
                .collect()
        };

        let mut expired = 0;
        for approval_id in candidates {
            let Some((approval, snapshot)) = self.expire_one(approval_id, now).await else {
                continue;
            };
            expired += 1;

            let unit_label = snapshot
                .as_ref()
                .map_or_else(|| approval.unit_id.to_string(), |s| s.unit_number.clone());
            effects::dispatch(
                &self.fanout,
                Notification::new(
                    vec![
                        Recipient::Agent {
                            agent_id: approval.requested_by,
                        },
                        Recipient::Role {
                            role: ObserverRole::NegotiationApprovers,
                        },
                        Recipient::Role {
                            role: ObserverRole::CreditDepartment,
                        },
                    ],
                    format!(
                        "Negotiation for unit {unit_label} expired without a response (deadline {})",
                        approval.deadline
                    ),
                    DomainEvent::NegotiationExpired {
                        approval_id: approval.id,
                        reservation_id: approval.reservation_id,
                        deadline: approval.deadline.inner(),
                    },
                ),
            )
            .await;
        }

        if expired > 0 {
            tracing::info!(expired, "Overdue negotiation sweep finished");
        }
        expired
    }

    /// Flips one overdue approval, rechecking under the write guard.
    /// `None` means another writer responded first.
    async fn expire_one(
        &self,
        approval_id: ApprovalId,
        now: DateTime<Utc>,
    ) -> Option<(NegotiationApproval, Option<ReservationSnapshot>)> {
        let mut state = self.store.write().await;
        let approval = state.approvals.get_mut(&approval_id)?;
        if !approval.is_overdue(now) {
            return None;
        }
        approval.status = ApprovalStatus::Expired;
        approval.responded_at = Some(now);
        let approval = approval.clone();
        let snapshot = state
            .reservations
            .get(&approval.reservation_id)
            .map(|reservation| reservation.snapshot.clone());
        Some((approval, snapshot))
    }

    fn ensure_can_approve(&self, manager: &Actor) -> Result<(), DomainError> {
        if self.access.allows(manager, Capability::ApproveNegotiations) {
            Ok(())
        } else {
            Err(DomainError::CapabilityDenied {
                capability: Capability::ApproveNegotiations,
            })
        }
    }

    fn ensure_respondable(
        approval: &NegotiationApproval,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if approval.status != ApprovalStatus::Pending {
            return Err(DomainError::ApprovalNotPending {
                id: approval.id,
                status: approval.status,
            });
        }
        if approval.deadline.is_passed(now) {
            return Err(DomainError::ApprovalDeadlinePassed {
                id: approval.id,
                deadline: approval.deadline.inner(),
            });
        }
        Ok(())
    }
}
