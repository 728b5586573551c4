//! Reservation state machine: exclusive unit claims and their lifecycle.
//!
//! `create` is the contended path: callers race for a unit, the per-unit
//! lock serializes them, and the first writer wins while everyone else gets
//! a typed conflict. `confirm` and `cancel` take the same lock so all claim
//! operations on one unit observe a total order.
//!
//! ```text
//! create (list price)      ──────────────► Confirmed ──┐
//! create (negotiated)      ► UnderNegotiation ─┐       │ cancel
//!                              │ confirm /     │       ▼
//!                              │ approval      └──► Cancelled
//!                              ▼               cancel
//!                           Confirmed
//! ```
//!
//! Cancelling the last active claim reverts the unit to available and
//! tells the head of its waiting list.

use crate::config::NegotiationConfig;
use crate::effects;
use crate::store::EngineStore;
use brokerage_core::environment::{AccessPolicy, Actor, Capability, Clock, VoucherRenderer};
use brokerage_core::error::DomainError;
use brokerage_core::events::{DomainEvent, Notification, NotificationFanout, ObserverRole, Recipient};
use brokerage_core::types::{
    AgentId, ApprovalDeadline, ApprovalId, ApprovalStatus, ClientContact, Money,
    NegotiationApproval, PaymentTerms, Reservation, ReservationId, ReservationKind,
    ReservationSnapshot, ReservationStatus, UnitId, UnitStatus,
};
use std::sync::Arc;

/// Input for [`ReservationService::create`]
#[derive(Clone, Debug)]
pub struct CreateReservation {
    /// Unit to claim
    pub unit_id: UnitId,
    /// Agent placing the claim (and owner of the resulting reservation)
    pub requested_by: AgentId,
    /// Claim at list price, or with a negotiated price
    pub kind: ReservationKind,
    /// Client the claim is placed for
    pub client: ClientContact,
    /// Agreed payment terms
    pub payment: PaymentTerms,
    /// Proposed selling price; required for negotiations, forbidden
    /// otherwise
    pub proposed_price: Option<Money>,
}

/// Claim operations over inventory units
pub struct ReservationService {
    store: Arc<EngineStore>,
    negotiation: NegotiationConfig,
    clock: Arc<dyn Clock>,
    voucher: Arc<dyn VoucherRenderer>,
    fanout: Arc<dyn NotificationFanout>,
    access: Arc<dyn AccessPolicy>,
}

impl ReservationService {
    /// Create a new reservation service
    #[must_use]
    pub fn new(
        store: Arc<EngineStore>,
        negotiation: NegotiationConfig,
        clock: Arc<dyn Clock>,
        voucher: Arc<dyn VoucherRenderer>,
        fanout: Arc<dyn NotificationFanout>,
        access: Arc<dyn AccessPolicy>,
    ) -> Self {
        Self {
            store,
            negotiation,
            clock,
            voucher,
            fanout,
            access,
        }
    }

    /// Places an exclusive claim on a unit.
    ///
    /// Acquires the unit's lock, then checks and writes under one store
    /// guard: the unit must exist, be available, and carry no active
    /// reservation. A list-price claim confirms immediately; a negotiated
    /// claim opens `UnderNegotiation` together with its pending approval
    /// and deadline. After commit the voucher renders and notifications go
    /// out, both best-effort.
    ///
    /// # Errors
    ///
    /// [`DomainError::UnitNotFound`] for an unregistered unit,
    /// [`DomainError::UnitAlreadyReserved`] when another active claim
    /// holds the unit, [`DomainError::UnitNotAvailable`] when the unit is
    /// sold, and validation errors for a malformed request.
    pub async fn create(&self, request: CreateReservation) -> Result<Reservation, DomainError> {
        Self::validate(&request)?;

        let unit_guard = self.store.lock_unit(request.unit_id).await;
        let now = self.clock.now();

        let (reservation, notifications) = {
            let mut state = self.store.write().await;

            let unit = state
                .units
                .get(&request.unit_id)
                .ok_or(DomainError::UnitNotFound(request.unit_id))?
                .clone();

            if let Some(existing) = state.active_reservation_for(request.unit_id) {
                return Err(DomainError::UnitAlreadyReserved {
                    unit_id: request.unit_id,
                    existing: existing.id,
                });
            }
            if !unit.is_available() {
                return Err(DomainError::UnitNotAvailable {
                    unit_id: request.unit_id,
                    status: unit.status,
                });
            }

            let agreed_price = match request.kind {
                ReservationKind::Negotiation => request
                    .proposed_price
                    .ok_or(DomainError::ProposedPriceMismatch)?,
                ReservationKind::ConfirmedReservation => unit.price,
            };

            let id = ReservationId::new();
            let snapshot = ReservationSnapshot {
                unit_id: unit.id,
                project_name: unit.project_name.clone(),
                unit_number: unit.unit_number.clone(),
                area_sqm: unit.area_sqm,
                list_price: unit.price,
                agreed_price,
                client: request.client.clone(),
                payment: request.payment.clone(),
                requested_by: request.requested_by,
                captured_at: now,
            };

            let (status, confirmed_at) = match request.kind {
                ReservationKind::ConfirmedReservation => {
                    (ReservationStatus::Confirmed, Some(now))
                }
                ReservationKind::Negotiation => (ReservationStatus::UnderNegotiation, None),
            };

            let reservation = Reservation {
                id,
                unit_id: unit.id,
                requested_by: request.requested_by,
                kind: request.kind,
                status,
                client: request.client,
                payment: request.payment,
                snapshot,
                created_at: now,
                confirmed_at,
                cancelled_at: None,
                cancellation_reason: None,
            };

            let mut notifications = vec![Notification::new(
                vec![Recipient::Agent {
                    agent_id: request.requested_by,
                }],
                format!("Unit {} in {} reserved", unit.unit_number, unit.project_name),
                DomainEvent::UnitReserved {
                    unit_id: unit.id,
                    reservation_id: id,
                    requested_by: request.requested_by,
                },
            )];

            if request.kind == ReservationKind::Negotiation {
                let deadline = ApprovalDeadline::new(now + self.negotiation.response_window());
                let approval = NegotiationApproval {
                    id: ApprovalId::new(),
                    reservation_id: id,
                    unit_id: unit.id,
                    requested_by: request.requested_by,
                    status: ApprovalStatus::Pending,
                    original_price: unit.price,
                    proposed_price: agreed_price,
                    deadline,
                    created_at: now,
                    responded_by: None,
                    responded_at: None,
                    response_note: None,
                };
                notifications.push(Notification::new(
                    vec![Recipient::Role {
                        role: ObserverRole::NegotiationApprovers,
                    }],
                    format!(
                        "Negotiation for unit {} in {}: proposed {} against list {}, respond by {}",
                        unit.unit_number, unit.project_name, agreed_price, unit.price, deadline,
                    ),
                    DomainEvent::NegotiationRequested {
                        approval_id: approval.id,
                        reservation_id: id,
                        unit_id: unit.id,
                        requested_by: request.requested_by,
                        original_price: unit.price,
                        proposed_price: agreed_price,
                        deadline: deadline.inner(),
                    },
                ));
                state.approvals.insert(approval.id, approval);
            }

            state.reservations.insert(id, reservation.clone());
            state.set_unit_status(unit.id, UnitStatus::Reserved);

            (reservation, notifications)
        };
        drop(unit_guard);

        tracing::info!(
            reservation_id = %reservation.id,
            unit_id = %reservation.unit_id,
            kind = ?reservation.kind,
            status = ?reservation.status,
            "Reservation created"
        );

        effects::render_voucher(&self.voucher, &reservation.snapshot).await;
        for notification in notifications {
            effects::dispatch(&self.fanout, notification).await;
        }

        Ok(reservation)
    }

    /// Confirms a reservation that is under negotiation.
    ///
    /// Only the requesting agent, or a holder of
    /// [`Capability::OverrideReservationOwnership`], may confirm. The
    /// voucher regenerates from the unchanged snapshot.
    ///
    /// # Errors
    ///
    /// [`DomainError::ReservationNotFound`] for an unknown id,
    /// [`DomainError::NotReservationOwner`] for a foreign actor, and
    /// [`DomainError::ReservationTransition`] unless the reservation is
    /// `UnderNegotiation`.
    pub async fn confirm(
        &self,
        id: ReservationId,
        actor: &Actor,
    ) -> Result<Reservation, DomainError> {
        let unit_id = self
            .store
            .reservation(id)
            .await
            .ok_or(DomainError::ReservationNotFound(id))?
            .unit_id;

        let unit_guard = self.store.lock_unit(unit_id).await;
        let now = self.clock.now();

        let reservation = {
            let mut state = self.store.write().await;
            let reservation = state
                .reservations
                .get_mut(&id)
                .ok_or(DomainError::ReservationNotFound(id))?;

            self.ensure_owner_or_override(reservation, actor)?;
            if reservation.status != ReservationStatus::UnderNegotiation {
                return Err(DomainError::ReservationTransition {
                    id,
                    status: reservation.status,
                    attempted: "confirmed",
                });
            }

            reservation.status = ReservationStatus::Confirmed;
            reservation.confirmed_at = Some(now);
            reservation.clone()
        };
        drop(unit_guard);

        tracing::info!(reservation_id = %id, unit_id = %unit_id, "Reservation confirmed");

        effects::render_voucher(&self.voucher, &reservation.snapshot).await;
        effects::dispatch(
            &self.fanout,
            Notification::new(
                vec![Recipient::Agent {
                    agent_id: reservation.requested_by,
                }],
                format!(
                    "Reservation for unit {} confirmed",
                    reservation.snapshot.unit_number
                ),
                DomainEvent::ReservationConfirmed {
                    reservation_id: id,
                    unit_id,
                },
            ),
        )
        .await;

        Ok(reservation)
    }

    /// Cancels an active reservation and releases its claim.
    ///
    /// When no other active reservation remains on the unit and the unit
    /// is still reserved (not sold), the unit reverts to available and the
    /// head of its waiting list is told the unit freed up.
    ///
    /// # Errors
    ///
    /// [`DomainError::ReservationNotFound`] for an unknown id,
    /// [`DomainError::NotReservationOwner`] for a foreign actor, and
    /// [`DomainError::ReservationTransition`] when the reservation is
    /// already cancelled.
    pub async fn cancel(
        &self,
        id: ReservationId,
        reason: String,
        actor: &Actor,
    ) -> Result<Reservation, DomainError> {
        let unit_id = self
            .store
            .reservation(id)
            .await
            .ok_or(DomainError::ReservationNotFound(id))?
            .unit_id;

        let unit_guard = self.store.lock_unit(unit_id).await;
        let now = self.clock.now();

        let (reservation, freed, head_agent) = {
            let mut state = self.store.write().await;
            let reservation = state
                .reservations
                .get_mut(&id)
                .ok_or(DomainError::ReservationNotFound(id))?;

            self.ensure_owner_or_override(reservation, actor)?;
            if !reservation.is_active() {
                return Err(DomainError::ReservationTransition {
                    id,
                    status: reservation.status,
                    attempted: "cancelled",
                });
            }

            reservation.status = ReservationStatus::Cancelled;
            reservation.cancelled_at = Some(now);
            reservation.cancellation_reason = Some(reason.clone());
            let reservation = reservation.clone();

            // A sold unit keeps its status; the sale outlives the claim
            let freed = state.active_reservation_for(unit_id).is_none()
                && state
                    .units
                    .get(&unit_id)
                    .is_some_and(|unit| unit.status == UnitStatus::Reserved);

            let mut head_agent = None;
            if freed {
                state.set_unit_status(unit_id, UnitStatus::Available);
                head_agent = state
                    .active_waiting_entries_for(unit_id, now)
                    .first()
                    .map(|entry| entry.created_by);
            }

            (reservation, freed, head_agent)
        };
        drop(unit_guard);

        tracing::info!(
            reservation_id = %id,
            unit_id = %unit_id,
            freed,
            "Reservation cancelled"
        );

        effects::dispatch(
            &self.fanout,
            Notification::new(
                vec![Recipient::Agent {
                    agent_id: reservation.requested_by,
                }],
                format!(
                    "Reservation for unit {} cancelled: {reason}",
                    reservation.snapshot.unit_number
                ),
                DomainEvent::ReservationCancelled {
                    reservation_id: id,
                    unit_id,
                    reason,
                },
            ),
        )
        .await;

        if freed {
            let recipients = head_agent
                .map(|agent_id| vec![Recipient::Agent { agent_id }])
                .unwrap_or_default();
            effects::dispatch(
                &self.fanout,
                Notification::new(
                    recipients,
                    format!(
                        "Unit {} is available again",
                        reservation.snapshot.unit_number
                    ),
                    DomainEvent::UnitFreed { unit_id },
                ),
            )
            .await;
        }

        Ok(reservation)
    }

    fn ensure_owner_or_override(
        &self,
        reservation: &Reservation,
        actor: &Actor,
    ) -> Result<(), DomainError> {
        if reservation.requested_by == actor.agent_id
            || self
                .access
                .allows(actor, Capability::OverrideReservationOwnership)
        {
            Ok(())
        } else {
            Err(DomainError::NotReservationOwner { id: reservation.id })
        }
    }

    fn validate(request: &CreateReservation) -> Result<(), DomainError> {
        if request.client.name.trim().is_empty() || request.client.phone.trim().is_empty() {
            return Err(DomainError::MissingClientContact);
        }
        match (request.kind, request.proposed_price) {
            (ReservationKind::Negotiation, None)
            | (ReservationKind::ConfirmedReservation, Some(_)) => {
                Err(DomainError::ProposedPriceMismatch)
            }
            _ => Ok(()),
        }
    }
}
