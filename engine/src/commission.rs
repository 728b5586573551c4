//! Commission computation and distribution.
//!
//! A commission is created once per sold unit from a confirmed
//! reservation. Derived figures follow fixed formulas on fixed-point
//! decimals:
//!
//! ```text
//! total_amount = final_selling_price × percentage / 100
//! vat          = total_amount × vat_rate / 100
//! net_amount   = total_amount + vat − marketing_expenses − bank_fees
//! ```
//!
//! Distribution amounts are snapshots of `net_amount × percentage / 100`
//! taken at write time; an expense update recomputes the net and every
//! distribution amount in the same transaction, so the rows never disagree
//! with their commission. Approval is gated on every distribution having
//! been responded to, and percentages are deliberately not forced to sum
//! to 100 on write; the split helpers report the sum on demand.

use crate::config::CommissionConfig;
use crate::effects;
use crate::store::EngineStore;
use brokerage_core::environment::{AccessPolicy, Actor, Capability, Clock};
use brokerage_core::error::DomainError;
use brokerage_core::events::{DomainEvent, Notification, NotificationFanout, Recipient};
use brokerage_core::types::{
    Commission, CommissionDistribution, CommissionId, CommissionSource, CommissionStatus,
    DistributionId, DistributionKind, DistributionRecipient, DistributionStatus, Money,
    Percentage, ReservationId, ReservationStatus, UnitId, UnitStatus,
};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Input for [`CommissionService::create`]
#[derive(Clone, Debug)]
pub struct CreateCommission {
    /// The sold unit
    pub unit_id: UnitId,
    /// The confirmed reservation the sale closed under
    pub reservation_id: ReservationId,
    /// Final selling price the commission is computed from
    pub final_selling_price: Money,
    /// Commission percentage
    pub percentage: Percentage,
    /// Sales channel that produced the sale
    pub source: CommissionSource,
}

/// A recipient's answer to their proposed share
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DistributionResponse {
    /// Accept the share
    Approve,
    /// Decline the share
    Reject,
}

/// Commission lifecycle and distribution operations
pub struct CommissionService {
    store: Arc<EngineStore>,
    config: CommissionConfig,
    clock: Arc<dyn Clock>,
    fanout: Arc<dyn NotificationFanout>,
    access: Arc<dyn AccessPolicy>,
}

impl CommissionService {
    /// Create a new commission service
    #[must_use]
    pub fn new(
        store: Arc<EngineStore>,
        config: CommissionConfig,
        clock: Arc<dyn Clock>,
        fanout: Arc<dyn NotificationFanout>,
        access: Arc<dyn AccessPolicy>,
    ) -> Self {
        Self {
            store,
            config,
            clock,
            fanout,
            access,
        }
    }

    /// Records the commission for a completed sale and marks the unit sold.
    ///
    /// # Errors
    ///
    /// [`DomainError::CapabilityDenied`] without
    /// [`Capability::ManageCommissions`],
    /// [`DomainError::CommissionAlreadyExists`] when the unit already has
    /// one, [`DomainError::NoConfirmedReservation`] unless the referenced
    /// reservation is confirmed on this unit, and
    /// [`DomainError::CommissionBelowMinimum`] when the computed net falls
    /// under the configured floor.
    pub async fn create(
        &self,
        request: CreateCommission,
        actor: &Actor,
    ) -> Result<Commission, DomainError> {
        self.ensure_can_manage(actor)?;

        let unit_guard = self.store.lock_unit(request.unit_id).await;
        let now = self.clock.now();

        let (commission, requested_by) = {
            let mut state = self.store.write().await;

            if !state.units.contains_key(&request.unit_id) {
                return Err(DomainError::UnitNotFound(request.unit_id));
            }
            if let Some(existing) = state.commission_for_unit(request.unit_id) {
                return Err(DomainError::CommissionAlreadyExists {
                    unit_id: request.unit_id,
                    existing: existing.id,
                });
            }

            let reservation = state
                .reservations
                .get(&request.reservation_id)
                .ok_or(DomainError::ReservationNotFound(request.reservation_id))?;
            if reservation.unit_id != request.unit_id
                || reservation.status != ReservationStatus::Confirmed
            {
                return Err(DomainError::NoConfirmedReservation {
                    unit_id: request.unit_id,
                });
            }
            let requested_by = reservation.requested_by;

            let total_amount = request
                .final_selling_price
                .checked_share(request.percentage)
                .ok_or(DomainError::AmountOverflow)?;
            let vat = total_amount
                .checked_share(self.config.vat_rate()?)
                .ok_or(DomainError::AmountOverflow)?;
            let net_amount = total_amount
                .checked_add(vat)
                .ok_or(DomainError::AmountOverflow)?;

            let minimum = self.config.minimum_net();
            if net_amount < minimum {
                return Err(DomainError::CommissionBelowMinimum {
                    net: net_amount,
                    minimum,
                });
            }

            let commission = Commission {
                id: CommissionId::new(),
                unit_id: request.unit_id,
                reservation_id: request.reservation_id,
                final_selling_price: request.final_selling_price,
                percentage: request.percentage,
                total_amount,
                vat,
                marketing_expenses: Money::ZERO,
                bank_fees: Money::ZERO,
                net_amount,
                status: CommissionStatus::Pending,
                source: request.source,
                created_at: now,
            };
            state.commissions.insert(commission.id, commission.clone());
            state.set_unit_status(request.unit_id, UnitStatus::Sold);

            (commission, requested_by)
        };
        drop(unit_guard);

        tracing::info!(
            commission_id = %commission.id,
            unit_id = %commission.unit_id,
            total = %commission.total_amount,
            net = %commission.net_amount,
            source = ?commission.source,
            "Commission created"
        );

        effects::dispatch(
            &self.fanout,
            Notification::new(
                vec![Recipient::Agent {
                    agent_id: requested_by,
                }],
                format!(
                    "Commission of {} recorded for your sale",
                    commission.net_amount
                ),
                DomainEvent::CommissionCreated {
                    commission_id: commission.id,
                    unit_id: commission.unit_id,
                    net_amount: commission.net_amount,
                },
            ),
        )
        .await;

        Ok(commission)
    }

    /// Adds a recipient share to an open commission.
    ///
    /// The amount snapshot derives from the commission's current net; it
    /// is rewritten if expenses later change.
    ///
    /// # Errors
    ///
    /// [`DomainError::CapabilityDenied`] without
    /// [`Capability::ManageCommissions`],
    /// [`DomainError::CommissionNotFound`] for an unknown id,
    /// [`DomainError::CommissionTransition`] once the commission left
    /// `Pending`, and [`DomainError::MissingRecipient`] when neither an
    /// internal agent nor an external party is named.
    pub async fn add_distribution(
        &self,
        commission_id: CommissionId,
        kind: DistributionKind,
        percentage: Percentage,
        recipient: DistributionRecipient,
        actor: &Actor,
    ) -> Result<CommissionDistribution, DomainError> {
        self.ensure_can_manage(actor)?;

        if !recipient.is_specified() {
            return Err(DomainError::MissingRecipient);
        }

        let now = self.clock.now();

        let distribution = {
            let mut state = self.store.write().await;

            let commission = state
                .commissions
                .get(&commission_id)
                .ok_or(DomainError::CommissionNotFound(commission_id))?;
            if commission.status != CommissionStatus::Pending {
                return Err(DomainError::CommissionTransition {
                    id: commission_id,
                    status: commission.status,
                    attempted: "modified",
                });
            }

            let amount = commission
                .net_amount
                .checked_share(percentage)
                .ok_or(DomainError::AmountOverflow)?;

            let distribution = CommissionDistribution {
                id: DistributionId::new(),
                commission_id,
                recipient,
                kind,
                percentage,
                amount,
                status: DistributionStatus::Pending,
                created_at: now,
            };
            state
                .distributions
                .insert(distribution.id, distribution.clone());
            distribution
        };

        tracing::info!(
            distribution_id = %distribution.id,
            commission_id = %commission_id,
            kind = ?distribution.kind,
            percentage = %distribution.percentage,
            amount = %distribution.amount,
            "Distribution added"
        );

        let recipients = distribution
            .recipient
            .agent_id
            .map(|agent_id| vec![Recipient::Agent { agent_id }])
            .unwrap_or_default();
        effects::dispatch(
            &self.fanout,
            Notification::new(
                recipients,
                format!(
                    "You were allocated {} ({}) of a commission",
                    distribution.amount, distribution.percentage
                ),
                DomainEvent::DistributionAdded {
                    distribution_id: distribution.id,
                    commission_id,
                    amount: distribution.amount,
                },
            ),
        )
        .await;

        Ok(distribution)
    }

    /// Updates the expense deductions on an open commission.
    ///
    /// Recomputes the net amount and rewrites every distribution amount
    /// under the same write guard, so concurrent reads never observe a net
    /// that disagrees with its shares.
    ///
    /// # Errors
    ///
    /// [`DomainError::CapabilityDenied`] without
    /// [`Capability::ManageCommissions`],
    /// [`DomainError::CommissionNotFound`] for an unknown id,
    /// [`DomainError::CommissionTransition`] once the commission left
    /// `Pending`, and [`DomainError::ExpensesExceedTotal`] when the
    /// combined expenses exceed the gross commission.
    pub async fn update_expenses(
        &self,
        commission_id: CommissionId,
        marketing_expenses: Money,
        bank_fees: Money,
        actor: &Actor,
    ) -> Result<Commission, DomainError> {
        self.ensure_can_manage(actor)?;

        let commission = {
            let mut state = self.store.write().await;

            let commission = state
                .commissions
                .get(&commission_id)
                .ok_or(DomainError::CommissionNotFound(commission_id))?;
            if commission.status != CommissionStatus::Pending {
                return Err(DomainError::CommissionTransition {
                    id: commission_id,
                    status: commission.status,
                    attempted: "modified",
                });
            }

            let expenses = marketing_expenses
                .checked_add(bank_fees)
                .ok_or(DomainError::AmountOverflow)?;
            if expenses > commission.total_amount {
                return Err(DomainError::ExpensesExceedTotal {
                    expenses,
                    total: commission.total_amount,
                });
            }

            let net_amount = commission
                .total_amount
                .checked_add(commission.vat)
                .and_then(|gross| gross.checked_sub(marketing_expenses))
                .and_then(|rest| rest.checked_sub(bank_fees))
                .ok_or(DomainError::AmountOverflow)?;

            // Compute every new share before touching state so a failure
            // leaves nothing half-written
            let reamounts: Vec<(DistributionId, Money)> = state
                .distributions_of(commission_id)
                .into_iter()
                .map(|distribution| {
                    net_amount
                        .checked_share(distribution.percentage)
                        .map(|amount| (distribution.id, amount))
                        .ok_or(DomainError::AmountOverflow)
                })
                .collect::<Result<_, _>>()?;

            let commission = state
                .commissions
                .get_mut(&commission_id)
                .ok_or(DomainError::CommissionNotFound(commission_id))?;
            commission.marketing_expenses = marketing_expenses;
            commission.bank_fees = bank_fees;
            commission.net_amount = net_amount;
            let commission = commission.clone();

            for (distribution_id, amount) in reamounts {
                if let Some(distribution) = state.distributions.get_mut(&distribution_id) {
                    distribution.amount = amount;
                }
            }

            commission
        };

        tracing::info!(
            commission_id = %commission_id,
            marketing = %commission.marketing_expenses,
            bank_fees = %commission.bank_fees,
            net = %commission.net_amount,
            "Commission expenses updated"
        );

        Ok(commission)
    }

    /// Locks a commission once every distribution has been responded to.
    ///
    /// # Errors
    ///
    /// [`DomainError::CapabilityDenied`] without
    /// [`Capability::ManageCommissions`],
    /// [`DomainError::CommissionNotFound`] for an unknown id,
    /// [`DomainError::CommissionTransition`] unless the commission is
    /// `Pending`, and [`DomainError::PendingDistributionsExist`] while any
    /// share still awaits a response.
    pub async fn approve(
        &self,
        commission_id: CommissionId,
        actor: &Actor,
    ) -> Result<Commission, DomainError> {
        self.ensure_can_manage(actor)?;

        let (commission, recipients) = {
            let mut state = self.store.write().await;

            let commission = state
                .commissions
                .get(&commission_id)
                .ok_or(DomainError::CommissionNotFound(commission_id))?;
            if commission.status != CommissionStatus::Pending {
                return Err(DomainError::CommissionTransition {
                    id: commission_id,
                    status: commission.status,
                    attempted: "approved",
                });
            }

            let pending = state
                .distributions_of(commission_id)
                .iter()
                .filter(|distribution| distribution.status == DistributionStatus::Pending)
                .count();
            if pending > 0 {
                return Err(DomainError::PendingDistributionsExist {
                    id: commission_id,
                    pending,
                });
            }

            let recipients: Vec<Recipient> = state
                .distributions_of(commission_id)
                .into_iter()
                .filter(|distribution| distribution.status == DistributionStatus::Approved)
                .filter_map(|distribution| distribution.recipient.agent_id)
                .map(|agent_id| Recipient::Agent { agent_id })
                .collect();

            let commission = state
                .commissions
                .get_mut(&commission_id)
                .ok_or(DomainError::CommissionNotFound(commission_id))?;
            commission.status = CommissionStatus::Approved;
            (commission.clone(), recipients)
        };

        tracing::info!(commission_id = %commission_id, "Commission approved");

        effects::dispatch(
            &self.fanout,
            Notification::new(
                recipients,
                format!(
                    "Commission of {} approved for payout",
                    commission.net_amount
                ),
                DomainEvent::CommissionApproved { commission_id },
            ),
        )
        .await;

        Ok(commission)
    }

    /// Pays out an approved commission, cascading to its approved shares.
    ///
    /// # Errors
    ///
    /// [`DomainError::CapabilityDenied`] without
    /// [`Capability::ManageCommissions`],
    /// [`DomainError::CommissionNotFound`] for an unknown id, and
    /// [`DomainError::CommissionTransition`] unless the commission is
    /// `Approved`.
    pub async fn mark_paid(
        &self,
        commission_id: CommissionId,
        actor: &Actor,
    ) -> Result<Commission, DomainError> {
        self.ensure_can_manage(actor)?;

        let (commission, recipients) = {
            let mut state = self.store.write().await;

            let status = state
                .commissions
                .get(&commission_id)
                .ok_or(DomainError::CommissionNotFound(commission_id))?
                .status;
            if status != CommissionStatus::Approved {
                return Err(DomainError::CommissionTransition {
                    id: commission_id,
                    status,
                    attempted: "paid",
                });
            }

            let paid_ids: Vec<DistributionId> = state
                .distributions_of(commission_id)
                .into_iter()
                .filter(|distribution| distribution.status == DistributionStatus::Approved)
                .map(|distribution| distribution.id)
                .collect();

            let mut recipients = Vec::new();
            for distribution_id in paid_ids {
                if let Some(distribution) = state.distributions.get_mut(&distribution_id) {
                    distribution.status = DistributionStatus::Paid;
                    if let Some(agent_id) = distribution.recipient.agent_id {
                        recipients.push(Recipient::Agent { agent_id });
                    }
                }
            }

            let commission = state
                .commissions
                .get_mut(&commission_id)
                .ok_or(DomainError::CommissionNotFound(commission_id))?;
            commission.status = CommissionStatus::Paid;
            (commission.clone(), recipients)
        };

        tracing::info!(commission_id = %commission_id, "Commission paid");

        effects::dispatch(
            &self.fanout,
            Notification::new(
                recipients,
                "Your commission share has been paid out".to_string(),
                DomainEvent::CommissionPaid { commission_id },
            ),
        )
        .await;

        Ok(commission)
    }

    /// Records a recipient's response to their pending share.
    ///
    /// The internal recipient may respond for themselves; anyone else
    /// needs [`Capability::ManageCommissions`] (external recipients answer
    /// through staff).
    ///
    /// # Errors
    ///
    /// [`DomainError::DistributionNotFound`] for an unknown id,
    /// [`DomainError::CapabilityDenied`] for a foreign actor without the
    /// capability, and [`DomainError::DistributionTransition`] once the
    /// share has already been responded to.
    pub async fn respond_to_distribution(
        &self,
        distribution_id: DistributionId,
        response: DistributionResponse,
        actor: &Actor,
    ) -> Result<CommissionDistribution, DomainError> {
        let distribution = {
            let mut state = self.store.write().await;

            let distribution = state
                .distributions
                .get(&distribution_id)
                .ok_or(DomainError::DistributionNotFound(distribution_id))?;

            let is_recipient = distribution.recipient.agent_id == Some(actor.agent_id);
            if !is_recipient && !self.access.allows(actor, Capability::ManageCommissions) {
                return Err(DomainError::CapabilityDenied {
                    capability: Capability::ManageCommissions,
                });
            }
            if distribution.status != DistributionStatus::Pending {
                return Err(DomainError::DistributionTransition {
                    id: distribution_id,
                    status: distribution.status,
                    attempted: "responded to",
                });
            }

            let distribution = state
                .distributions
                .get_mut(&distribution_id)
                .ok_or(DomainError::DistributionNotFound(distribution_id))?;
            distribution.status = match response {
                DistributionResponse::Approve => DistributionStatus::Approved,
                DistributionResponse::Reject => DistributionStatus::Rejected,
            };
            distribution.clone()
        };

        tracing::info!(
            distribution_id = %distribution_id,
            commission_id = %distribution.commission_id,
            response = ?response,
            "Distribution response recorded"
        );

        let event = match response {
            DistributionResponse::Approve => DomainEvent::DistributionApproved {
                distribution_id,
                commission_id: distribution.commission_id,
            },
            DistributionResponse::Reject => DomainEvent::DistributionRejected {
                distribution_id,
                commission_id: distribution.commission_id,
            },
        };
        let message = match response {
            DistributionResponse::Approve => "Distribution share accepted",
            DistributionResponse::Reject => "Distribution share declined",
        };
        let recipients = distribution
            .recipient
            .agent_id
            .map(|agent_id| vec![Recipient::Agent { agent_id }])
            .unwrap_or_default();
        effects::dispatch(
            &self.fanout,
            Notification::new(recipients, message.to_string(), event),
        )
        .await;

        Ok(distribution)
    }

    /// Sum of the distribution percentages counted toward the split.
    ///
    /// Rejected shares do not count; the sum may exceed 100, which is why
    /// this returns a plain decimal.
    ///
    /// # Errors
    ///
    /// [`DomainError::CommissionNotFound`] for an unknown id.
    pub async fn distribution_percentage_total(
        &self,
        commission_id: CommissionId,
    ) -> Result<Decimal, DomainError> {
        let state = self.store.read().await;
        if !state.commissions.contains_key(&commission_id) {
            return Err(DomainError::CommissionNotFound(commission_id));
        }
        Ok(state
            .distributions_of(commission_id)
            .into_iter()
            .filter(|distribution| distribution.status != DistributionStatus::Rejected)
            .map(|distribution| distribution.percentage.value())
            .sum())
    }

    /// Whether the counted shares split exactly 100% of the net.
    ///
    /// Storage is deliberately permissive; this check runs on demand only.
    ///
    /// # Errors
    ///
    /// [`DomainError::CommissionNotFound`] for an unknown id.
    pub async fn validate_distribution_split(
        &self,
        commission_id: CommissionId,
    ) -> Result<bool, DomainError> {
        let total = self.distribution_percentage_total(commission_id).await?;
        Ok(total == Percentage::FULL.value())
    }

    fn ensure_can_manage(&self, actor: &Actor) -> Result<(), DomainError> {
        if self.access.allows(actor, Capability::ManageCommissions) {
            Ok(())
        } else {
            Err(DomainError::CapabilityDenied {
                capability: Capability::ManageCommissions,
            })
        }
    }
}
