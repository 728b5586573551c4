//! Domain events and the notification fan-out boundary.
//!
//! Services emit a [`DomainEvent`] for every state change that outside
//! parties care about, wrapped in a [`Notification`] naming who should hear
//! about it. Delivery is at-least-once and unordered; the transport behind
//! [`NotificationFanout`] is not the engine's concern.

use crate::types::{
    AgentId, ApprovalId, CommissionId, DistributionId, EntryId, Money, ReservationId, UnitId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Domain events
// ============================================================================

/// Everything that happened in the engine worth telling someone about
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A unit gained an active claim
    UnitReserved {
        /// The claimed unit
        unit_id: UnitId,
        /// The claiming reservation
        reservation_id: ReservationId,
        /// The agent who placed the claim
        requested_by: AgentId,
    },

    /// A reservation moved to `Confirmed`
    ReservationConfirmed {
        /// The confirmed reservation
        reservation_id: ReservationId,
        /// Its unit
        unit_id: UnitId,
    },

    /// A reservation was cancelled
    ReservationCancelled {
        /// The cancelled reservation
        reservation_id: ReservationId,
        /// Its unit
        unit_id: UnitId,
        /// The recorded cancellation reason
        reason: String,
    },

    /// A price negotiation was opened and awaits a manager response
    NegotiationRequested {
        /// The new approval record
        approval_id: ApprovalId,
        /// The owning reservation
        reservation_id: ReservationId,
        /// The unit under negotiation
        unit_id: UnitId,
        /// The agent requesting the discount
        requested_by: AgentId,
        /// List price at request time
        original_price: Money,
        /// Proposed selling price
        proposed_price: Money,
        /// Hard response deadline
        deadline: DateTime<Utc>,
    },

    /// A manager approved a negotiation
    NegotiationApproved {
        /// The approval record
        approval_id: ApprovalId,
        /// The owning reservation, now confirmed
        reservation_id: ReservationId,
        /// The responding manager
        responded_by: AgentId,
    },

    /// A manager rejected a negotiation
    NegotiationRejected {
        /// The approval record
        approval_id: ApprovalId,
        /// The owning reservation, still under negotiation
        reservation_id: ReservationId,
        /// The responding manager
        responded_by: AgentId,
        /// The rejection reason
        reason: String,
    },

    /// A negotiation lapsed past its deadline without a response
    NegotiationExpired {
        /// The approval record
        approval_id: ApprovalId,
        /// The owning reservation
        reservation_id: ReservationId,
        /// The missed deadline
        deadline: DateTime<Utc>,
    },

    /// A unit lost its last active claim and is available again
    UnitFreed {
        /// The freed unit
        unit_id: UnitId,
    },

    /// A commission was computed for a sold unit
    CommissionCreated {
        /// The new commission
        commission_id: CommissionId,
        /// The sold unit
        unit_id: UnitId,
        /// Distributable net amount
        net_amount: Money,
    },

    /// A commission locked after all distributions resolved
    CommissionApproved {
        /// The approved commission
        commission_id: CommissionId,
    },

    /// A commission and its approved distributions were paid out
    CommissionPaid {
        /// The paid commission
        commission_id: CommissionId,
    },

    /// A recipient share was added to a commission
    DistributionAdded {
        /// The new distribution
        distribution_id: DistributionId,
        /// Its commission
        commission_id: CommissionId,
        /// The snapshot share amount
        amount: Money,
    },

    /// A recipient accepted their share
    DistributionApproved {
        /// The distribution
        distribution_id: DistributionId,
        /// Its commission
        commission_id: CommissionId,
    },

    /// A recipient declined their share
    DistributionRejected {
        /// The distribution
        distribution_id: DistributionId,
        /// Its commission
        commission_id: CommissionId,
    },

    /// A client joined a unit's waiting list
    WaitingListJoined {
        /// The new entry
        entry_id: EntryId,
        /// The unit waited on
        unit_id: UnitId,
        /// Queue priority
        priority: i32,
    },

    /// A waiting entry became a reservation
    WaitingListConverted {
        /// The converted entry
        entry_id: EntryId,
        /// The unit
        unit_id: UnitId,
        /// The resulting reservation
        reservation_id: ReservationId,
    },

    /// A waiting entry lapsed past its expiry
    WaitingListExpired {
        /// The expired entry
        entry_id: EntryId,
        /// The unit
        unit_id: UnitId,
    },
}

impl DomainEvent {
    /// Stable event type identifier for logs and routing
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::UnitReserved { .. } => "unit_reserved",
            Self::ReservationConfirmed { .. } => "reservation_confirmed",
            Self::ReservationCancelled { .. } => "reservation_cancelled",
            Self::NegotiationRequested { .. } => "negotiation_requested",
            Self::NegotiationApproved { .. } => "negotiation_approved",
            Self::NegotiationRejected { .. } => "negotiation_rejected",
            Self::NegotiationExpired { .. } => "negotiation_expired",
            Self::UnitFreed { .. } => "unit_freed",
            Self::CommissionCreated { .. } => "commission_created",
            Self::CommissionApproved { .. } => "commission_approved",
            Self::CommissionPaid { .. } => "commission_paid",
            Self::DistributionAdded { .. } => "distribution_added",
            Self::DistributionApproved { .. } => "distribution_approved",
            Self::DistributionRejected { .. } => "distribution_rejected",
            Self::WaitingListJoined { .. } => "waiting_list_joined",
            Self::WaitingListConverted { .. } => "waiting_list_converted",
            Self::WaitingListExpired { .. } => "waiting_list_expired",
        }
    }
}

// ============================================================================
// Notifications
// ============================================================================

/// Who a notification is addressed to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recipient {
    /// A specific agent
    Agent {
        /// The addressed agent
        agent_id: AgentId,
    },
    /// Everyone holding an observer role
    Role {
        /// The addressed role
        role: ObserverRole,
    },
}

/// Named observer groups that follow workflow outcomes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObserverRole {
    /// Managers who respond to negotiation requests
    NegotiationApprovers,
    /// Credit department staff observing negotiation outcomes
    CreditDepartment,
}

/// A message for the fan-out, carrying its originating event as context
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Who should receive the message
    pub recipients: Vec<Recipient>,
    /// Human-readable message body
    pub message: String,
    /// The event that triggered the notification
    pub context: DomainEvent,
}

impl Notification {
    /// Creates a new `Notification`
    #[must_use]
    pub const fn new(recipients: Vec<Recipient>, message: String, context: DomainEvent) -> Self {
        Self {
            recipients,
            message,
            context,
        }
    }
}

/// Errors from the notification fan-out collaborator
#[derive(Debug, Error)]
pub enum FanoutError {
    /// The transport failed to accept the notification
    #[error("failed to dispatch notification: {0}")]
    DispatchFailed(String),
}

/// Delivers notifications to interested parties.
///
/// Best-effort: the engine logs a delivery failure and moves on. Delivery
/// is at-least-once with no ordering guarantee.
#[async_trait]
pub trait NotificationFanout: Send + Sync {
    /// Dispatches one notification to its recipients.
    ///
    /// # Errors
    ///
    /// Returns [`FanoutError`] when the transport rejects the
    /// notification; callers log and continue.
    async fn notify(&self, notification: Notification) -> Result<(), FanoutError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_snake_case_tags() {
        let event = DomainEvent::UnitFreed {
            unit_id: UnitId::new(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "unit_freed");
        assert_eq!(event.event_type(), "unit_freed");
    }

    #[test]
    fn notification_round_trips_through_json() {
        let notification = Notification::new(
            vec![Recipient::Role {
                role: ObserverRole::CreditDepartment,
            }],
            "negotiation expired".to_string(),
            DomainEvent::NegotiationExpired {
                approval_id: ApprovalId::new(),
                reservation_id: ReservationId::new(),
                deadline: Utc::now(),
            },
        );
        let json = serde_json::to_string(&notification).unwrap();
        let back: Notification = serde_json::from_str(&json).unwrap();
        assert_eq!(back, notification);
    }
}
