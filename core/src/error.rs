//! Typed error taxonomy shared by every engine service.
//!
//! Each variant carries the structured context a caller needs to react;
//! [`DomainError::kind`] collapses the variants into the coarse classes an
//! outer layer (HTTP, CLI, scheduler) would map onto its own status codes.

use crate::types::{
    ApprovalId, ApprovalStatus, CommissionId, CommissionStatus, DistributionId,
    DistributionStatus, EntryId, EntryStatus, ReservationId, ReservationStatus, UnitId,
    UnitStatus,
};
use rust_decimal::Decimal;
use thiserror::Error;

/// Coarse classification of a [`DomainError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The referenced entity does not exist
    NotFound,
    /// A uniqueness or exclusivity rule was violated
    Conflict,
    /// The entity is not in a state that permits the transition
    InvalidTransition,
    /// The input failed validation
    ValidationFailed,
    /// The acting user lacks the required capability
    Forbidden,
    /// A required precondition on related state does not hold
    PreconditionFailed,
}

/// Errors produced by the reservation, negotiation, commission and
/// waiting-list services.
#[derive(Debug, Error, PartialEq)]
pub enum DomainError {
    // ── Not found ───────────────────────────────────────────────────────

    /// No unit with this id is registered
    #[error("unit {0} not found")]
    UnitNotFound(UnitId),

    /// No reservation with this id exists
    #[error("reservation {0} not found")]
    ReservationNotFound(ReservationId),

    /// No negotiation approval with this id exists
    #[error("negotiation approval {0} not found")]
    ApprovalNotFound(ApprovalId),

    /// No commission with this id exists
    #[error("commission {0} not found")]
    CommissionNotFound(CommissionId),

    /// No distribution with this id exists
    #[error("distribution {0} not found")]
    DistributionNotFound(DistributionId),

    /// No waiting-list entry with this id exists
    #[error("waiting list entry {0} not found")]
    EntryNotFound(EntryId),

    // ── Conflicts ───────────────────────────────────────────────────────

    /// Another active reservation already claims the unit
    #[error("unit {unit_id} already has an active reservation {existing}")]
    UnitAlreadyReserved {
        /// The contested unit
        unit_id: UnitId,
        /// The reservation holding the claim
        existing: ReservationId,
    },

    /// A unit with this id is already registered
    #[error("unit {0} is already registered")]
    UnitAlreadyRegistered(UnitId),

    /// A commission already exists for the unit
    #[error("unit {unit_id} already has commission {existing}")]
    CommissionAlreadyExists {
        /// The sold unit
        unit_id: UnitId,
        /// The existing commission
        existing: CommissionId,
    },

    // ── Invalid transitions ─────────────────────────────────────────────

    /// The reservation status does not permit the requested transition
    #[error("reservation {id} is {status:?} and cannot be {attempted}")]
    ReservationTransition {
        /// The reservation
        id: ReservationId,
        /// Its current status
        status: ReservationStatus,
        /// The attempted transition, e.g. "confirmed"
        attempted: &'static str,
    },

    /// The approval has already been responded to or has expired
    #[error("approval {id} is {status:?} and no longer accepts a response")]
    ApprovalNotPending {
        /// The approval
        id: ApprovalId,
        /// Its current status
        status: ApprovalStatus,
    },

    /// The approval deadline has passed; only the expiry sweep may act
    #[error("approval {id} deadline passed at {deadline}")]
    ApprovalDeadlinePassed {
        /// The approval
        id: ApprovalId,
        /// The missed deadline
        deadline: chrono::DateTime<chrono::Utc>,
    },

    /// The commission status does not permit the requested transition
    #[error("commission {id} is {status:?} and cannot be {attempted}")]
    CommissionTransition {
        /// The commission
        id: CommissionId,
        /// Its current status
        status: CommissionStatus,
        /// The attempted transition, e.g. "approved"
        attempted: &'static str,
    },

    /// The distribution status does not permit the requested transition
    #[error("distribution {id} is {status:?} and cannot be {attempted}")]
    DistributionTransition {
        /// The distribution
        id: DistributionId,
        /// Its current status
        status: DistributionStatus,
        /// The attempted transition
        attempted: &'static str,
    },

    /// The waiting-list entry is not in a state that permits the operation
    #[error("waiting list entry {id} is {status:?} and cannot be {attempted}")]
    EntryTransition {
        /// The entry
        id: EntryId,
        /// Its current status
        status: EntryStatus,
        /// The attempted transition, e.g. "converted"
        attempted: &'static str,
    },

    /// The entry's expiry passed before it could be converted
    #[error("waiting list entry {id} lapsed at {expired_at}")]
    EntryLapsed {
        /// The entry
        id: EntryId,
        /// When it lapsed
        expired_at: chrono::DateTime<chrono::Utc>,
    },

    // ── Validation ──────────────────────────────────────────────────────

    /// A percentage lies outside `[0, 100]`
    #[error("percentage {0} is outside the range [0, 100]")]
    PercentageOutOfRange(Decimal),

    /// A negotiation was requested without a proposed price, or a plain
    /// reservation carried one
    #[error("a proposed price is required for negotiations and forbidden otherwise")]
    ProposedPriceMismatch,

    /// Required client contact fields are empty
    #[error("client contact requires a name and phone number")]
    MissingClientContact,

    /// A distribution was added without any recipient
    #[error("distribution requires an internal agent or an external recipient")]
    MissingRecipient,

    /// The computed commission net falls below the configured floor
    #[error("commission net amount {net} is below the minimum {minimum}")]
    CommissionBelowMinimum {
        /// The computed net
        net: crate::types::Money,
        /// The configured floor
        minimum: crate::types::Money,
    },

    /// Expense updates may not exceed the gross commission
    #[error("expenses {expenses} exceed commission total {total}")]
    ExpensesExceedTotal {
        /// Marketing plus bank fees
        expenses: crate::types::Money,
        /// The gross commission
        total: crate::types::Money,
    },

    /// Money arithmetic overflowed or went negative
    #[error("money arithmetic overflow")]
    AmountOverflow,

    // ── Forbidden ───────────────────────────────────────────────────────

    /// The acting user lacks the capability the operation requires
    #[error("actor lacks the {capability:?} capability")]
    CapabilityDenied {
        /// The missing capability
        capability: crate::environment::Capability,
    },

    /// Only the requesting agent (or an override holder) may act on the
    /// reservation
    #[error("reservation {id} belongs to another agent")]
    NotReservationOwner {
        /// The reservation
        id: ReservationId,
    },

    // ── Preconditions ───────────────────────────────────────────────────

    /// The unit is not available for a new claim
    #[error("unit {unit_id} is {status:?}, not available")]
    UnitNotAvailable {
        /// The unit
        unit_id: UnitId,
        /// Its current status
        status: UnitStatus,
    },

    /// A commission requires a confirmed reservation on the unit
    #[error("unit {unit_id} has no confirmed reservation")]
    NoConfirmedReservation {
        /// The unit
        unit_id: UnitId,
    },

    /// Commission approval is blocked by unresolved distributions
    #[error("commission {id} has {pending} pending distribution(s)")]
    PendingDistributionsExist {
        /// The commission
        id: CommissionId,
        /// How many distributions still await a response
        pending: usize,
    },
}

impl DomainError {
    /// Classifies this error into its coarse [`ErrorKind`].
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UnitNotFound(_)
            | Self::ReservationNotFound(_)
            | Self::ApprovalNotFound(_)
            | Self::CommissionNotFound(_)
            | Self::DistributionNotFound(_)
            | Self::EntryNotFound(_) => ErrorKind::NotFound,

            Self::UnitAlreadyReserved { .. }
            | Self::UnitAlreadyRegistered(_)
            | Self::CommissionAlreadyExists { .. } => ErrorKind::Conflict,

            Self::ReservationTransition { .. }
            | Self::ApprovalNotPending { .. }
            | Self::ApprovalDeadlinePassed { .. }
            | Self::CommissionTransition { .. }
            | Self::DistributionTransition { .. }
            | Self::EntryTransition { .. }
            | Self::EntryLapsed { .. } => ErrorKind::InvalidTransition,

            Self::PercentageOutOfRange(_)
            | Self::ProposedPriceMismatch
            | Self::MissingClientContact
            | Self::MissingRecipient
            | Self::CommissionBelowMinimum { .. }
            | Self::ExpensesExceedTotal { .. }
            | Self::AmountOverflow => ErrorKind::ValidationFailed,

            Self::CapabilityDenied { .. } | Self::NotReservationOwner { .. } => {
                ErrorKind::Forbidden
            }

            Self::UnitNotAvailable { .. }
            | Self::NoConfirmedReservation { .. }
            | Self::PendingDistributionsExist { .. } => ErrorKind::PreconditionFailed,
        }
    }
}
