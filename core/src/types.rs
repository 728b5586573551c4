//! Domain types for the brokerage reservation & commission engine.
//!
//! This module contains all value objects, entities, and status enums shared
//! across the engine: sellable units, reservations with their immutable
//! snapshots, negotiation approvals, commissions with their distributions,
//! and waiting-list entries.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a sellable unit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitId(Uuid);

impl UnitId {
    /// Creates a new random `UnitId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `UnitId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UnitId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a reservation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationId(Uuid);

impl ReservationId {
    /// Creates a new random `ReservationId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `ReservationId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ReservationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a negotiation approval
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApprovalId(Uuid);

impl ApprovalId {
    /// Creates a new random `ApprovalId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `ApprovalId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ApprovalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ApprovalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a commission
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommissionId(Uuid);

impl CommissionId {
    /// Creates a new random `CommissionId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `CommissionId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CommissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CommissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a commission distribution
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DistributionId(Uuid);

impl DistributionId {
    /// Creates a new random `DistributionId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `DistributionId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DistributionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DistributionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a waiting-list entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Creates a new random `EntryId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a sales agent or staff member
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(Uuid);

impl AgentId {
    /// Creates a new random `AgentId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `AgentId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Money Value Object (fixed-point decimal to avoid floating point errors)
// ============================================================================

/// Monetary amount backed by a fixed-point decimal.
///
/// All currency fields round to 2 decimal places (half away from zero);
/// binary floating point never touches money. Amounts are non-negative:
/// subtraction that would go below zero returns `None`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Money(Decimal);

impl Money {
    /// A zero amount
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Creates a `Money` value from a decimal amount, rounded to 2 places
    #[must_use]
    pub fn new(amount: Decimal) -> Self {
        Self(round_currency(amount))
    }

    /// Creates a `Money` value from whole currency units
    #[must_use]
    pub fn from_major(units: u64) -> Self {
        Self(Decimal::from(units))
    }

    /// Returns the inner decimal amount
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Adds two amounts with overflow checking
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Subtracts an amount; `None` if the result would be negative
    #[must_use]
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        if self.0 >= other.0 {
            self.0.checked_sub(other.0).map(Self)
        } else {
            None
        }
    }

    /// Computes a percentage share of this amount, rounded to 2 places.
    ///
    /// `Money::from_major(25_000)` is `Money::from_major(1_000_000)
    /// .checked_share(Percentage::new(dec!(2.5))?)`.
    #[must_use]
    pub fn checked_share(self, percentage: Percentage) -> Option<Self> {
        let share = self
            .0
            .checked_mul(percentage.value())?
            .checked_div(Decimal::ONE_HUNDRED)?;
        Some(Self(round_currency(share)))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Rounds a decimal to 2 places, half away from zero (currency convention)
fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// A percentage constrained to the range `[0, 100]`.
///
/// Carries at least 2 decimal places of precision (e.g. `2.5`, `33.33`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Percentage(Decimal);

impl Percentage {
    /// Zero percent
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// One hundred percent
    pub const FULL: Self = Self(Decimal::ONE_HUNDRED);

    /// Creates a `Percentage`, validating the `[0, 100]` range.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::DomainError::PercentageOutOfRange`] when the
    /// value lies outside `[0, 100]`.
    pub fn new(value: Decimal) -> Result<Self, crate::error::DomainError> {
        if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
            return Err(crate::error::DomainError::PercentageOutOfRange(value));
        }
        Ok(Self(value))
    }

    /// Returns the inner decimal value
    #[must_use]
    pub const fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

// ============================================================================
// Client and Payment Value Objects
// ============================================================================

/// Contact details for the client a claim is placed for
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientContact {
    /// Client full name
    pub name: String,
    /// Client phone number
    pub phone: String,
    /// Client email, when known
    pub email: Option<String>,
}

impl ClientContact {
    /// Creates a new `ClientContact`
    #[must_use]
    pub const fn new(name: String, phone: String, email: Option<String>) -> Self {
        Self { name, phone, email }
    }
}

/// How the client intends to pay
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Full amount up front
    Cash,
    /// Installment plan
    Installments {
        /// Number of monthly installments
        months: u32,
    },
    /// Bank transfer against an external mortgage or facility
    BankTransfer,
}

/// Payment terms recorded on a reservation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTerms {
    /// Payment method
    pub method: PaymentMethod,
    /// Down payment collected at reservation time
    pub down_payment: Money,
    /// Free-form payment notes
    pub notes: Option<String>,
}

impl PaymentTerms {
    /// Creates new `PaymentTerms`
    #[must_use]
    pub const fn new(method: PaymentMethod, down_payment: Money, notes: Option<String>) -> Self {
        Self {
            method,
            down_payment,
            notes,
        }
    }
}

// ============================================================================
// Unit
// ============================================================================

/// A sellable inventory unit (apartment, villa, retail space) tied to a project
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    /// Unique unit identifier
    pub id: UnitId,
    /// Name of the project the unit belongs to
    pub project_name: String,
    /// Human-facing unit number within the project (e.g. "B-204")
    pub unit_number: String,
    /// List price
    pub price: Money,
    /// Unit area in square meters
    pub area_sqm: Decimal,
    /// Current availability status
    pub status: UnitStatus,
    /// When the unit was registered
    pub created_at: DateTime<Utc>,
}

impl Unit {
    /// Creates a new available `Unit`
    #[must_use]
    pub const fn new(
        id: UnitId,
        project_name: String,
        unit_number: String,
        price: Money,
        area_sqm: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            project_name,
            unit_number,
            price,
            area_sqm,
            status: UnitStatus::Available,
            created_at,
        }
    }

    /// Checks whether the unit can accept a new claim
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.status == UnitStatus::Available
    }
}

/// Unit availability status.
///
/// Units are never deleted, only transitioned. Only the reservation state
/// machine mutates this field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitStatus {
    /// Open for reservation
    Available,
    /// Claimed by an active reservation
    Reserved,
    /// Sale completed; a commission exists for the unit
    Sold,
}

// ============================================================================
// Reservation
// ============================================================================

/// A claim placed by a sales agent on a unit on behalf of a client
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    /// Unique reservation identifier
    pub id: ReservationId,
    /// Unit being claimed
    pub unit_id: UnitId,
    /// Sales agent who placed the claim
    pub requested_by: AgentId,
    /// Whether the claim was made at list price or with a negotiated price
    pub kind: ReservationKind,
    /// Current reservation status
    pub status: ReservationStatus,
    /// Client the claim is placed for
    pub client: ClientContact,
    /// Agreed payment terms
    pub payment: PaymentTerms,
    /// Immutable snapshot captured at creation; never recomputed
    pub snapshot: ReservationSnapshot,
    /// When the reservation was created
    pub created_at: DateTime<Utc>,
    /// When the reservation was confirmed, if it was
    pub confirmed_at: Option<DateTime<Utc>>,
    /// When the reservation was cancelled, if it was
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Why the reservation was cancelled, if it was
    pub cancellation_reason: Option<String>,
}

impl Reservation {
    /// Checks whether this reservation currently claims its unit.
    ///
    /// A unit has at most one active claim at any instant; this predicate
    /// defines "active".
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            ReservationStatus::UnderNegotiation | ReservationStatus::Confirmed
        )
    }
}

/// Reservation lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationStatus {
    /// Awaiting manager sign-off on a negotiated price
    UnderNegotiation,
    /// Claim confirmed
    Confirmed,
    /// Claim released; terminal
    Cancelled,
}

/// Reservation type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationKind {
    /// Reservation at list price, confirmed immediately
    ConfirmedReservation,
    /// Price-negotiated reservation requiring manager approval
    Negotiation,
}

/// Denormalized copy of unit, project, client and payment data captured when
/// a reservation is created.
///
/// The snapshot exists for voucher rendering and the audit trail: it is
/// captured exactly once and never re-derived from live references, so it
/// keeps its historical fidelity even after the unit or client records move
/// on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReservationSnapshot {
    /// Unit the snapshot was taken from
    pub unit_id: UnitId,
    /// Project name at capture time
    pub project_name: String,
    /// Unit number at capture time
    pub unit_number: String,
    /// Unit area at capture time
    pub area_sqm: Decimal,
    /// List price at capture time
    pub list_price: Money,
    /// Price the claim was made at (list price, or the proposed price for
    /// negotiations)
    pub agreed_price: Money,
    /// Client details at capture time
    pub client: ClientContact,
    /// Payment terms at capture time
    pub payment: PaymentTerms,
    /// Agent who placed the claim
    pub requested_by: AgentId,
    /// When the snapshot was captured
    pub captured_at: DateTime<Utc>,
}

// ============================================================================
// Negotiation Approval
// ============================================================================

/// Manager sign-off record for a price-negotiated reservation.
///
/// Exactly one approval exists per negotiation-kind reservation, created
/// atomically with it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NegotiationApproval {
    /// Unique approval identifier
    pub id: ApprovalId,
    /// Owning reservation (1:1)
    pub reservation_id: ReservationId,
    /// Unit under negotiation
    pub unit_id: UnitId,
    /// Agent who requested the negotiation
    pub requested_by: AgentId,
    /// Current approval status
    pub status: ApprovalStatus,
    /// List price at request time
    pub original_price: Money,
    /// Price the agent proposes to sell at
    pub proposed_price: Money,
    /// Hard response deadline
    pub deadline: ApprovalDeadline,
    /// When the approval was created
    pub created_at: DateTime<Utc>,
    /// Manager who responded, once responded
    pub responded_by: Option<AgentId>,
    /// When the response (or expiry) was recorded
    pub responded_at: Option<DateTime<Utc>>,
    /// Manager note or rejection reason
    pub response_note: Option<String>,
}

impl NegotiationApproval {
    /// Checks whether a manager may still respond: the approval is pending
    /// and the deadline has not passed.
    ///
    /// Deadlines are evaluated lazily against the supplied `now`; there is
    /// no in-process timer.
    #[must_use]
    pub fn can_respond(&self, now: DateTime<Utc>) -> bool {
        self.status == ApprovalStatus::Pending && !self.deadline.is_passed(now)
    }

    /// Checks whether the approval is pending but past its deadline
    #[must_use]
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == ApprovalStatus::Pending && self.deadline.is_passed(now)
    }
}

/// Approval lifecycle status.
///
/// Transitions only go `Pending` to one of the terminal states, never
/// backward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalStatus {
    /// Awaiting a manager response
    Pending,
    /// Manager approved the negotiated price; terminal
    Approved,
    /// Manager rejected the negotiated price; terminal
    Rejected,
    /// Deadline passed without a response; terminal
    Expired,
}

impl ApprovalStatus {
    /// Checks whether this status is terminal
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Wrapper for the negotiation response deadline
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApprovalDeadline(DateTime<Utc>);

impl ApprovalDeadline {
    /// Creates a new `ApprovalDeadline`
    #[must_use]
    pub const fn new(deadline: DateTime<Utc>) -> Self {
        Self(deadline)
    }

    /// Returns the inner `DateTime`
    #[must_use]
    pub const fn inner(&self) -> DateTime<Utc> {
        self.0
    }

    /// Checks if the deadline has passed
    #[must_use]
    pub fn is_passed(&self, now: DateTime<Utc>) -> bool {
        now >= self.0
    }
}

impl fmt::Display for ApprovalDeadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S UTC"))
    }
}

// ============================================================================
// Commission
// ============================================================================

/// The fee earned on a completed unit sale.
///
/// At most one commission exists per unit. Derived figures follow fixed
/// formulas: `total_amount = final_selling_price × percentage / 100` and
/// `net_amount = total_amount + vat − marketing_expenses − bank_fees`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Commission {
    /// Unique commission identifier
    pub id: CommissionId,
    /// Sold unit (unique per unit)
    pub unit_id: UnitId,
    /// Reservation the sale closed under
    pub reservation_id: ReservationId,
    /// Final selling price
    pub final_selling_price: Money,
    /// Commission percentage applied to the selling price
    pub percentage: Percentage,
    /// Gross commission before tax and expenses
    pub total_amount: Money,
    /// Value-added tax collected on top of the commission
    pub vat: Money,
    /// Marketing spend deducted from the commission
    pub marketing_expenses: Money,
    /// Bank fees deducted from the commission
    pub bank_fees: Money,
    /// Distributable net amount
    pub net_amount: Money,
    /// Current commission status
    pub status: CommissionStatus,
    /// Sales channel that produced the sale
    pub source: CommissionSource,
    /// When the commission was created
    pub created_at: DateTime<Utc>,
}

/// Commission lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommissionStatus {
    /// Open for distribution edits and expense updates
    Pending,
    /// Locked; every distribution has been responded to
    Approved,
    /// Paid out; terminal
    Paid,
}

/// Sales channel a commission originated from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommissionSource {
    /// Closed by the in-house sales office
    SalesOffice,
    /// Closed by an external marketer
    ExternalMarketer,
    /// Closed through a referral
    Referral,
}

/// One recipient's share of a commission.
///
/// `amount` is a snapshot of `net_amount × percentage / 100` taken when the
/// distribution was last written; it is not a live formula. Expense updates
/// on the parent commission recalculate all of its distribution amounts in
/// the same transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommissionDistribution {
    /// Unique distribution identifier
    pub id: DistributionId,
    /// Owning commission
    pub commission_id: CommissionId,
    /// Who receives this share
    pub recipient: DistributionRecipient,
    /// Contribution the share rewards
    pub kind: DistributionKind,
    /// Share of the commission net amount
    pub percentage: Percentage,
    /// Snapshot amount derived from the commission net at last write
    pub amount: Money,
    /// Current distribution status
    pub status: DistributionStatus,
    /// When the distribution was created
    pub created_at: DateTime<Utc>,
}

/// Distribution recipient: an internal agent, an external party, or both
/// recorded together (one path is authoritative for payout).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionRecipient {
    /// Internal recipient, when the share goes to staff
    pub agent_id: Option<AgentId>,
    /// External recipient name, when the share leaves the brokerage
    pub external_name: Option<String>,
    /// Bank account for external payout
    pub bank_account: Option<String>,
}

impl DistributionRecipient {
    /// Creates a recipient pointing at an internal agent
    #[must_use]
    pub const fn internal(agent_id: AgentId) -> Self {
        Self {
            agent_id: Some(agent_id),
            external_name: None,
            bank_account: None,
        }
    }

    /// Creates an external recipient with a payout account
    #[must_use]
    pub const fn external(name: String, bank_account: String) -> Self {
        Self {
            agent_id: None,
            external_name: Some(name),
            bank_account: Some(bank_account),
        }
    }

    /// Checks that at least one recipient path is present
    #[must_use]
    pub const fn is_specified(&self) -> bool {
        self.agent_id.is_some() || self.external_name.is_some()
    }
}

/// Contribution type a distribution rewards
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionKind {
    /// Sourced the client
    LeadGeneration,
    /// Moved the client toward the purchase
    Persuasion,
    /// Closed the sale
    Closing,
    /// Management share
    Management,
    /// Anything else
    Other,
    /// External marketer payout
    ExternalMarketer,
}

/// Distribution lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionStatus {
    /// Awaiting a response; blocks commission approval
    Pending,
    /// Share confirmed
    Approved,
    /// Share declined
    Rejected,
    /// Paid out alongside the commission
    Paid,
}

// ============================================================================
// Waiting List
// ============================================================================

/// Queued client interest in a unit that is not currently available
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaitingListEntry {
    /// Unique entry identifier
    pub id: EntryId,
    /// Unit the client is waiting for
    pub unit_id: UnitId,
    /// Interested client
    pub client: ClientContact,
    /// Queue priority; higher is served first
    pub priority: i32,
    /// Current entry status
    pub status: EntryStatus,
    /// Store-assigned submission counter; breaks `created_at` ties
    pub sequence: u64,
    /// Staff member who enqueued the client
    pub created_by: AgentId,
    /// When the entry was created
    pub created_at: DateTime<Utc>,
    /// When the entry lapses, if an expiry was set
    pub expires_at: Option<DateTime<Utc>>,
    /// Reservation the entry converted into, if converted
    pub converted_to: Option<ReservationId>,
    /// Staff member who performed the conversion
    pub converted_by: Option<AgentId>,
    /// When the conversion happened
    pub converted_at: Option<DateTime<Utc>>,
}

impl WaitingListEntry {
    /// Checks whether the entry is still serviceable: waiting and not past
    /// its expiry (expiry is evaluated lazily against `now`).
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == EntryStatus::Waiting
            && self.expires_at.is_none_or(|expires_at| now < expires_at)
    }
}

/// Waiting-list entry lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryStatus {
    /// In the queue
    Waiting,
    /// Converted into a reservation; terminal
    Converted,
    /// Cancelled by staff; terminal
    Cancelled,
    /// Lapsed past its expiry; terminal
    Expired,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn money_share_rounds_to_currency_precision() {
        let net = Money::new(dec!(1000.00));
        let third = Percentage::new(dec!(33.33)).unwrap();
        assert_eq!(net.checked_share(third).unwrap(), Money::new(dec!(333.30)));

        let price = Money::from_major(1_000_000);
        let rate = Percentage::new(dec!(2.5)).unwrap();
        assert_eq!(price.checked_share(rate).unwrap(), Money::from_major(25_000));
    }

    #[test]
    fn money_share_rounds_half_away_from_zero() {
        let amount = Money::new(dec!(100.25));
        let half = Percentage::new(dec!(50)).unwrap();
        // 50.125 rounds up, not to even
        assert_eq!(amount.checked_share(half).unwrap(), Money::new(dec!(50.13)));
    }

    #[test]
    fn money_never_goes_negative() {
        let small = Money::new(dec!(10));
        let large = Money::new(dec!(11));
        assert_eq!(small.checked_sub(large), None);
        assert_eq!(large.checked_sub(small).unwrap(), Money::new(dec!(1)));
    }

    #[test]
    fn percentage_rejects_out_of_range_values() {
        assert!(Percentage::new(dec!(-0.01)).is_err());
        assert!(Percentage::new(dec!(100.01)).is_err());
        assert!(Percentage::new(dec!(0)).is_ok());
        assert!(Percentage::new(dec!(100)).is_ok());
    }

    #[test]
    fn approval_deadline_is_lazy() {
        let deadline = ApprovalDeadline::new(
            DateTime::parse_from_rfc3339("2026-01-03T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        );
        let before = deadline.inner() - chrono::Duration::hours(1);
        let after = deadline.inner() + chrono::Duration::hours(1);
        assert!(!deadline.is_passed(before));
        assert!(deadline.is_passed(deadline.inner()));
        assert!(deadline.is_passed(after));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod arithmetic_properties {
    use super::{Money, Percentage};
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn money() -> impl Strategy<Value = Money> {
        (0i64..=10_000_000_000).prop_map(|cents| Money::new(Decimal::new(cents, 2)))
    }

    fn percentage() -> impl Strategy<Value = Percentage> {
        (0i64..=10_000).prop_map(|basis_points| {
            Percentage::new(Decimal::new(basis_points, 2)).expect("basis points stay in range")
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// A share of a non-negative amount never exceeds the amount.
        #[test]
        fn share_never_exceeds_the_amount(amount in money(), pct in percentage()) {
            let share = amount.checked_share(pct).expect("bounded inputs");
            prop_assert!(share <= amount);
        }

        /// The 100% share is the amount itself.
        #[test]
        fn full_share_is_identity(amount in money()) {
            prop_assert_eq!(amount.checked_share(Percentage::FULL), Some(amount));
        }

        /// Shares of complementary percentages differ from the whole by at
        /// most one rounding step.
        #[test]
        fn complementary_shares_cover_the_whole(amount in money(), basis_points in 0i64..=10_000) {
            let pct = Percentage::new(Decimal::new(basis_points, 2)).expect("in range");
            let rest = Percentage::new(Decimal::new(10_000 - basis_points, 2)).expect("in range");
            let a = amount.checked_share(pct).expect("bounded");
            let b = amount.checked_share(rest).expect("bounded");
            let sum = a.checked_add(b).expect("bounded");
            let gap = (sum.amount() - amount.amount()).abs();
            prop_assert!(gap <= dec!(0.01), "sum {sum} strays from {amount} by more than a cent");
        }

        /// The net accounting identity holds exactly under checked
        /// arithmetic: net + expenses == total + vat.
        #[test]
        fn net_accounting_identity(
            price in money(),
            pct in percentage(),
            vat_rate in percentage(),
            marketing_share in percentage(),
            bank_share in percentage(),
        ) {
            let total = price.checked_share(pct).expect("bounded");
            let vat = total.checked_share(vat_rate).expect("bounded");
            let marketing = total.checked_share(marketing_share).expect("bounded");
            let bank = total.checked_share(bank_share).expect("bounded");
            let expenses = marketing.checked_add(bank).expect("bounded");
            prop_assume!(expenses <= total);

            let net = total
                .checked_add(vat)
                .and_then(|gross| gross.checked_sub(marketing))
                .and_then(|rest| rest.checked_sub(bank))
                .expect("expenses fit inside the total");

            prop_assert_eq!(net.checked_add(expenses), total.checked_add(vat));
            prop_assert!(net >= vat, "expenses only ever eat into the gross");
        }
    }
}
