//! End-to-end tests for the negotiation approval workflow.
//!
//! A negotiated claim blocks its unit while a manager decides, the
//! response window is hard, and overdue approvals expire lazily through
//! the sweep rather than through timers.
//!
//! Run with: `cargo test --test negotiation_workflow_test -- --nocapture`

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use brokerage_core::environment::{Actor, Capability, Clock};
use brokerage_core::error::DomainError;
use brokerage_core::events::DomainEvent;
use brokerage_core::types::{
    AgentId, ApprovalStatus, Money, NegotiationApproval, Reservation, ReservationKind,
    ReservationStatus, Unit, UnitId, UnitStatus,
};
use brokerage_engine::config::{
    CommissionConfig, EngineConfig, NegotiationConfig, WaitingListConfig,
};
use brokerage_engine::{CreateReservation, Engine};
use brokerage_testing::{
    GrantTable, ManualClock, RecordingFanout, RecordingVoucher, fixtures, test_clock,
};
use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn test_config() -> EngineConfig {
    EngineConfig {
        negotiation: NegotiationConfig {
            response_window_hours: 48,
        },
        commission: CommissionConfig {
            vat_rate_percent: Decimal::ZERO,
            minimum_net: Decimal::from(100),
        },
        waiting_list: WaitingListConfig {
            entry_lifetime_days: 30,
        },
    }
}

type Harness = (
    Engine,
    ManualClock,
    Arc<RecordingFanout>,
    Arc<RecordingVoucher>,
    Actor,
);

fn negotiation_engine() -> Harness {
    let clock = ManualClock::new(test_clock().now());
    let fanout = Arc::new(RecordingFanout::new());
    let voucher = Arc::new(RecordingVoucher::new());
    let manager_id = AgentId::new();
    let manager = Actor::new(manager_id, "Sales Manager".to_string());
    let access = GrantTable::new().grant(manager_id, Capability::ApproveNegotiations);
    let engine = Engine::new(
        test_config(),
        Arc::new(clock.clone()),
        voucher.clone(),
        fanout.clone(),
        Arc::new(access),
    );
    (engine, clock, fanout, voucher, manager)
}

async fn register_unit(engine: &Engine, unit_number: &str, price: u64) -> UnitId {
    let unit = Unit::new(
        UnitId::new(),
        "Nile Towers".to_string(),
        unit_number.to_string(),
        Money::from_major(price),
        dec!(118.0),
        test_clock().now(),
    );
    let id = unit.id;
    engine
        .store()
        .register_unit(unit)
        .await
        .expect("unit registers");
    id
}

async fn open_negotiation(
    engine: &Engine,
    unit_id: UnitId,
    agent: AgentId,
    proposed: u64,
) -> (Reservation, NegotiationApproval) {
    let reservation = engine
        .reservations()
        .create(CreateReservation {
            unit_id,
            requested_by: agent,
            kind: ReservationKind::Negotiation,
            client: fixtures::client("Negotiating Client"),
            payment: fixtures::cash_terms(25_000),
            proposed_price: Some(Money::from_major(proposed)),
        })
        .await
        .expect("negotiation opens");
    let approval = engine
        .store()
        .approval_for_reservation(reservation.id)
        .await
        .expect("approval exists");
    (reservation, approval)
}

/// Test: the full happy path, 500,000 list price negotiated to 450,000.
///
/// Verifies that:
/// - The claim opens `UnderNegotiation` with a pending 48-hour approval
/// - The unit is blocked while the manager decides
/// - Approval confirms the reservation at the agreed price
/// - The voucher regenerates and the approval is announced exactly once
#[tokio::test]
async fn test_negotiated_claim_confirms_on_manager_approval() {
    println!("🧪 Negotiation Workflow: 500,000 list, 450,000 proposed, approved");

    let (engine, clock, fanout, voucher, manager) = negotiation_engine();
    let unit_id = register_unit(&engine, "N-1201", 500_000).await;
    let agent = AgentId::new();

    println!("  📦 Opening the negotiation...");
    let (reservation, approval) = open_negotiation(&engine, unit_id, agent, 450_000).await;

    assert_eq!(reservation.status, ReservationStatus::UnderNegotiation);
    assert_eq!(reservation.snapshot.list_price, Money::from_major(500_000));
    assert_eq!(reservation.snapshot.agreed_price, Money::from_major(450_000));
    assert!(reservation.confirmed_at.is_none());

    assert_eq!(approval.status, ApprovalStatus::Pending);
    assert_eq!(approval.original_price, Money::from_major(500_000));
    assert_eq!(approval.proposed_price, Money::from_major(450_000));
    assert_eq!(
        approval.deadline.inner(),
        reservation.created_at + Duration::hours(48)
    );

    let unit = engine.store().unit(unit_id).await.expect("unit exists");
    assert_eq!(
        unit.status,
        UnitStatus::Reserved,
        "The unit is blocked while the negotiation runs"
    );

    println!("  ⏳ Manager approves 24 hours in...");
    clock.advance(Duration::hours(24));
    let approved = engine
        .negotiations()
        .approve(
            approval.id,
            &manager,
            Some("Discount within quarter budget".to_string()),
        )
        .await
        .expect("approval within the window succeeds");

    assert_eq!(approved.status, ApprovalStatus::Approved);
    assert_eq!(approved.responded_by, Some(manager.agent_id));
    assert!(approved.responded_at.is_some());

    let confirmed = engine
        .store()
        .reservation(reservation.id)
        .await
        .expect("reservation exists");
    assert_eq!(confirmed.status, ReservationStatus::Confirmed);
    assert!(confirmed.confirmed_at.is_some());
    assert_eq!(
        confirmed.snapshot.agreed_price,
        Money::from_major(450_000),
        "The snapshot price never changes after capture"
    );

    assert_eq!(
        voucher.rendered().len(),
        2,
        "Voucher renders at creation and again at approval"
    );

    let announced = fanout
        .sent()
        .into_iter()
        .filter(|n| matches!(n.context, DomainEvent::NegotiationApproved { .. }))
        .count();
    assert_eq!(announced, 1);

    println!("  ✅ Negotiated claim confirmed at the agreed price");
}

/// Test: an approval accepts exactly one response.
#[tokio::test]
async fn test_responded_approval_refuses_a_second_response() {
    println!("🧪 Negotiation Workflow: the response is final");

    let (engine, _clock, _fanout, _voucher, manager) = negotiation_engine();
    let unit_id = register_unit(&engine, "N-0304", 300_000).await;
    let (_, approval) = open_negotiation(&engine, unit_id, AgentId::new(), 280_000).await;

    engine
        .negotiations()
        .approve(approval.id, &manager, None)
        .await
        .expect("first response lands");

    let err = engine
        .negotiations()
        .reject(approval.id, &manager, "Changed my mind".to_string())
        .await
        .expect_err("the response is final");
    assert_eq!(
        err,
        DomainError::ApprovalNotPending {
            id: approval.id,
            status: ApprovalStatus::Approved,
        }
    );

    println!("  ✅ Second response bounced off the terminal status");
}

/// Test: rejection records the reason but leaves the claim alive.
///
/// The reservation stays `UnderNegotiation` and keeps blocking the unit
/// until the owning agent cancels or the price is renegotiated.
#[tokio::test]
async fn test_rejection_keeps_the_reservation_under_negotiation() {
    println!("🧪 Negotiation Workflow: rejection path");

    let (engine, _clock, fanout, _voucher, manager) = negotiation_engine();
    let unit_id = register_unit(&engine, "N-0808", 750_000).await;
    let agent = AgentId::new();
    let (reservation, approval) = open_negotiation(&engine, unit_id, agent, 600_000).await;

    println!("  ❌ Manager rejects the discount...");
    let rejected = engine
        .negotiations()
        .reject(approval.id, &manager, "Discount too deep".to_string())
        .await
        .expect("rejection lands");

    assert_eq!(rejected.status, ApprovalStatus::Rejected);
    assert_eq!(rejected.response_note.as_deref(), Some("Discount too deep"));
    assert_eq!(rejected.responded_by, Some(manager.agent_id));

    let after = engine
        .store()
        .reservation(reservation.id)
        .await
        .expect("reservation exists");
    assert_eq!(after.status, ReservationStatus::UnderNegotiation);

    let unit = engine.store().unit(unit_id).await.expect("unit exists");
    assert_eq!(
        unit.status,
        UnitStatus::Reserved,
        "Rejection alone does not free the unit"
    );

    println!("  🔓 The owning agent backs out...");
    let owner = Actor::new(agent, "Requesting Agent".to_string());
    engine
        .reservations()
        .cancel(reservation.id, "Rejected terms".to_string(), &owner)
        .await
        .expect("owner cancels");

    let unit = engine.store().unit(unit_id).await.expect("unit exists");
    assert_eq!(unit.status, UnitStatus::Available);

    let rejections = fanout
        .sent()
        .into_iter()
        .filter(|n| matches!(n.context, DomainEvent::NegotiationRejected { .. }))
        .count();
    assert_eq!(rejections, 1);

    println!("  ✅ Rejection recorded; unit freed only by the cancel");
}

/// Test: the response window boundary is inclusive on the deadline.
///
/// One second before the deadline a response still counts; at the
/// deadline itself the window is closed.
#[tokio::test]
async fn test_response_at_the_deadline_is_too_late() {
    println!("🧪 Negotiation Workflow: the 48-hour window is hard");

    let (engine, clock, _fanout, _voucher, manager) = negotiation_engine();
    let unit_a = register_unit(&engine, "N-0101", 400_000).await;
    let unit_b = register_unit(&engine, "N-0102", 400_000).await;

    // Both approvals open at the same instant and share a deadline
    let (_, early) = open_negotiation(&engine, unit_a, AgentId::new(), 380_000).await;
    let (_, late) = open_negotiation(&engine, unit_b, AgentId::new(), 380_000).await;

    println!("  ⏳ Advancing to one second before the deadline...");
    clock.advance(Duration::hours(48) - Duration::seconds(1));
    engine
        .negotiations()
        .approve(early.id, &manager, None)
        .await
        .expect("one second before the deadline still counts");

    println!("  ⏳ Advancing onto the deadline itself...");
    clock.advance(Duration::seconds(1));
    let err = engine
        .negotiations()
        .approve(late.id, &manager, None)
        .await
        .expect_err("at the deadline the window is closed");
    assert_eq!(
        err,
        DomainError::ApprovalDeadlinePassed {
            id: late.id,
            deadline: late.deadline.inner(),
        }
    );

    let err = engine
        .negotiations()
        .reject(late.id, &manager, "Too late anyway".to_string())
        .await
        .expect_err("reject obeys the same window");
    assert!(matches!(err, DomainError::ApprovalDeadlinePassed { .. }));

    println!("  ✅ Window boundary enforced on both responses");
}

/// Test: the expiry sweep flips overdue approvals exactly once.
///
/// Verifies that:
/// - Every overdue pending approval expires in one sweep
/// - Expiry never cancels the owning reservation or frees the unit
/// - A second sweep finds nothing and sends no duplicate notices
#[tokio::test]
async fn test_expiry_sweep_flips_overdue_approvals_once() {
    println!("🧪 Negotiation Workflow: lazy expiry sweep");

    let (engine, clock, fanout, _voucher, manager) = negotiation_engine();
    let unit_a = register_unit(&engine, "N-0501", 350_000).await;
    let unit_b = register_unit(&engine, "N-0502", 360_000).await;
    let agent = AgentId::new();

    let (reservation_a, approval_a) = open_negotiation(&engine, unit_a, agent, 340_000).await;
    let (_, approval_b) = open_negotiation(&engine, unit_b, agent, 350_000).await;

    println!("  ⏳ Nobody responds for 49 hours...");
    clock.advance(Duration::hours(49));

    let expired = engine.negotiations().expire_overdue().await;
    assert_eq!(expired, 2, "Both overdue approvals expire");

    for id in [approval_a.id, approval_b.id] {
        let approval = engine.store().approval(id).await.expect("approval exists");
        assert_eq!(approval.status, ApprovalStatus::Expired);
        assert!(
            approval.responded_at.is_some(),
            "Expiry stamps when the sweep ran"
        );
        assert_eq!(approval.responded_by, None, "Nobody responded");
    }

    // Expiry never cancels the claim; staff decide what happens next
    let reservation = engine
        .store()
        .reservation(reservation_a.id)
        .await
        .expect("reservation exists");
    assert_eq!(reservation.status, ReservationStatus::UnderNegotiation);
    let unit = engine.store().unit(unit_a).await.expect("unit exists");
    assert_eq!(unit.status, UnitStatus::Reserved);

    let err = engine
        .negotiations()
        .approve(approval_a.id, &manager, None)
        .await
        .expect_err("already expired");
    assert_eq!(
        err,
        DomainError::ApprovalNotPending {
            id: approval_a.id,
            status: ApprovalStatus::Expired,
        }
    );

    println!("  🔁 Running the sweep again...");
    let expired_again = engine.negotiations().expire_overdue().await;
    assert_eq!(expired_again, 0, "The sweep is idempotent");

    let expiry_notices = fanout
        .sent()
        .into_iter()
        .filter(|n| matches!(n.context, DomainEvent::NegotiationExpired { .. }))
        .count();
    assert_eq!(
        expiry_notices, 2,
        "One notice per expired approval, never doubled"
    );

    println!("  ✅ Sweep expired both approvals exactly once");
}

/// Test: responding to a negotiation requires the approval capability.
#[tokio::test]
async fn test_response_requires_the_approval_capability() {
    println!("🧪 Negotiation Workflow: capability gate");

    let (engine, _clock, _fanout, _voucher, _manager) = negotiation_engine();
    let unit_id = register_unit(&engine, "N-0707", 500_000).await;
    let (_, approval) = open_negotiation(&engine, unit_id, AgentId::new(), 450_000).await;

    let outsider = Actor::new(AgentId::new(), "Unauthorized Agent".to_string());
    let err = engine
        .negotiations()
        .approve(approval.id, &outsider, None)
        .await
        .expect_err("no capability");
    assert_eq!(
        err,
        DomainError::CapabilityDenied {
            capability: Capability::ApproveNegotiations,
        }
    );

    let approval_after = engine
        .store()
        .approval(approval.id)
        .await
        .expect("approval exists");
    assert_eq!(approval_after.status, ApprovalStatus::Pending);

    println!("  ✅ Unauthorized response denied; approval untouched");
}
