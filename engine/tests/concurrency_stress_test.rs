//! Concurrency stress tests for contended unit claims.
//!
//! These tests verify that under heavy concurrent load exactly one claim
//! wins each unit and every loser receives a typed conflict instead of a
//! silent double-booking.
//!
//! Run with: `cargo test --test concurrency_stress_test -- --nocapture`

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use brokerage_core::environment::{Actor, Clock, PermissiveAccess};
use brokerage_core::error::DomainError;
use brokerage_core::events::DomainEvent;
use brokerage_core::types::{
    AgentId, Money, Reservation, ReservationKind, Unit, UnitId, UnitStatus,
};
use brokerage_engine::config::{
    CommissionConfig, EngineConfig, NegotiationConfig, WaitingListConfig,
};
use brokerage_engine::{CreateReservation, Engine};
use brokerage_testing::{RecordingFanout, RecordingVoucher, fixtures, test_clock};
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

fn test_engine() -> (Engine, Arc<RecordingFanout>, Arc<RecordingVoucher>) {
    let fanout = Arc::new(RecordingFanout::new());
    let voucher = Arc::new(RecordingVoucher::new());
    let engine = Engine::new(
        test_config(),
        Arc::new(test_clock()),
        voucher.clone(),
        fanout.clone(),
        Arc::new(PermissiveAccess),
    );
    (engine, fanout, voucher)
}

async fn register_unit(engine: &Engine, price: u64) -> UnitId {
    let unit = Unit::new(
        UnitId::new(),
        "Palm Heights".to_string(),
        "B-204".to_string(),
        Money::from_major(price),
        dec!(142.5),
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

fn list_price_request(unit_id: UnitId, agent: AgentId, client_name: &str) -> CreateReservation {
    CreateReservation {
        unit_id,
        requested_by: agent,
        kind: ReservationKind::ConfirmedReservation,
        client: fixtures::client(client_name),
        payment: fixtures::cash_terms(50_000),
        proposed_price: None,
    }
}

/// Test: 32 concurrent claims for a single unit.
///
/// Verifies that:
/// - Exactly 1 claim succeeds
/// - Exactly 31 claims fail with `UnitAlreadyReserved` naming the winner
/// - The unit ends up `Reserved` and only the winner produced side effects
#[tokio::test]
async fn test_single_unit_32_concurrent_claims() {
    println!("🧪 Concurrency Stress Test: 32 concurrent claims for 1 unit");

    let (engine, fanout, voucher) = test_engine();

    println!("  📦 Registering one available unit...");
    let unit_id = register_unit(&engine, 2_000_000).await;

    println!("  🚀 Launching 32 concurrent claim attempts...");
    let mut handles = vec![];

    for i in 0..32 {
        let reservations = Arc::clone(engine.reservations());
        let request = list_price_request(unit_id, AgentId::new(), &format!("Client {i}"));

        let handle = tokio::spawn(async move { reservations.create(request).await });

        handles.push(handle);
    }

    println!("  ⏳ Waiting for all attempts to complete...");
    let results: Vec<Result<Reservation, DomainError>> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|r| r.expect("Task panicked"))
        .collect();

    let successes: Vec<&Reservation> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    let failures: Vec<&DomainError> = results.iter().filter_map(|r| r.as_ref().err()).collect();

    println!("  📊 Results:");
    println!("    ✅ Successes: {}", successes.len());
    println!("    ❌ Failures: {}", failures.len());

    assert_eq!(
        successes.len(),
        1,
        "Expected exactly 1 claim to succeed, but {} succeeded",
        successes.len()
    );
    assert_eq!(
        failures.len(),
        31,
        "Expected exactly 31 claims to fail, but {} failed",
        failures.len()
    );

    let winner = successes[0];
    for failure in &failures {
        assert_eq!(
            **failure,
            DomainError::UnitAlreadyReserved {
                unit_id,
                existing: winner.id,
            },
            "Every loser gets the typed conflict naming the winner"
        );
    }

    let unit = engine.store().unit(unit_id).await.expect("unit exists");
    assert_eq!(unit.status, UnitStatus::Reserved);
    assert_eq!(winner.snapshot.agreed_price, Money::from_major(2_000_000));

    assert_eq!(
        voucher.rendered().len(),
        1,
        "Only the winning claim renders a voucher"
    );
    assert_eq!(
        fanout.sent().len(),
        1,
        "Only the winning claim sends a notification"
    );

    println!("  ✅ Concurrency test passed: no double-booking detected!");
    println!("  ✅ Exactly 1 winner for the unit");
}

/// Test: claims on two distinct units do not contend.
///
/// The per-unit lock serializes claims on one unit only; unrelated units
/// proceed in parallel and both claims succeed.
#[tokio::test]
async fn test_distinct_units_claim_in_parallel() {
    println!("🧪 Concurrency Test: parallel claims on 2 distinct units");

    let (engine, _fanout, _voucher) = test_engine();

    println!("  📦 Registering two available units...");
    let unit_a = register_unit(&engine, 1_500_000).await;
    let unit_b = register_unit(&engine, 1_800_000).await;

    println!("  🚀 Claiming both units concurrently...");
    let reservations_a = Arc::clone(engine.reservations());
    let reservations_b = Arc::clone(engine.reservations());
    let request_a = list_price_request(unit_a, AgentId::new(), "Client A");
    let request_b = list_price_request(unit_b, AgentId::new(), "Client B");

    let (result_a, result_b) = tokio::join!(
        tokio::spawn(async move { reservations_a.create(request_a).await }),
        tokio::spawn(async move { reservations_b.create(request_b).await }),
    );

    let reservation_a = result_a
        .expect("Task panicked")
        .expect("claim on unit A succeeds");
    let reservation_b = result_b
        .expect("Task panicked")
        .expect("claim on unit B succeeds");

    assert_eq!(reservation_a.unit_id, unit_a);
    assert_eq!(reservation_b.unit_id, unit_b);

    let unit_a_after = engine.store().unit(unit_a).await.expect("unit A exists");
    let unit_b_after = engine.store().unit(unit_b).await.expect("unit B exists");
    assert_eq!(unit_a_after.status, UnitStatus::Reserved);
    assert_eq!(unit_b_after.status, UnitStatus::Reserved);

    println!("  ✅ Both units claimed independently");
}

/// Test: cancelling the winning claim frees the unit for the next wave.
///
/// After the owner cancels, the unit reverts to available, the freed unit
/// is announced, and a second wave of 32 contenders again produces exactly
/// one winner.
#[tokio::test]
async fn test_freed_unit_accepts_the_next_wave() {
    println!("🧪 Concurrency Test: cancel frees the unit for a second wave");

    let (engine, fanout, _voucher) = test_engine();
    let unit_id = register_unit(&engine, 900_000).await;

    println!("  📦 First wave: one claim wins the unit...");
    let agent = AgentId::new();
    let winner = engine
        .reservations()
        .create(list_price_request(unit_id, agent, "First Winner"))
        .await
        .expect("first claim succeeds");

    let err = engine
        .reservations()
        .create(list_price_request(unit_id, AgentId::new(), "Too Late"))
        .await
        .expect_err("unit is taken");
    assert_eq!(
        err,
        DomainError::UnitAlreadyReserved {
            unit_id,
            existing: winner.id,
        }
    );

    println!("  🔓 Owner cancels; the unit frees up...");
    let owner = Actor::new(agent, "First Winner".to_string());
    engine
        .reservations()
        .cancel(winner.id, "Client backed out".to_string(), &owner)
        .await
        .expect("owner cancels");

    let unit = engine.store().unit(unit_id).await.expect("unit exists");
    assert_eq!(unit.status, UnitStatus::Available);

    let freed_announcements = fanout
        .sent()
        .into_iter()
        .filter(|notification| matches!(notification.context, DomainEvent::UnitFreed { .. }))
        .count();
    assert_eq!(
        freed_announcements, 1,
        "Cancelling the last claim announces the freed unit"
    );

    println!("  🚀 Second wave: 32 fresh contenders...");
    let mut handles = vec![];
    for i in 0..32 {
        let reservations = Arc::clone(engine.reservations());
        let request = list_price_request(unit_id, AgentId::new(), &format!("Second Wave {i}"));
        handles.push(tokio::spawn(async move { reservations.create(request).await }));
    }

    let results = futures::future::join_all(handles).await;
    let winners = results
        .iter()
        .filter(|result| result.as_ref().expect("Task panicked").is_ok())
        .count();

    assert_eq!(winners, 1, "Exactly one second-wave claim wins");

    let unit = engine.store().unit(unit_id).await.expect("unit exists");
    assert_eq!(unit.status, UnitStatus::Reserved);

    println!("  ✅ Freed unit accepted exactly one new claim");
}
