//! Reservation flow walkthrough binary
//!
//! Drives two units through the full brokerage lifecycle: a contended
//! claim, a negotiated discount with manager approval, commission
//! settlement with recipient shares, and a waiting list conversion after
//! the original claim falls through.
//!
//! Run with: `cargo run --bin reservation-flow`

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use brokerage_core::environment::{
    Actor, Clock, PermissiveAccess, SystemClock, VoucherError, VoucherRenderer,
};
use brokerage_core::error::DomainError;
use brokerage_core::events::{FanoutError, Notification, NotificationFanout};
use brokerage_core::types::{
    AgentId, ClientContact, CommissionSource, DistributionKind, DistributionRecipient, Money,
    PaymentMethod, PaymentTerms, Percentage, ReservationKind, ReservationSnapshot, Unit, UnitId,
};
use brokerage_engine::{
    ConversionTerms, CreateCommission, CreateReservation, DistributionResponse, Engine,
    EngineConfig,
};
use rust_decimal_macros::dec;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Prints every notification the engine fans out.
struct ConsoleFanout;

#[async_trait]
impl NotificationFanout for ConsoleFanout {
    async fn notify(&self, notification: Notification) -> Result<(), FanoutError> {
        info!(
            event = notification.context.event_type(),
            recipients = notification.recipients.len(),
            "📣 {}",
            notification.message
        );
        Ok(())
    }
}

/// Reports the path a real renderer would write the voucher to.
struct ConsoleVoucher;

#[async_trait]
impl VoucherRenderer for ConsoleVoucher {
    async fn render(&self, snapshot: &ReservationSnapshot) -> Result<PathBuf, VoucherError> {
        let path = PathBuf::from(format!(
            "vouchers/{}-{}.pdf",
            snapshot.project_name.to_lowercase().replace(' ', "-"),
            snapshot.unit_number.to_lowercase(),
        ));
        info!(path = %path.display(), agreed = %snapshot.agreed_price, "🧾 Voucher rendered");
        Ok(path)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reservation_flow=info,brokerage_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== Brokerage Engine: Reservation to Commission Walkthrough ===\n");

    let engine = Engine::new(
        EngineConfig::from_env(),
        Arc::new(SystemClock),
        Arc::new(ConsoleVoucher),
        Arc::new(ConsoleFanout),
        Arc::new(PermissiveAccess),
    );

    let now = SystemClock.now();
    println!(">>> Registering two units in Palm Hills West");
    let unit_a = Unit::new(
        UnitId::new(),
        "Palm Hills West".to_string(),
        "A-412".to_string(),
        Money::from_major(1_900_000),
        dec!(131.5),
        now,
    );
    let unit_b = Unit::new(
        UnitId::new(),
        "Palm Hills West".to_string(),
        "B-77".to_string(),
        Money::from_major(2_400_000),
        dec!(168.0),
        now,
    );
    let unit_a_id = unit_a.id;
    let unit_b_id = unit_b.id;
    engine.store().register_unit(unit_a).await?;
    engine.store().register_unit(unit_b).await?;

    let lead_agent = AgentId::new();
    let manager = Actor::new(AgentId::new(), "Branch Manager".to_string());
    let accountant = Actor::new(AgentId::new(), "Commissions Desk".to_string());
    let front_desk = Actor::new(AgentId::new(), "Front Desk".to_string());

    // ── A contended claim ───────────────────────────────────────────────

    println!("\n>>> Agent claims A-412 at list price");
    let claim_a = engine
        .reservations()
        .create(CreateReservation {
            unit_id: unit_a_id,
            requested_by: lead_agent,
            kind: ReservationKind::ConfirmedReservation,
            client: ClientContact::new(
                "Omar Farouk".to_string(),
                "+20-100-555-0147".to_string(),
                Some("omar.farouk@example.com".to_string()),
            ),
            payment: PaymentTerms::new(PaymentMethod::Cash, Money::from_major(400_000), None),
            proposed_price: None,
        })
        .await?;
    println!("    Reservation {} is {:?}", claim_a.id, claim_a.status);

    println!("\n>>> A rival agent tries the same unit");
    let rival_attempt = engine
        .reservations()
        .create(CreateReservation {
            unit_id: unit_a_id,
            requested_by: AgentId::new(),
            kind: ReservationKind::ConfirmedReservation,
            client: ClientContact::new(
                "Second Buyer".to_string(),
                "+20-100-555-0921".to_string(),
                None,
            ),
            payment: PaymentTerms::new(PaymentMethod::Cash, Money::from_major(100_000), None),
            proposed_price: None,
        })
        .await;
    match rival_attempt {
        Err(DomainError::UnitAlreadyReserved { existing, .. }) => {
            println!("    Blocked: unit already held by reservation {existing}");
        }
        Err(other) => bail!("unexpected error on the rival claim: {other}"),
        Ok(_) => bail!("the contended claim should have been blocked"),
    }

    // ── A negotiated discount ───────────────────────────────────────────

    println!("\n>>> Negotiated claim on B-77: 2,400,000 list, 2,250,000 proposed");
    let negotiated = engine
        .reservations()
        .create(CreateReservation {
            unit_id: unit_b_id,
            requested_by: lead_agent,
            kind: ReservationKind::Negotiation,
            client: ClientContact::new(
                "Layla Hassan".to_string(),
                "+20-122-555-0333".to_string(),
                None,
            ),
            payment: PaymentTerms::new(
                PaymentMethod::Installments { months: 48 },
                Money::from_major(250_000),
                Some("Quarterly installments".to_string()),
            ),
            proposed_price: Some(Money::from_major(2_250_000)),
        })
        .await?;
    let approval = engine
        .store()
        .approval_for_reservation(negotiated.id)
        .await
        .ok_or_else(|| anyhow!("negotiation should open an approval"))?;
    println!("    Approval {} pending until {}", approval.id, approval.deadline);

    println!("\n>>> Manager approves the discount");
    engine
        .negotiations()
        .approve(
            approval.id,
            &manager,
            Some("Within Q3 discount budget".to_string()),
        )
        .await?;
    let confirmed = engine
        .store()
        .reservation(negotiated.id)
        .await
        .ok_or_else(|| anyhow!("reservation should survive approval"))?;
    println!(
        "    Reservation {} is now {:?} at {}",
        confirmed.id, confirmed.status, confirmed.snapshot.agreed_price
    );

    // ── Commission settlement ───────────────────────────────────────────

    println!("\n>>> Settling the commission: 2,250,000 × 2.5%");
    let commission = engine
        .commissions()
        .create(
            CreateCommission {
                unit_id: unit_b_id,
                reservation_id: confirmed.id,
                final_selling_price: Money::from_major(2_250_000),
                percentage: Percentage::new(dec!(2.5))?,
                source: CommissionSource::SalesOffice,
            },
            &accountant,
        )
        .await?;
    println!(
        "    Gross {} | VAT {} | Net {}",
        commission.total_amount, commission.vat, commission.net_amount
    );

    println!("\n>>> Splitting the net 60/40 between closer and lead source");
    let scout = AgentId::new();
    let closer_share = engine
        .commissions()
        .add_distribution(
            commission.id,
            DistributionKind::Closing,
            Percentage::new(dec!(60))?,
            DistributionRecipient::internal(lead_agent),
            &accountant,
        )
        .await?;
    let lead_share = engine
        .commissions()
        .add_distribution(
            commission.id,
            DistributionKind::LeadGeneration,
            Percentage::new(dec!(40))?,
            DistributionRecipient::internal(scout),
            &accountant,
        )
        .await?;
    println!(
        "    Closer share {} | Lead share {}",
        closer_share.amount, lead_share.amount
    );

    println!("\n>>> Recording 7,500 marketing spend and 1,250 bank fees");
    let updated = engine
        .commissions()
        .update_expenses(
            commission.id,
            Money::from_major(7_500),
            Money::from_major(1_250),
            &accountant,
        )
        .await?;
    let closer_share = engine
        .store()
        .distribution(closer_share.id)
        .await
        .ok_or_else(|| anyhow!("closer share should survive the update"))?;
    let lead_share = engine
        .store()
        .distribution(lead_share.id)
        .await
        .ok_or_else(|| anyhow!("lead share should survive the update"))?;
    println!("    Net now {}", updated.net_amount);
    println!(
        "    Shares re-snapshot: closer {} | lead {}",
        closer_share.amount, lead_share.amount
    );

    println!("\n>>> Recipients accept, the desk approves and pays out");
    engine
        .commissions()
        .respond_to_distribution(
            closer_share.id,
            DistributionResponse::Approve,
            &Actor::new(lead_agent, "Lead Agent".to_string()),
        )
        .await?;
    engine
        .commissions()
        .respond_to_distribution(
            lead_share.id,
            DistributionResponse::Approve,
            &Actor::new(scout, "Scout".to_string()),
        )
        .await?;
    engine.commissions().approve(commission.id, &accountant).await?;
    let paid = engine.commissions().mark_paid(commission.id, &accountant).await?;
    println!("    Commission {} is {:?}", paid.id, paid.status);

    // ── Waiting list conversion ─────────────────────────────────────────

    println!("\n>>> Two clients join the waiting list for A-412");
    engine
        .waiting_list()
        .enqueue(
            unit_a_id,
            ClientContact::new(
                "Nadia Kamel".to_string(),
                "+20-111-555-0200".to_string(),
                None,
            ),
            2,
            &front_desk,
        )
        .await?;
    let vip = engine
        .waiting_list()
        .enqueue(
            unit_a_id,
            ClientContact::new(
                "Karim Said".to_string(),
                "+20-111-555-0888".to_string(),
                None,
            ),
            7,
            &front_desk,
        )
        .await?;
    for (index, entry) in engine
        .waiting_list()
        .active_entries(unit_a_id)
        .await
        .iter()
        .enumerate()
    {
        println!(
            "    {}. priority {}: {}",
            index + 1,
            entry.priority,
            entry.client.name
        );
    }

    println!("\n>>> The A-412 buyer backs out; the unit frees up");
    engine
        .reservations()
        .cancel(
            claim_a.id,
            "Buyer withdrew after inspection".to_string(),
            &Actor::new(lead_agent, "Lead Agent".to_string()),
        )
        .await?;

    println!("\n>>> Converting the queue head into a reservation");
    let (entry, reservation) = engine
        .waiting_list()
        .convert(
            vip.id,
            ConversionTerms {
                kind: ReservationKind::ConfirmedReservation,
                payment: PaymentTerms::new(
                    PaymentMethod::BankTransfer,
                    Money::from_major(500_000),
                    None,
                ),
                proposed_price: None,
            },
            &front_desk,
        )
        .await?;
    println!(
        "    Entry {:?} → reservation {} ({:?})",
        entry.status, reservation.id, reservation.status
    );

    // ── Maintenance ─────────────────────────────────────────────────────

    println!("\n>>> Running the maintenance sweeps");
    let report = engine.tasks().run_once().await;
    println!(
        "    Expired approvals: {} | Expired waiting entries: {}",
        report.expired_approvals, report.expired_waiting_entries
    );

    println!("\n=== Walkthrough complete ===");
    Ok(())
}
