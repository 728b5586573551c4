//! Unit Reservation & Commission Distribution Engine
//!
//! The transactional core of a real-estate brokerage back office:
//! exclusive unit reservation, time-boxed negotiation approvals,
//! commission computation with recipient distributions, and a priority
//! waiting list.
//!
//! # Architecture
//!
//! ```text
//!                 ┌─────────────────────────────────────────┐
//!                 │              EngineStore                │
//!                 │  RwLock<EngineState>  (transactions)    │
//!                 │  UnitLockRegistry     (per-unit mutex)  │
//!                 └───────┬─────────┬─────────┬─────────┬───┘
//!                         │         │         │         │
//!             ┌───────────┴──┐ ┌────┴─────┐ ┌─┴──────┐ ┌┴──────────┐
//!             │ Reservation  │ │Negotiation│ │Commiss.│ │ Waiting   │
//!             │   Service    │ │ Service   │ │Service │ │ List      │
//!             └───────┬──────┘ └────┬─────┘ └─┬──────┘ └┬──────────┘
//!                     │             │          │         │
//!                     └──────┬──────┴────┬─────┴─────────┘
//!                            ▼           ▼
//!                   VoucherRenderer  NotificationFanout
//!                   (best-effort, after commit)
//! ```
//!
//! # Key Properties
//!
//! ## 1. First Writer Wins
//!
//! Claim operations acquire a per-unit async mutex before the store's
//! write guard, so concurrent attempts on one unit are serialized and
//! exactly one succeeds:
//!
//! ```text
//! 32 concurrent create() on one unit
//!   → 1 × Ok(reservation)
//!   → 31 × Err(UnitAlreadyReserved)
//! ```
//!
//! ## 2. Transactions Without a Database
//!
//! The store's write guard is the transaction boundary. Every
//! check+mutate sequence runs under a single acquisition, and validation
//! precedes mutation, so a failed operation leaves no partial state.
//!
//! ## 3. Deadlines Are Data
//!
//! Negotiation deadlines and waiting-list expiries are timestamps checked
//! lazily against an injected clock. The sweep facade in [`tasks`] can
//! run at any cadence; sweeps are idempotent and recheck every candidate
//! under the write guard.
//!
//! # Usage
//!
//! Wire an [`Engine`] with an [`config::EngineConfig`] and the
//! collaborator traits from `brokerage-core`, then call the services:
//!
//! ```ignore
//! let engine = Engine::new(
//!     EngineConfig::from_env(),
//!     Arc::new(SystemClock),
//!     Arc::new(PdfVoucherRenderer::new(out_dir)),
//!     Arc::new(WebhookFanout::new(endpoint)),
//!     Arc::new(RoleTableAccess::from_env()),
//! );
//! engine.store().register_unit(unit).await?;
//! let reservation = engine.reservations().create(request).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod commission;
pub mod config;
mod effects;
pub mod negotiation;
pub mod reservation;
pub mod store;
pub mod tasks;
pub mod waitlist;

pub use commission::{CommissionService, CreateCommission, DistributionResponse};
pub use config::EngineConfig;
pub use negotiation::NegotiationService;
pub use reservation::{CreateReservation, ReservationService};
pub use store::EngineStore;
pub use tasks::{MaintenanceTasks, SweepReport};
pub use waitlist::{ConversionTerms, WaitingListService};

use brokerage_core::environment::{AccessPolicy, Clock, VoucherRenderer};
use brokerage_core::events::NotificationFanout;
use std::sync::Arc;

/// The four services wired over one shared store.
///
/// Construction is cheap and infallible; all state lives behind the
/// store's locks, so the engine handle can be cloned into as many tasks
/// as needed via the inner `Arc`s.
pub struct Engine {
    store: Arc<EngineStore>,
    reservations: Arc<ReservationService>,
    negotiations: Arc<NegotiationService>,
    commissions: Arc<CommissionService>,
    waiting_list: Arc<WaitingListService>,
    tasks: MaintenanceTasks,
}

impl Engine {
    /// Wires the services over a fresh store with the given collaborators
    #[must_use]
    pub fn new(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        voucher: Arc<dyn VoucherRenderer>,
        fanout: Arc<dyn NotificationFanout>,
        access: Arc<dyn AccessPolicy>,
    ) -> Self {
        let store = Arc::new(EngineStore::new());

        let reservations = Arc::new(ReservationService::new(
            Arc::clone(&store),
            config.negotiation.clone(),
            Arc::clone(&clock),
            Arc::clone(&voucher),
            Arc::clone(&fanout),
            Arc::clone(&access),
        ));
        let negotiations = Arc::new(NegotiationService::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            Arc::clone(&voucher),
            Arc::clone(&fanout),
            Arc::clone(&access),
        ));
        let commissions = Arc::new(CommissionService::new(
            Arc::clone(&store),
            config.commission.clone(),
            Arc::clone(&clock),
            Arc::clone(&fanout),
            Arc::clone(&access),
        ));
        let waiting_list = Arc::new(WaitingListService::new(
            Arc::clone(&store),
            config.waiting_list.clone(),
            Arc::clone(&clock),
            Arc::clone(&fanout),
            Arc::clone(&access),
            Arc::clone(&reservations),
        ));
        let tasks = MaintenanceTasks::new(Arc::clone(&negotiations), Arc::clone(&waiting_list));

        Self {
            store,
            reservations,
            negotiations,
            commissions,
            waiting_list,
            tasks,
        }
    }

    /// The shared store: unit registration and read access
    #[must_use]
    pub fn store(&self) -> &Arc<EngineStore> {
        &self.store
    }

    /// Claim operations
    #[must_use]
    pub fn reservations(&self) -> &Arc<ReservationService> {
        &self.reservations
    }

    /// Negotiation responses and the expiry sweep
    #[must_use]
    pub fn negotiations(&self) -> &Arc<NegotiationService> {
        &self.negotiations
    }

    /// Commission lifecycle and distributions
    #[must_use]
    pub fn commissions(&self) -> &Arc<CommissionService> {
        &self.commissions
    }

    /// Waiting list queue operations
    #[must_use]
    pub fn waiting_list(&self) -> &Arc<WaitingListService> {
        &self.waiting_list
    }

    /// Scheduled maintenance entry point
    #[must_use]
    pub fn tasks(&self) -> &MaintenanceTasks {
        &self.tasks
    }
}
