//! # Brokerage Testing
//!
//! Deterministic clocks and recording mocks for brokerage engine tests.
//!
//! This crate provides:
//! - Mock implementations of the engine's environment traits
//! - Recording collaborators that capture side effects for assertions
//! - Fixture builders for common domain values
//!
//! ## Example
//!
//! ```ignore
//! use brokerage_testing::{test_clock, RecordingFanout};
//!
//! #[tokio::test]
//! async fn test_reservation_flow() {
//!     let clock = Arc::new(test_clock());
//!     let fanout = Arc::new(RecordingFanout::new());
//!     let engine = Engine::new(config, clock, fanout.clone(), ...);
//!
//!     engine.reservations().create(request).await?;
//!
//!     assert_eq!(fanout.sent().len(), 1);
//! }
//! ```

use async_trait::async_trait;
use brokerage_core::environment::{
    AccessPolicy, Actor, Capability, Clock, VoucherError, VoucherRenderer,
};
use brokerage_core::events::{FanoutError, Notification, NotificationFanout};
use brokerage_core::types::ReservationSnapshot;
use chrono::{DateTime, Duration, Utc};

/// Mock implementations for testing.
pub mod mocks {
    use super::{
        AccessPolicy, Actor, Capability, Clock, DateTime, Duration, FanoutError, Notification,
        NotificationFanout, ReservationSnapshot, Utc, VoucherError, VoucherRenderer, async_trait,
    };
    use brokerage_core::types::AgentId;
    use std::collections::{HashMap, HashSet};
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex, PoisonError, RwLock};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use brokerage_testing::mocks::FixedClock;
    /// use brokerage_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Advanceable clock for deadline and expiry tests
    ///
    /// Starts at a chosen instant; tests move it forward explicitly to step
    /// past negotiation deadlines or waiting-list expiries. Clones share the
    /// same underlying time.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<RwLock<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a manual clock starting at the given time
        #[must_use]
        pub fn new(start: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(RwLock::new(start)),
            }
        }

        /// Move the clock forward by `duration`
        pub fn advance(&self, duration: Duration) {
            let mut guard = self.time.write().unwrap_or_else(PoisonError::into_inner);
            *guard += duration;
        }

        /// Set the clock to an absolute instant
        pub fn set(&self, time: DateTime<Utc>) {
            let mut guard = self.time.write().unwrap_or_else(PoisonError::into_inner);
            *guard = time;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.read().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Notification fan-out that records everything it is asked to send
    ///
    /// Construct with [`RecordingFanout::failing`] to simulate a transport
    /// outage; the engine must treat delivery as best-effort either way.
    #[derive(Debug, Default)]
    pub struct RecordingFanout {
        sent: Mutex<Vec<Notification>>,
        fail: bool,
    }

    impl RecordingFanout {
        /// Create a fan-out that accepts every notification
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a fan-out whose every dispatch fails
        #[must_use]
        pub fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        /// All notifications dispatched so far, in dispatch order
        #[must_use]
        pub fn sent(&self) -> Vec<Notification> {
            self.sent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    #[async_trait]
    impl NotificationFanout for RecordingFanout {
        async fn notify(&self, notification: Notification) -> Result<(), FanoutError> {
            self.sent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(notification);
            if self.fail {
                return Err(FanoutError::DispatchFailed(
                    "recording fanout configured to fail".to_string(),
                ));
            }
            Ok(())
        }
    }

    /// Voucher renderer that records rendered snapshots without touching disk
    #[derive(Debug, Default)]
    pub struct RecordingVoucher {
        rendered: Mutex<Vec<ReservationSnapshot>>,
        fail: bool,
    }

    impl RecordingVoucher {
        /// Create a renderer that succeeds for every snapshot
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a renderer whose every render fails
        #[must_use]
        pub fn failing() -> Self {
            Self {
                rendered: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        /// All snapshots rendered so far, in render order
        #[must_use]
        pub fn rendered(&self) -> Vec<ReservationSnapshot> {
            self.rendered
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    #[async_trait]
    impl VoucherRenderer for RecordingVoucher {
        async fn render(&self, snapshot: &ReservationSnapshot) -> Result<PathBuf, VoucherError> {
            if self.fail {
                return Err(VoucherError::RenderFailed(
                    "recording voucher configured to fail".to_string(),
                ));
            }
            self.rendered
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(snapshot.clone());
            Ok(PathBuf::from(format!(
                "vouchers/{}.pdf",
                snapshot.unit_number
            )))
        }
    }

    /// Access policy granting exactly the capabilities a test hands out
    ///
    /// # Example
    ///
    /// ```
    /// use brokerage_testing::mocks::GrantTable;
    /// use brokerage_core::environment::{AccessPolicy, Actor, Capability};
    /// use brokerage_core::types::AgentId;
    ///
    /// let manager = AgentId::new();
    /// let policy = GrantTable::new().grant(manager, Capability::ApproveNegotiations);
    /// let actor = Actor::new(manager, "manager".to_string());
    /// assert!(policy.allows(&actor, Capability::ApproveNegotiations));
    /// assert!(!policy.allows(&actor, Capability::ManageCommissions));
    /// ```
    #[derive(Debug, Default, Clone)]
    pub struct GrantTable {
        grants: HashMap<AgentId, HashSet<Capability>>,
    }

    impl GrantTable {
        /// Create an empty grant table (denies everything)
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Grant one capability to one agent
        #[must_use]
        pub fn grant(mut self, agent_id: AgentId, capability: Capability) -> Self {
            self.grants.entry(agent_id).or_default().insert(capability);
            self
        }
    }

    impl AccessPolicy for GrantTable {
        fn allows(&self, actor: &Actor, capability: Capability) -> bool {
            self.grants
                .get(&actor.agent_id)
                .is_some_and(|set| set.contains(&capability))
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Fixture builders for common domain values.
pub mod fixtures {
    use brokerage_core::types::{ClientContact, Money, PaymentMethod, PaymentTerms};

    /// Build a client contact with a phone number derived from the name
    #[must_use]
    pub fn client(name: &str) -> ClientContact {
        ClientContact::new(name.to_string(), format!("+20-10-{}", name.len()), None)
    }

    /// Cash payment terms with the given down payment in whole units
    #[must_use]
    pub fn cash_terms(down_payment: u64) -> PaymentTerms {
        PaymentTerms::new(PaymentMethod::Cash, Money::from_major(down_payment), None)
    }
}

// Re-export commonly used items
pub use mocks::{
    FixedClock, GrantTable, ManualClock, RecordingFanout, RecordingVoucher, test_clock,
};

#[cfg(test)]
mod tests {
    use super::*;
    use brokerage_core::events::DomainEvent;
    use brokerage_core::types::UnitId;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(test_clock().now());
        let start = clock.now();
        clock.advance(Duration::hours(49));
        assert_eq!(clock.now() - start, Duration::hours(49));
    }

    #[tokio::test]
    async fn test_recording_fanout_captures_in_order() {
        let fanout = RecordingFanout::new();
        let event = DomainEvent::UnitFreed {
            unit_id: UnitId::new(),
        };
        let notification = Notification::new(vec![], "unit freed".to_string(), event);
        let result = fanout.notify(notification.clone()).await;
        assert!(result.is_ok());
        assert_eq!(fanout.sent(), vec![notification]);
    }

    #[tokio::test]
    async fn test_failing_fanout_still_records() {
        let fanout = RecordingFanout::failing();
        let event = DomainEvent::UnitFreed {
            unit_id: UnitId::new(),
        };
        let result = fanout
            .notify(Notification::new(vec![], "x".to_string(), event))
            .await;
        assert!(result.is_err());
        assert_eq!(fanout.sent().len(), 1);
    }
}
