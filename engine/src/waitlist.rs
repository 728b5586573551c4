//! Priority waiting list for contested units.
//!
//! Clients queue on a unit with a priority; the queue serves the highest
//! priority first, with submission order breaking ties. Entries lapse
//! after a configurable lifetime (30 days by default), evaluated lazily
//! like every other deadline in the engine.
//!
//! Conversion turns an entry into a real reservation by delegating to the
//! reservation state machine, so a converted entry competes for the unit
//! under exactly the same first-writer-wins rules as any direct claim. The
//! reservation is created on behalf of the agent who enqueued the client;
//! the converter is recorded separately for the audit trail.

use crate::config::WaitingListConfig;
use crate::effects;
use crate::reservation::{CreateReservation, ReservationService};
use crate::store::EngineStore;
use brokerage_core::environment::{AccessPolicy, Actor, Capability, Clock};
use brokerage_core::error::DomainError;
use brokerage_core::events::{DomainEvent, Notification, NotificationFanout, Recipient};
use brokerage_core::types::{
    ClientContact, EntryId, EntryStatus, Money, PaymentTerms, Reservation, ReservationKind,
    UnitId, WaitingListEntry,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Reservation details supplied at conversion time, merged with the
/// entry's client data
#[derive(Clone, Debug)]
pub struct ConversionTerms {
    /// Claim at list price, or with a negotiated price
    pub kind: ReservationKind,
    /// Payment terms agreed with the waiting client
    pub payment: PaymentTerms,
    /// Proposed selling price; required for negotiations, forbidden
    /// otherwise
    pub proposed_price: Option<Money>,
}

/// Waiting list queue operations
pub struct WaitingListService {
    store: Arc<EngineStore>,
    config: WaitingListConfig,
    clock: Arc<dyn Clock>,
    fanout: Arc<dyn NotificationFanout>,
    access: Arc<dyn AccessPolicy>,
    reservations: Arc<ReservationService>,
}

impl WaitingListService {
    /// Create a new waiting list service
    #[must_use]
    pub fn new(
        store: Arc<EngineStore>,
        config: WaitingListConfig,
        clock: Arc<dyn Clock>,
        fanout: Arc<dyn NotificationFanout>,
        access: Arc<dyn AccessPolicy>,
        reservations: Arc<ReservationService>,
    ) -> Self {
        Self {
            store,
            config,
            clock,
            fanout,
            access,
            reservations,
        }
    }

    /// Queues a client on a unit.
    ///
    /// The entry receives the configured lifetime and a store-assigned
    /// submission counter so queue order is total even for entries created
    /// in the same instant.
    ///
    /// # Errors
    ///
    /// [`DomainError::CapabilityDenied`] without
    /// [`Capability::ManageWaitingList`], [`DomainError::UnitNotFound`]
    /// for an unregistered unit, and
    /// [`DomainError::MissingClientContact`] for an empty name or phone.
    pub async fn enqueue(
        &self,
        unit_id: UnitId,
        client: ClientContact,
        priority: i32,
        actor: &Actor,
    ) -> Result<WaitingListEntry, DomainError> {
        self.ensure_can_manage(actor)?;
        if client.name.trim().is_empty() || client.phone.trim().is_empty() {
            return Err(DomainError::MissingClientContact);
        }

        let now = self.clock.now();

        let entry = {
            let mut state = self.store.write().await;
            if !state.units.contains_key(&unit_id) {
                return Err(DomainError::UnitNotFound(unit_id));
            }

            let entry = WaitingListEntry {
                id: EntryId::new(),
                unit_id,
                client,
                priority,
                status: EntryStatus::Waiting,
                sequence: state.next_sequence(),
                created_by: actor.agent_id,
                created_at: now,
                expires_at: Some(now + self.config.entry_lifetime()),
                converted_to: None,
                converted_by: None,
                converted_at: None,
            };
            state.entries.insert(entry.id, entry.clone());
            entry
        };

        tracing::info!(
            entry_id = %entry.id,
            unit_id = %unit_id,
            priority,
            "Waiting list entry created"
        );

        effects::dispatch(
            &self.fanout,
            Notification::new(
                vec![Recipient::Agent {
                    agent_id: entry.created_by,
                }],
                format!("Client {} queued for a unit", entry.client.name),
                DomainEvent::WaitingListJoined {
                    entry_id: entry.id,
                    unit_id,
                    priority,
                },
            ),
        )
        .await;

        Ok(entry)
    }

    /// Converts a waiting entry into a reservation.
    ///
    /// The claim goes through the reservation state machine on behalf of
    /// the entry's creator, so it races other claimants under the normal
    /// first-writer-wins rules; a lost race surfaces as
    /// [`DomainError::UnitAlreadyReserved`] and leaves the entry waiting.
    /// On success the entry records the reservation and the converting
    /// actor.
    ///
    /// # Errors
    ///
    /// [`DomainError::CapabilityDenied`] without
    /// [`Capability::ManageWaitingList`], [`DomainError::EntryNotFound`]
    /// for an unknown id, [`DomainError::EntryTransition`] once the entry
    /// left the queue, [`DomainError::EntryLapsed`] past its expiry, and
    /// anything [`ReservationService::create`] returns.
    pub async fn convert(
        &self,
        entry_id: EntryId,
        terms: ConversionTerms,
        converter: &Actor,
    ) -> Result<(WaitingListEntry, Reservation), DomainError> {
        self.ensure_can_manage(converter)?;

        let now = self.clock.now();

        let entry = {
            let state = self.store.read().await;
            let entry = state
                .entries
                .get(&entry_id)
                .ok_or(DomainError::EntryNotFound(entry_id))?;
            Self::ensure_serviceable(entry, now)?;
            entry.clone()
        };

        let reservation = self
            .reservations
            .create(CreateReservation {
                unit_id: entry.unit_id,
                requested_by: entry.created_by,
                kind: terms.kind,
                client: entry.client.clone(),
                payment: terms.payment,
                proposed_price: terms.proposed_price,
            })
            .await?;

        let entry = {
            let mut state = self.store.write().await;
            let entry = state
                .entries
                .get_mut(&entry_id)
                .ok_or(DomainError::EntryNotFound(entry_id))?;
            // The reservation won the unit; conversion outranks a racing
            // cancel or sweep on this entry
            if entry.status != EntryStatus::Waiting {
                tracing::warn!(
                    entry_id = %entry_id,
                    status = ?entry.status,
                    "Entry left the queue mid-conversion; marking converted anyway"
                );
            }
            entry.status = EntryStatus::Converted;
            entry.converted_to = Some(reservation.id);
            entry.converted_by = Some(converter.agent_id);
            entry.converted_at = Some(now);
            entry.clone()
        };

        tracing::info!(
            entry_id = %entry_id,
            reservation_id = %reservation.id,
            unit_id = %entry.unit_id,
            converter = %converter.agent_id,
            "Waiting list entry converted"
        );

        effects::dispatch(
            &self.fanout,
            Notification::new(
                vec![Recipient::Agent {
                    agent_id: entry.created_by,
                }],
                format!(
                    "Waiting client {} now holds a reservation",
                    entry.client.name
                ),
                DomainEvent::WaitingListConverted {
                    entry_id,
                    unit_id: entry.unit_id,
                    reservation_id: reservation.id,
                },
            ),
        )
        .await;

        Ok((entry, reservation))
    }

    /// Removes a waiting entry from the queue.
    ///
    /// # Errors
    ///
    /// [`DomainError::CapabilityDenied`] without
    /// [`Capability::ManageWaitingList`], [`DomainError::EntryNotFound`]
    /// for an unknown id, and [`DomainError::EntryTransition`] once the
    /// entry already left the queue.
    pub async fn cancel(
        &self,
        entry_id: EntryId,
        actor: &Actor,
    ) -> Result<WaitingListEntry, DomainError> {
        self.ensure_can_manage(actor)?;

        let entry = {
            let mut state = self.store.write().await;
            let entry = state
                .entries
                .get_mut(&entry_id)
                .ok_or(DomainError::EntryNotFound(entry_id))?;
            if entry.status != EntryStatus::Waiting {
                return Err(DomainError::EntryTransition {
                    id: entry_id,
                    status: entry.status,
                    attempted: "cancelled",
                });
            }
            entry.status = EntryStatus::Cancelled;
            entry.clone()
        };

        tracing::info!(entry_id = %entry_id, unit_id = %entry.unit_id, "Waiting list entry cancelled");

        Ok(entry)
    }

    /// Expires every waiting entry past its lifetime.
    ///
    /// Candidates are collected under a read guard and rechecked entry by
    /// entry under a write guard, so a conversion or cancel landing
    /// mid-sweep wins. Idempotent: a second run over the same state does
    /// nothing. Returns how many entries this run expired.
    pub async fn mark_expired(&self) -> usize {
        let now = self.clock.now();

        let candidates: Vec<EntryId> = {
            let state = self.store.read().await;
            state
                .entries
                .values()
                .filter(|entry| Self::is_lapsed(entry, now))
                .map(|entry| entry.id)
                .collect()
        };

        let mut expired = 0;
        for entry_id in candidates {
            let Some(entry) = self.expire_one(entry_id, now).await else {
                continue;
            };
            expired += 1;

            effects::dispatch(
                &self.fanout,
                Notification::new(
                    vec![Recipient::Agent {
                        agent_id: entry.created_by,
                    }],
                    format!(
                        "Waiting list entry for client {} lapsed",
                        entry.client.name
                    ),
                    DomainEvent::WaitingListExpired {
                        entry_id: entry.id,
                        unit_id: entry.unit_id,
                    },
                ),
            )
            .await;
        }

        if expired > 0 {
            tracing::info!(expired, "Waiting list expiry sweep finished");
        }
        expired
    }

    /// Serviceable entries for one unit in queue order
    pub async fn active_entries(&self, unit_id: UnitId) -> Vec<WaitingListEntry> {
        let now = self.clock.now();
        self.store
            .read()
            .await
            .active_waiting_entries_for(unit_id, now)
            .into_iter()
            .cloned()
            .collect()
    }

    /// One-based queue position of an entry, `None` once it left the
    /// queue or lapsed.
    ///
    /// # Errors
    ///
    /// [`DomainError::EntryNotFound`] for an unknown id.
    pub async fn position(&self, entry_id: EntryId) -> Result<Option<usize>, DomainError> {
        let now = self.clock.now();
        let state = self.store.read().await;
        let entry = state
            .entries
            .get(&entry_id)
            .ok_or(DomainError::EntryNotFound(entry_id))?;
        if !entry.is_active(now) {
            return Ok(None);
        }
        Ok(state
            .active_waiting_entries_for(entry.unit_id, now)
            .iter()
            .position(|candidate| candidate.id == entry_id)
            .map(|index| index + 1))
    }

    /// Flips one lapsed entry, rechecking under the write guard.
    /// `None` means a conversion or cancel got there first.
    async fn expire_one(&self, entry_id: EntryId, now: DateTime<Utc>) -> Option<WaitingListEntry> {
        let mut state = self.store.write().await;
        let entry = state.entries.get_mut(&entry_id)?;
        if !Self::is_lapsed(entry, now) {
            return None;
        }
        entry.status = EntryStatus::Expired;
        Some(entry.clone())
    }

    /// Waiting, but past its expiry
    fn is_lapsed(entry: &WaitingListEntry, now: DateTime<Utc>) -> bool {
        entry.status == EntryStatus::Waiting
            && entry.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    fn ensure_serviceable(entry: &WaitingListEntry, now: DateTime<Utc>) -> Result<(), DomainError> {
        if entry.status != EntryStatus::Waiting {
            return Err(DomainError::EntryTransition {
                id: entry.id,
                status: entry.status,
                attempted: "converted",
            });
        }
        if let Some(expired_at) = entry
            .expires_at
            .filter(|expires_at| now >= *expires_at)
        {
            return Err(DomainError::EntryLapsed {
                id: entry.id,
                expired_at,
            });
        }
        Ok(())
    }

    fn ensure_can_manage(&self, actor: &Actor) -> Result<(), DomainError> {
        if self.access.allows(actor, Capability::ManageWaitingList) {
            Ok(())
        } else {
            Err(DomainError::CapabilityDenied {
                capability: Capability::ManageWaitingList,
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use brokerage_core::types::AgentId;

    fn entry(now: DateTime<Utc>, expires_at: Option<DateTime<Utc>>) -> WaitingListEntry {
        WaitingListEntry {
            id: EntryId::new(),
            unit_id: UnitId::new(),
            client: ClientContact::new("Client".to_string(), "+20-100".to_string(), None),
            priority: 0,
            status: EntryStatus::Waiting,
            sequence: 1,
            created_by: AgentId::new(),
            created_at: now,
            expires_at,
            converted_to: None,
            converted_by: None,
            converted_at: None,
        }
    }

    #[test]
    fn lapsed_entries_are_not_serviceable() {
        let now = Utc::now();
        let stale = entry(now - chrono::Duration::days(31), Some(now - chrono::Duration::days(1)));
        let err = WaitingListService::ensure_serviceable(&stale, now).unwrap_err();
        assert!(matches!(err, DomainError::EntryLapsed { .. }));
    }

    #[test]
    fn waiting_entries_inside_their_lifetime_are_serviceable() {
        let now = Utc::now();
        let fresh = entry(now, Some(now + chrono::Duration::days(30)));
        assert!(WaitingListService::ensure_serviceable(&fresh, now).is_ok());

        let open_ended = entry(now, None);
        assert!(WaitingListService::ensure_serviceable(&open_ended, now).is_ok());
    }

    #[test]
    fn converted_entries_cannot_be_converted_again() {
        let now = Utc::now();
        let mut done = entry(now, None);
        done.status = EntryStatus::Converted;
        let err = WaitingListService::ensure_serviceable(&done, now).unwrap_err();
        assert_eq!(
            err,
            DomainError::EntryTransition {
                id: done.id,
                status: EntryStatus::Converted,
                attempted: "converted",
            }
        );
    }
}
