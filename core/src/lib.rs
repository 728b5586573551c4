//! # Brokerage Core
//!
//! Domain types, events and collaborator traits for the brokerage
//! reservation & commission engine.
//!
//! This crate provides the shared vocabulary of the engine:
//!
//! - **Types**: typed identifiers, fixed-point [`types::Money`] and
//!   [`types::Percentage`], the entities (unit, reservation, negotiation
//!   approval, commission, distribution, waiting-list entry) and their
//!   status machines
//! - **Events**: the [`events::DomainEvent`] emitted on every externally
//!   visible state change, plus the [`events::NotificationFanout`] boundary
//! - **Environment**: injected dependencies behind traits
//!   ([`environment::Clock`], [`environment::AccessPolicy`],
//!   [`environment::VoucherRenderer`]) so services stay deterministic
//!   under test
//! - **Errors**: the [`error::DomainError`] taxonomy with its coarse
//!   [`error::ErrorKind`] classification
//!
//! ## Architecture Principles
//!
//! - Status fields transition, entities are never deleted
//! - Money is fixed-point decimal with checked arithmetic
//! - Deadlines are data, evaluated lazily against an injected clock
//! - Authorization enters through one trait boundary

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod environment;
pub mod error;
pub mod events;
pub mod types;

pub use environment::{
    AccessPolicy, Actor, Capability, Clock, PermissiveAccess, SystemClock, VoucherError,
    VoucherRenderer,
};
pub use error::{DomainError, ErrorKind};
pub use events::{DomainEvent, FanoutError, Notification, NotificationFanout, ObserverRole, Recipient};
pub use types::*;
