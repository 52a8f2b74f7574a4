//! Vaccine stock-lot management core.
//!
//! Tracks physical vaccine inventory as expiring, quantity-bounded lots
//! across a four-level custody hierarchy (national → regional → district →
//! health center). Doses are allocated soonest-expiring first, reserved and
//! released against future appointments, moved between owners through
//! recorded transfers, and cascade-deleted together with everything derived
//! from them, with the denormalized per-owner counters kept consistent
//! throughout.
//!
//! This crate has no network surface of its own; controllers invoke the
//! services in [`services`] in-process and receive plain data structures or
//! typed [`StockError`]s back.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod migrator;
pub mod services;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

pub use entities::owner::{OwnerLevel, StockOwner};
pub use entities::stock_lot::LotStatus;
pub use errors::StockError;
pub use services::allocation::LotAllocation;
pub use services::reservations::{ReservationOutcome, ReserveDoseInput};
pub use services::stock_lots::CreateLotInput;

/// Shared application state: the database pool, the event sender, and one
/// instance of every core service.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub event_sender: events::EventSender,
    pub services: services::StockServices,
}

impl AppState {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: events::EventSender) -> Self {
        let services = services::StockServices::new(db.clone(), event_sender.clone());
        Self {
            db,
            event_sender,
            services,
        }
    }
}
