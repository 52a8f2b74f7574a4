//! Dose reservations for health centers.
//!
//! A reservation is a soft hold of doses from one specific lot against a
//! future appointment, reversible via release. Reservation picks the
//! earliest-expiring lot that can still cover the appointment date.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::entities::owner::StockOwner;
use crate::entities::stock_lot::{self, LotStatus};
use crate::entities::stock_reservation;
use crate::errors::StockError;
use crate::events::{Event, EventSender};
use crate::services::stock_levels;
use crate::services::stock_lots::lots_for_owner;

/// Input for reserving doses at a health center.
#[derive(Debug, Clone, Copy)]
pub struct ReserveDoseInput {
    pub vaccine_id: i64,
    pub health_center_id: Option<i64>,
    pub quantity: i32,
    pub appointment_date: Option<NaiveDate>,
}

impl ReserveDoseInput {
    /// Single-dose reservation, the common case for one appointment.
    pub fn single(vaccine_id: i64, health_center_id: i64) -> Self {
        Self {
            vaccine_id,
            health_center_id: Some(health_center_id),
            quantity: 1,
            appointment_date: None,
        }
    }

    pub fn with_appointment(mut self, date: NaiveDate) -> Self {
        self.appointment_date = Some(date);
        self
    }

    pub fn with_quantity(mut self, quantity: i32) -> Self {
        self.quantity = quantity;
        self
    }
}

/// Result of a successful reservation: which lot covers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationOutcome {
    pub lot_id: i64,
    pub quantity: i32,
}

/// Picks a reason for an empty candidate set, most specific first.
async fn reservation_failure<C: ConnectionTrait>(
    conn: &C,
    vaccine_id: i64,
    owner: StockOwner,
    appointment: Option<NaiveDate>,
) -> Result<StockError, StockError> {
    let valid_with_stock = lots_for_owner(vaccine_id, owner)
        .filter(stock_lot::Column::Status.eq(LotStatus::Valid.as_str()))
        .filter(stock_lot::Column::RemainingQuantity.gt(0))
        .count(conn)
        .await?;

    if let Some(date) = appointment {
        if valid_with_stock > 0 {
            let covering = lots_for_owner(vaccine_id, owner)
                .filter(stock_lot::Column::Status.eq(LotStatus::Valid.as_str()))
                .filter(stock_lot::Column::RemainingQuantity.gt(0))
                .filter(stock_lot::Column::Expiration.gt(date))
                .count(conn)
                .await?;
            if covering == 0 {
                return Ok(StockError::LotWillExpireBeforeAppointment(date));
            }
        }
    }

    if valid_with_stock == 0 {
        let expired_with_stock = lots_for_owner(vaccine_id, owner)
            .filter(stock_lot::Column::Status.eq(LotStatus::Expired.as_str()))
            .filter(stock_lot::Column::RemainingQuantity.gt(0))
            .count(conn)
            .await?;
        if expired_with_stock > 0 {
            return Ok(StockError::AllLotsExpired);
        }
    }

    Ok(StockError::NoAvailableLot)
}

/// Validates the request, checks the counter, picks the candidate lot and
/// applies the hold on the given connection.
async fn reserve_on<C: ConnectionTrait>(
    conn: &C,
    input: ReserveDoseInput,
) -> Result<(ReservationOutcome, i64), StockError> {
    let health_center_id = input.health_center_id.ok_or_else(|| {
        StockError::InvalidOwner("health center id is required to reserve a dose".to_string())
    })?;
    if input.quantity <= 0 {
        return Err(StockError::InvalidQuantity(i64::from(input.quantity)));
    }

    let vaccine_id = input.vaccine_id;
    let quantity = input.quantity;
    let owner = StockOwner::health_center(health_center_id);

    let available = stock_levels::find_level(conn, vaccine_id, owner)
        .await?
        .map(|level| level.quantity)
        .unwrap_or(0);
    if available < quantity {
        return Err(StockError::InsufficientStock {
            requested: quantity,
            available,
        });
    }

    // A lot expiring on or before the appointment day cannot cover a dose
    // needed that day, sufficient remaining stock or not.
    let mut candidates = lots_for_owner(vaccine_id, owner)
        .filter(stock_lot::Column::Status.eq(LotStatus::Valid.as_str()))
        .filter(stock_lot::Column::RemainingQuantity.gte(quantity));
    if let Some(date) = input.appointment_date {
        candidates = candidates.filter(stock_lot::Column::Expiration.gt(date));
    }
    let candidate = candidates
        .order_by_asc(stock_lot::Column::Expiration)
        .one(conn)
        .await?;

    let lot = match candidate {
        Some(lot) => lot,
        None => {
            return Err(
                reservation_failure(conn, vaccine_id, owner, input.appointment_date).await?,
            )
        }
    };

    let mut active: stock_lot::ActiveModel = lot.clone().into();
    active.remaining_quantity = Set(lot.remaining_quantity - quantity);
    active.updated_at = Set(Utc::now());
    active.update(conn).await?;

    stock_levels::adjust_quantity(conn, vaccine_id, owner, -quantity).await?;

    Ok((
        ReservationOutcome {
            lot_id: lot.id,
            quantity,
        },
        health_center_id,
    ))
}

/// Returns held doses to a lot and to the health center's counter.
async fn release_on<C: ConnectionTrait>(
    conn: &C,
    vaccine_id: i64,
    health_center_id: i64,
    lot_id: i64,
    quantity: i32,
) -> Result<bool, StockError> {
    let lot = match stock_lot::Entity::find_by_id(lot_id).one(conn).await? {
        Some(lot) => lot,
        None => return Ok(false),
    };

    // remaining can never exceed the lot's original quantity, even on a
    // spurious double release
    let mut active: stock_lot::ActiveModel = lot.clone().into();
    active.remaining_quantity = Set(lot
        .quantity
        .min(lot.remaining_quantity.saturating_add(quantity)));
    active.updated_at = Set(Utc::now());
    active.update(conn).await?;

    let owner = StockOwner::health_center(health_center_id);
    stock_levels::credit_or_create(conn, vaccine_id, owner, quantity).await?;

    Ok(true)
}

/// Service reserving and releasing doses against appointments.
#[derive(Clone)]
pub struct ReservationService {
    db: Arc<DatabaseConnection>,
    events: EventSender,
}

impl ReservationService {
    pub fn new(db: Arc<DatabaseConnection>, events: EventSender) -> Self {
        Self { db, events }
    }

    /// Reserves doses from the earliest-expiring lot that can cover them.
    ///
    /// When an appointment date is supplied, only lots expiring strictly
    /// after that calendar date qualify. On failure the error names the most
    /// specific reason: `LotWillExpireBeforeAppointment` when valid stock
    /// exists but none of it survives to the appointment, `AllLotsExpired`
    /// when only expired stock remains, `NoAvailableLot` otherwise.
    #[instrument(skip(self))]
    pub async fn reserve_dose_for_health_center(
        &self,
        input: ReserveDoseInput,
    ) -> Result<ReservationOutcome, StockError> {
        let (outcome, health_center_id) = self
            .db
            .transaction::<_, (ReservationOutcome, i64), StockError>(move |txn| {
                Box::pin(async move { reserve_on(txn, input).await })
            })
            .await?;

        counter!("vaxstock.doses_reserved", outcome.quantity as u64);
        self.events
            .stock_summary_stale(input.vaccine_id, StockOwner::health_center(health_center_id))
            .await;
        self.events
            .emit(Event::DoseReserved {
                vaccine_id: input.vaccine_id,
                health_center_id,
                lot_id: outcome.lot_id,
                quantity: outcome.quantity,
            })
            .await;
        info!(
            vaccine_id = input.vaccine_id,
            health_center_id,
            lot_id = outcome.lot_id,
            quantity = outcome.quantity,
            "reserved doses"
        );

        Ok(outcome)
    }

    /// Returns previously held doses to a lot and the health center counter.
    ///
    /// Deliberately silent (`Ok(false)`) when the health center id, the lot
    /// id, or the lot row itself is missing, or when the quantity is not
    /// positive: release is called defensively from cleanup paths where the
    /// reservation might never have succeeded. The counter row is created
    /// when absent, so returning stock is never blocked by missing
    /// bookkeeping.
    #[instrument(skip(self))]
    pub async fn release_dose_for_health_center(
        &self,
        vaccine_id: i64,
        health_center_id: Option<i64>,
        lot_id: Option<i64>,
        quantity: i32,
    ) -> Result<bool, StockError> {
        let (health_center_id, lot_id) = match (health_center_id, lot_id) {
            (Some(health_center_id), Some(lot_id)) => (health_center_id, lot_id),
            _ => return Ok(false),
        };
        if quantity <= 0 {
            return Ok(false);
        }

        let released = self
            .db
            .transaction::<_, bool, StockError>(move |txn| {
                Box::pin(async move {
                    release_on(txn, vaccine_id, health_center_id, lot_id, quantity).await
                })
            })
            .await?;

        if released {
            self.events
                .stock_summary_stale(vaccine_id, StockOwner::health_center(health_center_id))
                .await;
            self.events
                .emit(Event::DoseReleased {
                    vaccine_id,
                    health_center_id,
                    lot_id,
                    quantity,
                })
                .await;
            info!(vaccine_id, health_center_id, lot_id, quantity, "released doses");
        }

        Ok(released)
    }

    /// Reserves doses and persists the reservation row linking the chosen
    /// lot to the caller's schedule entity, in one transaction.
    #[instrument(skip(self))]
    pub async fn reserve_for_schedule(
        &self,
        input: ReserveDoseInput,
        schedule_id: i64,
    ) -> Result<stock_reservation::Model, StockError> {
        let reservation = self
            .db
            .transaction::<_, stock_reservation::Model, StockError>(move |txn| {
                Box::pin(async move {
                    let (outcome, health_center_id) = reserve_on(txn, input).await?;

                    let reservation = stock_reservation::ActiveModel {
                        vaccine_id: Set(input.vaccine_id),
                        health_center_id: Set(health_center_id),
                        lot_id: Set(outcome.lot_id),
                        quantity: Set(outcome.quantity),
                        schedule_id: Set(Some(schedule_id)),
                        appointment_date: Set(input.appointment_date),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;

                    Ok(reservation)
                })
            })
            .await?;

        counter!("vaxstock.doses_reserved", reservation.quantity as u64);
        self.events
            .stock_summary_stale(
                reservation.vaccine_id,
                StockOwner::health_center(reservation.health_center_id),
            )
            .await;
        self.events
            .emit(Event::DoseReserved {
                vaccine_id: reservation.vaccine_id,
                health_center_id: reservation.health_center_id,
                lot_id: reservation.lot_id,
                quantity: reservation.quantity,
            })
            .await;
        info!(
            reservation_id = %reservation.id,
            schedule_id,
            lot_id = reservation.lot_id,
            "reserved doses for schedule"
        );

        Ok(reservation)
    }

    /// Cancels a persisted reservation: releases the held doses and deletes
    /// the row. A missing reservation is a valid no-op (`Ok(false)`).
    #[instrument(skip(self))]
    pub async fn cancel_reservation(&self, reservation_id: Uuid) -> Result<bool, StockError> {
        let cancelled = self
            .db
            .transaction::<_, Option<(i64, i64, i64, i32)>, StockError>(move |txn| {
                Box::pin(async move {
                    let reservation = match stock_reservation::Entity::find_by_id(reservation_id)
                        .one(txn)
                        .await?
                    {
                        Some(reservation) => reservation,
                        None => return Ok(None),
                    };

                    release_on(
                        txn,
                        reservation.vaccine_id,
                        reservation.health_center_id,
                        reservation.lot_id,
                        reservation.quantity,
                    )
                    .await?;

                    stock_reservation::Entity::delete_by_id(reservation.id)
                        .exec(txn)
                        .await?;

                    Ok(Some((
                        reservation.vaccine_id,
                        reservation.health_center_id,
                        reservation.lot_id,
                        reservation.quantity,
                    )))
                })
            })
            .await?;

        match cancelled {
            Some((vaccine_id, health_center_id, lot_id, quantity)) => {
                self.events
                    .stock_summary_stale(vaccine_id, StockOwner::health_center(health_center_id))
                    .await;
                self.events
                    .emit(Event::DoseReleased {
                        vaccine_id,
                        health_center_id,
                        lot_id,
                        quantity,
                    })
                    .await;
                info!(%reservation_id, "cancelled reservation");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Reservations currently held against one lot.
    #[instrument(skip(self))]
    pub async fn reservations_for_lot(
        &self,
        lot_id: i64,
    ) -> Result<Vec<stock_reservation::Model>, StockError> {
        Ok(stock_reservation::Entity::find()
            .filter(stock_reservation::Column::LotId.eq(lot_id))
            .all(&*self.db)
            .await?)
    }
}
