//! Stock-lot ledger: lot creation, the expiration sweep, and direct
//! (non-cascading) deletion.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Select, Set,
    TransactionTrait,
};
use tracing::{info, instrument};

use crate::entities::owner::StockOwner;
use crate::entities::stock_lot::{self, LotStatus};
use crate::entities::{stock_reservation, stock_transfer_line};
use crate::errors::StockError;
use crate::events::{Event, EventSender};
use crate::services::stock_levels;

/// Input for creating a stock lot.
///
/// The expiration arrives as text from upstream callers and must parse as an
/// ISO date (`YYYY-MM-DD`; RFC 3339 date-times are accepted and truncated to
/// their calendar date).
#[derive(Debug, Clone)]
pub struct CreateLotInput {
    pub vaccine_id: i64,
    pub owner: StockOwner,
    pub quantity: i32,
    pub expiration: String,
    pub source_lot_id: Option<i64>,
    pub status: Option<LotStatus>,
}

impl CreateLotInput {
    pub fn new(vaccine_id: i64, owner: StockOwner, quantity: i32, expiration: impl Into<String>) -> Self {
        Self {
            vaccine_id,
            owner,
            quantity,
            expiration: expiration.into(),
            source_lot_id: None,
            status: None,
        }
    }
}

pub(crate) fn parse_expiration(raw: &str) -> Result<NaiveDate, StockError> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(datetime.date_naive());
    }
    Err(StockError::InvalidExpiration(raw.to_string()))
}

/// Lots held by one owner for one vaccine.
pub(crate) fn lots_for_owner(vaccine_id: i64, owner: StockOwner) -> Select<stock_lot::Entity> {
    let select = stock_lot::Entity::find()
        .filter(stock_lot::Column::VaccineId.eq(vaccine_id))
        .filter(stock_lot::Column::OwnerType.eq(owner.level.as_str()));
    match owner.id {
        Some(id) => select.filter(stock_lot::Column::OwnerId.eq(id)),
        None => select.filter(stock_lot::Column::OwnerId.is_null()),
    }
}

/// Service owning the lot lifecycle primitives.
#[derive(Clone)]
pub struct StockLotService {
    db: Arc<DatabaseConnection>,
    events: EventSender,
}

impl StockLotService {
    pub fn new(db: Arc<DatabaseConnection>, events: EventSender) -> Self {
        Self { db, events }
    }

    /// Creates a lot with `remaining_quantity` equal to its full quantity.
    ///
    /// A zero quantity is permitted only for explicitly pending lots, which
    /// are filled once their transfer completes. An expiration on or before
    /// today forces the lot to EXPIRED no matter what status was requested.
    #[instrument(skip(self))]
    pub async fn create_lot(&self, input: CreateLotInput) -> Result<stock_lot::Model, StockError> {
        let expiration = parse_expiration(&input.expiration)?;

        let pending_requested = matches!(input.status, Some(LotStatus::Pending));
        if input.quantity < 0 || (input.quantity == 0 && !pending_requested) {
            return Err(StockError::InvalidQuantity(i64::from(input.quantity)));
        }

        let today = Utc::now().date_naive();
        let status = if expiration <= today {
            LotStatus::Expired
        } else {
            input.status.unwrap_or(LotStatus::Valid)
        };

        let now = Utc::now();
        let lot = stock_lot::ActiveModel {
            vaccine_id: Set(input.vaccine_id),
            owner_type: Set(input.owner.level.as_str().to_string()),
            owner_id: Set(input.owner.id),
            quantity: Set(input.quantity),
            remaining_quantity: Set(input.quantity),
            expiration: Set(expiration),
            status: Set(status.as_str().to_string()),
            source_lot_id: Set(input.source_lot_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        self.events
            .stock_summary_stale(lot.vaccine_id, input.owner)
            .await;
        self.events
            .emit(Event::LotCreated {
                lot_id: lot.id,
                vaccine_id: lot.vaccine_id,
            })
            .await;
        info!(
            lot_id = lot.id,
            vaccine_id = lot.vaccine_id,
            status = %lot.status,
            "created stock lot"
        );

        Ok(lot)
    }

    /// Flips every VALID or PENDING lot whose expiration has passed to
    /// EXPIRED, in one batch, and returns the flipped lots.
    ///
    /// Idempotent: with no elapsed time a second call returns an empty list.
    /// There is no in-process timer; a periodic job or an on-request check
    /// is expected to call this.
    #[instrument(skip(self))]
    pub async fn refresh_expired_lots(&self) -> Result<Vec<stock_lot::Model>, StockError> {
        let flipped = self
            .db
            .transaction::<_, Vec<stock_lot::Model>, StockError>(|txn| {
                Box::pin(async move {
                    let today = Utc::now().date_naive();
                    let now = Utc::now();

                    let stale = stock_lot::Entity::find()
                        .filter(stock_lot::Column::Status.is_in([
                            LotStatus::Valid.as_str(),
                            LotStatus::Pending.as_str(),
                        ]))
                        .filter(stock_lot::Column::Expiration.lte(today))
                        .all(txn)
                        .await?;

                    if stale.is_empty() {
                        return Ok(Vec::new());
                    }

                    let ids: Vec<i64> = stale.iter().map(|lot| lot.id).collect();
                    stock_lot::Entity::update_many()
                        .col_expr(
                            stock_lot::Column::Status,
                            Expr::value(LotStatus::Expired.as_str()),
                        )
                        .col_expr(stock_lot::Column::UpdatedAt, Expr::value(now))
                        .filter(stock_lot::Column::Id.is_in(ids))
                        .exec(txn)
                        .await?;

                    Ok(stale
                        .into_iter()
                        .map(|mut lot| {
                            lot.status = LotStatus::Expired.as_str().to_string();
                            lot.updated_at = now;
                            lot
                        })
                        .collect())
                })
            })
            .await?;

        if !flipped.is_empty() {
            let mut touched: HashSet<(i64, StockOwner)> = HashSet::new();
            for lot in &flipped {
                touched.insert((lot.vaccine_id, lot.owner()?));
            }
            for (vaccine_id, owner) in touched {
                self.events.stock_summary_stale(vaccine_id, owner).await;
            }

            let lot_ids: Vec<i64> = flipped.iter().map(|lot| lot.id).collect();
            info!(count = lot_ids.len(), "expired stale stock lots");
            self.events.emit(Event::LotsExpired { lot_ids }).await;
        }

        Ok(flipped)
    }

    /// Non-cascading deletion for a leaf lot with no derived lots.
    ///
    /// A missing lot is a valid no-op (`Ok(None)`), because callers delete
    /// defensively from cleanup paths. Remaining doses are reversed from the
    /// owner's counter before the row goes.
    #[instrument(skip(self))]
    pub async fn delete_lot_direct(&self, lot_id: i64) -> Result<Option<i64>, StockError> {
        let deleted = self
            .db
            .transaction::<_, Option<(i64, i64, StockOwner)>, StockError>(move |txn| {
                Box::pin(async move {
                    let lot = match stock_lot::Entity::find_by_id(lot_id).one(txn).await? {
                        Some(lot) => lot,
                        None => return Ok(None),
                    };

                    stock_transfer_line::Entity::delete_many()
                        .filter(stock_transfer_line::Column::LotId.eq(lot.id))
                        .exec(txn)
                        .await?;
                    stock_reservation::Entity::delete_many()
                        .filter(stock_reservation::Column::LotId.eq(lot.id))
                        .exec(txn)
                        .await?;

                    let owner = lot.owner()?;
                    if lot.remaining_quantity > 0 {
                        stock_levels::adjust_quantity(
                            txn,
                            lot.vaccine_id,
                            owner,
                            -lot.remaining_quantity,
                        )
                        .await?;
                    }

                    let id = lot.id;
                    let vaccine_id = lot.vaccine_id;
                    stock_lot::Entity::delete_by_id(id).exec(txn).await?;

                    Ok(Some((id, vaccine_id, owner)))
                })
            })
            .await?;

        match deleted {
            Some((id, vaccine_id, owner)) => {
                self.events.stock_summary_stale(vaccine_id, owner).await;
                info!(lot_id = id, "deleted stock lot");
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn get_lot(&self, lot_id: i64) -> Result<Option<stock_lot::Model>, StockError> {
        Ok(stock_lot::Entity::find_by_id(lot_id)
            .one(&*self.db)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_expiration_accepts_iso_dates() {
        let date = parse_expiration("2027-03-15").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2027, 3, 15).unwrap());
    }

    #[test]
    fn parse_expiration_truncates_rfc3339_datetimes() {
        let date = parse_expiration("2027-03-15T10:30:00Z").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2027, 3, 15).unwrap());
    }

    #[test]
    fn parse_expiration_rejects_garbage() {
        assert!(matches!(
            parse_expiration("soon"),
            Err(StockError::InvalidExpiration(_))
        ));
        assert!(matches!(
            parse_expiration("2027-13-45"),
            Err(StockError::InvalidExpiration(_))
        ));
    }
}
