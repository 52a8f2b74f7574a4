//! Lot-to-lot stock movements between owners.
//!
//! A completed movement is an immutable `StockTransfer` with one line per
//! constituent lot-allocation. An in-flight movement is a
//! `PendingStockTransfer`: source stock is consumed up front and parked in
//! empty pending lots at the destination until confirmation fills them.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use tracing::{info, instrument};

use crate::entities::owner::{OwnerLevel, StockOwner};
use crate::entities::stock_lot::{self, LotStatus};
use crate::entities::{
    pending_stock_transfer, pending_stock_transfer_lot, stock_transfer, stock_transfer_line,
};
use crate::errors::StockError;
use crate::events::{Event, EventSender};
use crate::services::allocation::{self, LotAllocation};
use crate::services::stock_levels;

/// Writes one transfer header plus its lines on the given connection.
pub(crate) async fn record_transfer_on<C: ConnectionTrait>(
    conn: &C,
    vaccine_id: i64,
    from: StockOwner,
    to: StockOwner,
    allocations: &[LotAllocation],
) -> Result<stock_transfer::Model, StockError> {
    // re-normalize: a national side always carries a null id
    let from = StockOwner::new(from.level, from.id);
    let to = StockOwner::new(to.level, to.id);

    let quantity: i32 = allocations.iter().map(|a| a.quantity).sum();
    let now = Utc::now();

    let transfer = stock_transfer::ActiveModel {
        vaccine_id: Set(vaccine_id),
        from_type: Set(from.level.as_str().to_string()),
        from_id: Set(from.id),
        to_type: Set(to.level.as_str().to_string()),
        to_id: Set(to.id),
        quantity: Set(quantity),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    for allocation in allocations {
        stock_transfer_line::ActiveModel {
            transfer_id: Set(transfer.id),
            lot_id: Set(allocation.lot_id),
            quantity: Set(allocation.quantity),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(conn)
        .await?;
    }

    Ok(transfer)
}

/// Service recording transfers and driving the pending-transfer lifecycle.
#[derive(Clone)]
pub struct StockTransferService {
    db: Arc<DatabaseConnection>,
    events: EventSender,
}

impl StockTransferService {
    pub fn new(db: Arc<DatabaseConnection>, events: EventSender) -> Self {
        Self { db, events }
    }

    /// Records a completed movement of doses between two owners.
    ///
    /// Append-only: transfers are never updated or deleted from here. A
    /// transfer with no moved doses is not recorded (`Ok(None)`). Owner ids
    /// arrive normalized through [`StockOwner`], so a national side always
    /// carries a null id.
    #[instrument(skip(self, allocations))]
    pub async fn record_transfer(
        &self,
        vaccine_id: i64,
        from: StockOwner,
        to: StockOwner,
        allocations: &[LotAllocation],
    ) -> Result<Option<stock_transfer::Model>, StockError> {
        if allocations.is_empty() {
            return Ok(None);
        }

        let allocations = allocations.to_vec();
        let transfer = self
            .db
            .transaction::<_, stock_transfer::Model, StockError>(move |txn| {
                Box::pin(async move {
                    record_transfer_on(txn, vaccine_id, from, to, &allocations).await
                })
            })
            .await?;

        self.events
            .emit(Event::TransferRecorded {
                transfer_id: transfer.id,
                quantity: transfer.quantity,
            })
            .await;
        info!(
            transfer_id = transfer.id,
            quantity = transfer.quantity,
            "recorded stock transfer"
        );

        Ok(Some(transfer))
    }

    /// One transfer with its lines.
    #[instrument(skip(self))]
    pub async fn find_transfer(
        &self,
        transfer_id: i64,
    ) -> Result<Option<(stock_transfer::Model, Vec<stock_transfer_line::Model>)>, StockError> {
        let transfer = match stock_transfer::Entity::find_by_id(transfer_id)
            .one(&*self.db)
            .await?
        {
            Some(transfer) => transfer,
            None => return Ok(None),
        };

        let lines = stock_transfer_line::Entity::find()
            .filter(stock_transfer_line::Column::TransferId.eq(transfer.id))
            .all(&*self.db)
            .await?;

        Ok(Some((transfer, lines)))
    }

    /// Starts a movement: consumes source stock soonest-expiring first,
    /// debits the source counter, and parks the doses in empty PENDING lots
    /// at the destination. The doses are in flight, counted nowhere, until
    /// the transfer is confirmed or cancelled.
    #[instrument(skip(self))]
    pub async fn initiate_transfer(
        &self,
        vaccine_id: i64,
        from: StockOwner,
        to: StockOwner,
        quantity: i32,
    ) -> Result<pending_stock_transfer::Model, StockError> {
        if quantity <= 0 {
            return Err(StockError::InvalidQuantity(i64::from(quantity)));
        }
        let from = StockOwner::new(from.level, from.id);
        let to = StockOwner::new(to.level, to.id);

        let pending = self
            .db
            .transaction::<_, pending_stock_transfer::Model, StockError>(move |txn| {
                Box::pin(async move {
                    let allocations =
                        allocation::apply_consumption(txn, vaccine_id, from, quantity).await?;
                    stock_levels::adjust_quantity(txn, vaccine_id, from, -quantity).await?;

                    let now = Utc::now();
                    let pending = pending_stock_transfer::ActiveModel {
                        vaccine_id: Set(vaccine_id),
                        from_type: Set(from.level.as_str().to_string()),
                        from_id: Set(from.id),
                        to_type: Set(to.level.as_str().to_string()),
                        to_id: Set(to.id),
                        quantity: Set(quantity),
                        created_at: Set(now),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;

                    for allocation in &allocations {
                        let lot = stock_lot::ActiveModel {
                            vaccine_id: Set(vaccine_id),
                            owner_type: Set(to.level.as_str().to_string()),
                            owner_id: Set(to.id),
                            quantity: Set(0),
                            remaining_quantity: Set(0),
                            expiration: Set(allocation.expiration),
                            status: Set(LotStatus::Pending.as_str().to_string()),
                            source_lot_id: Set(Some(allocation.lot_id)),
                            created_at: Set(now),
                            updated_at: Set(now),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await?;

                        pending_stock_transfer_lot::ActiveModel {
                            pending_transfer_id: Set(pending.id),
                            lot_id: Set(lot.id),
                            quantity: Set(allocation.quantity),
                            created_at: Set(now),
                            ..Default::default()
                        }
                        .insert(txn)
                        .await?;
                    }

                    Ok(pending)
                })
            })
            .await?;

        self.events.stock_summary_stale(vaccine_id, from).await;
        info!(
            pending_transfer_id = pending.id,
            vaccine_id, quantity, "initiated stock transfer"
        );

        Ok(pending)
    }

    /// Completes an in-flight movement: fills the pending destination lots,
    /// credits the destination counter (creating it on first receipt), and
    /// records the immutable transfer before pruning the pending rows.
    ///
    /// A pending lot whose expiration passed while in flight arrives
    /// EXPIRED, not VALID.
    #[instrument(skip(self))]
    pub async fn confirm_transfer(
        &self,
        pending_transfer_id: i64,
    ) -> Result<stock_transfer::Model, StockError> {
        let (transfer, vaccine_id, to) = self
            .db
            .transaction::<_, (stock_transfer::Model, i64, StockOwner), StockError>(move |txn| {
                Box::pin(async move {
                    let pending = pending_stock_transfer::Entity::find_by_id(pending_transfer_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            StockError::NotFound(format!(
                                "pending transfer {} not found",
                                pending_transfer_id
                            ))
                        })?;

                    let from = StockOwner::new(
                        OwnerLevel::parse_column(&pending.from_type)?,
                        pending.from_id,
                    );
                    let to =
                        StockOwner::new(OwnerLevel::parse_column(&pending.to_type)?, pending.to_id);

                    let lines = pending_stock_transfer_lot::Entity::find()
                        .filter(
                            pending_stock_transfer_lot::Column::PendingTransferId.eq(pending.id),
                        )
                        .all(txn)
                        .await?;

                    let today = Utc::now().date_naive();
                    let now = Utc::now();
                    let mut moved = Vec::with_capacity(lines.len());
                    for line in &lines {
                        let lot = stock_lot::Entity::find_by_id(line.lot_id)
                            .one(txn)
                            .await?
                            .ok_or_else(|| {
                                StockError::NotFound(format!(
                                    "pending lot {} not found",
                                    line.lot_id
                                ))
                            })?;

                        let status = if lot.expiration <= today {
                            LotStatus::Expired
                        } else {
                            LotStatus::Valid
                        };
                        let source_lot_id = lot.source_lot_id;
                        let expiration = lot.expiration;

                        let mut active: stock_lot::ActiveModel = lot.into();
                        active.quantity = Set(line.quantity);
                        active.remaining_quantity = Set(line.quantity);
                        active.status = Set(status.as_str().to_string());
                        active.updated_at = Set(now);
                        active.update(txn).await?;

                        moved.push(LotAllocation {
                            lot_id: source_lot_id.unwrap_or(line.lot_id),
                            quantity: line.quantity,
                            expiration,
                            status,
                        });
                    }

                    stock_levels::credit_or_create(txn, pending.vaccine_id, to, pending.quantity)
                        .await?;

                    let transfer =
                        record_transfer_on(txn, pending.vaccine_id, from, to, &moved).await?;

                    pending_stock_transfer_lot::Entity::delete_many()
                        .filter(
                            pending_stock_transfer_lot::Column::PendingTransferId.eq(pending.id),
                        )
                        .exec(txn)
                        .await?;
                    pending_stock_transfer::Entity::delete_by_id(pending.id)
                        .exec(txn)
                        .await?;

                    Ok((transfer, pending.vaccine_id, to))
                })
            })
            .await?;

        self.events.stock_summary_stale(vaccine_id, to).await;
        self.events
            .emit(Event::TransferRecorded {
                transfer_id: transfer.id,
                quantity: transfer.quantity,
            })
            .await;
        info!(
            transfer_id = transfer.id,
            quantity = transfer.quantity,
            "confirmed stock transfer"
        );

        Ok(transfer)
    }

    /// Abandons an in-flight movement: returns the consumed doses to their
    /// source lots, credits the source counter back, and deletes the empty
    /// destination lots with the pending rows. A missing pending transfer
    /// is a valid no-op (`Ok(false)`).
    #[instrument(skip(self))]
    pub async fn cancel_transfer(&self, pending_transfer_id: i64) -> Result<bool, StockError> {
        let cancelled = self
            .db
            .transaction::<_, Option<(i64, StockOwner)>, StockError>(move |txn| {
                Box::pin(async move {
                    let pending =
                        match pending_stock_transfer::Entity::find_by_id(pending_transfer_id)
                            .one(txn)
                            .await?
                        {
                            Some(pending) => pending,
                            None => return Ok(None),
                        };

                    let from = StockOwner::new(
                        OwnerLevel::parse_column(&pending.from_type)?,
                        pending.from_id,
                    );

                    let lines = pending_stock_transfer_lot::Entity::find()
                        .filter(
                            pending_stock_transfer_lot::Column::PendingTransferId.eq(pending.id),
                        )
                        .all(txn)
                        .await?;

                    for line in &lines {
                        let destination = match stock_lot::Entity::find_by_id(line.lot_id)
                            .one(txn)
                            .await?
                        {
                            Some(lot) => lot,
                            None => continue,
                        };

                        if let Some(source_id) = destination.source_lot_id {
                            if let Some(source) =
                                stock_lot::Entity::find_by_id(source_id).one(txn).await?
                            {
                                let mut active: stock_lot::ActiveModel = source.clone().into();
                                active.remaining_quantity = Set(source
                                    .quantity
                                    .min(source.remaining_quantity.saturating_add(line.quantity)));
                                active.updated_at = Set(Utc::now());
                                active.update(txn).await?;
                            }
                        }

                        stock_lot::Entity::delete_by_id(destination.id)
                            .exec(txn)
                            .await?;
                    }

                    pending_stock_transfer_lot::Entity::delete_many()
                        .filter(
                            pending_stock_transfer_lot::Column::PendingTransferId.eq(pending.id),
                        )
                        .exec(txn)
                        .await?;
                    pending_stock_transfer::Entity::delete_by_id(pending.id)
                        .exec(txn)
                        .await?;

                    stock_levels::adjust_quantity(txn, pending.vaccine_id, from, pending.quantity)
                        .await?;

                    Ok(Some((pending.vaccine_id, from)))
                })
            })
            .await?;

        match cancelled {
            Some((vaccine_id, from)) => {
                self.events.stock_summary_stale(vaccine_id, from).await;
                info!(pending_transfer_id, "cancelled stock transfer");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
