//! Cascade deletion of a lot and everything causally dependent on it.
//!
//! A lot's dependents are the lots split or transferred from it (reachable
//! through `source_lot_id`), their reservations, transfer lines, and any
//! pending transfers left without lot lines.

use std::collections::HashSet;
use std::sync::Arc;

use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, TransactionTrait,
};
use tracing::{info, instrument};

use crate::entities::owner::StockOwner;
use crate::entities::{
    pending_stock_transfer, pending_stock_transfer_lot, stock_lot, stock_reservation,
    stock_transfer_line,
};
use crate::errors::StockError;
use crate::events::{Event, EventSender};
use crate::services::stock_levels;

/// Service deleting lot subtrees with counter reversal.
#[derive(Clone)]
pub struct LotCascadeService {
    db: Arc<DatabaseConnection>,
    events: EventSender,
}

impl LotCascadeService {
    pub fn new(db: Arc<DatabaseConnection>, events: EventSender) -> Self {
        Self { db, events }
    }

    /// Deletes the lot, every lot derived from it, and all dependent rows,
    /// reversing each lot's remaining quantity from its owner's counter.
    ///
    /// Children are deleted before parents; the returned ids preserve that
    /// order. A missing starting lot yields an empty list, not an error.
    /// The whole traversal runs in one transaction so counters can never
    /// drift from lot state on a partial failure.
    #[instrument(skip(self))]
    pub async fn delete_lot_cascade(&self, lot_id: i64) -> Result<Vec<i64>, StockError> {
        type CascadeResult = (Vec<i64>, Vec<(i64, StockOwner)>);

        let (deleted_ids, touched) = self
            .db
            .transaction::<_, CascadeResult, StockError>(move |txn| {
                Box::pin(async move {
                    // Iterative depth-first traversal; the visited set makes
                    // cycle safety explicit.
                    let mut worklist: Vec<(i64, u32)> = vec![(lot_id, 0)];
                    let mut visited: HashSet<i64> = HashSet::new();
                    let mut collected: Vec<(stock_lot::Model, u32)> = Vec::new();
                    let mut pending_ids: HashSet<i64> = HashSet::new();

                    while let Some((current_id, depth)) = worklist.pop() {
                        if !visited.insert(current_id) {
                            continue;
                        }

                        let lot = match stock_lot::Entity::find_by_id(current_id).one(txn).await? {
                            Some(lot) => lot,
                            None => continue,
                        };

                        let lines = pending_stock_transfer_lot::Entity::find()
                            .filter(pending_stock_transfer_lot::Column::LotId.eq(lot.id))
                            .all(txn)
                            .await?;
                        for line in &lines {
                            pending_ids.insert(line.pending_transfer_id);
                        }
                        pending_stock_transfer_lot::Entity::delete_many()
                            .filter(pending_stock_transfer_lot::Column::LotId.eq(lot.id))
                            .exec(txn)
                            .await?;

                        stock_reservation::Entity::delete_many()
                            .filter(stock_reservation::Column::LotId.eq(lot.id))
                            .exec(txn)
                            .await?;

                        let children = stock_lot::Entity::find()
                            .filter(stock_lot::Column::SourceLotId.eq(lot.id))
                            .all(txn)
                            .await?;
                        for child in children {
                            if !visited.contains(&child.id) {
                                worklist.push((child.id, depth + 1));
                            }
                        }

                        collected.push((lot, depth));
                    }

                    if collected.is_empty() {
                        return Ok((Vec::new(), Vec::new()));
                    }

                    // deepest (most derived) lots go first
                    collected.sort_by(|a, b| b.1.cmp(&a.1));

                    let ids: Vec<i64> = collected.iter().map(|(lot, _)| lot.id).collect();
                    stock_transfer_line::Entity::delete_many()
                        .filter(stock_transfer_line::Column::LotId.is_in(ids.clone()))
                        .exec(txn)
                        .await?;

                    let mut touched: Vec<(i64, StockOwner)> = Vec::new();
                    let mut seen: HashSet<(i64, StockOwner)> = HashSet::new();
                    for (lot, _) in &collected {
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
                        stock_lot::Entity::delete_by_id(lot.id).exec(txn).await?;

                        if seen.insert((lot.vaccine_id, owner)) {
                            touched.push((lot.vaccine_id, owner));
                        }
                    }

                    // prune pending transfers left without lot lines
                    for pending_id in pending_ids {
                        let remaining = pending_stock_transfer_lot::Entity::find()
                            .filter(
                                pending_stock_transfer_lot::Column::PendingTransferId
                                    .eq(pending_id),
                            )
                            .count(txn)
                            .await?;
                        if remaining == 0 {
                            pending_stock_transfer::Entity::delete_by_id(pending_id)
                                .exec(txn)
                                .await?;
                        }
                    }

                    Ok((ids, touched))
                })
            })
            .await?;

        for (vaccine_id, owner) in &touched {
            self.events.stock_summary_stale(*vaccine_id, *owner).await;
        }
        if !deleted_ids.is_empty() {
            self.events
                .emit(Event::LotsDeleted {
                    lot_ids: deleted_ids.clone(),
                })
                .await;
            info!(count = deleted_ids.len(), "cascade-deleted stock lots");
        }

        Ok(deleted_ids)
    }
}
