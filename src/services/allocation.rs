//! Expiration-ordered dose consumption across stock lots.
//!
//! Lots are drained soonest-expiring first, which minimizes future waste.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, QueryFilter, QueryOrder,
    Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::entities::owner::StockOwner;
use crate::entities::stock_lot::{self, LotStatus};
use crate::errors::StockError;
use crate::events::{Event, EventSender};
use crate::services::stock_lots::lots_for_owner;

/// One slice of a consumption, taken from a single lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotAllocation {
    pub lot_id: i64,
    pub quantity: i32,
    pub expiration: NaiveDate,
    pub status: LotStatus,
}

/// Greedy plan over lots already sorted by expiration ascending.
///
/// Pure; fails before any mutation when the lots cannot cover the request.
pub(crate) fn plan_consumption(
    lots: &[stock_lot::Model],
    requested: i32,
) -> Result<Vec<LotAllocation>, StockError> {
    let available: i64 = lots
        .iter()
        .map(|lot| i64::from(lot.remaining_quantity.max(0)))
        .sum();
    if available < i64::from(requested) {
        return Err(StockError::InsufficientStock {
            requested,
            available: available.min(i64::from(i32::MAX)) as i32,
        });
    }

    let mut needed = requested;
    let mut plan = Vec::new();
    for lot in lots {
        if needed == 0 {
            break;
        }
        let take = needed.min(lot.remaining_quantity);
        if take <= 0 {
            continue;
        }
        plan.push(LotAllocation {
            lot_id: lot.id,
            quantity: take,
            expiration: lot.expiration,
            status: lot.lot_status().unwrap_or(LotStatus::Valid),
        });
        needed -= take;
    }

    Ok(plan)
}

/// Loads the owner's valid lots and applies the greedy plan on the given
/// connection. Shared with the transfer flow, which consumes source stock
/// inside its own transaction.
pub(crate) async fn apply_consumption<C: ConnectionTrait>(
    conn: &C,
    vaccine_id: i64,
    owner: StockOwner,
    quantity: i32,
) -> Result<Vec<LotAllocation>, StockError> {
    let lots = lots_for_owner(vaccine_id, owner)
        .filter(stock_lot::Column::Status.eq(LotStatus::Valid.as_str()))
        .filter(stock_lot::Column::RemainingQuantity.gt(0))
        .order_by_asc(stock_lot::Column::Expiration)
        .all(conn)
        .await?;

    let plan = plan_consumption(&lots, quantity)?;

    let by_id: HashMap<i64, &stock_lot::Model> = lots.iter().map(|lot| (lot.id, lot)).collect();
    for allocation in &plan {
        if let Some(lot) = by_id.get(&allocation.lot_id) {
            let mut active: stock_lot::ActiveModel = (*lot).clone().into();
            active.remaining_quantity = Set(lot.remaining_quantity - allocation.quantity);
            active.updated_at = Set(Utc::now());
            active.update(conn).await?;
        }
    }

    Ok(plan)
}

/// Service consuming doses from an owner's lots.
#[derive(Clone)]
pub struct AllocationService {
    db: Arc<DatabaseConnection>,
    events: EventSender,
}

impl AllocationService {
    pub fn new(db: Arc<DatabaseConnection>, events: EventSender) -> Self {
        Self { db, events }
    }

    /// Consumes `quantity` doses from the owner's valid lots, soonest
    /// expiration first.
    ///
    /// All-or-nothing: when total remaining stock cannot cover the request,
    /// the operation fails with `InsufficientStock` and no lot is touched.
    /// The returned allocations always sum exactly to the request. Counters
    /// are not adjusted here; callers that permanently remove stock own that
    /// follow-up.
    #[instrument(skip(self))]
    pub async fn consume_lots(
        &self,
        vaccine_id: i64,
        owner: StockOwner,
        quantity: i32,
    ) -> Result<Vec<LotAllocation>, StockError> {
        if quantity <= 0 {
            return Err(StockError::InvalidQuantity(i64::from(quantity)));
        }

        let allocations = self
            .db
            .transaction::<_, Vec<LotAllocation>, StockError>(move |txn| {
                Box::pin(async move { apply_consumption(txn, vaccine_id, owner, quantity).await })
            })
            .await?;

        counter!("vaxstock.doses_consumed", quantity as u64);
        self.events.stock_summary_stale(vaccine_id, owner).await;
        self.events
            .emit(Event::DosesConsumed {
                vaccine_id,
                quantity,
            })
            .await;
        info!(
            vaccine_id,
            quantity,
            lots = allocations.len(),
            "consumed doses from stock lots"
        );

        Ok(allocations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use proptest::prelude::*;

    fn lot(id: i64, remaining: i32, expires_in_days: i64) -> stock_lot::Model {
        let now = Utc::now();
        stock_lot::Model {
            id,
            vaccine_id: 1,
            owner_type: "HEALTHCENTER".to_string(),
            owner_id: Some(1),
            quantity: remaining,
            remaining_quantity: remaining,
            expiration: now.date_naive() + Duration::days(expires_in_days),
            status: LotStatus::Valid.as_str().to_string(),
            source_lot_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn plan_takes_soonest_expiring_lot_first() {
        let lots = vec![lot(1, 50, 30), lot(2, 100, 60)];
        let plan = plan_consumption(&lots, 30).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].lot_id, 1);
        assert_eq!(plan[0].quantity, 30);
    }

    #[test]
    fn plan_spans_lots_when_first_is_exhausted() {
        let lots = vec![lot(1, 50, 30), lot(2, 100, 60)];
        let plan = plan_consumption(&lots, 60).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].quantity, 50);
        assert_eq!(plan[1].quantity, 10);
    }

    #[test]
    fn plan_fails_when_stock_is_insufficient() {
        let lots = vec![lot(1, 50, 30), lot(2, 100, 60)];
        let err = plan_consumption(&lots, 200).unwrap_err();
        match err {
            StockError::InsufficientStock {
                requested,
                available,
            } => {
                assert_eq!(requested, 200);
                assert_eq!(available, 150);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    proptest! {
        #[test]
        fn plan_allocations_sum_to_request(
            remainders in proptest::collection::vec(0i32..500, 1..8),
            requested in 1i32..1000,
        ) {
            let lots: Vec<stock_lot::Model> = remainders
                .iter()
                .enumerate()
                .map(|(i, &r)| lot(i as i64 + 1, r, i as i64 + 1))
                .collect();
            let total: i64 = remainders.iter().map(|&r| i64::from(r)).sum();

            match plan_consumption(&lots, requested) {
                Ok(plan) => {
                    prop_assert!(i64::from(requested) <= total);
                    let allocated: i64 = plan.iter().map(|a| i64::from(a.quantity)).sum();
                    prop_assert_eq!(allocated, i64::from(requested));
                    // never takes more than a lot holds, in expiration order
                    for allocation in &plan {
                        let source = lots.iter().find(|l| l.id == allocation.lot_id).unwrap();
                        prop_assert!(allocation.quantity <= source.remaining_quantity);
                    }
                    for pair in plan.windows(2) {
                        prop_assert!(pair[0].expiration <= pair[1].expiration);
                    }
                }
                Err(StockError::InsufficientStock { .. }) => {
                    prop_assert!(i64::from(requested) > total);
                }
                Err(other) => return Err(TestCaseError::fail(format!("{:?}", other))),
            }
        }
    }
}
