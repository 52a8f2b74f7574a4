//! Denormalized per-owner/per-vaccine stock counters.
//!
//! Counters record total available doses independent of lot granularity.
//! They are provisioned out-of-band (`ensure_level`) and adjusted through
//! this module only; a delta adjustment never creates a missing row.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Select, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::entities::owner::StockOwner;
use crate::entities::stock_level;
use crate::errors::StockError;

pub(crate) fn level_query(vaccine_id: i64, owner: StockOwner) -> Select<stock_level::Entity> {
    let select = stock_level::Entity::find()
        .filter(stock_level::Column::VaccineId.eq(vaccine_id))
        .filter(stock_level::Column::OwnerType.eq(owner.level.as_str()));
    match owner.id {
        Some(id) => select.filter(stock_level::Column::OwnerId.eq(id)),
        None => select.filter(stock_level::Column::OwnerId.is_null()),
    }
}

pub(crate) async fn find_level<C: ConnectionTrait>(
    conn: &C,
    vaccine_id: i64,
    owner: StockOwner,
) -> Result<Option<stock_level::Model>, StockError> {
    Ok(level_query(vaccine_id, owner).one(conn).await?)
}

/// Applies `delta` to the counter, flooring at zero.
///
/// Returns `None` when delta is zero or when no counter row exists for the
/// owner/vaccine pair; a pair may legitimately have never received stock.
pub(crate) async fn adjust_quantity<C: ConnectionTrait>(
    conn: &C,
    vaccine_id: i64,
    owner: StockOwner,
    delta: i32,
) -> Result<Option<i32>, StockError> {
    if delta == 0 {
        return Ok(None);
    }

    let level = match find_level(conn, vaccine_id, owner).await? {
        Some(level) => level,
        None => return Ok(None),
    };

    let new_quantity = level.quantity.saturating_add(delta).max(0);
    let mut active: stock_level::ActiveModel = level.into();
    active.quantity = Set(new_quantity);
    active.updated_at = Set(Utc::now());
    active.update(conn).await?;

    Ok(Some(new_quantity))
}

/// Credits the counter, creating the row when absent.
///
/// Used where bookkeeping gaps must never block incoming stock: dose
/// release and transfer confirmation.
pub(crate) async fn credit_or_create<C: ConnectionTrait>(
    conn: &C,
    vaccine_id: i64,
    owner: StockOwner,
    quantity: i32,
) -> Result<i32, StockError> {
    match find_level(conn, vaccine_id, owner).await? {
        Some(level) => {
            let new_quantity = level.quantity.saturating_add(quantity).max(0);
            let mut active: stock_level::ActiveModel = level.into();
            active.quantity = Set(new_quantity);
            active.updated_at = Set(Utc::now());
            active.update(conn).await?;
            Ok(new_quantity)
        }
        None => {
            let now = Utc::now();
            let created = stock_level::ActiveModel {
                vaccine_id: Set(vaccine_id),
                owner_type: Set(owner.level.as_str().to_string()),
                owner_id: Set(owner.id),
                quantity: Set(quantity.max(0)),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(conn)
            .await?;
            Ok(created.quantity)
        }
    }
}

/// Service for reading and adjusting stock counters.
#[derive(Clone)]
pub struct StockLevelService {
    db: Arc<DatabaseConnection>,
}

impl StockLevelService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Applies a signed delta to the counter for one owner/vaccine pair.
    ///
    /// No-op (`Ok(None)`) when delta is zero or the counter row does not
    /// exist; otherwise returns the persisted value, floored at zero.
    #[instrument(skip(self))]
    pub async fn modify_stock_quantity(
        &self,
        vaccine_id: i64,
        owner: StockOwner,
        delta: i32,
    ) -> Result<Option<i32>, StockError> {
        adjust_quantity(&*self.db, vaccine_id, owner, delta).await
    }

    #[instrument(skip(self))]
    pub async fn quantity_on_hand(
        &self,
        vaccine_id: i64,
        owner: StockOwner,
    ) -> Result<Option<i32>, StockError> {
        Ok(find_level(&*self.db, vaccine_id, owner)
            .await?
            .map(|level| level.quantity))
    }

    /// Provisions the counter row for an owner/vaccine pair.
    ///
    /// Idempotent: an existing row is returned as-is, never reset.
    #[instrument(skip(self))]
    pub async fn ensure_level(
        &self,
        vaccine_id: i64,
        owner: StockOwner,
        initial: i32,
    ) -> Result<stock_level::Model, StockError> {
        if let Some(level) = find_level(&*self.db, vaccine_id, owner).await? {
            return Ok(level);
        }

        let now = Utc::now();
        let created = stock_level::ActiveModel {
            vaccine_id: Set(vaccine_id),
            owner_type: Set(owner.level.as_str().to_string()),
            owner_id: Set(owner.id),
            quantity: Set(initial.max(0)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(
            vaccine_id,
            owner_level = owner.level.as_str(),
            quantity = created.quantity,
            "provisioned stock counter"
        );
        Ok(created)
    }
}
