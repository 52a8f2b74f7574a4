#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use sea_orm_migration::MigratorTrait;

use vaxstock::entities::stock_lot::{self, LotStatus};
use vaxstock::events::EventSender;
use vaxstock::migrator::Migrator;
use vaxstock::{AppState, StockOwner};

/// Fresh in-memory database with the full schema applied.
///
/// The pool is pinned to a single connection so every query sees the same
/// in-memory database.
pub async fn setup() -> AppState {
    let mut options = ConnectOptions::new("sqlite::memory:".to_owned());
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options)
        .await
        .expect("connect to in-memory sqlite");
    Migrator::up(&db, None).await.expect("apply migrations");

    AppState::new(Arc::new(db), EventSender::disabled())
}

/// ISO date string `days` from today, for `CreateLotInput` expirations.
pub fn iso_date_in(days: i64) -> String {
    (Utc::now().date_naive() + Duration::days(days))
        .format("%Y-%m-%d")
        .to_string()
}

/// Inserts a lot row directly, bypassing the ledger's validation. Used to
/// build states the service API refuses to produce, like an expired lot
/// that still has remaining stock.
pub async fn insert_lot(
    db: &DatabaseConnection,
    vaccine_id: i64,
    owner: StockOwner,
    quantity: i32,
    remaining: i32,
    expires_in_days: i64,
    status: LotStatus,
) -> stock_lot::Model {
    let now = Utc::now();
    stock_lot::ActiveModel {
        vaccine_id: Set(vaccine_id),
        owner_type: Set(owner.level.as_str().to_string()),
        owner_id: Set(owner.id),
        quantity: Set(quantity),
        remaining_quantity: Set(remaining),
        expiration: Set(now.date_naive() + Duration::days(expires_in_days)),
        status: Set(status.as_str().to_string()),
        source_lot_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert lot")
}
