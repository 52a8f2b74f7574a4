use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Denormalized total-available-dose counter per owner and vaccine.
///
/// One row per (vaccine_id, owner_type, owner_id); owner_id is NULL for the
/// single national owner. Kept in sync with lot mutations by convention, not
/// by database constraint.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_levels")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub vaccine_id: i64,
    pub owner_type: String,
    pub owner_id: Option<i64>,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
