use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// An in-flight movement of doses awaiting confirmation. The moved doses
/// sit in empty pending lots at the destination, tracked through
/// [`super::pending_stock_transfer_lot`] lines; deleting the last line
/// deletes the pending transfer itself.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pending_stock_transfers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub vaccine_id: i64,
    pub from_type: String,
    pub from_id: Option<i64>,
    pub to_type: String,
    pub to_id: Option<i64>,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::pending_stock_transfer_lot::Entity")]
    Lots,
}

impl Related<super::pending_stock_transfer_lot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lots.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
