use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Association between a pending transfer and one of its destination lots.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pending_stock_transfer_lots")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub pending_transfer_id: i64,
    pub lot_id: i64,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::pending_stock_transfer::Entity",
        from = "Column::PendingTransferId",
        to = "super::pending_stock_transfer::Column::Id"
    )]
    PendingTransfer,
    #[sea_orm(
        belongs_to = "super::stock_lot::Entity",
        from = "Column::LotId",
        to = "super::stock_lot::Column::Id"
    )]
    Lot,
}

impl Related<super::pending_stock_transfer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PendingTransfer.def()
    }
}

impl Related<super::stock_lot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lot.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
