use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::owner::{OwnerLevel, StockOwner};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_lots")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub vaccine_id: i64,
    pub owner_type: String,
    pub owner_id: Option<i64>,
    pub quantity: i32,
    pub remaining_quantity: i32,
    pub expiration: NaiveDate,
    pub status: String,
    pub source_lot_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::SourceLotId",
        to = "Column::Id"
    )]
    SourceLot,
    #[sea_orm(has_many = "super::stock_transfer_line::Entity")]
    TransferLines,
    #[sea_orm(has_many = "super::stock_reservation::Entity")]
    Reservations,
    #[sea_orm(has_many = "super::pending_stock_transfer_lot::Entity")]
    PendingTransferLots,
}

impl Related<super::stock_transfer_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TransferLines.def()
    }
}

impl Related<super::stock_reservation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reservations.def()
    }
}

impl Related<super::pending_stock_transfer_lot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PendingTransferLots.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// The owner this lot belongs to, decoded from the persisted columns.
    pub fn owner(&self) -> Result<StockOwner, DbErr> {
        let level = OwnerLevel::parse_column(&self.owner_type)?;
        Ok(StockOwner::new(level, self.owner_id))
    }

    pub fn lot_status(&self) -> Option<LotStatus> {
        LotStatus::from_str(&self.status)
    }
}

/// Lifecycle status for stock lots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LotStatus {
    Valid,
    Expired,
    Pending,
}

impl LotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LotStatus::Valid => "VALID",
            LotStatus::Expired => "EXPIRED",
            LotStatus::Pending => "PENDING",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "VALID" => Some(LotStatus::Valid),
            "EXPIRED" => Some(LotStatus::Expired),
            "PENDING" => Some(LotStatus::Pending),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lot_status_conversion() {
        assert_eq!(LotStatus::Valid.as_str(), "VALID");
        assert_eq!(LotStatus::from_str("EXPIRED"), Some(LotStatus::Expired));
        assert_eq!(LotStatus::from_str("invalid"), None);
    }
}
