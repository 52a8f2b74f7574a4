use sea_orm::DbErr;
use serde::{Deserialize, Serialize};

/// Custody level for vaccine stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OwnerLevel {
    National,
    Regional,
    District,
    HealthCenter,
}

impl OwnerLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerLevel::National => "NATIONAL",
            OwnerLevel::Regional => "REGIONAL",
            OwnerLevel::District => "DISTRICT",
            OwnerLevel::HealthCenter => "HEALTHCENTER",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "NATIONAL" => Some(OwnerLevel::National),
            "REGIONAL" => Some(OwnerLevel::Regional),
            "DISTRICT" => Some(OwnerLevel::District),
            "HEALTHCENTER" => Some(OwnerLevel::HealthCenter),
            _ => None,
        }
    }

    /// Parses a persisted owner-level column value.
    pub(crate) fn parse_column(s: &str) -> Result<Self, DbErr> {
        Self::from_str(s).ok_or_else(|| DbErr::Custom(format!("unknown owner level: {}", s)))
    }
}

/// One stock owner: a custody level plus the identifier of the concrete
/// region, district, or health center.
///
/// There is exactly one national owner, so the id is forced to `None` at
/// that level no matter what the caller passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockOwner {
    pub level: OwnerLevel,
    pub id: Option<i64>,
}

impl StockOwner {
    pub fn new(level: OwnerLevel, id: Option<i64>) -> Self {
        let id = match level {
            OwnerLevel::National => None,
            _ => id,
        };
        Self { level, id }
    }

    pub fn national() -> Self {
        Self {
            level: OwnerLevel::National,
            id: None,
        }
    }

    pub fn regional(id: i64) -> Self {
        Self::new(OwnerLevel::Regional, Some(id))
    }

    pub fn district(id: i64) -> Self {
        Self::new(OwnerLevel::District, Some(id))
    }

    pub fn health_center(id: i64) -> Self {
        Self::new(OwnerLevel::HealthCenter, Some(id))
    }
}
