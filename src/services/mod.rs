// Stock-lot core services
pub mod allocation;
pub mod cascade;
pub mod reservations;
pub mod stock_levels;
pub mod stock_lots;
pub mod transfers;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::events::EventSender;

/// Container holding one instance of every core service.
#[derive(Clone)]
pub struct StockServices {
    pub lots: Arc<stock_lots::StockLotService>,
    pub levels: Arc<stock_levels::StockLevelService>,
    pub allocation: Arc<allocation::AllocationService>,
    pub transfers: Arc<transfers::StockTransferService>,
    pub reservations: Arc<reservations::ReservationService>,
    pub cascade: Arc<cascade::LotCascadeService>,
}

impl StockServices {
    /// Builds all services over the shared pool and event sender.
    pub fn new(db: Arc<DatabaseConnection>, events: EventSender) -> Self {
        Self {
            lots: Arc::new(stock_lots::StockLotService::new(db.clone(), events.clone())),
            levels: Arc::new(stock_levels::StockLevelService::new(db.clone())),
            allocation: Arc::new(allocation::AllocationService::new(
                db.clone(),
                events.clone(),
            )),
            transfers: Arc::new(transfers::StockTransferService::new(
                db.clone(),
                events.clone(),
            )),
            reservations: Arc::new(reservations::ReservationService::new(
                db.clone(),
                events.clone(),
            )),
            cascade: Arc::new(cascade::LotCascadeService::new(db, events)),
        }
    }
}
