use chrono::NaiveDate;
use sea_orm::error::DbErr;
use sea_orm::TransactionError;

/// Errors raised by the stock-lot core.
///
/// Apart from `Database` and `NotFound`, every variant is a rejected
/// precondition rather than corrupted state. Validation failures propagate
/// uncaught; the deliberately silent paths (defensive release, missing
/// counter row) are expressed as `Ok` no-op results, not as errors.
#[derive(Debug, thiserror::Error)]
pub enum StockError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid expiration date: {0}")]
    InvalidExpiration(String),

    #[error("invalid quantity: {0}")]
    InvalidQuantity(i64),

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i32, available: i32 },

    #[error("missing owner identifier: {0}")]
    InvalidOwner(String),

    #[error("every candidate lot expires on or before the appointment date {0}")]
    LotWillExpireBeforeAppointment(NaiveDate),

    #[error("only expired stock remains for this owner and vaccine")]
    AllLotsExpired,

    #[error("no available lot for this owner and vaccine")]
    NoAvailableLot,
}

impl From<TransactionError<StockError>> for StockError {
    fn from(err: TransactionError<StockError>) -> Self {
        match err {
            TransactionError::Connection(db_err) => StockError::Database(db_err),
            TransactionError::Transaction(stock_err) => stock_err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_error_refolds_into_stock_error() {
        let err: StockError =
            TransactionError::Transaction(StockError::AllLotsExpired).into();
        assert!(matches!(err, StockError::AllLotsExpired));

        let err: StockError =
            TransactionError::<StockError>::Connection(DbErr::Custom("boom".into())).into();
        assert!(matches!(err, StockError::Database(_)));
    }

    #[test]
    fn insufficient_stock_message_carries_both_quantities() {
        let err = StockError::InsufficientStock {
            requested: 20,
            available: 5,
        };
        assert_eq!(
            err.to_string(),
            "insufficient stock: requested 20, available 5"
        );
    }
}
