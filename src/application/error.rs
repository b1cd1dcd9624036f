use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{ConsumptionId, CustomerId, PricingError, TransactionId};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Account not found: {0}")]
    AccountNotFound(CustomerId),

    #[error("Consumption record not found: {0}")]
    RecordNotFound(ConsumptionId),

    #[error("Ledger transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Transaction {0} is already confirmed")]
    AlreadyConfirmed(TransactionId),

    #[error("Storage failure: {0}")]
    StorageFailure(#[from] anyhow::Error),
}

impl AppError {
    /// Storage failures are transient (lock timeout, I/O); every other
    /// error is a rejected precondition and will fail again unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::StorageFailure(_))
    }
}

impl From<PricingError> for AppError {
    fn from(err: PricingError) -> Self {
        AppError::InvalidAmount(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::StorageFailure(err.into())
    }
}
