//! Durable record of accounts, metered sessions and purchased credit.

mod memory;
#[cfg(feature = "postgres")]
mod postgres;
mod records;
mod store;

pub use memory::MemoryLedger;
#[cfg(feature = "postgres")]
pub use postgres::{PostgresLedger, PostgresLedgerConfig};
pub use records::{Account, CreditGrant, UsageSession};
pub use store::{LedgerFactory, LedgerStore};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Constraint violated: {message}")]
    Constraint { message: String },

    #[error("Corrupt ledger row: {message}")]
    Corrupt { message: String },
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

#[cfg(feature = "postgres")]
pub(crate) trait StorageResultExt<T> {
    fn storage_err(self) -> LedgerResult<T>;
    fn storage_err_ctx(self, context: &str) -> LedgerResult<T>;
}

#[cfg(feature = "postgres")]
impl<T, E: std::fmt::Display> StorageResultExt<T> for std::result::Result<T, E> {
    fn storage_err(self) -> LedgerResult<T> {
        self.map_err(|e| LedgerError::Storage {
            message: e.to_string(),
        })
    }

    fn storage_err_ctx(self, context: &str) -> LedgerResult<T> {
        self.map_err(|e| LedgerError::Storage {
            message: format!("{}: {}", context, e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_error_display() {
        let err = LedgerError::Storage {
            message: "connection reset".to_string(),
        };
        assert!(err.to_string().contains("connection reset"));

        let err = LedgerError::Constraint {
            message: "unknown account acct-1".to_string(),
        };
        assert!(err.to_string().contains("acct-1"));
    }
}
