//! Account Port (Driven Port)
//!
//! Interface for reading the account evaluation balance.

use async_trait::async_trait;

use crate::domain::holdings::AccountBalance;

/// Account port error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AccountError {
    /// The request reached the brokerage and was rejected.
    #[error("Account request rejected: {message}")]
    Rejected {
        /// Error details.
        message: String,
    },

    /// The brokerage could not be reached.
    #[error("Account source unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },

    /// The response could not be interpreted.
    #[error("Malformed account response: {message}")]
    Malformed {
        /// Error details.
        message: String,
    },
}

/// Port for the account balance source.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountPort: Send + Sync {
    /// Fetch the current account evaluation balance.
    async fn account_balance(&self) -> Result<AccountBalance, AccountError>;
}
