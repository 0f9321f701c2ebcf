//! Transaction guard for automatic rollback on drop
//!
//! This module provides RAII-style transaction management with automatic rollback.

use super::driver::Driver;
use super::error::{PormError, Result};
use std::sync::Arc;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GuardState {
    Active,
    Committed,
    RolledBack,
}

/// Transaction guard that automatically rolls back on drop if not committed
///
/// # Example
///
/// ```no_run
/// use porm::prelude::*;
/// use std::sync::Arc;
///
/// fn transfer(db: Arc<dyn Driver>) -> Result<()> {
///     let tx = TransactionGuard::begin(db)?;
///     tx.driver().execute("UPDATE accounts SET balance = balance - 100 WHERE id = 1")?;
///     tx.driver().execute("UPDATE accounts SET balance = balance + 100 WHERE id = 2")?;
///     tx.commit()
/// }
/// ```
pub struct TransactionGuard {
    driver: Arc<dyn Driver>,
    state: GuardState,
}

impl TransactionGuard {
    /// Begin a new transaction
    ///
    /// # Errors
    ///
    /// Returns an error if a transaction is already active or the driver fails.
    pub fn begin(driver: Arc<dyn Driver>) -> Result<Self> {
        driver.begin_transaction()?;
        Ok(Self {
            driver,
            state: GuardState::Active,
        })
    }

    /// Handle bound to the open transaction
    pub fn driver(&self) -> Arc<dyn Driver> {
        Arc::clone(&self.driver)
    }

    /// Commit the transaction
    pub fn commit(mut self) -> Result<()> {
        if self.state != GuardState::Active {
            return Err(PormError::transaction("Cannot commit a finished transaction"));
        }
        self.driver.commit()?;
        self.state = GuardState::Committed;
        Ok(())
    }

    /// Explicitly rollback the transaction
    pub fn rollback(mut self) -> Result<()> {
        if self.state != GuardState::Active {
            return Err(PormError::transaction("Cannot rollback a finished transaction"));
        }
        self.driver.rollback()?;
        self.state = GuardState::RolledBack;
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.state == GuardState::Active
    }
}

impl Drop for TransactionGuard {
    fn drop(&mut self) {
        if self.state == GuardState::Active {
            warn!("transaction guard dropped without commit or rollback; rolling back");
            if let Err(e) = self.driver.rollback() {
                error!(error = %e, "automatic rollback failed");
            }
            self.state = GuardState::RolledBack;
        }
    }
}
