//! Domain traits defining contracts for the store, wallets, the ledger and the HTTP API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::error::{AppError, LedgerError};
use super::types::{
    AccountInfo, CreditId, CreditPatch, CreditRecord, InsertCreditRecord, SignedTransaction,
    TransactionPayload, TransactionStatus, TxHash,
};

/// Record store contract for credit persistence.
#[async_trait]
pub trait CreditRepository: Send + Sync {
    /// Check the store is open and usable
    async fn health_check(&self) -> Result<(), AppError>;

    /// All records in ascending id order
    async fn list(&self) -> Result<Vec<CreditRecord>, AppError>;

    async fn get(&self, id: CreditId) -> Result<Option<CreditRecord>, AppError>;

    /// Assign the next id, stamp the creation time and store the record
    async fn create(&self, input: InsertCreditRecord) -> Result<CreditRecord, AppError>;

    /// Merge `patch` over an existing record. `Ok(None)` when the id is absent.
    async fn update(
        &self,
        id: CreditId,
        patch: &CreditPatch,
    ) -> Result<Option<CreditRecord>, AppError>;

    /// `Ok(false)` when the id is absent.
    async fn delete(&self, id: CreditId) -> Result<bool, AppError>;

    /// Number of stored records
    async fn count(&self) -> Result<usize, AppError> {
        Ok(self.list().await?.len())
    }

    /// Release the store. Later calls fail.
    async fn close(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Capability set exposed by a wallet extension.
#[async_trait]
pub trait WalletExtension: Send + Sync {
    /// Ask the extension for a connection and return the authorized account
    async fn connect(&self) -> Result<AccountInfo, AppError>;

    async fn disconnect(&self) -> Result<(), AppError>;

    /// Account of the current connection
    async fn account(&self) -> Result<AccountInfo, AppError>;

    /// Sign `payload` and hand it to the ledger, returning the transaction hash
    async fn sign_and_submit_transaction(
        &self,
        payload: &TransactionPayload,
    ) -> Result<TxHash, AppError>;

    /// Whether the extension already authorized a connection
    async fn is_connected(&self) -> bool;
}

/// Ledger node client for transaction submission and status
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Check node connectivity
    async fn health_check(&self) -> Result<(), AppError>;

    /// Submit a signed transaction and return its hash
    async fn submit_transaction(&self, transaction: &SignedTransaction)
    -> Result<TxHash, AppError>;

    async fn get_transaction_status(&self, hash: &str) -> Result<TransactionStatus, AppError>;

    /// Poll until the transaction commits, fails, or `timeout` elapses
    async fn wait_for_confirmation(
        &self,
        hash: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<(), AppError> {
        let start = Instant::now();

        while start.elapsed() < timeout {
            match self.get_transaction_status(hash).await {
                Ok(TransactionStatus::Committed) => {
                    info!(tx_hash = %hash, "Transaction committed");
                    return Ok(());
                }
                Ok(TransactionStatus::Pending) => {
                    debug!(tx_hash = %hash, "Transaction still pending");
                }
                Ok(TransactionStatus::Failed(reason)) => {
                    return Err(LedgerError::TransactionFailed(reason).into());
                }
                Err(e) => {
                    warn!(tx_hash = %hash, error = ?e, "Error checking transaction status");
                }
            }
            tokio::time::sleep(poll_interval).await;
        }

        Err(LedgerError::Timeout(format!(
            "Transaction {} not committed within {}s",
            hash,
            timeout.as_secs()
        ))
        .into())
    }
}

/// Client-side view of the credits HTTP API
#[async_trait]
pub trait CreditsApi: Send + Sync {
    async fn list(&self) -> Result<Vec<CreditRecord>, AppError>;

    async fn create(&self, input: &InsertCreditRecord) -> Result<CreditRecord, AppError>;

    /// Fails with `StoreError::NotFound` when the id is absent
    async fn update(&self, id: CreditId, patch: &CreditPatch) -> Result<CreditRecord, AppError>;

    /// Fails with `StoreError::NotFound` when the id is absent
    async fn delete(&self, id: CreditId) -> Result<(), AppError>;
}
