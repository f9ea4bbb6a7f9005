//! Application service layer.
//!
//! `CreditService` implements the server-side use cases on top of a
//! `CreditRepository`: payload validation, record lifecycle, and the
//! counters that describe them.

use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::domain::{
    AppError, CreditId, CreditRecord, CreditRepository, HealthResponse, HealthStatus, StoreError,
    parse_insert, parse_patch,
};
use crate::infra::observability::{
    CREDIT_VALIDATION_FAILURES_TOTAL, CREDITS_CREATED_TOTAL, CREDITS_DELETED_TOTAL,
    CREDITS_STORED, CREDITS_UPDATED_TOTAL,
};

/// Message carried by every "not found" outcome
pub const CREDIT_NOT_FOUND: &str = "Credit not found";

/// Server-side credit use cases.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use carbon_credit_market::app::CreditService;
/// use carbon_credit_market::infra::InMemoryCreditStore;
///
/// # async fn demo() -> Result<(), carbon_credit_market::domain::AppError> {
/// let service = CreditService::new(Arc::new(InMemoryCreditStore::init()));
/// let body = serde_json::json!({
///     "tokenId": "0xabc", "owner": "0x1", "amount": 10, "description": "Reforestation"
/// });
/// let record = service.create(&body).await?;
/// assert_eq!(record.id, 1);
/// # Ok(())
/// # }
/// ```
pub struct CreditService {
    repository: Arc<dyn CreditRepository>,
}

impl CreditService {
    #[must_use]
    pub fn new(repository: Arc<dyn CreditRepository>) -> Self {
        Self { repository }
    }

    /// All records, in id order.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<CreditRecord>, AppError> {
        self.repository.list().await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: CreditId) -> Result<CreditRecord, AppError> {
        self.repository
            .get(id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    /// Validates a raw creation body and stores the record.
    ///
    /// # Errors
    ///
    /// `AppError::Validation` listing every bad field; the store is untouched.
    #[instrument(skip(self, body))]
    pub async fn create(&self, body: &serde_json::Value) -> Result<CreditRecord, AppError> {
        let input = parse_insert(body).inspect_err(|e| {
            metrics::counter!(CREDIT_VALIDATION_FAILURES_TOTAL).increment(1);
            warn!(error = %e, "Rejected credit creation payload");
        })?;

        let record = self.repository.create(input).await?;
        info!(credit_id = record.id, owner = %record.owner, listed = record.listed, "Credit created");

        metrics::counter!(CREDITS_CREATED_TOTAL).increment(1);
        self.record_stored_gauge().await;
        Ok(record)
    }

    /// Validates a partial body and merges it over the record.
    ///
    /// An invalid body is rejected before the id is looked up.
    #[instrument(skip(self, body))]
    pub async fn update(
        &self,
        id: CreditId,
        body: &serde_json::Value,
    ) -> Result<CreditRecord, AppError> {
        let patch = parse_patch(body).inspect_err(|e| {
            metrics::counter!(CREDIT_VALIDATION_FAILURES_TOTAL).increment(1);
            warn!(credit_id = id, error = %e, "Rejected credit update payload");
        })?;

        let record = self
            .repository
            .update(id, &patch)
            .await?
            .ok_or_else(|| not_found(id))?;
        info!(credit_id = id, owner = %record.owner, listed = record.listed, "Credit updated");

        metrics::counter!(CREDITS_UPDATED_TOTAL).increment(1);
        Ok(record)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: CreditId) -> Result<(), AppError> {
        if !self.repository.delete(id).await? {
            return Err(not_found(id));
        }
        info!(credit_id = id, "Credit deleted");

        metrics::counter!(CREDITS_DELETED_TOTAL).increment(1);
        self.record_stored_gauge().await;
        Ok(())
    }

    /// Performs a health check on the record store.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> HealthResponse {
        match self.repository.health_check().await {
            Ok(()) => {
                let credits = self.repository.count().await.unwrap_or_default();
                HealthResponse::new(HealthStatus::Healthy, credits)
            }
            Err(e) => {
                warn!(error = ?e, "Store health check failed");
                HealthResponse::new(HealthStatus::Unhealthy, 0)
            }
        }
    }

    /// Closes the underlying store.
    pub async fn shutdown(&self) -> Result<(), AppError> {
        self.repository.close().await
    }

    async fn record_stored_gauge(&self) {
        if let Ok(count) = self.repository.count().await {
            metrics::gauge!(CREDITS_STORED).set(count as f64);
        }
    }
}

fn not_found(id: CreditId) -> AppError {
    warn!(credit_id = id, "Credit not found");
    StoreError::NotFound(CREDIT_NOT_FOUND.to_string()).into()
}
