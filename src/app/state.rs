//! Application state management.
//!
//! This module provides the shared application state that is
//! accessible to all request handlers via Axum's State extractor.

use std::sync::Arc;

use crate::domain::CreditRepository;
use crate::infra::observability::PrometheusHandle;

use super::service::CreditService;

/// Shared application state for the Axum web server.
///
/// The store is constructed by the entry point and injected here, so each
/// test can build its own isolated state.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use carbon_credit_market::app::AppState;
/// use carbon_credit_market::infra::InMemoryCreditStore;
///
/// let state = Arc::new(AppState::new(Arc::new(InMemoryCreditStore::init())));
/// assert!(state.metrics.is_none());
/// ```
#[derive(Clone)]
pub struct AppState {
    /// Credit use cases.
    pub service: Arc<CreditService>,

    /// The record store backing `service`.
    pub repository: Arc<dyn CreditRepository>,

    /// Prometheus handle when a recorder is installed.
    pub metrics: Option<Arc<PrometheusHandle>>,
}

impl AppState {
    /// Creates the state and the `CreditService` wired to `repository`.
    #[must_use]
    pub fn new(repository: Arc<dyn CreditRepository>) -> Self {
        let service = Arc::new(CreditService::new(Arc::clone(&repository)));
        Self {
            service,
            repository,
            metrics: None,
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, handle: Arc<PrometheusHandle>) -> Self {
        self.metrics = Some(handle);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::InMemoryCreditStore;

    #[test]
    fn test_app_state_is_clone() {
        let state = AppState::new(Arc::new(InMemoryCreditStore::init()));
        let cloned = state.clone();

        assert!(Arc::ptr_eq(&state.service, &cloned.service));
        assert!(Arc::ptr_eq(&state.repository, &cloned.repository));
    }

    #[tokio::test]
    async fn test_service_shares_the_injected_store() {
        let store = Arc::new(InMemoryCreditStore::init());
        let state = AppState::new(store.clone());

        state
            .service
            .create(&serde_json::json!({
                "tokenId": "t", "owner": "A", "amount": 1, "description": "x"
            }))
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
    }
}
