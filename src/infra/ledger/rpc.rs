//! REST client for a ledger full node.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::domain::{AppError, LedgerClient, LedgerError, SignedTransaction, TransactionStatus, TxHash};

/// Configuration for the ledger client
#[derive(Debug, Clone)]
pub struct RpcLedgerConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for RpcLedgerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Ledger node client speaking the node's JSON REST API
pub struct RpcLedgerClient {
    http_client: Client,
    node_url: String,
    config: RpcLedgerConfig,
}

#[derive(Debug, Deserialize)]
struct SubmittedTransaction {
    hash: String,
}

#[derive(Debug, Deserialize)]
struct TransactionView {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    vm_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NodeError {
    message: String,
    #[serde(default)]
    error_code: Option<String>,
}

impl TransactionView {
    fn status(&self) -> TransactionStatus {
        if self.kind == "pending_transaction" {
            return TransactionStatus::Pending;
        }
        match self.success {
            Some(true) => TransactionStatus::Committed,
            Some(false) => TransactionStatus::Failed(
                self.vm_status
                    .clone()
                    .unwrap_or_else(|| "unknown vm status".to_string()),
            ),
            None => TransactionStatus::Pending,
        }
    }
}

impl RpcLedgerClient {
    /// Create a new ledger client with custom configuration
    pub fn new(node_url: &str, config: RpcLedgerConfig) -> Result<Self, AppError> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LedgerError::Connection(e.to_string()))?;
        info!(node_url = %node_url, "Created ledger client");
        Ok(Self {
            http_client,
            node_url: node_url.trim_end_matches('/').to_string(),
            config,
        })
    }

    /// Create a new ledger client with default configuration
    pub fn with_defaults(node_url: &str) -> Result<Self, AppError> {
        Self::new(node_url, RpcLedgerConfig::default())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1{}", self.node_url, path)
    }

    /// Send a request with retries on transport failures
    #[instrument(skip(self, build))]
    async fn send_with_retries<F>(&self, operation: &str, build: F) -> Result<Response, AppError>
    where
        F: Fn() -> reqwest::RequestBuilder + Send + Sync,
    {
        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tokio::time::sleep(self.config.retry_delay).await;
            }
            match build().send().await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    warn!(attempt = attempt, error = %e, operation = %operation, "Ledger call failed");
                    last_error = Some(if e.is_timeout() {
                        LedgerError::Timeout(e.to_string())
                    } else {
                        LedgerError::Connection(e.to_string())
                    });
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| LedgerError::Rpc("Unknown error".to_string()))
            .into())
    }

    async fn read_json<R: DeserializeOwned>(response: Response) -> Result<R, AppError> {
        let status = response.status();
        if !status.is_success() {
            return Err(Self::node_error(status, response).await.into());
        }
        response
            .json()
            .await
            .map_err(|e| LedgerError::Rpc(e.to_string()).into())
    }

    async fn node_error(status: StatusCode, response: Response) -> LedgerError {
        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<NodeError>(&body) {
            Ok(NodeError {
                message,
                error_code: Some(code),
            }) => format!("{code}: {message}"),
            Ok(NodeError { message, .. }) => message,
            Err(_) if body.is_empty() => status.to_string(),
            Err(_) => body,
        };
        LedgerError::Rpc(format!("{}: {}", status.as_u16(), message))
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        let url = self.endpoint("/");
        let response = self
            .send_with_retries("ledger_info", || self.http_client.get(&url))
            .await?;
        let _: serde_json::Value = Self::read_json(response).await?;
        Ok(())
    }

    #[instrument(skip(self, transaction), fields(sender = %transaction.sender))]
    async fn submit_transaction(
        &self,
        transaction: &SignedTransaction,
    ) -> Result<TxHash, AppError> {
        let url = self.endpoint("/transactions");
        let response = self
            .send_with_retries("submit_transaction", || {
                self.http_client.post(&url).json(transaction)
            })
            .await?;
        let submitted: SubmittedTransaction = Self::read_json(response).await?;
        info!(tx_hash = %submitted.hash, "Transaction submitted");
        Ok(submitted.hash)
    }

    #[instrument(skip(self))]
    async fn get_transaction_status(&self, hash: &str) -> Result<TransactionStatus, AppError> {
        let url = self.endpoint(&format!("/transactions/by_hash/{hash}"));
        let response = self
            .send_with_retries("transaction_by_hash", || self.http_client.get(&url))
            .await?;

        // Not yet indexed by the node
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(TransactionStatus::Pending);
        }
        let view: TransactionView = Self::read_json(response).await?;
        Ok(view.status())
    }
}
