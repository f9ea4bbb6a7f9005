//! Mock implementations for testing.
//!
//! These mocks provide in-memory implementations of domain traits
//! that can be configured to simulate success, failure, and latency,
//! and that record the calls made against them.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::domain::{
    AccountInfo, AppError, CreditId, CreditPatch, CreditRecord, CreditRepository, CreditsApi,
    ExternalServiceError, InsertCreditRecord, LedgerClient, LedgerError, SignedTransaction,
    StoreError, TransactionPayload, TransactionStatus, TxHash, WalletError, WalletExtension,
};
use crate::infra::InMemoryCreditStore;

/// Configuration for mock behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// If true, operations will fail.
    pub should_fail: bool,
    /// Custom error message for failures.
    pub error_message: Option<String>,
    /// Simulated latency in milliseconds.
    pub latency_ms: Option<u64>,
}

impl MockConfig {
    /// Creates a config that always succeeds.
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    /// Creates a config that always fails.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            should_fail: true,
            error_message: Some(message.into()),
            latency_ms: None,
        }
    }

    /// Adds simulated latency.
    #[must_use]
    pub fn with_latency(mut self, ms: u64) -> Self {
        self.latency_ms = Some(ms);
        self
    }

    async fn simulate_latency(&self) {
        if let Some(ms) = self.latency_ms {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    fn failure_message(&self, default: &str) -> Option<String> {
        self.should_fail.then(|| {
            self.error_message
                .clone()
                .unwrap_or_else(|| default.to_string())
        })
    }
}

/// Mock wallet extension.
///
/// Only `sign_and_submit_transaction` honours the failure config, so a
/// failing mock still connects and reports its account.
///
/// # Example
///
/// ```
/// use carbon_credit_market::test_utils::{MockConfig, MockWalletExtension};
///
/// // A wallet that is already authorized
/// let wallet = MockWalletExtension::connected("0xa11ce");
///
/// // A wallet whose submissions are declined
/// let declining = MockWalletExtension::with_config("0xb0b", MockConfig::failure("User rejected"));
/// ```
pub struct MockWalletExtension {
    address: String,
    config: MockConfig,
    connected: AtomicBool,
    call_count: AtomicU64,
    submitted: Mutex<Vec<TransactionPayload>>,
}

impl MockWalletExtension {
    /// Creates a disconnected wallet that succeeds once connected.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self::with_config(address, MockConfig::success())
    }

    #[must_use]
    pub fn with_config(address: impl Into<String>, config: MockConfig) -> Self {
        Self {
            address: address.into(),
            config,
            connected: AtomicBool::new(false),
            call_count: AtomicU64::new(0),
            submitted: Mutex::new(Vec::new()),
        }
    }

    /// Creates a wallet that already authorized a connection.
    #[must_use]
    pub fn connected(address: impl Into<String>) -> Self {
        let wallet = Self::new(address);
        wallet.set_connected(true);
        wallet
    }

    /// Creates a connected wallet whose submissions fail with `message`.
    #[must_use]
    pub fn rejecting(address: impl Into<String>, message: impl Into<String>) -> Self {
        let wallet = Self::with_config(address, MockConfig::failure(message));
        wallet.set_connected(true);
        wallet
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    /// Gets the number of times any method was called.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Payloads accepted for submission, in order.
    pub fn submitted(&self) -> Vec<TransactionPayload> {
        self.submitted.lock().unwrap().clone()
    }

    fn increment_call_count(&self) {
        self.call_count.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl WalletExtension for MockWalletExtension {
    async fn connect(&self) -> Result<AccountInfo, AppError> {
        self.increment_call_count();
        self.set_connected(true);
        Ok(AccountInfo::new(self.address.clone()))
    }

    async fn disconnect(&self) -> Result<(), AppError> {
        self.increment_call_count();
        self.set_connected(false);
        Ok(())
    }

    async fn account(&self) -> Result<AccountInfo, AppError> {
        self.increment_call_count();
        if !self.connected.load(Ordering::Relaxed) {
            return Err(WalletError::NotConnected.into());
        }
        Ok(AccountInfo::new(self.address.clone()))
    }

    async fn sign_and_submit_transaction(
        &self,
        payload: &TransactionPayload,
    ) -> Result<TxHash, AppError> {
        self.increment_call_count();
        self.config.simulate_latency().await;

        if !self.connected.load(Ordering::Relaxed) {
            return Err(WalletError::NotConnected.into());
        }
        if let Some(message) = self.config.failure_message("Mock wallet rejection") {
            return Err(WalletError::Rejected(format!("{}: {}", payload.function, message)).into());
        }

        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(payload.clone());
        Ok(format!("0xmock{:060x}", submitted.len()))
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

/// Mock ledger client.
///
/// Unknown hashes report the default status, which starts as `Committed`.
///
/// # Example
///
/// ```
/// use carbon_credit_market::test_utils::{MockConfig, MockLedgerClient};
///
/// let ledger = MockLedgerClient::new();
/// let failing = MockLedgerClient::with_config(MockConfig::failure("node down"));
/// ```
pub struct MockLedgerClient {
    config: MockConfig,
    call_count: AtomicU64,
    is_healthy: AtomicBool,
    submitted: Mutex<Vec<SignedTransaction>>,
    statuses: Mutex<HashMap<String, TransactionStatus>>,
    default_status: Mutex<TransactionStatus>,
}

impl MockLedgerClient {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            call_count: AtomicU64::new(0),
            is_healthy: AtomicBool::new(true),
            submitted: Mutex::new(Vec::new()),
            statuses: Mutex::new(HashMap::new()),
            default_status: Mutex::new(TransactionStatus::Committed),
        }
    }

    /// Creates a mock that always fails.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    /// Gets the number of times any method was called.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Sets the health status.
    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    pub fn submitted(&self) -> Vec<SignedTransaction> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn set_status(&self, hash: impl Into<String>, status: TransactionStatus) {
        self.statuses.lock().unwrap().insert(hash.into(), status);
    }

    /// Status reported for hashes without an explicit one.
    pub fn set_default_status(&self, status: TransactionStatus) {
        *self.default_status.lock().unwrap() = status;
    }

    fn increment_call_count(&self) {
        self.call_count.fetch_add(1, Ordering::Relaxed);
    }

    fn check_should_fail(&self) -> Result<(), AppError> {
        match self.config.failure_message("Mock ledger error") {
            Some(msg) => Err(LedgerError::Rpc(msg).into()),
            None => Ok(()),
        }
    }
}

impl Default for MockLedgerClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerClient for MockLedgerClient {
    async fn health_check(&self) -> Result<(), AppError> {
        self.increment_call_count();

        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(LedgerError::Connection("Mock ledger unhealthy".to_string()).into());
        }

        self.check_should_fail()
    }

    async fn submit_transaction(
        &self,
        transaction: &SignedTransaction,
    ) -> Result<TxHash, AppError> {
        self.increment_call_count();
        self.config.simulate_latency().await;
        self.check_should_fail()?;

        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(transaction.clone());
        Ok(format!("0xledger{:058x}", submitted.len()))
    }

    async fn get_transaction_status(&self, hash: &str) -> Result<TransactionStatus, AppError> {
        self.increment_call_count();
        self.check_should_fail()?;

        let status = self.statuses.lock().unwrap().get(hash).cloned();
        Ok(status.unwrap_or_else(|| self.default_status.lock().unwrap().clone()))
    }
}

/// A call made against [`MockCreditsApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    List,
    Create(InsertCreditRecord),
    Update(CreditId, CreditPatch),
    Delete(CreditId),
}

impl ApiCall {
    /// Whether the call changes server state.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, ApiCall::List)
    }
}

/// Mock credits API backed by an [`InMemoryCreditStore`].
///
/// Records every call. `MockConfig` failures apply to all calls;
/// `set_fail_updates` fails only PATCH calls.
pub struct MockCreditsApi {
    store: InMemoryCreditStore,
    config: MockConfig,
    fail_updates: AtomicBool,
    calls: Mutex<Vec<ApiCall>>,
}

impl MockCreditsApi {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            store: InMemoryCreditStore::init(),
            config,
            fail_updates: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Backing store, for seeding and inspecting records directly.
    pub fn store(&self) -> &InMemoryCreditStore {
        &self.store
    }

    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::Relaxed);
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.calls().iter().filter(|c| c.is_mutation()).count()
    }

    async fn record(&self, call: ApiCall) -> Result<(), AppError> {
        self.calls.lock().unwrap().push(call);
        self.config.simulate_latency().await;
        match self.config.failure_message("Mock API unavailable") {
            Some(msg) => Err(ExternalServiceError::Unavailable(msg).into()),
            None => Ok(()),
        }
    }
}

impl Default for MockCreditsApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CreditsApi for MockCreditsApi {
    async fn list(&self) -> Result<Vec<CreditRecord>, AppError> {
        self.record(ApiCall::List).await?;
        self.store.list().await
    }

    async fn create(&self, input: &InsertCreditRecord) -> Result<CreditRecord, AppError> {
        self.record(ApiCall::Create(input.clone())).await?;
        self.store.create(input.clone()).await
    }

    async fn update(&self, id: CreditId, patch: &CreditPatch) -> Result<CreditRecord, AppError> {
        self.record(ApiCall::Update(id, patch.clone())).await?;
        if self.fail_updates.load(Ordering::Relaxed) {
            return Err(ExternalServiceError::UnexpectedStatus {
                status: 500,
                message: "Mock update failure".to_string(),
            }
            .into());
        }
        self.store
            .update(id, patch)
            .await?
            .ok_or_else(|| StoreError::NotFound("Credit not found".to_string()).into())
    }

    async fn delete(&self, id: CreditId) -> Result<(), AppError> {
        self.record(ApiCall::Delete(id)).await?;
        if self.store.delete(id).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound("Credit not found".to_string()).into())
        }
    }
}

/// Repository whose every operation fails with the configured store error.
pub struct FailingCreditRepository {
    error: StoreError,
}

impl FailingCreditRepository {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: StoreError::Internal(message.into()),
        }
    }

    /// Behaves like a store after `close()`.
    #[must_use]
    pub fn closed() -> Self {
        Self {
            error: StoreError::Closed,
        }
    }

    fn fail<T>(&self) -> Result<T, AppError> {
        Err(self.error.clone().into())
    }
}

#[async_trait]
impl CreditRepository for FailingCreditRepository {
    async fn health_check(&self) -> Result<(), AppError> {
        self.fail()
    }

    async fn list(&self) -> Result<Vec<CreditRecord>, AppError> {
        self.fail()
    }

    async fn get(&self, _id: CreditId) -> Result<Option<CreditRecord>, AppError> {
        self.fail()
    }

    async fn create(&self, _input: InsertCreditRecord) -> Result<CreditRecord, AppError> {
        self.fail()
    }

    async fn update(
        &self,
        _id: CreditId,
        _patch: &CreditPatch,
    ) -> Result<Option<CreditRecord>, AppError> {
        self.fail()
    }

    async fn delete(&self, _id: CreditId) -> Result<bool, AppError> {
        self.fail()
    }
}
