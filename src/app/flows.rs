//! Client-side marketplace flows.
//!
//! Each flow drives the detected wallet and then mutates records through the
//! credits API. Steps within a flow run sequentially and a failure aborts the
//! flow without repairing earlier steps.
//!
//! The purchase flow is a single-pass state machine:
//!
//! ```text
//! WalletCheck -> SelfTradeGuard -> OnChainSubmit -> [Confirm] -> RecordUpdate -> Done
//! ```
//!
//! With [`ConfirmationPolicy::FireAndForget`] the record is updated as soon
//! as the wallet accepts the transaction, so the ledger and the store are
//! only eventually consistent and nothing reconciles them if the update
//! fails. [`ConfirmationPolicy::AwaitLedger`] polls the ledger first.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::domain::{
    AccountInfo, AppError, ConfigError, CreditId, CreditPatch, CreditRecord, CreditsApi,
    DetectedWallet, InsertCreditRecord, LedgerClient, LedgerModule, StoreError, TxHash,
    WalletError, WalletExtension,
};

use super::service::CREDIT_NOT_FOUND;

pub const WALLET_REQUIRED: &str = "Please connect your wallet first";
pub const SELF_TRADE: &str = "You cannot buy your own carbon credits";
pub const INSUFFICIENT_FUNDS: &str =
    "Transaction failed. Please make sure you have enough APT tokens.";
pub const NOT_OWNER: &str = "You can only delete your own listings";

/// Whether flows wait for the ledger before touching records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfirmationPolicy {
    /// Treat wallet acceptance as success.
    #[default]
    FireAndForget,
    /// Poll the ledger until the transaction commits, failing on abort or timeout.
    AwaitLedger { timeout: Duration },
}

#[derive(Debug, Clone)]
pub struct FlowConfig {
    pub module: LedgerModule,
    pub confirmation: ConfirmationPolicy,
    pub poll_interval: Duration,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            module: LedgerModule::default(),
            confirmation: ConfirmationPolicy::default(),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Stages of the purchase state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseStage {
    WalletCheck,
    SelfTradeGuard,
    OnChainSubmit,
    Confirm,
    RecordUpdate,
    Done,
}

impl fmt::Display for PurchaseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PurchaseStage::WalletCheck => "wallet_check",
            PurchaseStage::SelfTradeGuard => "self_trade_guard",
            PurchaseStage::OnChainSubmit => "on_chain_submit",
            PurchaseStage::Confirm => "confirm",
            PurchaseStage::RecordUpdate => "record_update",
            PurchaseStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// A purchase aborted at `stage`.
///
/// `tx_hash` is set when the on-chain transfer was already submitted, which
/// means the ledger and the record store may now disagree.
#[derive(Debug, Error)]
#[error("purchase failed at {stage}: {source}")]
pub struct PurchaseError {
    pub stage: PurchaseStage,
    pub source: AppError,
    pub tx_hash: Option<TxHash>,
}

impl PurchaseError {
    fn at(stage: PurchaseStage, source: AppError) -> Self {
        Self {
            stage,
            source,
            tx_hash: None,
        }
    }

    /// Short message suitable for a user notification.
    pub fn user_message(&self) -> String {
        match (&self.stage, &self.source) {
            (PurchaseStage::WalletCheck, AppError::Wallet(_)) => WALLET_REQUIRED.to_string(),
            (_, source) => source.to_string(),
        }
    }

    /// Whether the on-chain transfer went through but the record did not follow.
    pub fn is_divergent(&self) -> bool {
        self.tx_hash.is_some()
    }
}

/// A mint that did not produce a record.
///
/// `tx_hash` is set when the token was minted on-chain but creating its
/// record failed, leaving a credit the store knows nothing about.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct MintError {
    pub source: AppError,
    pub tx_hash: Option<TxHash>,
}

impl MintError {
    pub fn is_divergent(&self) -> bool {
        self.tx_hash.is_some()
    }
}

impl From<AppError> for MintError {
    fn from(source: AppError) -> Self {
        Self {
            source,
            tx_hash: None,
        }
    }
}

/// Outcome of a completed purchase.
#[derive(Debug, Clone)]
pub struct PurchaseReceipt {
    pub tx_hash: TxHash,
    pub record: CreditRecord,
    /// Market view refetched after the update; `None` if the refetch failed.
    pub market: Option<Vec<CreditRecord>>,
}

/// Orchestrates the mint, list, purchase and delete flows.
pub struct MarketplaceFlows {
    wallet: DetectedWallet,
    api: Arc<dyn CreditsApi>,
    ledger: Option<Arc<dyn LedgerClient>>,
    config: FlowConfig,
}

impl MarketplaceFlows {
    /// # Errors
    ///
    /// `ConfigError::InvalidValue` when `AwaitLedger` is requested without a ledger client.
    pub fn new(
        wallet: DetectedWallet,
        api: Arc<dyn CreditsApi>,
        ledger: Option<Arc<dyn LedgerClient>>,
        config: FlowConfig,
    ) -> Result<Self, AppError> {
        if matches!(config.confirmation, ConfirmationPolicy::AwaitLedger { .. }) && ledger.is_none()
        {
            return Err(ConfigError::InvalidValue {
                key: "confirmation".to_string(),
                message: "awaiting ledger confirmation requires a ledger client".to_string(),
            }
            .into());
        }
        Ok(Self {
            wallet,
            api,
            ledger,
            config,
        })
    }

    pub fn wallet(&self) -> &DetectedWallet {
        &self.wallet
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Prompt the wallet for a connection.
    pub async fn connect(&self) -> Result<AccountInfo, AppError> {
        self.wallet.connect().await
    }

    /// All records.
    pub async fn all(&self) -> Result<Vec<CreditRecord>, AppError> {
        self.api.list().await
    }

    /// Records currently listed for sale.
    pub async fn market(&self) -> Result<Vec<CreditRecord>, AppError> {
        let records = self.api.list().await?;
        Ok(records.into_iter().filter(|r| r.listed).collect())
    }

    /// Mint on-chain, then record the credit under the wallet's address with
    /// the transaction hash as its token id.
    #[instrument(skip(self, description))]
    pub async fn mint(
        &self,
        amount: i64,
        description: impl Into<String> + Send,
        price: Option<i64>,
    ) -> Result<CreditRecord, MintError> {
        let account = self.require_account().await?;

        let tx_hash = self
            .wallet
            .sign_and_submit_transaction(&self.config.module.mint(amount))
            .await?;
        info!(tx_hash = %tx_hash, owner = %account.address, "Mint transaction submitted");
        self.confirm(&tx_hash).await?;

        let mut input = InsertCreditRecord::new(tx_hash.clone(), account.address, amount, description);
        input.price = price;

        self.api.create(&input).await.map_err(|e| {
            error!(tx_hash = %tx_hash, error = %e, "Minted on-chain but failed to record the credit");
            MintError {
                source: e,
                tx_hash: Some(tx_hash),
            }
        })
    }

    /// Publish a listing. The wallet is not involved.
    #[instrument(skip(self, input), fields(owner = %input.owner))]
    pub async fn list_credit(&self, input: InsertCreditRecord) -> Result<CreditRecord, AppError> {
        let record = self.api.create(&input.listed(true)).await?;
        info!(credit_id = record.id, "Credit listed");
        Ok(record)
    }

    /// Buy `record` for the connected account.
    #[instrument(skip(self, record), fields(credit_id = record.id, token_id = %record.token_id))]
    pub async fn purchase(&self, record: &CreditRecord) -> Result<PurchaseReceipt, PurchaseError> {
        use PurchaseStage::*;

        enter(WalletCheck);
        let buyer = self
            .wallet
            .account()
            .await
            .map_err(|e| PurchaseError::at(WalletCheck, e))?;

        enter(SelfTradeGuard);
        if buyer.address == record.owner {
            warn!(buyer = %buyer.address, "Blocked purchase of own listing");
            return Err(PurchaseError::at(
                SelfTradeGuard,
                AppError::BusinessRule(SELF_TRADE.to_string()),
            ));
        }

        enter(OnChainSubmit);
        let payload = self.config.module.buy(&record.token_id);
        let buy_function = payload.function.clone();
        let tx_hash = self
            .wallet
            .sign_and_submit_transaction(&payload)
            .await
            .map_err(|e| PurchaseError::at(OnChainSubmit, rewrite_buy_failure(e, &buy_function)))?;
        info!(tx_hash = %tx_hash, "Buy transaction submitted");

        if matches!(self.config.confirmation, ConfirmationPolicy::AwaitLedger { .. }) {
            enter(Confirm);
            self.confirm(&tx_hash)
                .await
                .map_err(|e| PurchaseError::at(Confirm, e))?;
        }

        enter(RecordUpdate);
        let updated = match self
            .api
            .update(record.id, &CreditPatch::transfer_to(buyer.address.clone()))
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                error!(
                    tx_hash = %tx_hash,
                    error = %e,
                    "Transfer submitted on-chain but the record update failed; ledger and store diverge"
                );
                return Err(PurchaseError {
                    stage: RecordUpdate,
                    source: e,
                    tx_hash: Some(tx_hash),
                });
            }
        };

        enter(Done);
        let market = self
            .market()
            .await
            .inspect_err(|e| warn!(error = %e, "Failed to refresh market after purchase"))
            .ok();

        Ok(PurchaseReceipt {
            tx_hash,
            record: updated,
            market,
        })
    }

    /// Delete a listing owned by the connected account and return the refreshed market.
    #[instrument(skip(self))]
    pub async fn delete_listing(&self, id: CreditId) -> Result<Vec<CreditRecord>, AppError> {
        let account = self.require_account().await?;

        let records = self.api.list().await?;
        let record = records
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(CREDIT_NOT_FOUND.to_string()))?;

        if record.owner != account.address {
            warn!(owner = %record.owner, caller = %account.address, "Blocked delete of foreign listing");
            return Err(AppError::BusinessRule(NOT_OWNER.to_string()));
        }

        self.api.delete(id).await?;
        info!(credit_id = id, "Listing deleted");
        self.market().await
    }

    async fn require_account(&self) -> Result<AccountInfo, AppError> {
        self.wallet.account().await.map_err(|e| match e {
            AppError::Wallet(WalletError::Unavailable | WalletError::NotConnected) => {
                AppError::BusinessRule(WALLET_REQUIRED.to_string())
            }
            other => other,
        })
    }

    async fn confirm(&self, tx_hash: &str) -> Result<(), AppError> {
        let ConfirmationPolicy::AwaitLedger { timeout } = self.config.confirmation else {
            return Ok(());
        };
        let Some(ledger) = &self.ledger else {
            return Err(AppError::NotSupported(
                "ledger confirmation without a ledger client".to_string(),
            ));
        };
        ledger
            .wait_for_confirmation(tx_hash, timeout, self.config.poll_interval)
            .await
    }
}

fn enter(stage: PurchaseStage) {
    info!(stage = %stage, "Purchase stage");
}

fn rewrite_buy_failure(err: AppError, buy_function: &str) -> AppError {
    match err {
        AppError::Wallet(WalletError::Rejected(message)) if message.contains(buy_function) => {
            AppError::BusinessRule(INSUFFICIENT_FUNDS.to_string())
        }
        other => other,
    }
}
