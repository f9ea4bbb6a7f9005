//! Wallet extension detection and ledger payload construction.
//!
//! The execution environment may expose any number of wallet extensions
//! under well-known names. [`detect_wallet`] picks one of the supported
//! variants in a fixed probe order and returns it as a [`DetectedWallet`],
//! which forwards the capability contract to the chosen extension.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, instrument};

use super::error::{AppError, WalletError};
use super::traits::WalletExtension;
use super::types::{AccountInfo, TransactionPayload, TxHash};

/// Supported wallet extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WalletKind {
    Petra,
    Martian,
}

impl WalletKind {
    /// Probe order used by [`detect_wallet`]; first found wins.
    pub const PROBE_ORDER: [WalletKind; 2] = [WalletKind::Petra, WalletKind::Martian];

    /// Name under which the extension registers itself.
    pub fn key(&self) -> &'static str {
        match self {
            WalletKind::Petra => "petra",
            WalletKind::Martian => "martian",
        }
    }
}

impl fmt::Display for WalletKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Extensions present in the execution environment, keyed by name.
#[derive(Default, Clone)]
pub struct ExtensionRegistry {
    extensions: HashMap<String, Arc<dyn WalletExtension>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extension(mut self, name: impl Into<String>, extension: Arc<dyn WalletExtension>) -> Self {
        self.register(name, extension);
        self
    }

    pub fn register(&mut self, name: impl Into<String>, extension: Arc<dyn WalletExtension>) {
        self.extensions.insert(name.into(), extension);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn WalletExtension>> {
        self.extensions.get(name).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.extensions.keys().collect();
        names.sort();
        f.debug_struct("ExtensionRegistry")
            .field("extensions", &names)
            .finish()
    }
}

/// The wallet selected for this session.
#[derive(Clone)]
pub enum DetectedWallet {
    Petra(Arc<dyn WalletExtension>),
    Martian(Arc<dyn WalletExtension>),
    None,
}

impl DetectedWallet {
    pub fn kind(&self) -> Option<WalletKind> {
        match self {
            DetectedWallet::Petra(_) => Some(WalletKind::Petra),
            DetectedWallet::Martian(_) => Some(WalletKind::Martian),
            DetectedWallet::None => None,
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, DetectedWallet::None)
    }

    fn extension(&self) -> Result<&Arc<dyn WalletExtension>, AppError> {
        match self {
            DetectedWallet::Petra(ext) | DetectedWallet::Martian(ext) => Ok(ext),
            DetectedWallet::None => Err(WalletError::Unavailable.into()),
        }
    }

    /// Reads the account of a connection the extension already authorized,
    /// without prompting. `None` when there is no wallet or no prior connection.
    #[instrument(skip(self), fields(wallet = ?self.kind()))]
    pub async fn reconnect_existing(&self) -> Option<AccountInfo> {
        let ext = self.extension().ok()?;
        if !ext.is_connected().await {
            debug!("No existing wallet connection");
            return None;
        }
        ext.account().await.ok()
    }
}

impl fmt::Debug for DetectedWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(kind) => write!(f, "DetectedWallet({kind})"),
            None => f.write_str("DetectedWallet(None)"),
        }
    }
}

#[async_trait]
impl WalletExtension for DetectedWallet {
    async fn connect(&self) -> Result<AccountInfo, AppError> {
        self.extension()?.connect().await
    }

    async fn disconnect(&self) -> Result<(), AppError> {
        self.extension()?.disconnect().await
    }

    async fn account(&self) -> Result<AccountInfo, AppError> {
        self.extension()?.account().await
    }

    async fn sign_and_submit_transaction(
        &self,
        payload: &TransactionPayload,
    ) -> Result<TxHash, AppError> {
        self.extension()?.sign_and_submit_transaction(payload).await
    }

    async fn is_connected(&self) -> bool {
        match self.extension() {
            Ok(ext) => ext.is_connected().await,
            Err(_) => false,
        }
    }
}

/// Picks the first supported extension present in `registry`.
pub fn detect_wallet(registry: &ExtensionRegistry) -> DetectedWallet {
    for kind in WalletKind::PROBE_ORDER {
        if let Some(ext) = registry.get(kind.key()) {
            return match kind {
                WalletKind::Petra => DetectedWallet::Petra(ext),
                WalletKind::Martian => DetectedWallet::Martian(ext),
            };
        }
    }
    DetectedWallet::None
}

/// Builds entry-function payloads against the on-chain credits module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerModule {
    name: String,
}

impl LedgerModule {
    pub const DEFAULT_NAME: &'static str = "carbon_credits";

    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn function(&self, action: &str) -> String {
        format!("{}::{}", self.name, action)
    }

    pub fn mint(&self, amount: i64) -> TransactionPayload {
        TransactionPayload::entry_function(self.function("mint"), vec![json!(amount)])
    }

    pub fn list(&self, token_id: &str, price: i64) -> TransactionPayload {
        TransactionPayload::entry_function(self.function("list"), vec![json!(token_id), json!(price)])
    }

    pub fn buy(&self, token_id: &str) -> TransactionPayload {
        TransactionPayload::entry_function(self.function("buy"), vec![json!(token_id)])
    }
}

impl Default for LedgerModule {
    fn default() -> Self {
        Self::new(Self::DEFAULT_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockWalletExtension;

    fn registry_with(names: &[&str]) -> ExtensionRegistry {
        names.iter().fold(ExtensionRegistry::new(), |registry, name| {
            registry.with_extension(*name, Arc::new(MockWalletExtension::new(*name)))
        })
    }

    #[test]
    fn test_detect_prefers_petra() {
        let wallet = detect_wallet(&registry_with(&["martian", "petra"]));
        assert_eq!(wallet.kind(), Some(WalletKind::Petra));
    }

    #[test]
    fn test_detect_falls_back_to_martian() {
        let wallet = detect_wallet(&registry_with(&["martian"]));
        assert_eq!(wallet.kind(), Some(WalletKind::Martian));
    }

    #[test]
    fn test_detect_none_when_no_known_extension() {
        let wallet = detect_wallet(&registry_with(&["metamask"]));
        assert!(!wallet.is_available());
        assert_eq!(wallet.kind(), None);

        assert!(!detect_wallet(&ExtensionRegistry::new()).is_available());
    }

    #[tokio::test]
    async fn test_none_variant_reports_unavailable() {
        let wallet = DetectedWallet::None;

        let err = wallet.connect().await.unwrap_err();
        assert!(matches!(err, AppError::Wallet(WalletError::Unavailable)));

        let err = wallet
            .sign_and_submit_transaction(&LedgerModule::default().buy("t"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Wallet(WalletError::Unavailable)));
        assert!(!wallet.is_connected().await);
        assert!(wallet.reconnect_existing().await.is_none());
    }

    #[tokio::test]
    async fn test_detected_wallet_forwards_to_extension() {
        let mock = Arc::new(MockWalletExtension::new("0xabc"));
        let registry = ExtensionRegistry::new().with_extension("petra", mock.clone());
        let wallet = detect_wallet(&registry);

        let account = wallet.connect().await.unwrap();
        assert_eq!(account.address, "0xabc");

        let hash = wallet
            .sign_and_submit_transaction(&LedgerModule::default().mint(10))
            .await
            .unwrap();
        assert!(!hash.is_empty());
        assert_eq!(mock.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_reconnect_existing_requires_prior_authorization() {
        let mock = Arc::new(MockWalletExtension::new("0xabc"));
        let wallet = DetectedWallet::Petra(mock.clone());

        assert!(wallet.reconnect_existing().await.is_none());

        mock.connect().await.unwrap();
        let account = wallet.reconnect_existing().await.unwrap();
        assert_eq!(account.address, "0xabc");
    }

    #[test]
    fn test_payload_builders() {
        let module = LedgerModule::default();

        let mint = module.mint(10);
        assert_eq!(mint.function, "carbon_credits::mint");
        assert_eq!(mint.arguments, vec![json!(10)]);

        let list = module.list("tx1", 40);
        assert_eq!(list.function, "carbon_credits::list");
        assert_eq!(list.arguments, vec![json!("tx1"), json!(40)]);

        let buy = module.buy("tx1");
        assert_eq!(buy.function, "carbon_credits::buy");
        assert_eq!(buy.arguments, vec![json!("tx1")]);
        assert!(buy.type_arguments.is_empty());
        assert_eq!(buy.payload_type, TransactionPayload::ENTRY_FUNCTION);
    }

    #[test]
    fn test_custom_module_name() {
        let module = LedgerModule::new("0x1::market");
        assert_eq!(module.buy("t").function, "0x1::market::buy");
    }
}
