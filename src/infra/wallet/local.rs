//! Key-holding wallet extension for use outside a browser.
//!
//! Holds an ed25519 key, signs entry-function payloads locally and hands the
//! signed transaction to a [`LedgerClient`]. The command-line client registers
//! it in the same slot a browser extension would occupy.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use tracing::{info, instrument};

use crate::domain::{
    AccountInfo, AppError, ConfigError, LedgerClient, SignatureEnvelope, SignedTransaction,
    TransactionPayload, TxHash, WalletError, WalletExtension,
};

/// Signature scheme tag attached to submitted transactions.
pub const ED25519_SCHEME: &str = "ed25519_signature";

/// Single-signer ed25519 scheme byte appended before hashing the public key.
const ED25519_ADDRESS_SCHEME: u8 = 0x00;

/// Parse a base58-encoded private key (32-byte seed or 64-byte keypair).
pub fn signing_key_from_base58(secret: &SecretString) -> Result<SigningKey, AppError> {
    let invalid = |message: String| ConfigError::InvalidValue {
        key: "wallet private key".to_string(),
        message,
    };

    let key_bytes = bs58::decode(secret.expose_secret())
        .into_vec()
        .map_err(|e| invalid(e.to_string()))?;

    let seed: [u8; 32] = match key_bytes.len() {
        32 | 64 => key_bytes[..32]
            .try_into()
            .map_err(|_| invalid("Invalid keypair format".to_string()))?,
        len => return Err(invalid(format!("Key must be 32 or 64 bytes, got {len}")).into()),
    };

    Ok(SigningKey::from_bytes(&seed))
}

/// Account address derived from an ed25519 public key.
pub fn address_from_public_key(public_key: &[u8; 32]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(public_key);
    hasher.update([ED25519_ADDRESS_SCHEME]);
    format!("0x{}", to_hex(&hasher.finalize()))
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Wallet extension backed by a locally held key
pub struct LocalKeyExtension {
    signing_key: SigningKey,
    address: String,
    ledger: Arc<dyn LedgerClient>,
    connected: AtomicBool,
    sequence_number: AtomicU64,
}

impl LocalKeyExtension {
    pub fn new(signing_key: SigningKey, ledger: Arc<dyn LedgerClient>) -> Self {
        let address = address_from_public_key(signing_key.verifying_key().as_bytes());
        Self {
            signing_key,
            address,
            ledger,
            connected: AtomicBool::new(false),
            sequence_number: AtomicU64::new(0),
        }
    }

    /// Build from a base58 secret
    pub fn from_secret(secret: &SecretString, ledger: Arc<dyn LedgerClient>) -> Result<Self, AppError> {
        Ok(Self::new(signing_key_from_base58(secret)?, ledger))
    }

    /// Build with a freshly generated key
    pub fn ephemeral(ledger: Arc<dyn LedgerClient>) -> Self {
        Self::new(SigningKey::generate(&mut OsRng), ledger)
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[must_use]
    pub fn public_key_hex(&self) -> String {
        format!("0x{}", to_hex(self.signing_key.verifying_key().as_bytes()))
    }

    /// Sign the serialized JSON of `payload` into a submittable transaction
    pub fn sign_payload(&self, payload: &TransactionPayload) -> Result<SignedTransaction, AppError> {
        let message = serde_json::to_vec(payload)?;
        let signature = self.signing_key.sign(&message);

        Ok(SignedTransaction {
            sender: self.address.clone(),
            sequence_number: self.sequence_number.fetch_add(1, Ordering::SeqCst).to_string(),
            payload: payload.clone(),
            signature: SignatureEnvelope {
                scheme: ED25519_SCHEME.to_string(),
                public_key: self.public_key_hex(),
                signature: format!("0x{}", to_hex(&signature.to_bytes())),
            },
        })
    }

    fn account_info(&self) -> AccountInfo {
        AccountInfo {
            address: self.address.clone(),
            public_key: Some(self.public_key_hex()),
        }
    }
}

#[async_trait]
impl WalletExtension for LocalKeyExtension {
    async fn connect(&self) -> Result<AccountInfo, AppError> {
        self.connected.store(true, Ordering::SeqCst);
        info!(address = %self.address, "Local key wallet connected");
        Ok(self.account_info())
    }

    async fn disconnect(&self) -> Result<(), AppError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn account(&self) -> Result<AccountInfo, AppError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(WalletError::NotConnected.into());
        }
        Ok(self.account_info())
    }

    #[instrument(skip(self, payload), fields(function = %payload.function))]
    async fn sign_and_submit_transaction(
        &self,
        payload: &TransactionPayload,
    ) -> Result<TxHash, AppError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(WalletError::Rejected(format!(
                "wallet is disconnected, refusing to sign {}",
                payload.function
            ))
            .into());
        }

        let transaction = self.sign_payload(payload)?;
        self.ledger
            .submit_transaction(&transaction)
            .await
            .map_err(|e| WalletError::Rejected(format!("{}: {}", payload.function, e)).into())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
