//! Domain layer containing core business types, traits, validation, and error definitions.

pub mod error;
pub mod traits;
pub mod types;
pub mod validation;
pub mod wallet;

pub use error::{
    AppError, ConfigError, ExternalServiceError, FieldError, LedgerError, StoreError,
    ValidationError, WalletError,
};
pub use traits::{CreditRepository, CreditsApi, LedgerClient, WalletExtension};
pub use types::{
    AccountInfo, CreditId, CreditPatch, CreditRecord, DeleteResponse, ErrorDetail, ErrorResponse,
    HealthResponse, HealthStatus, InsertCreditRecord, SignatureEnvelope, SignedTransaction,
    TransactionPayload, TransactionStatus, TxHash,
};
pub use validation::{parse_insert, parse_patch};
pub use wallet::{DetectedWallet, ExtensionRegistry, LedgerModule, WalletKind, detect_wallet};
