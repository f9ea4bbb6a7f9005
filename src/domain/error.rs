//! Application error types with proper error chaining.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Store is closed")]
    Closed,
    #[error("Store failure: {0}")]
    Internal(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("No compatible wallet extension found")]
    Unavailable,
    #[error("Wallet is not connected")]
    NotConnected,
    #[error("Wallet rejected the request: {0}")]
    Rejected(String),
}

#[derive(Error, Debug, Clone)]
pub enum LedgerError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Ledger call failed: {0}")]
    Rpc(String),
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
    #[error("Timeout waiting for confirmation: {0}")]
    Timeout(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

#[derive(Error, Debug, Clone)]
pub enum ValidationError {
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    #[error("Validation failed: {}", summarize(.0))]
    Fields(Vec<FieldError>),
}

impl ValidationError {
    /// Field-level details, flattened for the error response body.
    pub fn details(&self) -> Vec<FieldError> {
        match self {
            ValidationError::InvalidFormat(_) => Vec::new(),
            ValidationError::Fields(errors) => errors.clone(),
        }
    }
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<&str> for ValidationError {
    fn from(s: &str) -> Self {
        ValidationError::InvalidFormat(s.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ExternalServiceError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Unexpected status {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    ExternalService(#[from] ExternalServiceError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    BusinessRule(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Deserialization error: {0}")]
    Deserialization(String),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Operation not supported: {0}")]
    NotSupported(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = err
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("failed '{}' check", e.code));
                    FieldError::new(field.to_string(), message)
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        ValidationError::Fields(fields)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_conversion() {
        use validator::Validate;

        #[derive(Validate)]
        struct TestStruct {
            #[validate(length(min = 1, message = "must not be empty"))]
            val: String,
        }

        let s = TestStruct {
            val: "".to_string(),
        };
        let err = s.validate().unwrap_err();
        let app_err = AppError::from(err);

        match app_err {
            AppError::Validation(ValidationError::Fields(fields)) => {
                assert_eq!(fields, vec![FieldError::new("val", "must not be empty")]);
            }
            other => panic!("Expected field errors, got {:?}", other),
        }
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<String>("invalid json").unwrap_err();
        let app_err = AppError::from(json_err);
        assert!(matches!(app_err, AppError::Serialization(_)));
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::NotFound("credit 7".to_string());
        assert_eq!(err.to_string(), "Record not found: credit 7");

        assert_eq!(StoreError::Closed.to_string(), "Store is closed");
    }

    #[test]
    fn test_wallet_error_display() {
        assert_eq!(
            WalletError::Unavailable.to_string(),
            "No compatible wallet extension found"
        );
        assert_eq!(
            WalletError::Rejected("user declined".to_string()).to_string(),
            "Wallet rejected the request: user declined"
        );
    }

    #[test]
    fn test_ledger_error_display() {
        let err = LedgerError::Timeout("60s".to_string());
        assert_eq!(err.to_string(), "Timeout waiting for confirmation: 60s");

        let err = LedgerError::TransactionFailed("abort".to_string());
        assert_eq!(err.to_string(), "Transaction failed: abort");
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::Fields(vec![
            FieldError::new("amount", "Required"),
            FieldError::new("owner", "Expected string, received number"),
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: amount: Required; owner: Expected string, received number"
        );
    }

    #[test]
    fn test_validation_error_details() {
        let err = ValidationError::Fields(vec![FieldError::new("tokenId", "Required")]);
        assert_eq!(err.details(), vec![FieldError::new("tokenId", "Required")]);

        let err = ValidationError::InvalidFormat("not an object".to_string());
        assert!(err.details().is_empty());
    }

    #[test]
    fn test_business_rule_display_is_bare_message() {
        let err = AppError::BusinessRule("You cannot buy your own carbon credits".to_string());
        assert_eq!(err.to_string(), "You cannot buy your own carbon credits");
    }

    #[test]
    fn test_app_error_from_store_error() {
        let app_err: AppError = StoreError::Closed.into();
        assert!(matches!(app_err, AppError::Store(StoreError::Closed)));
    }

    #[test]
    fn test_app_error_from_wallet_error() {
        let app_err: AppError = WalletError::NotConnected.into();
        assert!(matches!(app_err, AppError::Wallet(WalletError::NotConnected)));
    }

    #[test]
    fn test_external_service_error_display() {
        let err = ExternalServiceError::UnexpectedStatus {
            status: 502,
            message: "bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "Unexpected status 502: bad gateway");
    }
}
