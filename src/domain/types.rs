use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::error::FieldError;

/// Store-assigned identifier of a credit record.
pub type CreditId = u64;

/// Opaque transaction identifier returned by a wallet or ledger.
pub type TxHash = String;

/// A listing of a quantity of carbon credits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreditRecord {
    pub id: CreditId,
    pub token_id: String,
    pub owner: String,
    pub amount: i64,
    pub price: Option<i64>,
    pub listed: bool,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl CreditRecord {
    /// Builds the stored form of a validated creation payload.
    pub fn from_insert(id: CreditId, input: InsertCreditRecord, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            token_id: input.token_id,
            owner: input.owner,
            amount: input.amount,
            price: input.price,
            listed: input.listed,
            description: input.description,
            created_at,
        }
    }

    /// Merges the provided fields over this record. `id` and `created_at` never change.
    pub fn apply(&mut self, patch: &CreditPatch) {
        if let Some(token_id) = &patch.token_id {
            self.token_id = token_id.clone();
        }
        if let Some(owner) = &patch.owner {
            self.owner = owner.clone();
        }
        if let Some(amount) = patch.amount {
            self.amount = amount;
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(listed) = patch.listed {
            self.listed = listed;
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
    }
}

/// Creation payload for a credit record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InsertCreditRecord {
    pub token_id: String,
    pub owner: String,
    pub amount: i64,
    #[serde(default)]
    pub price: Option<i64>,
    #[serde(default)]
    pub listed: bool,
    pub description: String,
}

impl InsertCreditRecord {
    pub fn new(
        token_id: impl Into<String>,
        owner: impl Into<String>,
        amount: i64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            token_id: token_id.into(),
            owner: owner.into(),
            amount,
            price: None,
            listed: false,
            description: description.into(),
        }
    }

    pub fn with_price(mut self, price: i64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn listed(mut self, listed: bool) -> Self {
        self.listed = listed;
        self
    }
}

/// Partial update of a credit record.
///
/// `price` is doubly optional: `None` leaves the price alone, `Some(None)`
/// clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Validate)]
pub struct CreditPatch {
    pub token_id: Option<String>,
    #[validate(length(min = 1, message = "Owner must not be empty"))]
    pub owner: Option<String>,
    pub amount: Option<i64>,
    pub price: Option<Option<i64>>,
    pub listed: Option<bool>,
    pub description: Option<String>,
}

impl CreditPatch {
    /// The patch the purchase flow sends: new owner, no longer listed.
    pub fn transfer_to(owner: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
            listed: Some(false),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Serialize for CreditPatch {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(None)?;
        if let Some(token_id) = &self.token_id {
            map.serialize_entry("tokenId", token_id)?;
        }
        if let Some(owner) = &self.owner {
            map.serialize_entry("owner", owner)?;
        }
        if let Some(amount) = &self.amount {
            map.serialize_entry("amount", amount)?;
        }
        if let Some(price) = &self.price {
            map.serialize_entry("price", price)?;
        }
        if let Some(listed) = &self.listed {
            map.serialize_entry("listed", listed)?;
        }
        if let Some(description) = &self.description {
            map.serialize_entry("description", description)?;
        }
        map.end()
    }
}

/// Body of a successful DELETE.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct DeleteResponse {
    pub success: bool,
}

/// Account exposed by a connected wallet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountInfo {
    pub address: String,
    pub public_key: Option<String>,
}

impl AccountInfo {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            public_key: None,
        }
    }
}

/// Entry-function payload submitted through a wallet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionPayload {
    #[serde(rename = "type")]
    pub payload_type: String,
    pub function: String,
    pub type_arguments: Vec<String>,
    pub arguments: Vec<serde_json::Value>,
}

impl TransactionPayload {
    pub const ENTRY_FUNCTION: &'static str = "entry_function_payload";

    pub fn entry_function(function: impl Into<String>, arguments: Vec<serde_json::Value>) -> Self {
        Self {
            payload_type: Self::ENTRY_FUNCTION.to_string(),
            function: function.into(),
            type_arguments: Vec::new(),
            arguments,
        }
    }
}

/// A payload signed by a wallet, ready for ledger submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignedTransaction {
    pub sender: String,
    pub sequence_number: String,
    pub payload: TransactionPayload,
    pub signature: SignatureEnvelope,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignatureEnvelope {
    #[serde(rename = "type")]
    pub scheme: String,
    pub public_key: String,
    pub signature: String,
}

/// Ledger-side state of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    Pending,
    Committed,
    Failed(String),
}

/// Health check status for services.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Health check response for the application.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub store: HealthStatus,
    pub credits: usize,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    pub fn new(store: HealthStatus, credits: usize) -> Self {
        Self {
            status: store.clone(),
            store,
            credits,
            timestamp: Utc::now(),
        }
    }
}

/// Error payload returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    pub r#type: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}
