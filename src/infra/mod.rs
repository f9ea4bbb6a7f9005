//! Infrastructure layer implementations.

pub mod client;
pub mod ledger;
pub mod observability;
pub mod store;
pub mod wallet;

pub use client::HttpCreditsApi;
pub use ledger::{RpcLedgerClient, RpcLedgerConfig};
pub use store::InMemoryCreditStore;
pub use wallet::{LocalKeyExtension, address_from_public_key, signing_key_from_base58};
