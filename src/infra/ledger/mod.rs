//! Ledger node clients.

mod rpc;

pub use rpc::{RpcLedgerClient, RpcLedgerConfig};
