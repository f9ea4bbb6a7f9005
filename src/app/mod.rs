//! Application layer: server use cases, shared state, and client flows.

pub mod flows;
pub mod service;
pub mod state;

pub use flows::{
    ConfirmationPolicy, FlowConfig, MarketplaceFlows, MintError, PurchaseError, PurchaseReceipt,
    PurchaseStage,
};
pub use service::CreditService;
pub use state::AppState;
