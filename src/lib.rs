//! Carbon Credit Market
//!
//! An HTTP record store for tokenized carbon credits, plus the client-side
//! flows that mint, list and trade those credits through a wallet extension
//! before mirroring the outcome into the store.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                   API Layer                  │
//! │   axum handlers, routing, error responses    │
//! ├─────────────────────────────────────────────┤
//! │               Application Layer              │
//! │  CreditService, AppState, marketplace flows  │
//! ├─────────────────────────────────────────────┤
//! │                 Domain Layer                 │
//! │ Records, validation, wallets, traits, errors │
//! ├─────────────────────────────────────────────┤
//! │             Infrastructure Layer             │
//! │ Memory store, HTTP client, ledger, key wallet│
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Every collaborator sits behind a trait in [`domain`] and is injected as an
//! `Arc<dyn Trait>`, so tests swap in the doubles from [`test_utils`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use carbon_credit_market::api::create_router;
//! use carbon_credit_market::app::AppState;
//! use carbon_credit_market::infra::InMemoryCreditStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(InMemoryCreditStore::init());
//!     let state = Arc::new(AppState::new(store));
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     axum::serve(listener, create_router(state)).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod app;
pub mod config;
pub mod domain;
pub mod infra;
pub mod test_utils;
