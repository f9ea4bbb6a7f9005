//! Marketplace flows driven against a live server over HTTP.

use std::sync::Arc;
use std::time::Duration;

use carbon_credit_market::api::create_router;
use carbon_credit_market::app::{
    AppState, ConfirmationPolicy, FlowConfig, MarketplaceFlows, PurchaseStage,
    flows::{INSUFFICIENT_FUNDS, NOT_OWNER, SELF_TRADE},
};
use carbon_credit_market::domain::{
    AppError, CreditsApi, DetectedWallet, ExtensionRegistry, InsertCreditRecord, TransactionStatus,
    WalletExtension, WalletKind, detect_wallet,
};
use carbon_credit_market::infra::{HttpCreditsApi, InMemoryCreditStore, LocalKeyExtension};
use carbon_credit_market::test_utils::MockLedgerClient;

async fn spawn_server() -> String {
    let store = Arc::new(InMemoryCreditStore::init());
    let router = create_router(Arc::new(AppState::new(store)));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn connected_wallet(ledger: Arc<MockLedgerClient>, slot: WalletKind) -> (DetectedWallet, String) {
    let extension = LocalKeyExtension::ephemeral(ledger);
    let address = extension.address().to_string();
    let registry = ExtensionRegistry::new().with_extension(slot.key(), Arc::new(extension));

    let wallet = detect_wallet(&registry);
    wallet.connect().await.unwrap();
    (wallet, address)
}

fn flows_for(
    wallet: DetectedWallet,
    base_url: &str,
    ledger: Arc<MockLedgerClient>,
    config: FlowConfig,
) -> MarketplaceFlows {
    let api = Arc::new(HttpCreditsApi::with_defaults(base_url).unwrap());
    MarketplaceFlows::new(wallet, api, Some(ledger), config).unwrap()
}

#[tokio::test]
async fn test_mint_list_and_buy_over_http() {
    let base_url = spawn_server().await;
    let ledger = Arc::new(MockLedgerClient::new());

    let (seller_wallet, seller) = connected_wallet(ledger.clone(), WalletKind::Petra).await;
    let (buyer_wallet, buyer) = connected_wallet(ledger.clone(), WalletKind::Martian).await;
    assert_eq!(buyer_wallet.kind(), Some(WalletKind::Martian));

    let seller_flows = flows_for(seller_wallet, &base_url, ledger.clone(), FlowConfig::default());
    let buyer_flows = flows_for(buyer_wallet, &base_url, ledger.clone(), FlowConfig::default());

    // Mint records the credit under the seller with the tx hash as token id.
    let minted = seller_flows
        .mint(50, "Kelp forest sequestration", Some(12))
        .await
        .unwrap();
    assert_eq!(minted.owner, seller);
    assert!(minted.token_id.starts_with("0xledger"));
    assert!(!minted.listed);

    // Listing publishes a separate, listed record.
    let listing = seller_flows
        .list_credit(
            InsertCreditRecord::new(minted.token_id.clone(), seller.clone(), 50, "Kelp forest sequestration")
                .with_price(12),
        )
        .await
        .unwrap();
    assert!(listing.listed);
    assert_eq!(buyer_flows.market().await.unwrap(), vec![listing.clone()]);

    // The seller cannot buy their own listing.
    let err = seller_flows.purchase(&listing).await.unwrap_err();
    assert_eq!(err.stage, PurchaseStage::SelfTradeGuard);
    assert_eq!(err.user_message(), SELF_TRADE);

    // The buyer can.
    let receipt = buyer_flows.purchase(&listing).await.unwrap();
    assert_eq!(receipt.record.owner, buyer);
    assert!(!receipt.record.listed);
    assert_eq!(receipt.market, Some(vec![]));

    // mint + buy reached the ledger; the self-trade never did.
    assert_eq!(ledger.submitted().len(), 2);
    assert_eq!(seller_flows.all().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_rejected_buy_reports_insufficient_funds() {
    let base_url = spawn_server().await;
    let api = HttpCreditsApi::with_defaults(&base_url).unwrap();
    let listing = api
        .create(&InsertCreditRecord::new("0xtoken", "0xseller", 3, "Biochar").listed(true))
        .await
        .unwrap();

    let broke_ledger = Arc::new(MockLedgerClient::failing("INSUFFICIENT_BALANCE"));
    let (wallet, _) = connected_wallet(broke_ledger.clone(), WalletKind::Petra).await;
    let flows = flows_for(wallet, &base_url, broke_ledger, FlowConfig::default());

    let err = flows.purchase(&listing).await.unwrap_err();

    assert_eq!(err.stage, PurchaseStage::OnChainSubmit);
    assert_eq!(err.user_message(), INSUFFICIENT_FUNDS);
    assert!(!err.is_divergent());

    let unchanged = api.list().await.unwrap();
    assert_eq!(unchanged[0].owner, "0xseller");
    assert!(unchanged[0].listed);
}

#[tokio::test]
async fn test_await_ledger_stops_failed_transfer_before_record_update() {
    let base_url = spawn_server().await;
    let api = HttpCreditsApi::with_defaults(&base_url).unwrap();
    let listing = api
        .create(&InsertCreditRecord::new("0xtoken", "0xseller", 3, "Biochar").listed(true))
        .await
        .unwrap();

    let ledger = Arc::new(MockLedgerClient::new());
    ledger.set_default_status(TransactionStatus::Failed("Move abort".to_string()));
    let (wallet, _) = connected_wallet(ledger.clone(), WalletKind::Petra).await;

    let config = FlowConfig {
        confirmation: ConfirmationPolicy::AwaitLedger {
            timeout: Duration::from_secs(2),
        },
        poll_interval: Duration::from_millis(10),
        ..FlowConfig::default()
    };
    let flows = flows_for(wallet, &base_url, ledger, config);

    let err = flows.purchase(&listing).await.unwrap_err();

    assert_eq!(err.stage, PurchaseStage::Confirm);
    assert!(api.list().await.unwrap()[0].listed);
}

#[tokio::test]
async fn test_delete_listing_requires_ownership() {
    let base_url = spawn_server().await;
    let ledger = Arc::new(MockLedgerClient::new());

    let (owner_wallet, owner) = connected_wallet(ledger.clone(), WalletKind::Petra).await;
    let (other_wallet, _) = connected_wallet(ledger.clone(), WalletKind::Petra).await;
    let owner_flows = flows_for(owner_wallet, &base_url, ledger.clone(), FlowConfig::default());
    let other_flows = flows_for(other_wallet, &base_url, ledger, FlowConfig::default());

    let listing = owner_flows
        .list_credit(InsertCreditRecord::new("0xtoken", owner, 8, "Cookstoves"))
        .await
        .unwrap();

    let err = other_flows.delete_listing(listing.id).await.unwrap_err();
    assert!(matches!(err, AppError::BusinessRule(ref msg) if msg == NOT_OWNER));

    let market = owner_flows.delete_listing(listing.id).await.unwrap();
    assert!(market.is_empty());
    assert!(owner_flows.all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_disconnected_wallet_cannot_mint() {
    let base_url = spawn_server().await;
    let ledger = Arc::new(MockLedgerClient::new());
    let (wallet, _) = connected_wallet(ledger.clone(), WalletKind::Petra).await;
    wallet.disconnect().await.unwrap();

    let flows = flows_for(wallet, &base_url, ledger.clone(), FlowConfig::default());
    let err = flows.mint(1, "nope", None).await.unwrap_err();

    assert!(matches!(err.source, AppError::BusinessRule(_)));
    assert!(!err.is_divergent());
    assert!(ledger.submitted().is_empty());
    assert!(flows.all().await.unwrap().is_empty());
}
