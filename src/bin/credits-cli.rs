//! credits-cli: command-line client for the carbon credit market.
//!
//! Holds a local ed25519 key as its wallet, submits ledger transactions
//! through a node's REST endpoint and mirrors the outcome into the credits API.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use serde::Serialize;
use tracing::{info, warn};

use carbon_credit_market::app::{ConfirmationPolicy, FlowConfig, MarketplaceFlows};
use carbon_credit_market::config::ClientConfig;
use carbon_credit_market::domain::{
    ExtensionRegistry, InsertCreditRecord, LedgerClient, LedgerModule, WalletExtension, WalletKind,
    detect_wallet,
};
use carbon_credit_market::infra::observability::init_tracing;
use carbon_credit_market::infra::{HttpCreditsApi, LocalKeyExtension, RpcLedgerClient};

/// Carbon credit market client
#[derive(Parser, Debug)]
#[command(name = "credits-cli")]
#[command(about = "Mint, list and trade tokenized carbon credits")]
struct Args {
    /// Credits API base URL (overrides API_BASE_URL)
    #[arg(long)]
    api: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show credits currently listed for sale
    Market,
    /// Show every credit record
    All,
    /// Show the wallet account
    Account,
    /// Mint credits on-chain and record them
    Mint {
        #[arg(long)]
        amount: i64,
        #[arg(long)]
        description: String,
        #[arg(long)]
        price: Option<i64>,
    },
    /// Publish a listing without touching the wallet
    List {
        #[arg(long)]
        token_id: String,
        #[arg(long)]
        amount: i64,
        #[arg(long)]
        price: i64,
        #[arg(long)]
        description: String,
        #[arg(long, default_value = "default")]
        owner: String,
    },
    /// Buy a listed credit
    Buy {
        #[arg(long)]
        id: u64,
    },
    /// Delete one of your listings
    Delete {
        #[arg(long)]
        id: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    let mut config = ClientConfig::from_env().context("Invalid client configuration")?;
    if let Some(api) = args.api {
        config.api_base_url = api;
    }
    init_tracing(config.log_format);

    let flows = build_flows(&config).await?;
    info!(
        module = flows.config().module.name(),
        confirmation = ?flows.config().confirmation,
        "Marketplace flows ready"
    );

    match args.command {
        Command::Market => print_json(&flows.market().await?)?,
        Command::All => print_json(&flows.all().await?)?,
        Command::Account => print_json(&flows.connect().await?)?,
        Command::Mint {
            amount,
            description,
            price,
        } => {
            match flows.mint(amount, description, price).await {
                Ok(record) => print_json(&record)?,
                Err(e) if e.is_divergent() => {
                    return Err(anyhow!(
                        "{} (token {} was minted; no record was created)",
                        e.source,
                        e.tx_hash.as_deref().unwrap_or_default()
                    ));
                }
                Err(e) => return Err(e.source.into()),
            }
        }
        Command::List {
            token_id,
            amount,
            price,
            description,
            owner,
        } => {
            let input = InsertCreditRecord::new(token_id, owner, amount, description).with_price(price);
            print_json(&flows.list_credit(input).await?)?;
        }
        Command::Buy { id } => {
            let record = flows
                .market()
                .await?
                .into_iter()
                .find(|r| r.id == id)
                .ok_or_else(|| anyhow!("Credit {id} is not listed"))?;

            match flows.purchase(&record).await {
                Ok(receipt) => {
                    info!(tx_hash = %receipt.tx_hash, "Purchase complete");
                    print_json(&receipt.record)?;
                }
                Err(e) if e.is_divergent() => {
                    return Err(anyhow!(
                        "{} (transaction {} was submitted; the record was not updated)",
                        e.user_message(),
                        e.tx_hash.as_deref().unwrap_or_default()
                    ));
                }
                Err(e) => return Err(anyhow!(e.user_message())),
            }
        }
        Command::Delete { id } => print_json(&flows.delete_listing(id).await?)?,
    }

    Ok(())
}

async fn build_flows(config: &ClientConfig) -> Result<MarketplaceFlows> {
    let ledger: Arc<dyn LedgerClient> = Arc::new(RpcLedgerClient::with_defaults(&config.ledger_node_url)?);

    let extension = match &config.wallet_private_key {
        Some(secret) => LocalKeyExtension::from_secret(secret, Arc::clone(&ledger))?,
        None => {
            warn!("WALLET_PRIVATE_KEY not set, generating an ephemeral key");
            LocalKeyExtension::ephemeral(Arc::clone(&ledger))
        }
    };
    info!(address = %extension.address(), "Local wallet ready");

    let registry = ExtensionRegistry::new().with_extension(WalletKind::Petra.key(), Arc::new(extension));
    let wallet = detect_wallet(&registry);
    if wallet.reconnect_existing().await.is_none() {
        wallet.connect().await?;
    }

    let confirmation = if config.confirm_transactions {
        ConfirmationPolicy::AwaitLedger {
            timeout: config.confirmation_timeout,
        }
    } else {
        ConfirmationPolicy::FireAndForget
    };
    let flow_config = FlowConfig {
        module: LedgerModule::new(config.ledger_module.clone()),
        confirmation,
        ..FlowConfig::default()
    };

    let api = Arc::new(HttpCreditsApi::with_defaults(&config.api_base_url)?);
    Ok(MarketplaceFlows::new(wallet, api, Some(ledger), flow_config)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
