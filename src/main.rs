//! `xpay`: command-line access to the XIF ledger adapter.
//!
//! ```text
//! xpay --config xpay.toml account 02ab...
//! XPAY_PRIVATE_KEY=... xpay transfer --to 03cd... --amount 1.5
//! ```
//!
//! Every command prints pretty JSON on stdout; logs go to stderr.

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;

use xpay_adapter::config::load_or_default;
use xpay_adapter::observability::{logging, metrics};
use xpay_adapter::{Wallet, XifAdapter};

#[derive(Parser)]
#[command(name = "xpay")]
#[command(about = "Account, transfer and query tool for the XIF ledger", long_about = None)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show an account record
    Account { address: String },
    /// Show an account balance
    Balance { address: String },
    /// Show the latest block
    LatestBlock,
    /// Show the block at a height
    Block { height: u64 },
    /// Show a transaction by hash
    Tx { hash: String },
    /// Ask the service to create a wallet
    NewWallet {
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Generate a local key pair and print its address
    NewKey {
        /// Announce the address to the service
        #[arg(long)]
        inform: bool,
    },
    /// Check an address string
    VerifyAddress { address: String },
    /// Transfer from the key in XPAY_PRIVATE_KEY
    Transfer {
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: String,
        #[arg(long)]
        symbol: Option<String>,
        /// Sign through the remote service (requires signing.allow_online)
        #[arg(long)]
        online: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_or_default(cli.config.as_deref())?;
    logging::init_logging(&config.observability);

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    tracing::debug!(
        server_api = %config.ledger.server_api,
        symbol = %config.ledger.symbol,
        "Configuration loaded"
    );

    let adapter = XifAdapter::from_config(config)?;

    match cli.command {
        Commands::Account { address } => print_json(&adapter.get_account(&address).await?)?,
        Commands::Balance { address } => {
            let balance = adapter.get_balance(&address).await?;
            print_json(&json!({ "address": address, "balance": balance }))?;
        }
        Commands::LatestBlock => print_json(&adapter.get_latest_block().await?)?,
        Commands::Block { height } => print_json(&adapter.get_block(height).await?)?,
        Commands::Tx { hash } => print_json(&adapter.get_transaction(&hash).await?)?,
        Commands::NewWallet { symbol } => {
            print_json(&adapter.new_wallet(symbol.as_deref()).await?)?
        }
        Commands::NewKey { inform } => {
            let wallet = Wallet::generate();
            let address = if inform {
                adapter
                    .create_address(&wallet.public_key_uncompressed())
                    .await?
            } else {
                wallet.address()
            };
            // The secret goes to stdout once; it is never logged.
            print_json(&json!({
                "address": address,
                "private_key": hex::encode(wallet.signing_key().to_bytes()),
            }))?;
        }
        Commands::VerifyAddress { address } => {
            let valid = adapter.verify_address(&address);
            print_json(&json!({ "address": address, "valid": valid }))?;
        }
        Commands::Transfer {
            to,
            amount,
            symbol,
            online,
        } => {
            let wallet = Wallet::from_env()?;
            let submitted = if online {
                adapter
                    .transfer_online(&wallet, &to, &amount, symbol.as_deref())
                    .await?
            } else {
                adapter
                    .transfer_offline(&wallet, &to, &amount, symbol.as_deref())
                    .await?
            };
            print_json(&submitted)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
