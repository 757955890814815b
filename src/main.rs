//! `asset-transfer`: command-line shell over the Asset Hub client core.

use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use asset_hub_client::balance::{format_amount, BalanceSnapshot, TrackedItem};
use asset_hub_client::chain::storage::{AssetDetailsOf, AssetMetadataOf};
use asset_hub_client::chain::ChainSpecification;
use asset_hub_client::config::{load_config, ClientConfig};
use asset_hub_client::identity::{IdentityError, IdentityProvider, LocalKeystore};
use asset_hub_client::lifecycle::wait_for_signal;
use asset_hub_client::observability::logging::init_logging;
use asset_hub_client::{AssetSession, Ss58Codec};

#[derive(Parser)]
#[command(name = "asset-transfer")]
#[command(about = "Track and transfer Asset Hub assets", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in Westend defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Identity provider to use; the first configured one by default
    #[arg(short, long)]
    provider: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List identity providers
    Providers,
    /// List the accounts of the provider
    Accounts,
    /// Follow balances of an account until interrupted
    Watch {
        /// Account to watch; the first account by default
        #[arg(long)]
        account: Option<String>,
    },
    /// Transfer the configured asset, paying fees in it
    Transfer {
        #[arg(long)]
        to: String,
        /// Amount in the asset's smallest unit
        #[arg(long)]
        amount: String,
        /// Sending account; the first account by default
        #[arg(long)]
        from: Option<String>,
    },
    /// Show details of the configured asset
    Asset,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };
    init_logging(&config.observability);

    let keystore = Arc::new(LocalKeystore::from_config(&config.identity.providers));
    let provider = match &cli.provider {
        Some(name) => name.clone(),
        None => keystore
            .list_providers()
            .into_iter()
            .next()
            .ok_or_else(|| IdentityError::UnknownProvider("<none configured>".into()))?,
    };

    match cli.command {
        Commands::Providers => {
            for name in keystore.list_providers() {
                println!("{name}");
            }
        }
        Commands::Accounts => {
            keystore.connect(&provider).await?;
            let codec = offline_codec(&config)?;
            for identity in keystore.on_accounts_change().borrow().iter() {
                println!(
                    "{}  {}",
                    codec.encode(&identity.address),
                    identity.name.as_deref().unwrap_or("-")
                );
            }
        }
        Commands::Watch { account } => {
            let session = open_session(&config, keystore, &provider, account.as_deref()).await?;
            watch_balances(&session).await?;
            session.shutdown().await;
        }
        Commands::Transfer { to, amount, from } => {
            let session = open_session(&config, keystore, &provider, from.as_deref()).await?;
            let mut events = session.submit_transfer(&to, &amount).await?;
            let mut failed = false;
            while let Some(event) = events.next().await {
                let event = event?;
                println!("{}: {:?}", event.label(), event);
                failed = matches!(event, asset_hub_client::TxEvent::Failed(_));
            }
            session.shutdown().await;
            if failed {
                std::process::exit(1);
            }
        }
        Commands::Asset => {
            let session = AssetSession::start(&config, keystore).await?;
            let asset_id = session.asset_id();
            let connection = session.connection();
            let details = connection.query_once(&AssetDetailsOf { asset_id }).await?;
            let metadata = connection.query_once(&AssetMetadataOf { asset_id }).await?;
            match (details, metadata) {
                (Some(details), metadata) => {
                    let decimals = metadata.as_ref().map_or(0, |m| m.decimals);
                    println!("asset:        {asset_id}");
                    if let Some(m) = &metadata {
                        println!("name:         {}", m.name());
                        println!("symbol:       {}", m.symbol());
                    }
                    println!("decimals:     {decimals}");
                    println!("supply:       {}", format_amount(details.supply, decimals));
                    println!("min balance:  {}", format_amount(details.min_balance, decimals));
                    println!("accounts:     {}", details.accounts);
                    println!("owner:        {}", connection.ss58().encode(&details.owner));
                }
                (None, _) => println!("asset {asset_id} does not exist"),
            }
            session.shutdown().await;
        }
    }

    Ok(())
}

/// Address codec without a chain connection: config, then spec, then 42.
fn offline_codec(config: &ClientConfig) -> Result<Ss58Codec, Box<dyn std::error::Error>> {
    let spec = ChainSpecification::load_or_default(config.chain.spec_path.as_deref())?;
    let prefix = config
        .chain
        .ss58_prefix
        .or(spec.properties.ss58_format)
        .unwrap_or(asset_hub_client::address::GENERIC_SS58_PREFIX);
    Ok(Ss58Codec::new(prefix))
}

async fn open_session(
    config: &ClientConfig,
    keystore: Arc<LocalKeystore>,
    provider: &str,
    account: Option<&str>,
) -> Result<AssetSession, Box<dyn std::error::Error>> {
    let session = AssetSession::start(config, keystore.clone()).await?;
    session.connect_provider(provider).await?;
    if keystore.on_accounts_change().borrow().is_empty() {
        return Err(Box::new(IdentityError::NoAccountSelected));
    }
    let mut selection = session.selection();
    selection.wait_for(|s| s.selected.is_some()).await?;
    if let Some(account) = account {
        let address = session.connection().ss58().decode(account)?;
        session.select(&address)?;
    }
    Ok(session)
}

async fn watch_balances(session: &AssetSession) -> Result<(), Box<dyn std::error::Error>> {
    let connection = session.connection();
    let spec = connection.spec();
    let mut units: HashMap<TrackedItem, (String, u8)> = HashMap::new();
    units.insert(
        TrackedItem::NativeFree,
        (spec.token_symbol().to_string(), spec.token_decimals()),
    );

    let mut view = session.balances();
    let signal = wait_for_signal();
    tokio::pin!(signal);

    loop {
        let current = view.borrow_and_update().clone();
        if let Some(account) = current.account {
            let mut line = connection.ss58().encode(&account);
            for (item, snapshot) in &current.items {
                if let TrackedItem::Asset(asset_id) = item {
                    if !units.contains_key(item) {
                        let meta = connection
                            .query_once(&AssetMetadataOf {
                                asset_id: *asset_id,
                            })
                            .await?;
                        let unit = meta
                            .map_or((format!("#{asset_id}"), 0), |m| (m.symbol(), m.decimals));
                        units.insert(*item, unit);
                    }
                }
                let (symbol, decimals) = units.get(item).cloned().unwrap_or_default();
                let shown = match snapshot {
                    BalanceSnapshot::Loading => "loading".to_string(),
                    BalanceSnapshot::Live(amount) => {
                        format!("{} {symbol}", format_amount(*amount, decimals))
                    }
                    BalanceSnapshot::Failed(reason) => format!("failed ({reason})"),
                };
                line.push_str(&format!("  {item}: {shown}"));
            }
            println!("{line}");
        }

        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = &mut signal => break,
        }
    }
    Ok(())
}
