use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use sorosub_client::{
    amount::{from_smallest_unit, parse_display_amount, RawAmount},
    cache::{format_renewal_date, FileStore, StoredSubscription, SubscriptionCache},
    config::{format_address, interval_label, MONTHLY},
    credit::{
        displayed_score, horizon_credit_data, is_bnpl_eligible, points_to_bnpl, CreditTier,
    },
    dashboard::{fetch_overview, provider_list, reconcile},
    flows::{FlowContext, FlowOutcome, SubscribeRequest},
    horizon::Horizon,
    rpc::HttpRpc,
    submit::{submit, PollConfig, SubmissionOutcome},
    wallet::{KeypairWallet, WalletSession},
    NetworkConfig, SoroSub,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sorosub", version, about = "SoroSub subscription and BNPL client")]
struct Cli {
    /// TOML network config; defaults to testnet plus SOROSUB_* overrides
    #[arg(long, global = true, env = "SOROSUB_CONFIG")]
    config: Option<PathBuf>,

    /// Local subscription cache file
    #[arg(
        long,
        global = true,
        env = "SOROSUB_CACHE",
        default_value = "sorosub_subscriptions.json"
    )]
    cache: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a new keypair
    Keygen,
    /// Initialize the contract (admin)
    Init {
        #[arg(long, env = "SOROSUB_SECRET", hide_env_values = true)]
        secret: String,
        /// Liquidity pool address; defaults to the admin
        #[arg(long)]
        liquidity_pool: Option<String>,
    },
    /// Contract initialization state and liquidity pool
    Status,
    /// Show one subscription
    Subscription { subscriber: String, merchant: String },
    /// Show outstanding BNPL debt
    Debt { user: String },
    /// Horizon credit breakdown, optionally with the on-chain score
    Score {
        account: String,
        #[arg(long)]
        merchant: Option<String>,
    },
    /// Payment token balance
    Balance { account: String },
    /// Everything the dashboard shows for one account
    Overview { account: String },
    /// Approve and create a subscription
    Subscribe {
        #[arg(long, env = "SOROSUB_SECRET", hide_env_values = true)]
        secret: String,
        merchant: String,
        /// Amount per period in display units, e.g. 9.99
        amount: String,
        #[arg(long, default_value = "Subscription")]
        name: String,
        #[arg(long, default_value_t = MONTHLY)]
        interval: u64,
    },
    /// Cancel a subscription
    Cancel {
        #[arg(long, env = "SOROSUB_SECRET", hide_env_values = true)]
        secret: String,
        merchant: String,
    },
    /// Repay BNPL debt
    Repay {
        #[arg(long, env = "SOROSUB_SECRET", hide_env_values = true)]
        secret: String,
        amount: String,
    },
    /// Inspect the local subscription cache
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
}

#[derive(Subcommand)]
enum CacheCommand {
    List,
    Remove { id: String },
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => NetworkConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => NetworkConfig::from_env().context("loading config from environment")?,
    };
    let cache = SubscriptionCache::new(FileStore::new(&cli.cache));

    match cli.command {
        Command::Keygen => {
            let wallet = KeypairWallet::generate();
            println!("public: {}", wallet.public_key());
            println!("secret: {}", wallet.secret());
        }
        Command::Init {
            secret,
            liquidity_pool,
        } => {
            let client = SoroSub::from_config(config)?;
            let session = connected(&secret).await?;
            let admin = session.public_key().context("wallet has no address")?;
            let pool = liquidity_pool.unwrap_or_else(|| admin.clone());

            if client.try_is_initialized().await? {
                warn!("contract already initialized");
                return Ok(());
            }
            let prepared = client.initialize(&admin, &pool).await?;
            let xdr = session
                .sign(&prepared.xdr, &client.config().network_passphrase)
                .await?;
            let outcome =
                submit(client.rpc(), &xdr, &PollConfig::default(), &ctrl_c_token()).await?;
            report_submission(&outcome)?;
        }
        Command::Status => {
            let client = SoroSub::from_config(config)?;
            let initialized = client.is_initialized().await;
            let pool = client.get_liquidity_pool().await;
            println!("contract:       {}", client.config().contract_id);
            println!("initialized:    {initialized}");
            println!(
                "liquidity pool: {}",
                pool.as_deref().unwrap_or("(not set)")
            );
        }
        Command::Subscription {
            subscriber,
            merchant,
        } => {
            let client = SoroSub::from_config(config)?;
            match client.try_get_subscription(&subscriber, &merchant).await {
                Ok(subscription) => {
                    print_json(&subscription)?;
                    println!(
                        "{} {} {}",
                        subscription.display_amount(),
                        interval_label(subscription.interval),
                        if subscription.is_active { "active" } else { "cancelled" }
                    );
                }
                Err(e) if e.is_missing_record() => println!("no subscription"),
                Err(e) => return Err(e.into()),
            }
        }
        Command::Debt { user } => {
            let client = SoroSub::from_config(config)?;
            match client.try_get_user_debt(&user).await? {
                Some(debt) => println!("{} owed ({})", debt.display_amount(), debt.token),
                None => println!("no debt"),
            }
        }
        Command::Score { account, merchant } => {
            let horizon = Horizon::from_url(&config.horizon_url, request_timeout(&config))?;
            let data = horizon_credit_data(&horizon, &account).await;
            let score = displayed_score(data.total_horizon_score);
            print_json(&data)?;
            println!(
                "score {score} ({}), bnpl {}",
                CreditTier::from_score(score).label(),
                if is_bnpl_eligible(score) {
                    "unlocked".to_string()
                } else {
                    format!("needs {} more", points_to_bnpl(score))
                }
            );
            if let Some(merchant) = merchant {
                let client = SoroSub::from_config(config)?;
                let on_chain = client.get_credit_score(&account, &merchant).await;
                println!("on-chain score with {}: {on_chain}", format_address(&merchant, 4));
            }
        }
        Command::Balance { account } => {
            let client = SoroSub::from_config(config)?;
            let token = client.config().token_id.clone();
            let raw = client.try_token_balance(&account, &token).await?;
            println!("{}", from_smallest_unit(&RawAmount::Integer(raw)));
        }
        Command::Overview { account } => {
            let horizon = Horizon::from_url(&config.horizon_url, request_timeout(&config))?;
            let client = SoroSub::from_config(config)?;
            let cached = cache.list();
            let providers = provider_list(&client.config().known_providers, &cached);
            let overview = fetch_overview(&client, &horizon, &account, &providers).await;
            print_json(&overview)?;
            for (stored, status) in reconcile(&cached, &overview.subscriptions) {
                println!("{} {}: {status:?}", stored.id, stored.name);
            }
        }
        Command::Subscribe {
            secret,
            merchant,
            amount,
            name,
            interval,
        } => {
            let amount = parse_display_amount(&amount)?;
            let client = SoroSub::from_config(config)?;
            let session = connected(&secret).await?;
            let request = SubscribeRequest {
                name,
                merchant,
                amount,
                interval,
            };
            let outcome = flow(&client, &session).subscribe(&request, &cache).await?;
            report_flow(outcome)?;
        }
        Command::Cancel { secret, merchant } => {
            let client = SoroSub::from_config(config)?;
            let session = connected(&secret).await?;
            let outcome = flow(&client, &session).cancel(&merchant, &cache).await?;
            report_flow(outcome)?;
        }
        Command::Repay { secret, amount } => {
            let amount = parse_display_amount(&amount)?;
            let client = SoroSub::from_config(config)?;
            let session = connected(&secret).await?;
            let outcome = flow(&client, &session).repay(amount).await?;
            report_flow(outcome)?;
        }
        Command::Cache { action } => match action {
            CacheCommand::List => {
                let now_ms = chrono::Utc::now().timestamp_millis();
                for stored in cache.list() {
                    print_cached(&stored, now_ms);
                }
            }
            CacheCommand::Remove { id } => {
                if !cache.remove(&id) {
                    bail!("no cached subscription with id {id}");
                }
            }
            CacheCommand::Clear => cache.clear(),
        },
    }
    Ok(())
}

fn request_timeout(config: &NetworkConfig) -> Duration {
    Duration::from_secs(config.request_timeout_secs)
}

/// Cancelled on Ctrl-C
fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling");
            trigger.cancel();
        }
    });
    token
}

async fn connected(secret: &str) -> Result<WalletSession<KeypairWallet>> {
    let session = WalletSession::new(KeypairWallet::from_secret(secret)?);
    session.connect().await?;
    Ok(session)
}

fn flow<'a>(
    client: &'a SoroSub<HttpRpc>,
    session: &'a WalletSession<KeypairWallet>,
) -> FlowContext<'a, HttpRpc, KeypairWallet> {
    let mut context = FlowContext::new(client, session);
    context.cancel = ctrl_c_token();
    context
}

fn report_submission(outcome: &SubmissionOutcome) -> Result<()> {
    match outcome {
        SubmissionOutcome::Confirmed(confirmation) => {
            println!("{:?} {}", confirmation.status, confirmation.hash);
            if !outcome.is_success() {
                bail!("transaction failed");
            }
        }
        SubmissionOutcome::TimedOut { hash, attempts } => {
            bail!("no result for {hash} after {attempts} polls; it may still land")
        }
    }
    Ok(())
}

fn report_flow(outcome: FlowOutcome) -> Result<()> {
    match outcome {
        FlowOutcome::Completed { hash } => println!("confirmed {hash}"),
        FlowOutcome::Declined => println!("declined"),
        FlowOutcome::Incomplete { step, outcome } => {
            println!("{step} did not complete");
            report_submission(&outcome)?;
        }
    }
    Ok(())
}

fn print_cached(stored: &StoredSubscription, now_ms: i64) {
    let renewal = stored
        .next_renewal(now_ms)
        .map(format_renewal_date)
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{}  {}  {} {}  {}  next {}",
        stored.id,
        stored.name,
        stored.amount,
        interval_label(stored.interval_seconds),
        format_address(&stored.provider_address, 4),
        renewal
    );
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
