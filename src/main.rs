//! `moneyrace` operator CLI.
//!
//! Exercises the client core from a terminal: derive addresses, inspect and
//! manage a file-backed session, list rooms, check balances and watch a room's
//! live yield.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use moneyrace_core::api::ApiClient;
use moneyrace_core::blockchain::client::LedgerClient;
use moneyrace_core::blockchain::keypair::DerivedKeypair;
use moneyrace_core::blockchain::types::{Address, ObjectId};
use moneyrace_core::config::{load_config, ClientConfig, SessionBackend};
use moneyrace_core::lifecycle::{Clock, SystemClock};
use moneyrace_core::live_yield::{rate_per_sec, spawn_ticker, SharedEstimator, YieldStore};
use moneyrace_core::observability::{logging, metrics};
use moneyrace_core::rooms::{format_usdc, period_status, PeriodStatus};
use moneyrace_core::session::SessionStore;
use moneyrace_core::Shutdown;

#[derive(Parser)]
#[command(name = "moneyrace")]
#[command(about = "Operator CLI for the MoneyRace client core", long_about = None)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Session file; overrides [session] storage_path
    /// [default: .moneyrace/session.json when neither is set]
    #[arg(long)]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

const DEFAULT_SESSION_FILE: &str = ".moneyrace/session.json";

/// `--session-file` wins over the config file, which wins over the default.
fn session_path(flag: Option<&std::path::Path>, configured: Option<String>) -> String {
    match flag {
        Some(path) => path.to_string_lossy().into_owned(),
        None => configured.unwrap_or_else(|| DEFAULT_SESSION_FILE.to_string()),
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Derive the address for an identity subject
    Derive {
        subject: String,
        #[arg(long)]
        salt: Option<String>,
    },
    /// Manage the stored session
    Session {
        #[command(subcommand)]
        action: SessionCommand,
    },
    /// List rooms, or show one room
    Rooms {
        #[arg(long)]
        room: Option<String>,
    },
    /// Stablecoin balance of an address
    Balance {
        address: String,
        /// Read from the ledger instead of the backend
        #[arg(long)]
        ledger: bool,
    },
    /// Print a room's live yield until interrupted
    WatchYield {
        room: String,
        /// Stop after this many seconds
        #[arg(long)]
        seconds: Option<u64>,
    },
}

#[derive(Subcommand)]
enum SessionCommand {
    /// Show the stored session
    Status,
    /// Derive and store a session for a subject
    Login { subject: String },
    /// Extend the session
    Refresh {
        #[arg(long)]
        extend_secs: Option<u64>,
    },
    /// Remove the stored session
    Clear,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };
    logging::init(&config.observability);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // The CLI is a separate process per invocation; the session must live on disk.
    config.session.backend = SessionBackend::File;
    let configured = config.session.storage_path.take();
    config.session.storage_path = Some(session_path(cli.session_file.as_deref(), configured));

    match cli.command {
        Commands::Derive { subject, salt } => {
            let salt = salt.unwrap_or_else(|| config.session.derivation_salt.clone());
            let keypair = DerivedKeypair::from_subject(&subject, &salt)?;
            println!("address:    {}", keypair.address());
            println!("public key: {}", keypair.public_key_hex());
        }
        Commands::Session { action } => run_session(&config, action)?,
        Commands::Rooms { room } => run_rooms(&config, room).await?,
        Commands::Balance { address, ledger } => {
            let address = Address::from_str(&address)?;
            let balance = if ledger {
                LedgerClient::new(&config.chain)?
                    .get_balance(&address, &config.chain.usdc_type)
                    .await?
            } else {
                ApiClient::new(&config.api)?.usdc_balance(&address).await?
            };
            println!("{} ({} base units)", format_usdc(balance), balance);
        }
        Commands::WatchYield { room, seconds } => run_watch_yield(&config, &room, seconds).await?,
    }

    Ok(())
}

fn run_session(config: &ClientConfig, action: SessionCommand) -> Result<(), Box<dyn std::error::Error>> {
    let store = SessionStore::from_config(&config.session)?;
    let ttl = Duration::from_secs(config.session.ttl_secs);

    match action {
        SessionCommand::Status => match store.load()? {
            Some(keypair) => {
                let expires_at = store.expires_at()?.unwrap_or(0);
                let remaining = expires_at.saturating_sub(store.now_ms()) / 1000;
                println!("address:    {}", keypair.address());
                println!("subject:    {}", store.subject()?.unwrap_or_default());
                println!("expires in: {}s", remaining);
            }
            None => println!("no active session"),
        },
        SessionCommand::Login { subject } => {
            let keypair = store.login(&subject, ttl)?;
            println!("address: {}", keypair.address());
        }
        SessionCommand::Refresh { extend_secs } => {
            let extension = extend_secs.map(Duration::from_secs).unwrap_or(ttl);
            let expires_at = store.refresh(extension)?;
            println!("expires at: {} (unix ms)", expires_at);
        }
        SessionCommand::Clear => {
            store.clear()?;
            println!("session cleared");
        }
    }
    Ok(())
}

async fn run_rooms(config: &ClientConfig, room: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let api = ApiClient::new(&config.api)?;
    let now = SystemClock.now_ms();

    let rooms = match room {
        Some(id) => vec![api.get_room(&ObjectId::from_str(&id)?).await?],
        None => api.list_rooms().await?,
    };

    for room in rooms {
        let schedule = match period_status(&room, now) {
            PeriodStatus::Unscheduled => "unscheduled".to_string(),
            PeriodStatus::NotStarted { starts_in_ms } => format!("starts in {}s", starts_in_ms / 1000),
            PeriodStatus::Running { index, remaining_ms } => format!(
                "period {}/{} ({}s left)",
                index + 1,
                room.total_periods,
                remaining_ms / 1000
            ),
            PeriodStatus::Finished => "finished".to_string(),
        };
        println!(
            "{}  {:<24} {:>14}/period  {:>5.2}%  {:>3} players  {}{}",
            room.id,
            room.name,
            format_usdc(room.deposit_amount),
            room.expected_return_pct,
            room.participant_count,
            schedule,
            if room.is_private { "  [private]" } else { "" },
        );
    }
    Ok(())
}

async fn run_watch_yield(
    config: &ClientConfig,
    room: &str,
    seconds: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let api = ApiClient::new(&config.api)?;
    let room = api.get_room(&ObjectId::from_str(room)?).await?;

    let yields = match &config.live_yield.persistence_path {
        Some(path) => YieldStore::load_from_file(path)?,
        None => YieldStore::new(None),
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let rate = rate_per_sec(room.total_deposited, room.annual_rate());
    let estimator: SharedEstimator = Arc::new(Mutex::new(yields.estimator(
        room.id,
        room.realized_yield,
        rate,
        clock.now_ms(),
    )));

    let shutdown = Shutdown::new();
    let ctrl_c = shutdown.trigger_on_ctrl_c();
    let mut stopped = shutdown.subscribe();
    let ticker = spawn_ticker(
        estimator.clone(),
        yields,
        clock,
        &config.live_yield,
        Some(shutdown.subscribe()),
    );

    tracing::info!(room_id = %room.id, rate_per_sec = rate, "Watching live yield");
    let deadline = async {
        match seconds {
            Some(s) => tokio::time::sleep(Duration::from_secs(s)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let mut print = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = print.tick() => {
                let displayed = estimator.lock().unwrap_or_else(|p| p.into_inner()).displayed();
                println!("{}  {:.6} USDC", room.name, displayed / 1_000_000.0);
            }
            _ = stopped.recv() => break,
            _ = &mut deadline => break,
        }
    }

    shutdown.trigger();
    ticker.stop().await;
    ctrl_c.abort();
    Ok(())
}
