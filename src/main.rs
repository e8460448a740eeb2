//! DipTrader - Main Entry Point
//!
//! Runs one strategy or one direct order against Upbit and prints the
//! outcome as JSON on stdout. Logs go to stderr.

use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use std::ffi::OsString;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use dip_trader::config::load_config;
use dip_trader::{
    cancellation, AppConfig, DirectTrader, PositionIntent, StrategyRunner, StrategyVariant,
    Symbol, UpbitClient,
};

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "DIP_TRADER_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

/// Flags shared by every strategy run
#[derive(ClapArgs, Debug)]
struct RunOptions {
    /// Market symbol, e.g. BTC/KRW
    #[arg(short, long)]
    symbol: Symbol,

    /// Delay between price samples in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Cancel the run after this many seconds
    #[arg(long)]
    max_runtime_secs: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Buy a dip from the first sampled price, exit at fixed profit or loss
    Dip {
        #[command(flatten)]
        run: RunOptions,
        /// Quote amount to spend
        #[arg(long)]
        notional: Decimal,
        #[arg(long)]
        dip: Option<Decimal>,
        #[arg(long)]
        profit: Option<Decimal>,
        #[arg(long)]
        loss: Option<Decimal>,
    },
    /// Dip entry with fixed profit/loss plus a trailing stop above entry
    DipTrailing {
        #[command(flatten)]
        run: RunOptions,
        /// Quote amount to spend
        #[arg(long)]
        notional: Decimal,
        #[arg(long)]
        dip: Option<Decimal>,
        #[arg(long)]
        profit: Option<Decimal>,
        #[arg(long)]
        loss: Option<Decimal>,
        #[arg(long)]
        trailing: Option<Decimal>,
    },
    /// Trailing stop on a held position
    TrailingStop {
        #[command(flatten)]
        run: RunOptions,
        /// Base quantity to sell; defaults to the free balance
        #[arg(long)]
        quantity: Option<Decimal>,
        #[arg(long)]
        trailing: Option<Decimal>,
        /// Seed the running high instead of using the first sample
        #[arg(long)]
        reference_price: Option<Decimal>,
    },
    /// Buy once price rebounds off its running low
    TrailingBuy {
        #[command(flatten)]
        run: RunOptions,
        /// Quote amount to spend
        #[arg(long)]
        notional: Decimal,
        #[arg(long)]
        trailing: Option<Decimal>,
        /// Seed the running low instead of using the first sample
        #[arg(long)]
        reference_price: Option<Decimal>,
    },
    /// Market buy of a quote amount, or limit buy of a base quantity with --price
    Buy {
        #[arg(short, long)]
        symbol: Symbol,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        price: Option<Decimal>,
    },
    /// Sell a base quantity at market, or at --price
    Sell {
        #[arg(short, long)]
        symbol: Symbol,
        #[arg(long)]
        quantity: Decimal,
        #[arg(long)]
        price: Option<Decimal>,
    },
    /// Sell a fraction (0 to 1) of the free base balance
    SellRatio {
        #[arg(short, long)]
        symbol: Symbol,
        #[arg(long)]
        ratio: Decimal,
        #[arg(long)]
        price: Option<Decimal>,
    },
    /// Spend a fraction (0 to 1) of the free quote balance
    BuyRatio {
        #[arg(short, long)]
        symbol: Symbol,
        #[arg(long)]
        ratio: Decimal,
        #[arg(long)]
        price: Option<Decimal>,
    },
    /// List non-zero balances
    Balances,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env before parsing so it can supply DIP_TRADER_CONFIG
    let args = parse_args(None, std::env::args_os()).unwrap_or_else(|e| e.exit());
    let config = load_config(args.config.as_deref())?;

    // Initialize logging
    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.settings.log_level);
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting DipTrader");
    if let Some(path) = &args.config {
        info!("Configuration file: {}", path);
    }

    let client = Arc::new(UpbitClient::new(&config.upbit)?);
    let trader = DirectTrader::new(client.clone(), client.clone());

    match args.command {
        Command::Dip {
            run,
            notional,
            dip,
            profit,
            loss,
        } => {
            let intent = intent_for(&config, &run)
                .with_notional(notional)
                .override_dip(dip)
                .override_profit(profit)
                .override_loss(loss);
            run_strategy(client, StrategyVariant::DipFixedExit, intent, &run).await
        }
        Command::DipTrailing {
            run,
            notional,
            dip,
            profit,
            loss,
            trailing,
        } => {
            let intent = intent_for(&config, &run)
                .with_notional(notional)
                .override_dip(dip)
                .override_profit(profit)
                .override_loss(loss)
                .override_trailing(trailing);
            run_strategy(client, StrategyVariant::DipTrailingExit, intent, &run).await
        }
        Command::TrailingStop {
            run,
            quantity,
            trailing,
            reference_price,
        } => {
            let mut intent = intent_for(&config, &run).override_trailing(trailing);
            intent.quantity = quantity;
            intent.reference_price = reference_price;
            run_strategy(client, StrategyVariant::TrailingStopExit, intent, &run).await
        }
        Command::TrailingBuy {
            run,
            notional,
            trailing,
            reference_price,
        } => {
            let mut intent = intent_for(&config, &run)
                .with_notional(notional)
                .override_trailing(trailing);
            intent.reference_price = reference_price;
            run_strategy(client, StrategyVariant::TrailingBuyEntry, intent, &run).await
        }
        Command::Buy {
            symbol,
            amount,
            price,
        } => print_json(&trader.buy(&symbol, amount, price).await?),
        Command::Sell {
            symbol,
            quantity,
            price,
        } => print_json(&trader.sell(&symbol, quantity, price).await?),
        Command::SellRatio {
            symbol,
            ratio,
            price,
        } => print_json(&trader.sell_ratio(&symbol, ratio, price).await?),
        Command::BuyRatio {
            symbol,
            ratio,
            price,
        } => print_json(&trader.buy_ratio(&symbol, ratio, price).await?),
        Command::Balances => print_json(&trader.balances().await?),
    }
}

/// Read environment variables from `env_file` (or `.env` when `None`), then parse `argv`
///
/// Variables already set in the process environment win over the file.
fn parse_args<I, T>(env_file: Option<&Path>, argv: I) -> std::result::Result<Args, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let loaded = match env_file {
        Some(path) => dotenvy::from_path(path),
        None => dotenvy::dotenv().map(|_| ()),
    };
    // a missing .env is normal
    loaded.ok();
    Args::try_parse_from(argv)
}

fn intent_for(config: &AppConfig, run: &RunOptions) -> PositionIntent {
    let intent = config.base_intent(run.symbol.clone());
    match run.poll_interval_ms {
        Some(ms) => intent.with_poll_interval(Duration::from_millis(ms)),
        None => intent,
    }
}

/// Optional flag overrides on top of the configured defaults
trait IntentOverrides: Sized {
    fn override_dip(self, value: Option<Decimal>) -> Self;
    fn override_profit(self, value: Option<Decimal>) -> Self;
    fn override_loss(self, value: Option<Decimal>) -> Self;
    fn override_trailing(self, value: Option<Decimal>) -> Self;
}

impl IntentOverrides for PositionIntent {
    fn override_dip(self, value: Option<Decimal>) -> Self {
        match value {
            Some(v) => self.with_dip_percent(v),
            None => self,
        }
    }

    fn override_profit(self, value: Option<Decimal>) -> Self {
        match value {
            Some(v) => self.with_profit_percent(v),
            None => self,
        }
    }

    fn override_loss(self, value: Option<Decimal>) -> Self {
        match value {
            Some(v) => self.with_loss_percent(v),
            None => self,
        }
    }

    fn override_trailing(self, value: Option<Decimal>) -> Self {
        match value {
            Some(v) => self.with_trailing_percent(v),
            None => self,
        }
    }
}

async fn run_strategy(
    client: Arc<UpbitClient>,
    variant: StrategyVariant,
    intent: PositionIntent,
    run: &RunOptions,
) -> Result<ExitCode> {
    let runner = StrategyRunner::from_client(client);
    let (handle, token) = cancellation();

    if let Some(secs) = run.max_runtime_secs {
        handle.cancel_after(Duration::from_secs(secs));
    }

    let ctrl_c = {
        let handle = handle.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received shutdown signal, cancelling run");
                handle.cancel();
            }
        })
    };

    info!(%variant, symbol = %intent.symbol, "starting run");
    let result = runner.run(variant, &intent, token).await;
    ctrl_c.abort();
    let result = result?;

    print_json(&result)?;
    match result.failure() {
        None => Ok(ExitCode::SUCCESS),
        Some(failure) => {
            error!(%failure, "run failed");
            if let Some(order) = failure.live_order() {
                warn!(order_id = %order.id, "entry order is still open on the exchange");
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(ExitCode::SUCCESS)
}
