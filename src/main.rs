//! Kraken signal engines entry point.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kraken_signals::arbitrage::TriangleExecutor;
use kraken_signals::bot::{PressureBot, TriangleBot};
use kraken_signals::config::Config;
use kraken_signals::error::ConfigError;
use kraken_signals::market::{FeedStreams, KrakenFeed, MarketDataProvider, Pair};
use kraken_signals::metrics;
use kraken_signals::trading::PaperPortfolio;
use kraken_signals::utils::{cancellation, shutdown_signal};

/// Order-book pressure and triangular arbitrage signals on Kraken.
#[derive(Parser, Debug)]
#[command(name = "kraken-signals")]
#[command(about = "Order-book pressure and triangular arbitrage signal engines for Kraken")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the triangular arbitrage engine.
    Triangle {
        /// Execute signals against the paper portfolio.
        #[arg(long)]
        execute: bool,
    },

    /// Run the order-book pressure engine.
    Pressure {
        /// Instrument to trade, `INSTRUMENT/BASE`; repeatable.
        #[arg(short, long = "symbol")]
        symbols: Vec<String>,
    },

    /// Run both engines over one feed (default).
    Run {
        /// Execute arbitrage signals against the paper portfolio.
        #[arg(long)]
        execute: bool,
    },

    /// Check configuration validity.
    CheckConfig,
}

/// Which engines to start.
#[derive(Debug, Default)]
struct Engines {
    triangle: bool,
    execute: bool,
    pressure: Option<Vec<Pair>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("kraken_signals=debug,info")
    } else {
        let level = config.as_ref().map(|c| c.rust_log.as_str()).unwrap_or("info");
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    if args.json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config(config),
        Some(Command::Triangle { execute }) => {
            let engines = Engines {
                triangle: true,
                execute,
                pressure: None,
            };
            Ok(cmd_run(config?, engines).await?)
        }
        Some(Command::Pressure { symbols }) => {
            let config = config?;
            let engines = Engines {
                pressure: Some(pressure_pairs(&config, &symbols)?),
                ..Engines::default()
            };
            Ok(cmd_run(config, engines).await?)
        }
        Some(Command::Run { execute }) => {
            let config = config?;
            let engines = Engines {
                triangle: true,
                execute,
                pressure: Some(config.pressure_pairs()?),
            };
            Ok(cmd_run(config, engines).await?)
        }
        None => {
            let config = config?;
            let engines = Engines {
                triangle: true,
                execute: config.execute,
                pressure: Some(config.pressure_pairs()?),
            };
            Ok(cmd_run(config, engines).await?)
        }
    }
}

/// Check configuration validity.
fn cmd_check_config(config: Result<Config, ConfigError>) -> anyhow::Result<()> {
    println!("======================================================================");
    println!("KRAKEN SIGNALS - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match config {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    let checked = config
        .context()
        .and_then(|ctx| Ok((ctx, config.pressure_pairs()?)));
    let (ctx, pairs) = match checked {
        Ok(checked) => {
            println!("OK");
            checked
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    };

    let pressure: Vec<String> = pairs.iter().map(Pair::symbol).collect();
    let tickers: Vec<String> = ctx.basket.subscription_pairs().iter().map(Pair::symbol).collect();

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  WebSocket: {}", config.kraken_ws_url);
    println!("  Basket: {} (base {})", ctx.basket.symbols().join(","), ctx.base_currency);
    println!("  Ticker pairs: {}", tickers.join(", "));
    println!("  Tradeable Threshold: {}%", ctx.tradeable_threshold);
    println!("  Pressure Instruments: {}", pressure.join(", "));
    println!("  Entry Threshold: {}", ctx.entry_threshold);
    println!("  Trade Size: {}", ctx.trade_size);
    println!("  Fee: {}", ctx.fee);
    println!("  Target Fraction: {}", ctx.target_fraction);
    println!("  Book Depth: {}", ctx.book_depth);
    println!("  Execute: {} (capital {})", config.execute, config.sim_capital);
    println!("  Cooldown: {}s", config.cooldown_seconds);
    match config.metrics_port {
        Some(port) => println!("  Metrics: 0.0.0.0:{}", port),
        None => println!("  Metrics: disabled"),
    }
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Instruments named on the command line, or the configured ones.
fn pressure_pairs(config: &Config, symbols: &[String]) -> kraken_signals::Result<Vec<Pair>> {
    if symbols.is_empty() {
        return Ok(config.pressure_pairs()?);
    }
    let pairs = symbols
        .iter()
        .map(|s| s.to_uppercase().parse::<Pair>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(pairs)
}

/// Run the selected engines over one Kraken feed until shutdown.
async fn cmd_run(config: Config, engines: Engines) -> kraken_signals::Result<()> {
    config.validate()?;
    let ctx = config.context()?;

    if let Some(port) = config.metrics_port {
        metrics::install_exporter(port)?;
    }

    info!("========================================");
    info!("KRAKEN SIGNALS STARTED");
    info!("========================================");
    info!("Basket: {}", ctx.basket.symbols().join(","));
    info!("Triangle: {}", if engines.triangle { "enabled" } else { "disabled" });
    info!("Execution: {}", if engines.execute { "PAPER" } else { "SIGNALS ONLY" });
    if let Some(pairs) = &engines.pressure {
        let symbols: Vec<String> = pairs.iter().map(Pair::symbol).collect();
        info!("Pressure: {}", symbols.join(","));
    }
    info!("========================================");

    let (feed, streams) = KrakenFeed::spawn(config.kraken_ws_url.clone(), config.reconnect());
    let provider: Arc<dyn MarketDataProvider> = Arc::new(feed);
    let FeedStreams { ticks, books } = streams;

    let (shutdown_tx, shutdown_rx) = cancellation();
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let portfolio = (engines.triangle && engines.execute).then(|| {
        Arc::new(PaperPortfolio::new(
            ctx.base_currency.clone(),
            config.sim_capital,
            ctx.fee,
        ))
    });

    let triangle = engines.triangle.then(|| {
        let mut bot = TriangleBot::new(&ctx, provider.clone());
        if let Some(portfolio) = &portfolio {
            bot = bot.with_executor(TriangleExecutor::new(&ctx, portfolio.clone()));
        }
        tokio::spawn(bot.run(ticks, shutdown_rx.clone()))
    });

    let pressure = engines.pressure.map(|pairs| {
        let bot = PressureBot::new(&ctx, provider.clone(), pairs);
        tokio::spawn(bot.run(books, shutdown_rx.clone()))
    });

    if let Some(handle) = triangle {
        let stats = handle.await?;
        info!("========================================");
        info!("TRIANGLE SUMMARY");
        info!("Ticks received: {}", stats.ticks_received);
        info!("Ticks dropped: {}", stats.events_dropped);
        info!("Signals: {}", stats.signals);
        info!("Cycles executed: {}", stats.cycles_executed);
        info!("Execution failures: {}", stats.execution_failures);
        if stats.subscription_failures > 0 {
            warn!("Subscription failures: {}", stats.subscription_failures);
        }
    }

    if let Some(portfolio) = &portfolio {
        for symbol in ctx.basket.symbols() {
            info!("Paper balance {}: {}", symbol, portfolio.balance(symbol));
        }
    }

    if let Some(handle) = pressure {
        let report = handle.await?;
        info!("========================================");
        info!("PRESSURE SUMMARY");
        info!("Book messages: {}", report.books_received);
        info!("Dropped: {}", report.events_dropped);
        info!("Position events: {}", report.position_events);
        for (symbol, pnl) in &report.pnl {
            info!("PnL {}: {}", symbol, pnl);
        }
        info!("Total PnL: {}", report.total_pnl());
        if report.subscription_failures > 0 {
            warn!("Subscription failures: {}", report.subscription_failures);
        }
    }

    info!("========================================");
    info!("KRAKEN SIGNALS STOPPED");
    Ok(())
}
