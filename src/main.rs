use std::time::Duration;

use godark_client::config::Config;
use godark_client::feed::FeedRegistry;
use godark_client::monitor::{ServiceClient, ServiceKind, StatusMonitor};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command-line arguments first to determine mode
    let args: Vec<String> = std::env::args().collect();
    let cli = parse_args(&args);

    // Initialize tracing/logging
    // Market data prints on stdout; logs always go to stderr
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting GoDark client in {} mode...", cli.mode);

    match cli.mode.as_str() {
        "orderbook" => run_orderbook(&cli).await?,
        "trades" => run_trades(&cli).await?,
        "status" => run_status().await?,
        _ => {
            eprintln!("Invalid mode: {}", cli.mode);
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}

struct CliArgs {
    mode: String,
    symbol: String,
    levels: Option<usize>,
    max_trades: Option<usize>,
}

/// Parse command-line arguments
fn parse_args(args: &[String]) -> CliArgs {
    let mut cli = CliArgs {
        mode: "orderbook".to_string(),
        symbol: "BTC-USDT-PERP".to_string(),
        levels: None,
        max_trades: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--mode" => {
                if i + 1 < args.len() {
                    cli.mode = args[i + 1].clone();
                    i += 1;
                }
            }
            "--orderbook" => cli.mode = "orderbook".to_string(),
            "--trades" => cli.mode = "trades".to_string(),
            "--status" => cli.mode = "status".to_string(),
            "--symbol" => {
                if i + 1 < args.len() {
                    cli.symbol = args[i + 1].clone();
                    i += 1;
                }
            }
            "--levels" => {
                if i + 1 < args.len() {
                    cli.levels = args[i + 1].parse().ok();
                    i += 1;
                }
            }
            "--max-trades" => {
                if i + 1 < args.len() {
                    cli.max_trades = args[i + 1].parse().ok();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

/// Print usage information
fn print_usage() {
    println!("GoDark Client - market data and service monitoring for the GoDark exchange");
    println!();
    println!("USAGE:");
    println!("    godark-client [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --mode <MODE>        What to watch: orderbook, trades, or status (default: orderbook)");
    println!("    --orderbook          Watch the L2 orderbook (shortcut for --mode orderbook)");
    println!("    --trades             Watch the trade tape (shortcut for --mode trades)");
    println!("    --status             Watch backend service status (shortcut for --mode status)");
    println!("    --symbol <SYMBOL>    Perp symbol to watch (default: BTC-USDT-PERP)");
    println!("    --levels <N>         Orderbook depth per side (default: 10)");
    println!("    --max-trades <N>     Trade tape length (default: 50)");
    println!("    --help, -h           Print this help message");
    println!();
    println!("ENVIRONMENT VARIABLES:");
    println!("    GODARK_API_URL            Trading REST base URL (default: https://godark.goquant.io/testnet)");
    println!("    GODARK_WS_PRIVATE_URL     Private trading stream URL (default: wss://godark.goquant.io/ws/testnet)");
    println!("    GOMARKET_WS_URL           GoMarket feed host (default: wss://gomarket-api.goquant.io)");
    println!("    GODARK_HANDSHAKE_TOKEN    Handshake token for authenticated endpoints");
    println!("    SETTLEMENT_RELAYER_URL    Settlement relayer base URL (default: http://localhost:8080)");
    println!("    LIQUIDATION_ENGINE_URL    Liquidation engine base URL (default: http://localhost:8081)");
    println!("    POSITION_MANAGEMENT_URL   Position management base URL (default: http://localhost:8081)");
    println!("    MOCK_ENGINE_URL           Mock matching engine base URL (default: http://localhost:3003)");
    println!("    RUST_LOG                  Logging level (default: info)");
    println!();
    println!("EXAMPLES:");
    println!("    # Watch the BTC perp book");
    println!("    godark-client --orderbook");
    println!();
    println!("    # Watch ETH trades with a longer tape");
    println!("    godark-client --trades --symbol ETH-USDT-PERP --max-trades 100");
    println!();
    println!("    # Watch backend service health");
    println!("    godark-client --status");
}

/// Watch one symbol's aggregated L2 book
async fn run_orderbook(cli: &CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::from_env();
    if let Some(levels) = cli.levels {
        config.max_levels = levels;
    }

    let registry = FeedRegistry::new(&config);
    let feed = registry.subscribe_orderbook(&cli.symbol).await;
    tracing::info!(
        "Watching {} orderbook, top {} levels per side",
        cli.symbol,
        config.max_levels
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                let view = feed.view().await;
                match (view.best_bid(), view.best_ask()) {
                    (Some(bid), Some(ask)) => {
                        println!(
                            "{}  bid {} x {}  |  ask {} x {}  ({} bid / {} ask levels)",
                            cli.symbol,
                            bid.price,
                            bid.size,
                            ask.price,
                            ask.size,
                            view.bids.len(),
                            view.asks.len()
                        );
                    }
                    _ => match feed.last_error().await {
                        Some(err) => println!("{}  no book yet ({})", cli.symbol, err),
                        None => println!("{}  waiting for first snapshot...", cli.symbol),
                    },
                }
            }
        }
    }

    tracing::info!("Received shutdown signal (Ctrl+C)");
    registry.shutdown_all().await;
    Ok(())
}

/// Watch one symbol's trade tape
async fn run_trades(cli: &CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::from_env();
    if let Some(max_trades) = cli.max_trades {
        config.max_trades = max_trades;
    }

    let registry = FeedRegistry::new(&config);
    let feed = registry.subscribe_trades(&cli.symbol).await;
    tracing::info!(
        "Watching {} trades, keeping the last {}",
        cli.symbol,
        config.max_trades
    );

    let mut last_printed: Option<(u64, chrono::DateTime<chrono::Utc>)> = None;
    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                if let Some(trade) = feed.latest().await {
                    let key = (trade.trade_id, trade.time);
                    if last_printed != Some(key) {
                        println!(
                            "{}  {} {} @ {}  [{}]",
                            cli.symbol,
                            trade.side,
                            trade.amount,
                            trade.price,
                            trade.time.format("%H:%M:%S%.3f")
                        );
                        last_printed = Some(key);
                    }
                } else if let Some(err) = feed.last_error().await {
                    println!("{}  no trades yet ({})", cli.symbol, err);
                }
            }
        }
    }

    tracing::info!("Received shutdown signal (Ctrl+C)");
    registry.shutdown_all().await;
    Ok(())
}

/// Watch the backend services behind the exchange
async fn run_status() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();

    let monitors = [
        StatusMonitor::start(ServiceClient::new(
            ServiceKind::SettlementRelayer,
            config.settlement_relayer_url.clone(),
        )),
        StatusMonitor::start(ServiceClient::new(
            ServiceKind::LiquidationEngine,
            config.liquidation_engine_url.clone(),
        )),
        StatusMonitor::start(ServiceClient::new(
            ServiceKind::PositionManagement,
            config.position_management_url.clone(),
        )),
        StatusMonitor::start(ServiceClient::new(
            ServiceKind::MockEngine,
            config.mock_engine_url.clone(),
        )),
    ];
    tracing::info!("Polling {} services", monitors.len());

    let mut ticker = tokio::time::interval(Duration::from_secs(2));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                println!("--- service status ---");
                for monitor in &monitors {
                    let status = monitor.status();
                    let state = if status.loading {
                        "checking..."
                    } else if status.running {
                        "up"
                    } else {
                        "down"
                    };
                    let stats = if status.stats.is_some() { " (stats ok)" } else { "" };
                    println!("{:<22} {}{}", monitor.kind().name(), state, stats);
                }
            }
        }
    }

    tracing::info!("Received shutdown signal (Ctrl+C)");
    for monitor in &monitors {
        monitor.stop();
    }
    Ok(())
}
