//! Spread Monitor
//!
//! Watches order book spreads and liquidity for a list of instruments and
//! alerts when a market stays unhealthy.

use clap::{Parser, Subcommand};
use spread_monitor::{
    audit::CsvAuditLog,
    config::Config,
    monitor::{render_table, render_warning_details, MonitorState},
    notify::WebhookNotifier,
    orderbook::{metrics::format_depth, parse_snapshot, BookMetrics, MetricsConfig},
    runner::Monitor,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "spread-monitor")]
#[command(about = "Order book spread and liquidity monitor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monitor
    Run {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// Parse a saved snapshot and print its metrics
    Parse {
        /// Snapshot text file
        file: PathBuf,
        /// Depth bands in percent of mid
        #[arg(long, value_delimiter = ',', default_value = "1,2")]
        band: Vec<f64>,
    },
    /// List configured instruments
    Instruments,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { once } => run_monitor(load_config(&cli.config)?, once).await,
        Commands::Parse { file, band } => parse_file(&file, band),
        Commands::Instruments => show_instruments(&load_config(&cli.config)?),
    }
}

fn load_config(path: &str) -> anyhow::Result<Config> {
    if Path::new(path).exists() {
        Config::load(path)
    } else {
        Config::load_default()
    }
}

async fn run_monitor(config: Config, once: bool) -> anyhow::Result<()> {
    tracing::info!(
        "Starting spread monitor for {} instrument(s)",
        config.instruments.len()
    );

    let source = config.source.build()?;
    tracing::info!("Data source: {}", source.name());

    let sink = Arc::new(CsvAuditLog::from_config(&config.audit));
    tracing::info!("Audit log directory: {}", sink.dir().display());

    let notifier = Arc::new(WebhookNotifier::from_config(&config.notify)?);

    let mut monitor = Monitor::new(&config, source, sink, notifier);

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, stopping after the current sample");
            signal_token.cancel();
        }
    });

    let table = tokio::spawn(print_table(
        monitor.state(),
        config.sampling.table_refresh(),
        cancel.clone(),
    ));

    let max_cycles = once.then_some(1);
    let result = monitor.run(&cancel, max_cycles).await;

    cancel.cancel();
    if let Err(e) = table.await {
        tracing::warn!("Table printer stopped abnormally: {}", e);
    }
    print_snapshot(&monitor.state());

    result?;
    tracing::info!("Spread monitor stopped after {} cycle(s)", monitor.cycle());
    Ok(())
}

async fn print_table(state: MonitorState, every: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = interval.tick() => print_snapshot(&state),
        }
    }
}

fn print_snapshot(state: &MonitorState) {
    println!("{}", render_table(&state.snapshot(), &state.progress()));

    let warnings = state.warning_rows();
    if !warnings.is_empty() {
        println!("{}", render_warning_details(&warnings));
    }
}

fn parse_file(file: &Path, bands: Vec<f64>) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)?;
    let book = parse_snapshot(&raw);

    let metrics_config = MetricsConfig {
        depth_bands: bands,
        ..MetricsConfig::default()
    };
    let metrics = BookMetrics::compute(&book, &metrics_config);

    println!("\n📖 Snapshot: {}\n", file.display());
    println!("Asks: {}  Bids: {}", book.asks.len(), book.bids.len());
    println!(
        "Best ask: {}  Best bid: {}",
        book.best_ask().map(|p| p.to_string()).unwrap_or_else(|| "--".to_string()),
        book.best_bid().map(|p| p.to_string()).unwrap_or_else(|| "--".to_string())
    );
    println!(
        "Spread: {} ({})",
        book.spread_price.map(|p| p.to_string()).unwrap_or_else(|| "--".to_string()),
        book.spread_percent
            .map(|p| format!("{}%", p))
            .unwrap_or_else(|| "--".to_string())
    );
    println!(
        "Mid: {}",
        metrics.mid_price.map(|m| format!("{:.6}", m)).unwrap_or_else(|| "--".to_string())
    );
    for band in &metrics.depths {
        println!("Depth ±{}%: {}", band.band_percent, format_depth(band.depth));
    }
    println!(
        "DWS: {}",
        metrics.dws.map(|d| format!("{:.4}%", d)).unwrap_or_else(|| "--".to_string())
    );
    if let Some(volume) = metrics.volume {
        println!(
            "Within {}%: bids {} ({} orders), asks {} ({} orders), imbalance {:.2}",
            metrics_config.volume_band,
            format_depth(Some(volume.bid_volume)),
            volume.bid_orders,
            format_depth(Some(volume.ask_volume)),
            volume.ask_orders,
            volume.imbalance()
        );
    }

    if !book.is_usable() {
        tracing::warn!("Snapshot has no spread percentage and would count as a failed sample");
    }
    Ok(())
}

fn show_instruments(config: &Config) -> anyhow::Result<()> {
    println!("\n📋 Configured instruments\n");
    println!("{:<16} {:>10}", "Symbol", "Target %");
    println!("{}", "-".repeat(27));
    for instrument in &config.instruments {
        println!(
            "{:<16} {:>10.4}",
            instrument.symbol, instrument.target_spread_percent
        );
    }
    Ok(())
}
