//! txmond daemon entry point.
//!
//! Initializes logging, connects the store databases, registers the
//! monitor with the event loop and runs it until the process dies.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use netmon_orch_common::redis_backend::{RedisConfig, RedisDatabase, RedisDb};
use netmon_orch_common::{OrchDaemon, OrchDaemonConfig};
use netmon_txmond::tables::{
    CFG_TX_MON_TABLE_NAME, COUNTERS_PORT_NAME_MAP, COUNTERS_TABLE, STATE_TX_MONITOR_TABLE_NAME,
};
use netmon_txmond::TxMonOrch;

/// Per-port traffic anomaly monitor daemon
#[derive(Parser, Debug)]
#[command(name = "txmond")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Redis server host
    #[arg(long, default_value = "127.0.0.1")]
    redis_host: String,

    /// Redis server port
    #[arg(long, default_value = "6379")]
    redis_port: u16,

    /// Redis database index for CONFIG_DB
    #[arg(long, default_value = "4")]
    config_db: u32,

    /// Redis database index for COUNTERS_DB
    #[arg(long, default_value = "2")]
    counters_db: u32,

    /// Redis database index for STATE_DB
    #[arg(long, default_value = "6")]
    state_db: u32,

    /// Select timeout in milliseconds
    #[arg(long, default_value = "1000")]
    select_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

/// Initializes tracing/logging.
fn init_logging(level: &str) {
    let level: Level = level.parse().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config_db = RedisDatabase::new(
        RedisConfig::new(args.redis_host.as_str(), args.redis_port, RedisDb::ConfigDb)
            .with_index(args.config_db),
    )
    .await
    .context("connecting to CONFIG_DB")?;

    let counters_db = RedisDatabase::new(
        RedisConfig::new(args.redis_host.as_str(), args.redis_port, RedisDb::CountersDb)
            .with_index(args.counters_db),
    )
    .await
    .context("connecting to COUNTERS_DB")?;

    let state_db = RedisDatabase::new(
        RedisConfig::new(args.redis_host.as_str(), args.redis_port, RedisDb::StateDb)
            .with_index(args.state_db),
    )
    .await
    .context("connecting to STATE_DB")?;

    let consumer = config_db.subscribe(CFG_TX_MON_TABLE_NAME);
    let orch = TxMonOrch::new(
        consumer,
        Box::new(counters_db.table(COUNTERS_TABLE)),
        Box::new(counters_db.table(COUNTERS_PORT_NAME_MAP)),
        Box::new(state_db.table(STATE_TX_MONITOR_TABLE_NAME)),
    );

    let mut daemon = OrchDaemon::new(OrchDaemonConfig {
        select_timeout_ms: args.select_timeout,
    });
    daemon.register(Box::new(orch));

    daemon.run().await;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("--- Starting txmond ---");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Runtime error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
