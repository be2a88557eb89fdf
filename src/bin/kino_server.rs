use std::{error::Error, net::SocketAddr, path::PathBuf, time::Duration};

use clap::Parser;
use kino::{
    QueryServer, SqliteExecutor,
    config::{
        DEFAULT_ADDRESS, DEFAULT_DATABASE, DEFAULT_POOL_SIZE, DEFAULT_WORKERS, DatabaseConfig,
        ServerConfig,
    },
    protocol::TransportOptions,
};
use log::info;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Listen for new connections at address
    #[arg(long, env = "KINO_ADDRESS", default_value = DEFAULT_ADDRESS)]
    address: SocketAddr,
    /// Path to the SQLite database file
    #[arg(long, env = "KINO_DATABASE", default_value = DEFAULT_DATABASE)]
    database: PathBuf,
    /// Number of pooled database connections
    #[arg(long, env = "KINO_POOL_SIZE", default_value_t = DEFAULT_POOL_SIZE)]
    pool_size: usize,
    /// Number of connections served at the same time
    #[arg(long, env = "KINO_WORKERS", default_value_t = DEFAULT_WORKERS)]
    workers: usize,
    /// Give up on a peer that stalls a read phase for this many milliseconds
    #[arg(long, env = "KINO_PHASE_TIMEOUT_MS")]
    phase_timeout_ms: Option<u64>,
    /// Pause after every read, for exercising partial frames
    #[arg(long, env = "KINO_LATENCY_MS")]
    latency_ms: Option<u64>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();

    let config = ServerConfig {
        address: cli.address,
        workers: cli.workers,
        transport: TransportOptions {
            phase_timeout: cli.phase_timeout_ms.map(Duration::from_millis),
            latency: cli.latency_ms.map(Duration::from_millis),
            shutdown: None,
        },
        database: DatabaseConfig {
            path: cli.database,
            pool_size: cli.pool_size,
        },
    };

    let executor = SqliteExecutor::from_config(&config.database)?;
    let server = QueryServer::bind(&config, executor)?;

    let signal = server.shutdown_signal();
    ctrlc::set_handler(move || {
        info!("received interrupt");
        signal.trigger();
    })?;

    server.listen()?;
    Ok(())
}
