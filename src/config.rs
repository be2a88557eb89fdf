//! Runtime configuration for the server and its query executor.
//!
//! Binaries fill these structures from command line arguments and
//! environment variables; the library only consumes them.
use std::{
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    path::PathBuf,
};

use crate::protocol::TransportOptions;

pub const DEFAULT_PORT: u16 = 12345;
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:12345";
pub const DEFAULT_WORKERS: usize = 15;
pub const DEFAULT_DATABASE: &str = "kino.db";
pub const DEFAULT_POOL_SIZE: usize = 4;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    /// Number of pooled connections shared by all connection tasks.
    pub pool_size: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DATABASE),
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: SocketAddr,
    /// Connection tasks that may run at the same time.
    pub workers: usize,
    pub transport: TransportOptions,
    pub database: DatabaseConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            workers: DEFAULT_WORKERS,
            transport: TransportOptions::default(),
            database: DatabaseConfig::default(),
        }
    }
}
