pub mod cli;
pub mod config;
pub mod dispatch;
pub mod executor;
pub mod protocol;

pub use cli::{Command, prompt};
pub use config::{DatabaseConfig, ServerConfig};
pub use dispatch::Dispatcher;
pub use executor::{QueryExecutor, SqliteExecutor};
pub use protocol::{Content, ContentType, QueryClient, QueryServer};
