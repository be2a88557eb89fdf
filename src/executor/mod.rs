//! Query execution backends.
//!
//! The dispatcher never talks to a database directly, it hands fully built
//! query strings to a [`QueryExecutor`] and receives rows back. Executors are
//! shared by every connection task and must therefore be `Send + Sync`.
//!
//! # See Also
//! - [`SqliteExecutor`]: pooled executor backed by an SQLite database file.
use std::sync::{Arc, PoisonError};

use thiserror::Error;

pub use crate::protocol::Row;

pub mod sqlite;

pub use sqlite::SqliteExecutor;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("connection pool lock poisoned")]
    PoolPoisoned,

    #[error("connection pool must hold at least one connection")]
    EmptyPool,
}

impl<T> From<PoisonError<T>> for ExecutorError {
    fn from(_: PoisonError<T>) -> Self {
        ExecutorError::PoolPoisoned
    }
}

pub trait QueryExecutor: Send + Sync {
    /// Run `query` and return the resulting rows in order.
    fn execute(&self, query: &str) -> Result<Vec<Row>, ExecutorError>;
}

impl<E: QueryExecutor + ?Sized> QueryExecutor for Arc<E> {
    fn execute(&self, query: &str) -> Result<Vec<Row>, ExecutorError> {
        (**self).execute(query)
    }
}
