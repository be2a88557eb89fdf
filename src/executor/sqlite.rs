use std::{
    path::Path,
    sync::{Condvar, Mutex},
};

use log::{debug, info, trace};
use rusqlite::{Connection, types::ValueRef};
use serde_json::{Number, Value};

use super::{ExecutorError, QueryExecutor, Row};
use crate::config::DatabaseConfig;

/// Executes queries against an SQLite database through a fixed pool of
/// connections. Each query holds exactly one connection while it runs.
pub struct SqliteExecutor {
    idle: Mutex<Vec<Connection>>,
    available: Condvar,
}

impl SqliteExecutor {
    pub fn open(path: impl AsRef<Path>, pool_size: usize) -> Result<Self, ExecutorError> {
        if pool_size == 0 {
            return Err(ExecutorError::EmptyPool);
        }

        let path = path.as_ref();
        let connections = (0..pool_size)
            .map(|_| Connection::open(path))
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            "opened {} connection(s) to {}",
            connections.len(),
            path.display()
        );

        Ok(Self {
            idle: Mutex::new(connections),
            available: Condvar::new(),
        })
    }

    pub fn from_config(config: &DatabaseConfig) -> Result<Self, ExecutorError> {
        Self::open(&config.path, config.pool_size)
    }

    fn acquire(&self) -> Result<Connection, ExecutorError> {
        let mut idle = self.idle.lock()?;
        loop {
            if let Some(conn) = idle.pop() {
                return Ok(conn);
            }
            trace!("waiting for an idle connection");
            idle = self.available.wait(idle)?;
        }
    }

    fn release(&self, conn: Connection) {
        match self.idle.lock() {
            Ok(mut idle) => {
                idle.push(conn);
                self.available.notify_one();
            }
            Err(_) => debug!("dropping connection, pool lock poisoned"),
        }
    }
}

impl QueryExecutor for SqliteExecutor {
    fn execute(&self, query: &str) -> Result<Vec<Row>, ExecutorError> {
        let conn = self.acquire()?;
        let result = run_query(&conn, query);
        self.release(conn);

        let rows = result?;
        debug!("query returned {} row(s)", rows.len());
        Ok(rows)
    }
}

fn run_query(conn: &Connection, query: &str) -> Result<Vec<Row>, ExecutorError> {
    // Only a single statement can be prepared.
    let query = query.trim().trim_end_matches(';');

    let mut statement = conn.prepare(query)?;
    let columns: Vec<String> = statement
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();

    let mut rows = statement.query([])?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Row::new();
        for (i, column) in columns.iter().enumerate() {
            record.insert(column.clone(), to_json(row.get_ref(i)?));
        }
        records.push(record);
    }
    Ok(records)
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(text) => Value::String(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
    }
}
