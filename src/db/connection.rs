use rusqlite::Connection;
use std::cell::RefCell;
use std::collections::HashMap;
use tracing::info;

use crate::errors::AppError;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

// Thread-local connections, one per database path.
thread_local! {
    static DB_CONNS: RefCell<HashMap<String, Connection>> = RefCell::new(HashMap::new());
}

#[derive(Clone, Debug)]
pub struct Database {
    path: String,
}

impl Database {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Provides a mutable connection to the closure.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Connection) -> Result<T, AppError>,
    {
        DB_CONNS
            .try_with(|cell| {
                let mut conns = cell.borrow_mut();
                if !conns.contains_key(&self.path) {
                    let conn = Connection::open(&self.path)
                        .map_err(|e| AppError::DbError(format!("Open DB failed: {e}")))?;
                    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
                    conns.insert(self.path.clone(), conn);
                }
                match conns.get_mut(&self.path) {
                    Some(conn) => f(conn),
                    None => Err(AppError::DbError("connection slot missing".to_string())),
                }
            })
            .map_err(|e| AppError::DbError(format!("connection storage unavailable: {e}")))?
    }
}

/// Apply the bundled schema. Safe to run on every start.
pub fn init_db(db: &Database) -> Result<(), AppError> {
    db.with_conn(|conn| {
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| AppError::DbError(format!("Failed to apply schema: {e}")))?;
        Ok(())
    })?;

    info!(path = %db.path(), "database initialized");
    Ok(())
}
