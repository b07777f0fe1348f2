//! SQLite store utilities.
//!
//! Runtime defaults are intentionally conservative:
//! - `journal_mode = WAL` to allow concurrent readers while a writer commits
//! - `busy_timeout = 5s` to reduce transient lock failures under contention
//! - `foreign_keys = ON` to protect relational integrity
//! - `synchronous = NORMAL` as the usual WAL pairing

pub mod migrations;
pub mod repository;

use crate::config::DatabaseConfig;
use anyhow::{Context, Result};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::time::Duration;

pub type Pool = r2d2::Pool<SqliteConnectionManager>;
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Busy timeout applied to every pooled connection.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
struct PragmaCustomizer;

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        configure_connection(conn)
    }
}

/// Open (or create) the issue-board database and build the bounded pool.
///
/// The parent directory is created if absent. `max_idle_conns` maps onto the
/// pool's idle floor and is clamped to the pool size.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the initial pool
/// connections fail to open and configure.
pub fn open(cfg: &DatabaseConfig) -> Result<Pool> {
    if let Some(parent) = cfg.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create database directory {}", parent.display()))?;
        }
    }

    let max_open = cfg.max_open_conns.max(1);
    let manager = SqliteConnectionManager::file(&cfg.path);
    let pool = r2d2::Pool::builder()
        .max_size(max_open)
        .min_idle(Some(cfg.max_idle_conns.min(max_open)))
        .max_lifetime(Some(cfg.conn_max_lifetime))
        .connection_customizer(Box::new(PragmaCustomizer))
        .build(manager)
        .with_context(|| format!("open database {}", cfg.path.display()))?;

    Ok(pool)
}

fn configure_connection(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}
