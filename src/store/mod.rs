//! Persistent donation log
//!
//! This module stores weighed donations in a single SQLite file with three
//! tables (`sources`, `types`, `logs`) and a `view_logs` display view.
//!
//! # Connection discipline
//!
//! [`LogStore`] never keeps a connection around. Every public operation
//! opens its own connection, does its work inside one transaction and
//! drops the connection before returning. Writers from different threads
//! are serialized by SQLite's locking, so a clone of the store can be
//! handed to every thread that needs one.
//!
//! # Undo / redo
//!
//! Rows are never physically deleted. The `deleted` flag works as a
//! single-slot undo/redo stack keyed by id:
//!
//! - [`LogStore::undo_last`] marks the active row with the highest id deleted
//! - [`LogStore::redo_last`] restores the deleted row with the highest id
//!
//! Only the boundary row on each side is reachable; this is not a general
//! history stack.
//!
//! # Components
//!
//! - [`log`] - append, undo/redo, entry listings and reference data
//! - [`aggregate`] - per-day, per-type and per-source totals
//! - [`schema`] - one-time schema creation and additive migrations

pub mod aggregate;
pub mod log;
pub mod schema;

pub use aggregate::{DayTotal, Total};
pub use schema::{SchemaBootstrap, SchemaScript, BUNDLED_SCHEMA};

use crate::config::DatabaseConfig;
use crate::error::{Result, ResultExt};
use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Handle to the donation database
///
/// Cheap to clone; clones share the schema bootstrap state.
#[derive(Debug, Clone)]
pub struct LogStore {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    path: PathBuf,
    busy_timeout: Duration,
    bootstrap: SchemaBootstrap,
}

impl LogStore {
    /// Open the store described by `config`
    ///
    /// The database path is resolved through
    /// [`DatabaseConfig::resolved_path`], so `WEIGHIT_DB_PATH` wins.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        let path = config.resolved_path()?;
        Self::build(
            path,
            config.busy_timeout(),
            SchemaScript::from_option(config.schema_path.as_deref()),
        )
    }

    /// Open a store on an explicit file with default settings
    pub fn open_at(path: impl Into<PathBuf>) -> Result<Self> {
        let defaults = DatabaseConfig::default();
        Self::build(path.into(), defaults.busy_timeout(), SchemaScript::Bundled)
    }

    /// Point a fresh store at `path` and force the schema script to run
    ///
    /// Test harnesses use this to start every test on a new file.
    pub fn init_for_test(path: impl Into<PathBuf>, script: SchemaScript) -> Result<Self> {
        let defaults = DatabaseConfig::default();
        let store = Self::build(path.into(), defaults.busy_timeout(), script)?;
        store.inner.bootstrap.reset();
        let mut conn = store.raw_connection()?;
        store.inner.bootstrap.force(&mut conn)?;
        Ok(store)
    }

    fn build(path: PathBuf, busy_timeout: Duration, script: SchemaScript) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        tracing::debug!("Using database {}", path.display());

        Ok(Self {
            inner: Arc::new(StoreInner {
                path,
                busy_timeout,
                bootstrap: SchemaBootstrap::new(script),
            }),
        })
    }

    /// Database file this store operates on
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Forget that the schema was created; the next connection re-checks it
    pub fn reset_schema_flag(&self) {
        self.inner.bootstrap.reset();
    }

    /// Whether the schema bootstrap has run for this store
    pub fn schema_initialized(&self) -> bool {
        self.inner.bootstrap.is_initialized()
    }

    /// Open a short-lived connection, bootstrapping the schema on first use
    ///
    /// The caller owns the connection and must not keep it past the
    /// operation it was opened for.
    pub fn connection(&self) -> Result<Connection> {
        let mut conn = self.raw_connection()?;
        self.inner.bootstrap.ensure(&mut conn)?;
        Ok(conn)
    }

    fn raw_connection(&self) -> Result<Connection> {
        let conn = Connection::open(&self.inner.path)
            .with_context(|| format!("Failed to open database {}", self.inner.path.display()))?;
        conn.busy_timeout(self.inner.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(conn)
    }
}

/// Current UTC date, the day boundary used by daily totals
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}
