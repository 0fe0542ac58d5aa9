//! One-time schema creation and additive migrations
//!
//! [`SchemaBootstrap`] runs the schema script the first time any connection
//! is requested. A mutex plus a double-checked flag keeps concurrent first
//! callers from racing; once the flag is set the check is a single atomic
//! load. Tests that need a clean slate call [`SchemaBootstrap::reset`].
//!
//! The script only runs when the `logs` table is missing. Databases created
//! by older builds get the columns and view they lack added in place; no
//! column is ever dropped or renamed.

use crate::error::{Result, ResultExt, WeighError};
use rusqlite::{Connection, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// The bundled schema script
pub const BUNDLED_SCHEMA: &str = include_str!("schema.sql");

/// Table whose presence marks an initialized database
const CORE_TABLE: &str = "logs";

/// Columns added after the first schema, with their definitions
const ADDITIVE_COLUMNS: &[(&str, &str, &str)] = &[
    ("logs", "temp_pickup_f", "REAL"),
    ("logs", "temp_dropoff_f", "REAL"),
    ("types", "requires_temp", "INTEGER NOT NULL DEFAULT 0"),
];

const VIEW_LOGS: &str = "CREATE VIEW IF NOT EXISTS view_logs AS
SELECT l.id, l.timestamp, l.weight_lb, s.name AS source, t.name AS type,
       l.deleted, l.temp_pickup_f, l.temp_dropoff_f
FROM logs l
LEFT JOIN sources s ON l.source_id = s.id
LEFT JOIN types t ON l.type_id = t.id
ORDER BY l.id DESC";

/// Where the schema script comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaScript {
    /// The script compiled into the crate
    Bundled,
    /// A script file on disk
    File(PathBuf),
}

impl SchemaScript {
    /// Use a file when given, otherwise the bundled script
    pub fn from_option(path: Option<&Path>) -> Self {
        match path {
            Some(path) => SchemaScript::File(path.to_path_buf()),
            None => SchemaScript::Bundled,
        }
    }

    fn load(&self) -> Result<String> {
        match self {
            SchemaScript::Bundled => Ok(BUNDLED_SCHEMA.to_string()),
            SchemaScript::File(path) => std::fs::read_to_string(path).map_err(|e| {
                WeighError::Schema(format!(
                    "Failed to read schema script {}: {}",
                    path.display(),
                    e
                ))
            }),
        }
    }
}

/// Guard that initializes the schema once per store
#[derive(Debug)]
pub struct SchemaBootstrap {
    script: SchemaScript,
    lock: Mutex<()>,
    initialized: AtomicBool,
}

impl SchemaBootstrap {
    pub fn new(script: SchemaScript) -> Self {
        Self {
            script,
            lock: Mutex::new(()),
            initialized: AtomicBool::new(false),
        }
    }

    /// Make sure the schema exists, running the script at most once
    pub fn ensure(&self, conn: &mut Connection) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }

        bootstrap(conn, &self.script)?;
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    /// Run the script unconditionally and mark the schema initialized
    pub fn force(&self, conn: &mut Connection) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        enable_wal(conn)?;
        let script = self.script.load()?;
        conn.execute_batch(&script)
            .context("Failed to run schema script")?;
        migrate_additive(conn)?;
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    /// Forget that the schema was initialized
    pub fn reset(&self) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.initialized.store(false, Ordering::Release);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }
}

/// Create the schema if the core table is missing, then apply additive migrations
///
/// Returns `true` when the schema script ran.
pub fn bootstrap(conn: &mut Connection, script: &SchemaScript) -> Result<bool> {
    enable_wal(conn)?;

    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .context("Failed to lock database for schema setup")?;
    let created = if table_exists(&tx, CORE_TABLE)? {
        false
    } else {
        tracing::info!("Creating database schema");
        tx.execute_batch(&script.load()?)
            .context("Failed to run schema script")?;
        true
    };
    migrate_additive(&tx)?;
    tx.commit().context("Failed to commit schema setup")?;

    Ok(created)
}

/// Names of all tables in the database, sorted
pub fn table_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
         ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(names)
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn column_names(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names)
}

/// Add missing columns and the display view to an existing database
fn migrate_additive(conn: &Connection) -> Result<()> {
    for (table, column, definition) in ADDITIVE_COLUMNS {
        if !table_exists(conn, table)? {
            return Err(WeighError::Schema(format!(
                "Table '{}' is missing after schema setup",
                table
            )));
        }
        if column_names(conn, table)?.iter().any(|c| c == column) {
            continue;
        }
        tracing::info!("Adding column {}.{}", table, column);
        conn.execute_batch(&format!(
            "ALTER TABLE {table} ADD COLUMN {column} {definition}"
        ))
        .with_context(|| format!("Failed to add column {}.{}", table, column))?;
    }

    conn.execute_batch(VIEW_LOGS)
        .context("Failed to create view_logs")?;
    Ok(())
}

fn enable_wal(conn: &Connection) -> Result<()> {
    let mode: String = conn
        .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
        .context("Failed to set journal mode")?;
    if !mode.eq_ignore_ascii_case("wal") {
        tracing::debug!("Database journal mode is {}", mode);
    }
    Ok(())
}
