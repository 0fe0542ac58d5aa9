//! Append, undo/redo and listings for the donation log

use super::LogStore;
use crate::error::{Result, ResultExt, WeighError};
use crate::types::{FoodType, LogEntry, Source};
use chrono::{NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

/// Columns selected for a [`LogEntry`], in `entry_from_row` order
const ENTRY_COLUMNS: &str = "l.id, l.timestamp, l.weight_lb, s.name, t.name, l.deleted,
     l.temp_pickup_f, l.temp_dropoff_f
     FROM logs l
     JOIN sources s ON l.source_id = s.id
     JOIN types t ON l.type_id = t.id";

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<LogEntry> {
    Ok(LogEntry {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        weight_lb: row.get(2)?,
        source: row.get(3)?,
        food_type: row.get(4)?,
        deleted: row.get(5)?,
        temp_pickup_f: row.get(6)?,
        temp_dropoff_f: row.get(7)?,
    })
}

fn source_id(conn: &Connection, name: &str) -> Result<i64> {
    conn.query_row("SELECT id FROM sources WHERE name = ?1", [name], |row| {
        row.get(0)
    })
    .optional()?
    .ok_or_else(|| WeighError::UnknownSource(name.to_string()))
}

fn type_id(conn: &Connection, name: &str) -> Result<i64> {
    conn.query_row("SELECT id FROM types WHERE name = ?1", [name], |row| {
        row.get(0)
    })
    .optional()?
    .ok_or_else(|| WeighError::UnknownType(name.to_string()))
}

/// Flip the `deleted` flag on the highest-id row currently set to `from`
fn flip_boundary(store: &LogStore, from: bool) -> Result<Option<i64>> {
    let mut conn = store.connection()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let id: Option<i64> = tx
        .query_row(
            "SELECT id FROM logs WHERE deleted = ?1 ORDER BY id DESC LIMIT 1",
            [from],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(id) = id {
        tx.execute(
            "UPDATE logs SET deleted = ?1 WHERE id = ?2",
            params![!from, id],
        )?;
    }
    tx.commit()?;
    Ok(id)
}

impl LogStore {
    /// Record one weighed donation
    ///
    /// Source and type are looked up by name; an unknown name fails with
    /// [`WeighError::UnknownSource`] / [`WeighError::UnknownType`] and
    /// nothing is written. The timestamp is assigned here, in UTC.
    /// Returns the id of the new row.
    pub fn append(
        &self,
        weight_lb: f64,
        source: &str,
        food_type: &str,
        temp_pickup_f: Option<f64>,
        temp_dropoff_f: Option<f64>,
    ) -> Result<i64> {
        let mut conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let source_id = source_id(&tx, source)?;
        let type_id = type_id(&tx, food_type)?;
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false);

        tx.execute(
            "INSERT INTO logs (timestamp, weight_lb, source_id, type_id, deleted,
                               temp_pickup_f, temp_dropoff_f)
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6)",
            params![timestamp, weight_lb, source_id, type_id, temp_pickup_f, temp_dropoff_f],
        )
        .context("Failed to insert log entry")?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        tracing::info!(
            "Logged #{}: {:.2} lb from '{}' as '{}'",
            id,
            weight_lb,
            source,
            food_type
        );
        Ok(id)
    }

    /// Mark the most recent active entry deleted
    ///
    /// Returns its id, or `None` when there is nothing to undo.
    pub fn undo_last(&self) -> Result<Option<i64>> {
        let id = flip_boundary(self, false)?;
        match id {
            Some(id) => tracing::info!("Undid log entry #{}", id),
            None => tracing::debug!("Nothing to undo"),
        }
        Ok(id)
    }

    /// Restore the deleted entry with the highest id
    ///
    /// This targets the highest deleted id, which in sequential use is the
    /// entry undone last. Returns `None` when nothing is deleted.
    pub fn redo_last(&self) -> Result<Option<i64>> {
        let id = flip_boundary(self, true)?;
        match id {
            Some(id) => tracing::info!("Restored log entry #{}", id),
            None => tracing::debug!("Nothing to redo"),
        }
        Ok(id)
    }

    /// Most recent active entries, newest first
    ///
    /// `source` restricts to one source name; `date` to one UTC day.
    pub fn recent(
        &self,
        limit: usize,
        source: Option<&str>,
        date: Option<NaiveDate>,
    ) -> Result<Vec<LogEntry>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS}
             WHERE l.deleted = 0
               AND (?1 IS NULL OR s.name = ?1)
               AND (?2 IS NULL OR DATE(l.timestamp) = ?2)
             ORDER BY l.id DESC
             LIMIT ?3"
        ))?;
        let entries = stmt
            .query_map(params![source, date, limit as i64], entry_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Most recent entries including deleted ones, newest first
    pub fn history(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS}
             ORDER BY l.id DESC
             LIMIT ?1"
        ))?;
        let entries = stmt
            .query_map([limit as i64], entry_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Active entries whose UTC day falls in `start..=end`, oldest first
    pub fn logs_between(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<LogEntry>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS}
             WHERE DATE(l.timestamp) BETWEEN ?1 AND ?2
               AND l.deleted = 0
             ORDER BY l.timestamp ASC, l.id ASC"
        ))?;
        let entries = stmt
            .query_map(params![start, end], entry_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// One entry by id, deleted or not
    pub fn entry(&self, id: i64) -> Result<Option<LogEntry>> {
        let conn = self.connection()?;
        let entry = conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} WHERE l.id = ?1"),
                [id],
                entry_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    // ==================== Reference data ====================

    /// Add a source; an existing name is left alone
    pub fn add_source(&self, name: &str) -> Result<()> {
        let conn = self.connection()?;
        let inserted = conn.execute("INSERT OR IGNORE INTO sources (name) VALUES (?1)", [name])?;
        if inserted > 0 {
            tracing::info!("Added source '{}'", name);
        }
        Ok(())
    }

    /// All sources in insertion order
    pub fn sources(&self) -> Result<Vec<Source>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare("SELECT id, name FROM sources ORDER BY id")?;
        let sources = stmt
            .query_map([], |row| {
                Ok(Source {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sources)
    }

    /// Add a food type; an existing name is left alone
    pub fn add_type(&self, name: &str, sort_order: i64, requires_temp: bool) -> Result<()> {
        let conn = self.connection()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO types (name, sort_order, requires_temp) VALUES (?1, ?2, ?3)",
            params![name, sort_order, requires_temp],
        )?;
        if inserted > 0 {
            tracing::info!("Added food type '{}'", name);
        }
        Ok(())
    }

    /// All food types in display order
    pub fn types(&self) -> Result<Vec<FoodType>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, sort_order, requires_temp FROM types ORDER BY sort_order, id",
        )?;
        let types = stmt
            .query_map([], food_type_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(types)
    }

    /// Look up one food type by name
    pub fn food_type(&self, name: &str) -> Result<Option<FoodType>> {
        let conn = self.connection()?;
        let food_type = conn
            .query_row(
                "SELECT id, name, sort_order, requires_temp FROM types WHERE name = ?1",
                [name],
                food_type_from_row,
            )
            .optional()?;
        Ok(food_type)
    }
}

fn food_type_from_row(row: &Row<'_>) -> rusqlite::Result<FoodType> {
    Ok(FoodType {
        id: row.get(0)?,
        name: row.get(1)?,
        sort_order: row.get(2)?,
        requires_temp: row.get(3)?,
    })
}
