//! Daily totals over active log entries
//!
//! All totals ignore soft-deleted rows and bucket entries by the UTC date of
//! their timestamp.

use super::LogStore;
use crate::error::Result;
use chrono::NaiveDate;
use rusqlite::params;
use serde::Serialize;

/// Total weight for one named bucket (food type or source)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Total {
    pub name: String,
    pub weight_lb: f64,
}

/// Total weight for one UTC day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayTotal {
    pub date: NaiveDate,
    pub weight_lb: f64,
}

impl LogStore {
    /// Per-type totals for `date`, optionally restricted to one source
    ///
    /// Every food type is listed, in display order, with `0.0` when nothing
    /// of that type was logged.
    pub fn totals_per_type(&self, date: NaiveDate, source: Option<&str>) -> Result<Vec<Total>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT t.name, COALESCE(SUM(l.weight_lb), 0.0)
             FROM types t
             LEFT JOIN logs l
               ON l.type_id = t.id
              AND l.deleted = 0
              AND DATE(l.timestamp) = ?1
              AND (?2 IS NULL OR l.source_id = (SELECT id FROM sources WHERE name = ?2))
             GROUP BY t.id
             ORDER BY t.sort_order, t.id",
        )?;
        let totals = stmt
            .query_map(params![date, source], |row| {
                Ok(Total {
                    name: row.get(0)?,
                    weight_lb: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(totals)
    }

    /// Sum of all active entries for `date`
    pub fn totals_overall(&self, date: NaiveDate) -> Result<f64> {
        let conn = self.connection()?;
        let total = conn.query_row(
            "SELECT COALESCE(SUM(weight_lb), 0.0) FROM logs
             WHERE deleted = 0 AND DATE(timestamp) = ?1",
            [date],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// Per-source totals for `date`, every source listed, by name
    pub fn totals_per_source(&self, date: NaiveDate) -> Result<Vec<Total>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT s.name, COALESCE(SUM(l.weight_lb), 0.0)
             FROM sources s
             LEFT JOIN logs l
               ON l.source_id = s.id
              AND l.deleted = 0
              AND DATE(l.timestamp) = ?1
             GROUP BY s.id
             ORDER BY s.name",
        )?;
        let totals = stmt
            .query_map([date], |row| {
                Ok(Total {
                    name: row.get(0)?,
                    weight_lb: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(totals)
    }

    /// Daily totals for `start..=end`; days with no entries are omitted
    pub fn totals_per_day(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DayTotal>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT DATE(timestamp) AS day, SUM(weight_lb)
             FROM logs
             WHERE deleted = 0 AND DATE(timestamp) BETWEEN ?1 AND ?2
             GROUP BY day
             ORDER BY day",
        )?;
        let totals = stmt
            .query_map(params![start, end], |row| {
                Ok(DayTotal {
                    date: row.get(0)?,
                    weight_lb: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(totals)
    }

    /// Number of entries not marked deleted
    pub fn active_entry_count(&self) -> Result<u64> {
        let conn = self.connection()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM logs WHERE deleted = 0", [], |row| {
                row.get(0)
            })?;
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{today_utc, SchemaScript};
    use tempfile::TempDir;

    fn store() -> (TempDir, LogStore) {
        let dir = tempfile::tempdir().unwrap();
        let store =
            LogStore::init_for_test(dir.path().join("weigh.db"), SchemaScript::Bundled).unwrap();
        (dir, store)
    }

    fn weight_of(totals: &[Total], name: &str) -> f64 {
        totals.iter().find(|t| t.name == name).unwrap().weight_lb
    }

    #[test]
    fn test_empty_day_is_zero_filled() {
        let (_dir, store) = store();
        let totals = store.totals_per_type(today_utc(), None).unwrap();

        let names: Vec<_> = totals.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            ["Produce", "Dry", "Bread", "Dairy", "Meat", "Prepared", "Frozen", "Non-Food"]
        );
        assert!(totals.iter().all(|t| t.weight_lb == 0.0));
        assert_eq!(store.totals_overall(today_utc()).unwrap(), 0.0);
    }

    #[test]
    fn test_source_filter() {
        let (_dir, store) = store();
        store.append(4.0, "Wegmans", "Bread", None, None).unwrap();
        store.append(1.5, "Aldi", "Bread", None, None).unwrap();

        let today = today_utc();
        assert_eq!(weight_of(&store.totals_per_type(today, None).unwrap(), "Bread"), 5.5);
        assert_eq!(
            weight_of(&store.totals_per_type(today, Some("Aldi")).unwrap(), "Bread"),
            1.5
        );
        assert_eq!(
            weight_of(&store.totals_per_type(today, Some("Nowhere")).unwrap(), "Bread"),
            0.0
        );

        let per_source = store.totals_per_source(today).unwrap();
        assert_eq!(weight_of(&per_source, "Wegmans"), 4.0);
        assert_eq!(weight_of(&per_source, "Safeway"), 0.0);
    }

    #[test]
    fn test_other_days_are_excluded() {
        let (_dir, store) = store();
        store.append(2.0, "Giant", "Dry", None, None).unwrap();

        let yesterday = today_utc().pred_opt().unwrap();
        assert_eq!(store.totals_overall(yesterday).unwrap(), 0.0);
        assert_eq!(store.totals_overall(today_utc()).unwrap(), 2.0);

        let days = store.totals_per_day(yesterday, today_utc()).unwrap();
        assert_eq!(days, vec![DayTotal { date: today_utc(), weight_lb: 2.0 }]);
    }
}
