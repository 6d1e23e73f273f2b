//! Catalog backends: an in-memory table (loaded from CSV by the CLI) and a
//! SQLite table for installations that share the catalog with other tools.

use std::path::Path;

use rusqlite::{Connection, params};
use sorter_traits::{BoxError, Catalog, Shape, TargetSpec, TargetStatus};

use crate::error::{HwError, Result};

/// Status string written back when a target leaves the cell.
pub const PROCESSED: &str = "processed";

/// One catalog row with its raw status string.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRecord {
    pub spec: TargetSpec,
    pub status: String,
}

impl CatalogRecord {
    pub fn new(spec: TargetSpec, status: impl Into<String>) -> Self {
        Self {
            spec,
            status: status.into(),
        }
    }
}

fn status_of(raw: &str) -> TargetStatus {
    if raw == PROCESSED {
        TargetStatus::Processed
    } else {
        TargetStatus::Pending
    }
}

/// Catalog kept entirely in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryCatalog {
    records: Vec<CatalogRecord>,
}

impl MemoryCatalog {
    pub fn new(records: Vec<CatalogRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[CatalogRecord] {
        &self.records
    }
}

impl Catalog for MemoryCatalog {
    fn fetch_pending(&mut self, status_filter: &str) -> std::result::Result<Vec<TargetSpec>, BoxError> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.status == status_filter)
            .map(|r| r.spec.clone())
            .collect())
    }

    fn mark_processed(&mut self, common_id: &str) -> std::result::Result<(), BoxError> {
        let rec = self
            .records
            .iter_mut()
            .find(|r| r.spec.common_id == common_id)
            .ok_or_else(|| HwError::Catalog(format!("unknown common id '{common_id}'")))?;
        rec.status = PROCESSED.to_string();
        rec.spec.status = TargetStatus::Processed;
        tracing::debug!(common_id, "catalog record marked processed");
        Ok(())
    }
}

/// Catalog backed by an `objects` table in a SQLite database.
pub struct SqliteCatalog {
    conn: Connection,
}

impl SqliteCatalog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS objects (
                common_id TEXT PRIMARY KEY NOT NULL,
                length    REAL NOT NULL,
                width     REAL NOT NULL,
                height    REAL NOT NULL,
                shape     TEXT NOT NULL,
                status    TEXT NOT NULL
            );",
        )?;
        Ok(Self { conn })
    }

    /// Insert or replace one record.
    pub fn upsert(&self, rec: &CatalogRecord) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO objects (common_id, length, width, height, shape, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                rec.spec.common_id,
                f64::from(rec.spec.length_mm),
                f64::from(rec.spec.width_mm),
                f64::from(rec.spec.height_mm),
                rec.spec.shape.as_str(),
                rec.status,
            ],
        )?;
        Ok(())
    }

    fn select(&self, status_filter: &str) -> Result<Vec<TargetSpec>> {
        let mut stmt = self.conn.prepare(
            "SELECT common_id, length, width, height, shape, status
             FROM objects WHERE status = ?1 ORDER BY common_id",
        )?;
        let rows = stmt.query_map(params![status_filter], |row| {
            let shape: String = row.get(4)?;
            let status: String = row.get(5)?;
            Ok(TargetSpec {
                common_id: row.get(0)?,
                length_mm: row.get::<_, f64>(1)? as f32,
                width_mm: row.get::<_, f64>(2)? as f32,
                height_mm: row.get::<_, f64>(3)? as f32,
                shape: Shape::from_catalog(&shape),
                status: status_of(&status),
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(HwError::from)
    }

    fn update_processed(&self, common_id: &str) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE objects SET status = ?1 WHERE common_id = ?2",
            params![PROCESSED, common_id],
        )?;
        if changed == 0 {
            return Err(HwError::Catalog(format!("unknown common id '{common_id}'")));
        }
        Ok(())
    }
}

impl Catalog for SqliteCatalog {
    fn fetch_pending(&mut self, status_filter: &str) -> std::result::Result<Vec<TargetSpec>, BoxError> {
        Ok(self.select(status_filter)?)
    }

    fn mark_processed(&mut self, common_id: &str) -> std::result::Result<(), BoxError> {
        self.update_processed(common_id)?;
        tracing::debug!(common_id, "sqlite record marked processed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn rec(id: &str, status: &str) -> CatalogRecord {
        CatalogRecord::new(
            TargetSpec {
                common_id: id.into(),
                length_mm: 600.0,
                width_mm: 400.0,
                height_mm: 200.0,
                shape: Shape::Box,
                status: status_of(status),
            },
            status,
        )
    }

    #[rstest]
    #[case("pending", 2)]
    #[case("unplaced", 1)]
    #[case("processed", 0)]
    fn memory_filters_by_status(#[case] filter: &str, #[case] n: usize) {
        let mut c = MemoryCatalog::new(vec![rec("a", "pending"), rec("b", "pending"), rec("c", "unplaced")]);
        assert_eq!(c.fetch_pending(filter).unwrap().len(), n);
    }

    #[test]
    fn memory_mark_processed_removes_from_pending() {
        let mut c = MemoryCatalog::new(vec![rec("a", "pending"), rec("b", "pending")]);
        c.mark_processed("a").unwrap();
        let ids: Vec<_> = c
            .fetch_pending("pending")
            .unwrap()
            .into_iter()
            .map(|t| t.common_id)
            .collect();
        assert_eq!(ids, vec!["b".to_string()]);
        assert!(c.mark_processed("zzz").is_err());
    }

    #[test]
    fn sqlite_round_trip() {
        let mut c = SqliteCatalog::open_in_memory().unwrap();
        c.upsert(&rec("a", "pending")).unwrap();
        c.upsert(&rec("b", "unplaced")).unwrap();

        let pending = c.fetch_pending("pending").unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].common_id, "a");
        assert_eq!(pending[0].shape, Shape::Box);
        assert!((pending[0].length_mm - 600.0).abs() < 1e-3);

        c.mark_processed("a").unwrap();
        assert!(c.fetch_pending("pending").unwrap().is_empty());
        assert_eq!(c.fetch_pending(PROCESSED).unwrap().len(), 1);
        assert!(c.mark_processed("missing").is_err());
    }
}
