//! Parquet-file [`HistoryTable`] managed through `DuckDB`.
//!
//! Each append loads the existing file into an in-memory `DuckDB` table,
//! inserts the new rows, writes the table to a sibling temp file, and
//! renames it over the original. A crash mid-append leaves the previous
//! file intact.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use duckdb::Connection;

use crate::schema::{DERIVED_COLUMNS, PROCESSED_COLUMNS, history_column_names};
use crate::{HistoryError, HistoryRow, HistoryTable};

const TABLE: &str = "history";

/// [`HistoryTable`] stored as a single Parquet file.
#[derive(Debug, Clone)]
pub struct ParquetTable {
    path: PathBuf,
}

impl ParquetTable {
    /// Points at `path`. The file is created on first append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the Parquet file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens an in-memory connection holding the current file's rows.
    fn load(&self) -> Result<Connection, HistoryError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(&create_table_sql())?;

        if self.path.exists() {
            let columns = history_column_names().collect::<Vec<_>>().join(", ");
            conn.execute_batch(&format!(
                "INSERT INTO {TABLE} SELECT {columns} FROM read_parquet('{}');",
                sql_path(&self.path)
            ))?;
        } else {
            log::info!(
                "No historical table at {}, starting a new one",
                self.path.display()
            );
        }

        Ok(conn)
    }
}

impl HistoryTable for ParquetTable {
    fn read_table(&self) -> Result<Vec<HistoryRow>, HistoryError> {
        let conn = self.load()?;
        let columns = history_column_names()
            .map(|c| {
                if c == "date" {
                    "strftime(date, '%Y-%m-%d')".to_string()
                } else {
                    c.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(", ");

        let mut stmt = conn.prepare(&format!("SELECT {columns} FROM {TABLE}"))?;
        let mut rows = stmt.query([])?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let date: String = row.get(12)?;
            let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .map_err(|_| HistoryError::InvalidDate { value: date.clone() })?;

            out.push(HistoryRow {
                id: row.get(0)?,
                name: row.get(1)?,
                price_per_unit: row.get(2)?,
                price_per_weight_quant: row.get(3)?,
                weight_quant_unit: row.get(4)?,
                offer: row.get(5)?,
                categories: [row.get(6)?, row.get(7)?, row.get(8)?, row.get(9)?],
                clubcard_price: row.get(10)?,
                clubcard_discount_percentage: row.get(11)?,
                date,
            });
        }

        Ok(out)
    }

    fn append_table(&mut self, rows: &[HistoryRow]) -> Result<usize, HistoryError> {
        let conn = self.load()?;

        let existing: i64 = conn
            .prepare(&format!("SELECT COUNT(*) FROM {TABLE}"))?
            .query_row([], |row| row.get(0))?;
        log::info!(
            "Loaded {existing} existing row(s) from {}",
            self.path.display()
        );

        conn.execute_batch("BEGIN TRANSACTION;")?;
        {
            let placeholders = history_column_names()
                .map(|c| if c == "date" { "CAST(? AS DATE)" } else { "?" })
                .collect::<Vec<_>>()
                .join(", ");
            let mut stmt =
                conn.prepare(&format!("INSERT INTO {TABLE} VALUES ({placeholders})"))?;

            for row in rows {
                let date = row.date.format("%Y-%m-%d").to_string();
                stmt.execute(duckdb::params![
                    row.id,
                    row.name,
                    row.price_per_unit,
                    row.price_per_weight_quant,
                    row.weight_quant_unit.as_deref(),
                    row.offer.as_deref(),
                    row.categories[0].as_deref(),
                    row.categories[1].as_deref(),
                    row.categories[2].as_deref(),
                    row.categories[3].as_deref(),
                    row.clubcard_price,
                    row.clubcard_discount_percentage,
                    date,
                ])?;
            }
        }
        conn.execute_batch("COMMIT;")?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("parquet.tmp");
        conn.execute_batch(&format!(
            "COPY {TABLE} TO '{}' (FORMAT PARQUET);",
            sql_path(&tmp)
        ))?;
        std::fs::rename(&tmp, &self.path)?;

        let total: i64 = conn
            .prepare(&format!("SELECT COUNT(*) FROM {TABLE}"))?
            .query_row([], |row| row.get(0))?;
        log::info!("Wrote {total} row(s) to {}", self.path.display());

        Ok(usize::try_from(total).unwrap_or_default())
    }
}

fn create_table_sql() -> String {
    let columns = PROCESSED_COLUMNS
        .iter()
        .map(|c| (c.name, c.ty.sql_type()))
        .chain(DERIVED_COLUMNS.iter().copied())
        .map(|(name, ty)| format!("{name} {ty}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {TABLE} ({columns});")
}

/// Renders a path as a single-quoted SQL string body.
fn sql_path(path: &Path) -> String {
    path.display().to_string().replace('\'', "''")
}
