#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! The historical product table.
//!
//! Every run's processed rows are appended, stamped with the run date, to
//! one ever-growing table. Rows are never deduplicated; `(id, date)` keys
//! the resulting time series implicitly.

pub mod parquet;
pub mod processed;
pub mod schema;

use chrono::NaiveDate;
use shelf_crawl_catalog_models::{MAX_CATEGORY_DEPTH, Offer};

pub use processed::{ProcessedRow, read_processed_csv, write_processed_csv};
pub use schema::ColumnType;

/// Errors from reading, casting, or appending historical rows.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// A value could not be cast to its declared column type.
    #[error("Cannot cast {column} value {value:?} on line {line} to {expected}")]
    SchemaCast {
        /// 1-based CSV line (the header is line 1).
        line: u64,
        /// Column name.
        column: &'static str,
        /// Raw cell text.
        value: String,
        /// Declared type.
        expected: ColumnType,
    },

    /// A declared column is missing from the processed CSV header.
    #[error("Processed data has no {column} column")]
    MissingColumn {
        /// Column name.
        column: &'static str,
    },

    /// CSV read or write error.
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// `DuckDB` error.
    #[error(transparent)]
    DuckDb(#[from] duckdb::Error),

    /// A stored date could not be parsed.
    #[error("Invalid date {value:?} in historical table")]
    InvalidDate {
        /// Raw date text.
        value: String,
    },

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One row of the historical table.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    /// Product id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Shelf price of one unit.
    pub price_per_unit: Option<f64>,
    /// Price per weight or volume quantity.
    pub price_per_weight_quant: Option<f64>,
    /// Unit of `price_per_weight_quant`, e.g. `kg`.
    pub weight_quant_unit: Option<String>,
    /// Raw promotional offer text.
    pub offer: Option<String>,
    /// Category path, outermost first, padded with `None`.
    pub categories: [Option<String>; MAX_CATEGORY_DEPTH],
    /// Unit price with the loyalty card, when the offer carries one.
    pub clubcard_price: Option<f64>,
    /// `100 * (1 - clubcard_price / price_per_unit)`.
    pub clubcard_discount_percentage: Option<f64>,
    /// Date of the run that produced the row.
    pub date: NaiveDate,
}

impl HistoryRow {
    /// Stamps a processed row with the run date and derives the clubcard
    /// columns.
    #[must_use]
    pub fn from_processed(row: ProcessedRow, date: NaiveDate) -> Self {
        let clubcard_price = Offer::parse(row.offer.as_deref()).clubcard_price();
        let clubcard_discount_percentage = match (clubcard_price, row.price_per_unit) {
            (Some(card), Some(unit)) if unit > 0.0 => Some(100.0 * (1.0 - card / unit)),
            _ => None,
        };

        Self {
            id: row.id,
            name: row.name,
            price_per_unit: row.price_per_unit,
            price_per_weight_quant: row.price_per_weight_quant,
            weight_quant_unit: row.weight_quant_unit,
            offer: row.offer,
            categories: row.categories,
            clubcard_price,
            clubcard_discount_percentage,
            date,
        }
    }
}

/// An append-only table of [`HistoryRow`]s.
pub trait HistoryTable: Send {
    /// Reads every row. An absent table reads as empty.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError`] if the backend fails.
    fn read_table(&self) -> Result<Vec<HistoryRow>, HistoryError>;

    /// Appends `rows`, returning the table's new row count. Either every
    /// row is written or none is.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError`] if the backend fails.
    fn append_table(&mut self, rows: &[HistoryRow]) -> Result<usize, HistoryError>;
}

/// In-memory [`HistoryTable`].
#[derive(Debug, Default, Clone)]
pub struct MemoryTable {
    rows: Vec<HistoryRow>,
}

impl MemoryTable {
    /// Creates an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self { rows: Vec::new() }
    }

    /// Borrows the stored rows.
    #[must_use]
    pub fn rows(&self) -> &[HistoryRow] {
        &self.rows
    }
}

impl HistoryTable for MemoryTable {
    fn read_table(&self) -> Result<Vec<HistoryRow>, HistoryError> {
        Ok(self.rows.clone())
    }

    fn append_table(&mut self, rows: &[HistoryRow]) -> Result<usize, HistoryError> {
        self.rows.extend_from_slice(rows);
        Ok(self.rows.len())
    }
}

/// Counts reported by [`append`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AppendStats {
    /// Rows appended in this run.
    pub appended: usize,
    /// Rows in the table afterwards.
    pub total: usize,
}

impl std::fmt::Display for AppendStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} appended, {} total", self.appended, self.total)
    }
}

/// Casts processed CSV bytes and appends them to `table`, stamped with
/// `run_date`.
///
/// Every row is cast before anything is written, so a cast failure leaves
/// the table untouched.
///
/// # Errors
///
/// Returns [`HistoryError::SchemaCast`] or [`HistoryError::MissingColumn`]
/// for malformed input, or any backend error.
pub fn append(
    table: &mut dyn HistoryTable,
    processed_csv: &[u8],
    run_date: NaiveDate,
) -> Result<AppendStats, HistoryError> {
    let rows: Vec<HistoryRow> = read_processed_csv(processed_csv)?
        .into_iter()
        .map(|row| HistoryRow::from_processed(row, run_date))
        .collect();

    log::info!("Appending {} row(s) for {run_date}", rows.len());
    let total = table.append_table(&rows)?;

    let stats = AppendStats {
        appended: rows.len(),
        total,
    };
    log::info!("Historical table: {stats}");
    Ok(stats)
}
