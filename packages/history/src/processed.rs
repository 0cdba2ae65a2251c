//! Flattening result sets into the processed CSV and casting them back.
//!
//! The CSV is written untyped: every cell is plain text and empty cells mean
//! "no value". Types are enforced only when the file is read for appending,
//! so a malformed file is caught before anything touches the historical
//! table.

use shelf_crawl_catalog_models::{MAX_CATEGORY_DEPTH, ResultSet};

use crate::HistoryError;
use crate::schema::{Column, ColumnType, PROCESSED_COLUMNS};

/// One row of the processed CSV after casting.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedRow {
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
}

/// Flattens a result set into processed CSV bytes, one row per product in
/// id order.
///
/// # Errors
///
/// Returns [`HistoryError::Csv`] if the writer fails.
pub fn write_processed_csv(results: &ResultSet) -> Result<Vec<u8>, HistoryError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(PROCESSED_COLUMNS.iter().map(|c| c.name))?;

    for record in results.records() {
        let mut row: Vec<String> = vec![
            record.id.to_string(),
            record.name.clone(),
            float_cell(record.price_per_unit),
            float_cell(record.price_per_weight_quant),
            record.weight_quant_unit.clone().unwrap_or_default(),
            record.offer.clone().unwrap_or_default(),
        ];
        row.extend((1..=MAX_CATEGORY_DEPTH).map(|depth| {
            record
                .category(depth)
                .map(str::to_string)
                .unwrap_or_default()
        }));
        writer.write_record(&row)?;
    }

    writer
        .into_inner()
        .map_err(|e| HistoryError::Io(e.into_error()))
}

fn float_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Reads processed CSV bytes, casting every declared column.
///
/// Columns may appear in any order; extra columns are ignored.
///
/// # Errors
///
/// * [`HistoryError::MissingColumn`] if a declared column is absent.
/// * [`HistoryError::SchemaCast`] if a value does not cast to its declared
///   type, or a required value is empty.
/// * [`HistoryError::Csv`] if the file is not well-formed CSV.
pub fn read_processed_csv(bytes: &[u8]) -> Result<Vec<ProcessedRow>, HistoryError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);

    let headers = reader.headers()?.clone();
    let mut positions = [0usize; PROCESSED_COLUMNS.len()];
    for (slot, column) in positions.iter_mut().zip(PROCESSED_COLUMNS.iter()) {
        *slot = headers
            .iter()
            .position(|h| h.trim() == column.name)
            .ok_or(HistoryError::MissingColumn {
                column: column.name,
            })?;
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, csv::Position::line);

        let mut cells = positions
            .iter()
            .zip(PROCESSED_COLUMNS.iter())
            .map(|(&pos, column)| cast_cell(record.get(pos).unwrap_or(""), column, line));

        let mut next = || cells.next().unwrap_or(Ok(Cell::Empty));

        let id = next()?.into_text();
        let name = next()?.into_text();
        let price_per_unit = next()?.into_float();
        let price_per_weight_quant = next()?.into_float();
        let weight_quant_unit = next()?.into_text();
        let offer = next()?.into_text();
        let categories = [
            next()?.into_text(),
            next()?.into_text(),
            next()?.into_text(),
            next()?.into_text(),
        ];

        rows.push(ProcessedRow {
            id: id.unwrap_or_default(),
            name: name.unwrap_or_default(),
            price_per_unit,
            price_per_weight_quant,
            weight_quant_unit,
            offer,
            categories,
        });
    }

    log::debug!("Cast {} processed row(s)", rows.len());
    Ok(rows)
}

enum Cell {
    Empty,
    Text(String),
    Float(f64),
}

impl Cell {
    fn into_text(self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s),
            Self::Empty | Self::Float(_) => None,
        }
    }

    fn into_float(self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(v),
            Self::Empty | Self::Text(_) => None,
        }
    }
}

fn cast_cell(raw: &str, column: &Column, line: u64) -> Result<Cell, HistoryError> {
    let value = raw.trim();

    if value.is_empty() {
        if column.required {
            return Err(HistoryError::SchemaCast {
                line,
                column: column.name,
                value: raw.to_string(),
                expected: column.ty,
            });
        }
        return Ok(Cell::Empty);
    }

    match column.ty {
        ColumnType::Text => Ok(Cell::Text(value.to_string())),
        ColumnType::Float => value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Cell::Float)
            .ok_or_else(|| HistoryError::SchemaCast {
                line,
                column: column.name,
                value: raw.to_string(),
                expected: column.ty,
            }),
    }
}
