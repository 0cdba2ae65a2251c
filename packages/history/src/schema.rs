//! Column layout of the processed CSV and the historical table.

use strum_macros::Display;

/// Storage type a processed column is cast to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ColumnType {
    /// UTF-8 text.
    Text,
    /// 64-bit float.
    Float,
}

impl ColumnType {
    /// `DuckDB` column type for this storage type.
    #[must_use]
    pub const fn sql_type(self) -> &'static str {
        match self {
            Self::Text => "VARCHAR",
            Self::Float => "DOUBLE",
        }
    }
}

/// One declared column of the processed CSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Header name.
    pub name: &'static str,
    /// Type the value is cast to.
    pub ty: ColumnType,
    /// Whether an empty value is a cast failure.
    pub required: bool,
}

impl Column {
    const fn text(name: &'static str, required: bool) -> Self {
        Self {
            name,
            ty: ColumnType::Text,
            required,
        }
    }

    const fn float(name: &'static str) -> Self {
        Self {
            name,
            ty: ColumnType::Float,
            required: false,
        }
    }
}

/// Declared columns of the processed CSV, in file order.
pub const PROCESSED_COLUMNS: [Column; 10] = [
    Column::text("id", true),
    Column::text("name", true),
    Column::float("price_per_unit"),
    Column::float("price_per_weight_quant"),
    Column::text("weight_quant_unit", false),
    Column::text("offer", false),
    Column::text("category_1", false),
    Column::text("category_2", false),
    Column::text("category_3", false),
    Column::text("category_4", false),
];

/// Columns the append step derives, after the processed columns.
pub const DERIVED_COLUMNS: [(&str, &str); 3] = [
    ("clubcard_price", "DOUBLE"),
    ("clubcard_discount_percentage", "DOUBLE"),
    ("date", "DATE"),
];

/// Every historical table column name, in table order.
pub fn history_column_names() -> impl Iterator<Item = &'static str> {
    PROCESSED_COLUMNS
        .iter()
        .map(|c| c.name)
        .chain(DERIVED_COLUMNS.iter().map(|(name, _)| *name))
}
