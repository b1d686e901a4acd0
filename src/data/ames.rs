//! Bulk loader for the Ames housing TSV.
//!
//! Fetches the dataset on first use, indexes rows by the `Order` column,
//! drops the `PID` parcel identifier (an identifier, not a feature), applies
//! the registry's declared dtypes, and splits off the sale price target.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::schema::SchemaRegistry;

use super::coerce::coerce_strict;
use super::table::{RawTable, TypedColumn, TypedTable};

/// Upstream location of the De Cock Ames housing data.
pub const DATA_URL: &str = "https://jse.amstat.org/v19n3/decock/AmesHousing.txt";

/// File name of the cached dataset inside the data directory.
pub const DATA_FILE: &str = "AmesHousing.txt";

/// Row-identifier column; becomes the table index, not a feature.
pub const INDEX_COLUMN: &str = "Order";

/// Parcel identifier; dropped at load time, not useful as a feature.
pub const PARCEL_ID_COLUMN: &str = "PID";

/// Training target.
pub const TARGET_COLUMN: &str = "SalePrice";

/// Errors raised by the bulk loader.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to download dataset: {0}")]
    Download(Box<ureq::Error>),

    #[error("failed to parse dataset: {0}")]
    Csv(#[from] csv::Error),

    #[error("dataset is missing required column {0:?}")]
    MissingColumn(String),

    #[error("row {row} has invalid {INDEX_COLUMN} value {value:?}")]
    BadIndex { row: usize, value: String },

    #[error("row {row_id} has a missing or non-numeric {TARGET_COLUMN}")]
    BadTarget { row_id: u64 },

    #[error(transparent)]
    Schema(#[from] crate::schema::SchemaError),
}

/// Ensure the dataset file exists locally, downloading it if absent.
///
/// Returns the path to the cached file.
pub fn ensure_dataset(data_dir: &Path) -> Result<PathBuf, DataError> {
    fs::create_dir_all(data_dir)?;
    let path = data_dir.join(DATA_FILE);
    if !path.is_file() {
        info!(url = DATA_URL, "dataset not found locally, downloading");
        let response = ureq::get(DATA_URL)
            .call()
            .map_err(|e| DataError::Download(Box::new(e)))?;
        let mut reader = response.into_reader();
        let mut file = fs::File::create(&path)?;
        io::copy(&mut reader, &mut file)?;
    }
    Ok(path)
}

/// Load the raw tab-delimited dataset.
///
/// The `Order` column becomes the row index and `PID` is excluded. Empty
/// cells and the literal `NA` are missing markers.
pub fn load_raw(path: &Path) -> Result<RawTable, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    let order_pos = headers
        .iter()
        .position(|h| h == INDEX_COLUMN)
        .ok_or_else(|| DataError::MissingColumn(INDEX_COLUMN.to_string()))?;

    let mut index = Vec::new();
    let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];

    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let order = record.get(order_pos).unwrap_or_default();
        let id = order
            .trim()
            .parse::<u64>()
            .map_err(|_| DataError::BadIndex {
                row,
                value: order.to_string(),
            })?;
        index.push(id);

        for (pos, cell) in record.iter().enumerate() {
            let cell = cell.trim();
            let value = if cell.is_empty() || cell == "NA" {
                None
            } else {
                Some(cell.to_string())
            };
            columns[pos].push(value);
        }
    }

    let mut table = RawTable::with_index(index);
    for (pos, header) in headers.iter().enumerate() {
        if header == INDEX_COLUMN || header == PARCEL_ID_COLUMN {
            continue;
        }
        table.insert_column(header.to_string(), std::mem::take(&mut columns[pos]));
    }

    Ok(table)
}

/// Load, coerce, and split the dataset into features and target.
///
/// Every remaining column must carry a declared type; the bulk path is the
/// stricter caller that fails on schema gaps rather than degrading.
pub fn load_training_table(
    path: &Path,
    registry: &SchemaRegistry,
) -> Result<(TypedTable, Vec<f32>), DataError> {
    let raw = load_raw(path)?;
    info!(rows = raw.n_rows(), "loaded dataset");

    let mut typed = coerce_strict(&raw, registry.column_types())?;

    let target = typed
        .remove_column(TARGET_COLUMN)
        .ok_or_else(|| DataError::MissingColumn(TARGET_COLUMN.to_string()))?;
    let targets = match target {
        TypedColumn::Numeric(values) => values,
        TypedColumn::Categorical(_) => {
            return Err(DataError::MissingColumn(TARGET_COLUMN.to_string()));
        }
    };

    if let Some(pos) = targets.iter().position(|t| !t.is_finite()) {
        return Err(DataError::BadTarget {
            row_id: typed.index()[pos],
        });
    }

    Ok((typed, targets))
}
