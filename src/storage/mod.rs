//! Flat-file persistence.
//!
//! Writes the per-endpoint CSV files the harvester produces: the
//! marketplace listing, one open-order file per property and one
//! timestamped transaction history per property. Files are overwritten.

use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::types::{json_cell, OrderBook, Property, Transaction};

pub const PROPERTIES_FILE: &str = "properties.csv";

/// Marker shared by every per-property open-order file.
pub const OPEN_ORDERS_MARKER: &str = "open_orders";

pub const PROPERTIES_HEADER: [&str; 3] = ["ID", "Asset Unit", "Address"];

pub const OPEN_ORDERS_HEADER: [&str; 7] = [
    "Order Type",
    "Quantity",
    "Price",
    "Property ID",
    "Order ID",
    "Expire At",
    "Created At",
];

pub const HISTORY_HEADER: [&str; 8] = [
    "ID",
    "Type",
    "Quantity",
    "Price",
    "Amount Crypto",
    "Payment Currency",
    "Created At",
    "Updated At",
];

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to create output directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Csv { path: PathBuf, source: csv::Error },

    #[error("failed to flush {}: {source}", path.display())]
    Flush {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// `<asset_unit>_open_orders.csv`
pub fn open_orders_file_name(asset_unit: &str) -> String {
    format!("{asset_unit}_{OPEN_ORDERS_MARKER}.csv")
}

/// `<asset_unit>_history_<YYYYmmdd-HH-MM-SS>.csv`
pub fn history_file_name(asset_unit: &str, at: DateTime<Local>) -> String {
    format!("{asset_unit}_history_{}.csv", at.format("%Y%m%d-%H-%M-%S"))
}

/// Write `header` then `rows` to `path`, creating the parent directory.
pub fn write_csv<I, R>(path: &Path, header: &[&str], rows: I) -> Result<(), StorageError>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| StorageError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let csv_err = |source: csv::Error| StorageError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut wtr = csv::Writer::from_path(path).map_err(csv_err)?;
    wtr.write_record(header).map_err(csv_err)?;
    let mut count = 0usize;
    for row in rows {
        wtr.write_record(row).map_err(csv_err)?;
        count += 1;
    }
    wtr.flush().map_err(|source| StorageError::Flush {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(path = %path.display(), rows = count, "CSV written");
    Ok(())
}

/// Write the marketplace listing to `properties.csv`.
pub fn save_properties(dir: &Path, properties: &[Property]) -> Result<PathBuf, StorageError> {
    let path = dir.join(PROPERTIES_FILE);
    let rows = properties
        .iter()
        .map(|p| [p.id.as_str(), p.asset_unit.as_str(), p.address.as_str()]);
    write_csv(&path, &PROPERTIES_HEADER, rows)?;
    Ok(path)
}

/// Write one property's book, buys first, to `<asset_unit>_open_orders.csv`.
pub fn save_order_book(
    dir: &Path,
    asset_unit: &str,
    book: &OrderBook,
) -> Result<PathBuf, StorageError> {
    let path = dir.join(open_orders_file_name(asset_unit));
    let rows = book.iter_sided().map(|(side, o)| {
        [
            side.to_string(),
            o.quantity.map(|q| q.to_string()).unwrap_or_default(),
            o.price.map(|p| p.to_string()).unwrap_or_default(),
            o.property_id.clone().unwrap_or_default(),
            o.id.clone().unwrap_or_default(),
            o.expire_at.clone().unwrap_or_default(),
            o.created_at.clone().unwrap_or_default(),
        ]
    });
    write_csv(&path, &OPEN_ORDERS_HEADER, rows)?;
    Ok(path)
}

/// Write one property's trade history to a file stamped with `at`.
pub fn save_transactions(
    dir: &Path,
    asset_unit: &str,
    transactions: &[Transaction],
    at: DateTime<Local>,
) -> Result<PathBuf, StorageError> {
    let path = dir.join(history_file_name(asset_unit, at));
    let rows = transactions.iter().map(|t| {
        [
            json_cell(&t.id),
            json_cell(&t.kind),
            json_cell(&t.quantity),
            json_cell(&t.price),
            json_cell(&t.amount_crypto),
            json_cell(&t.payment_currency),
            json_cell(&t.created_at),
            json_cell(&t.updated_at),
        ]
    });
    write_csv(&path, &HISTORY_HEADER, rows)?;
    Ok(path)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
