//! Combined open-order book.
//!
//! Scans a directory of per-property `<asset_unit>_open_orders.csv` files,
//! optionally keeps only asset units on the liquidity-pool allowlist,
//! rewrites property ids into detail-page links and writes one combined
//! CSV sorted sells-first, highest price first.

use rust_decimal::Decimal;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::allowlist;
use crate::config::OutputConfig;
use crate::storage::{self, StorageError, OPEN_ORDERS_MARKER};
use crate::types::{property_link, OrderRow, OrderSide};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Files containing this marker are previous combined outputs.
const COMBINED_MARKER: &str = "combined";

pub const COMBINED_FILE: &str = "combined_open_orders.csv";
pub const COMBINED_LP_FILE: &str = "combined_open_orders_lp_only.csv";

pub const COMBINED_HEADER: [&str; 7] = [
    "Order Type",
    "Quantity",
    "Price",
    "Property Link",
    "Order ID",
    "Expire At",
    "Created At",
];

const COL_ORDER_TYPE: &str = "Order Type";
const COL_QUANTITY: &str = "Quantity";
const COL_PRICE: &str = "Price";
const COL_PROPERTY_ID: &str = "Property ID";
const COL_ORDER_ID: &str = "Order ID";
const COL_EXPIRE_AT: &str = "Expire At";
const COL_CREATED_AT: &str = "Created At";

// ---------------------------------------------------------------------------
// Errors and report
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    #[error("cannot read order directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot read allowlist {}: {source}", path.display())]
    Allowlist {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot read {file}: {source}")]
    Csv { file: String, source: csv::Error },

    #[error("{file}: missing required column {column:?}")]
    MissingColumn { file: String, column: &'static str },

    #[error("{file}, row {row}: invalid {column} value {value:?}")]
    InvalidValue {
        file: String,
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error(transparent)]
    Write(#[from] StorageError),
}

/// Where the allowlist comes from when filtering is on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LpFilter {
    /// Include every open-order file.
    Off,
    /// Include only files whose asset unit is listed in this file.
    Allowlist(PathBuf),
}

impl LpFilter {
    pub fn is_on(&self) -> bool {
        matches!(self, LpFilter::Allowlist(_))
    }

    /// Output file name for this mode.
    pub fn output_file(&self) -> &'static str {
        if self.is_on() {
            COMBINED_LP_FILE
        } else {
            COMBINED_FILE
        }
    }
}

/// Summary of one aggregation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateReport {
    pub output: PathBuf,
    /// File names read, in processing order.
    pub included: Vec<String>,
    /// Asset units skipped for lacking a liquidity pool.
    pub skipped: Vec<String>,
    pub rows: usize,
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// Merges per-property open-order files into one sorted book.
#[derive(Debug, Clone)]
pub struct OrderAggregator {
    dir: PathBuf,
    filter: LpFilter,
    link_base: String,
}

impl OrderAggregator {
    pub fn new(dir: impl Into<PathBuf>, filter: LpFilter, link_base: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            filter,
            link_base: link_base.into(),
        }
    }

    /// Aggregator over the configured output directory; `lp_only` selects
    /// the configured allowlist.
    pub fn from_config(cfg: &OutputConfig, lp_only: bool) -> Self {
        let filter = if lp_only {
            LpFilter::Allowlist(cfg.lp_list.clone())
        } else {
            LpFilter::Off
        };
        Self::new(cfg.dir.clone(), filter, cfg.property_link_base.clone())
    }

    pub fn output_path(&self) -> PathBuf {
        self.dir.join(self.filter.output_file())
    }

    /// Run the whole read → filter → sort → write pipeline.
    pub fn run(&self) -> Result<AggregateReport, AggregateError> {
        let allow = match &self.filter {
            LpFilter::Off => None,
            LpFilter::Allowlist(path) => Some(allowlist::load(path).map_err(|source| {
                AggregateError::Allowlist {
                    path: path.clone(),
                    source,
                }
            })?),
        };

        let candidates = candidate_files(&self.dir)?;
        let mut included = Vec::new();
        let mut skipped = Vec::new();
        let mut orders = Vec::new();

        for name in candidates {
            if let Some(allow) = &allow {
                let unit = asset_unit(&name);
                if !allow.contains(unit) {
                    info!(asset_unit = unit, "No liquidity pool, skipping");
                    skipped.push(unit.to_string());
                    continue;
                }
            }

            let rows = read_open_orders(&self.dir.join(&name), &name, &self.link_base)?;
            debug!(file = %name, rows = rows.len(), "Open orders read");
            orders.extend(rows);
            included.push(name);
        }

        sort_orders(&mut orders);

        let output = self.output_path();
        storage::write_csv(&output, &COMBINED_HEADER, orders.iter().map(OrderRow::to_record))?;

        info!(
            output = %output.display(),
            files = included.len(),
            skipped = skipped.len(),
            rows = orders.len(),
            "Combined order book written"
        );

        Ok(AggregateReport {
            output,
            included,
            skipped,
            rows: orders.len(),
        })
    }
}

/// Sort sells before buys, higher price first within a side.
///
/// Stable: orders with equal side and price keep their read order.
pub fn sort_orders(orders: &mut [OrderRow]) {
    orders.sort_by(|a, b| (b.order_type, b.price).cmp(&(a.order_type, a.price)));
}

/// Open-order file names in `dir`, excluding earlier combined outputs,
/// sorted by name.
fn candidate_files(dir: &Path) -> Result<Vec<String>, AggregateError> {
    let read_err = |source: std::io::Error| AggregateError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if is_candidate(&name) && entry.path().is_file() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

fn is_candidate(name: &str) -> bool {
    name.contains(OPEN_ORDERS_MARKER) && !name.contains(COMBINED_MARKER)
}

/// Everything before the first underscore of a file name.
fn asset_unit(file_name: &str) -> &str {
    file_name.split('_').next().unwrap_or(file_name)
}

/// Column positions resolved from a header row.
struct Columns {
    order_type: usize,
    quantity: usize,
    price: usize,
    property_id: usize,
    order_id: usize,
    expire_at: usize,
    created_at: usize,
}

impl Columns {
    fn resolve(headers: &csv::StringRecord, file: &str) -> Result<Self, AggregateError> {
        let find = |column: &'static str| {
            headers
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| AggregateError::MissingColumn {
                    file: file.to_string(),
                    column,
                })
        };

        Ok(Self {
            order_type: find(COL_ORDER_TYPE)?,
            quantity: find(COL_QUANTITY)?,
            price: find(COL_PRICE)?,
            property_id: find(COL_PROPERTY_ID)?,
            order_id: find(COL_ORDER_ID)?,
            expire_at: find(COL_EXPIRE_AT)?,
            created_at: find(COL_CREATED_AT)?,
        })
    }
}

/// Parse one open-order file into normalised rows.
fn read_open_orders(
    path: &Path,
    file: &str,
    link_base: &str,
) -> Result<Vec<OrderRow>, AggregateError> {
    let csv_err = |source: csv::Error| AggregateError::Csv {
        file: file.to_string(),
        source,
    };

    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    let headers = rdr.headers().map_err(csv_err)?.clone();
    let cols = Columns::resolve(&headers, file)?;

    let mut rows = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record.map_err(csv_err)?;
        let row = idx + 1;
        let cell = |i: usize| record.get(i).unwrap_or("");
        let invalid = |column: &'static str, value: &str| AggregateError::InvalidValue {
            file: file.to_string(),
            row,
            column,
            value: value.to_string(),
        };

        let order_type: OrderSide = cell(cols.order_type)
            .parse()
            .map_err(|_| invalid(COL_ORDER_TYPE, cell(cols.order_type)))?;
        let quantity: u64 = cell(cols.quantity)
            .trim()
            .parse()
            .map_err(|_| invalid(COL_QUANTITY, cell(cols.quantity)))?;
        let price: Decimal = cell(cols.price)
            .trim()
            .parse()
            .map_err(|_| invalid(COL_PRICE, cell(cols.price)))?;

        rows.push(OrderRow {
            order_type,
            quantity,
            price,
            property_link: property_link(link_base, cell(cols.property_id)),
            order_id: cell(cols.order_id).to_string(),
            expire_at: cell(cols.expire_at).to_string(),
            created_at: cell(cols.created_at).to_string(),
        });
    }

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
