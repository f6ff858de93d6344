//! Marketplace harvester.
//!
//! The explicit fetch-and-save action: pages through the marketplace,
//! writes `properties.csv`, then pulls each property's order book and
//! trade history into per-property CSVs. Requests are issued one at a
//! time, in listing order.

use chrono::Local;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::api::{ApiError, MarketplaceApi};
use crate::storage::{self, StorageError};
use crate::types::Property;

// ---------------------------------------------------------------------------
// Harvest result
// ---------------------------------------------------------------------------

/// Fatal harvest failures. Anything per-property lands in the report instead.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("marketplace listing failed on page {page}: {source}")]
    Listing { page: u32, source: ApiError },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Which per-property step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestStage {
    OrderBook,
    History,
}

impl fmt::Display for HarvestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HarvestStage::OrderBook => write!(f, "order book"),
            HarvestStage::History => write!(f, "history"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyFailure {
    pub property_id: String,
    pub asset_unit: String,
    pub stage: HarvestStage,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestReport {
    pub properties: usize,
    pub pages: u32,
    pub order_books: Vec<PathBuf>,
    pub histories: Vec<PathBuf>,
    pub failures: Vec<PropertyFailure>,
}

// ---------------------------------------------------------------------------
// Harvester
// ---------------------------------------------------------------------------

pub struct Harvester<A> {
    api: A,
    dir: PathBuf,
    page_size: u32,
    max_pages: u32,
}

impl<A: MarketplaceApi> Harvester<A> {
    pub fn new(api: A, dir: impl Into<PathBuf>, page_size: u32, max_pages: u32) -> Self {
        Self {
            api,
            dir: dir.into(),
            page_size: page_size.max(1),
            max_pages: max_pages.max(1),
        }
    }

    /// Page through the marketplace until a short page or `max_pages`.
    pub async fn fetch_properties(&self) -> Result<(Vec<Property>, u32), HarvestError> {
        let mut all = Vec::new();
        let mut pages = 0;

        for page in 1..=self.max_pages {
            let batch = self
                .api
                .fetch_properties_page(page, self.page_size)
                .await
                .map_err(|source| HarvestError::Listing { page, source })?;
            pages = page;
            let n = batch.len();
            all.extend(batch);
            debug!(page, fetched = n, total = all.len(), "Marketplace page fetched");

            if n < self.page_size as usize {
                return Ok((all, pages));
            }
        }

        warn!(
            max_pages = self.max_pages,
            total = all.len(),
            "Stopped at page limit, listing may be truncated"
        );
        Ok((all, pages))
    }

    /// Run the full harvest.
    pub async fn run(&self) -> Result<HarvestReport, HarvestError> {
        info!(dir = %self.dir.display(), "Harvesting Lofty marketplace...");

        let (properties, pages) = self.fetch_properties().await?;
        let listing = storage::save_properties(&self.dir, &properties)?;
        info!(
            properties = properties.len(),
            pages,
            path = %listing.display(),
            "Marketplace listing saved"
        );

        let mut report = HarvestReport {
            properties: properties.len(),
            pages,
            ..HarvestReport::default()
        };

        for property in &properties {
            match self.save_order_book(property).await {
                Ok(path) => report.order_books.push(path),
                Err(reason) => report.failures.push(failure(property, HarvestStage::OrderBook, reason)),
            }
            match self.save_history(property).await {
                Ok(path) => report.histories.push(path),
                Err(reason) => report.failures.push(failure(property, HarvestStage::History, reason)),
            }
        }

        info!(
            properties = report.properties,
            order_books = report.order_books.len(),
            histories = report.histories.len(),
            failures = report.failures.len(),
            "Harvest complete"
        );

        Ok(report)
    }

    async fn save_order_book(&self, property: &Property) -> Result<PathBuf, String> {
        let book = self
            .api
            .fetch_order_book(&property.id)
            .await
            .map_err(|e| e.to_string())?;
        let path = storage::save_order_book(&self.dir, &property.asset_unit, &book)
            .map_err(|e| e.to_string())?;
        debug!(asset_unit = %property.asset_unit, orders = book.len(), "Order book saved");
        Ok(path)
    }

    async fn save_history(&self, property: &Property) -> Result<PathBuf, String> {
        let txns = self
            .api
            .fetch_transactions(&property.id)
            .await
            .map_err(|e| e.to_string())?;
        let path = storage::save_transactions(&self.dir, &property.asset_unit, &txns, Local::now())
            .map_err(|e| e.to_string())?;
        debug!(asset_unit = %property.asset_unit, transactions = txns.len(), "History saved");
        Ok(path)
    }
}

fn failure(property: &Property, stage: HarvestStage, reason: String) -> PropertyFailure {
    warn!(
        asset_unit = %property.asset_unit,
        property_id = %property.id,
        %stage,
        reason = %reason,
        "Property step failed, continuing"
    );
    PropertyFailure {
        property_id: property.id.clone(),
        asset_unit: property.asset_unit.clone(),
        stage,
        reason,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockMarketplaceApi;
    use crate::types::{BookOrder, OrderBook, Transaction};
    use mockall::predicate::eq;
    use rust_decimal_macros::dec;
    use std::fs;

    fn prop(id: &str, unit: &str) -> Property {
        Property {
            id: id.to_string(),
            asset_unit: unit.to_string(),
            address: format!("{unit} street"),
        }
    }

    fn book() -> OrderBook {
        OrderBook {
            buy_orders: vec![BookOrder {
                id: Some("b1".into()),
                quantity: Some(2),
                price: Some(dec!(50)),
                property_id: Some("p1".into()),
                ..BookOrder::default()
            }],
            sell_orders: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_pagination_stops_on_short_page() {
        let mut api = MockMarketplaceApi::new();
        api.expect_fetch_properties_page()
            .with(eq(1u32), eq(2u32))
            .times(1)
            .returning(|_, _| Ok(vec![prop("p1", "A"), prop("p2", "B")]));
        api.expect_fetch_properties_page()
            .with(eq(2u32), eq(2u32))
            .times(1)
            .returning(|_, _| Ok(vec![prop("p3", "C")]));

        let dir = tempfile::tempdir().unwrap();
        let harvester = Harvester::new(api, dir.path(), 2, 10);
        let (props, pages) = harvester.fetch_properties().await.unwrap();
        assert_eq!(props.len(), 3);
        assert_eq!(pages, 2);
    }

    #[tokio::test]
    async fn test_pagination_respects_max_pages() {
        let mut api = MockMarketplaceApi::new();
        api.expect_fetch_properties_page()
            .times(3)
            .returning(|page, _| Ok(vec![prop(&format!("p{page}"), "X")]));

        let dir = tempfile::tempdir().unwrap();
        let harvester = Harvester::new(api, dir.path(), 1, 3);
        let (props, pages) = harvester.fetch_properties().await.unwrap();
        assert_eq!(props.len(), 3);
        assert_eq!(pages, 3);
    }

    #[tokio::test]
    async fn test_listing_failure_aborts() {
        let mut api = MockMarketplaceApi::new();
        api.expect_fetch_properties_page().returning(|_, _| {
            Err(ApiError::Status {
                endpoint: "/properties/v2/marketplace".into(),
                status: 500,
                body: String::new(),
            })
        });
        api.expect_fetch_order_book().never();

        let dir = tempfile::tempdir().unwrap();
        let err = Harvester::new(api, dir.path(), 200, 5).run().await.unwrap_err();
        assert!(matches!(err, HarvestError::Listing { page: 1, .. }));
        assert!(!dir.path().join("properties.csv").exists());
    }

    #[tokio::test]
    async fn test_run_writes_files_and_skips_failures() {
        let mut api = MockMarketplaceApi::new();
        api.expect_fetch_properties_page()
            .returning(|_, _| Ok(vec![prop("p1", "AAA"), prop("p2", "BBB")]));
        api.expect_fetch_order_book()
            .with(eq("p1"))
            .returning(|_| Ok(book()));
        api.expect_fetch_order_book().with(eq("p2")).returning(|_| {
            Err(ApiError::Unsuccessful {
                endpoint: "/exchange/v2/getpropertyorderbook".into(),
            })
        });
        api.expect_fetch_transactions()
            .returning(|_| Ok(vec![Transaction::default()]));

        let dir = tempfile::tempdir().unwrap();
        let report = Harvester::new(api, dir.path(), 200, 5).run().await.unwrap();

        assert_eq!(report.properties, 2);
        assert_eq!(report.pages, 1);
        assert_eq!(report.order_books, vec![dir.path().join("AAA_open_orders.csv")]);
        assert_eq!(report.histories.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].asset_unit, "BBB");
        assert_eq!(report.failures[0].stage, HarvestStage::OrderBook);

        let listing = fs::read_to_string(dir.path().join("properties.csv")).unwrap();
        assert_eq!(
            listing,
            "ID,Asset Unit,Address\np1,AAA,AAA street\np2,BBB,BBB street\n"
        );
        let orders = fs::read_to_string(dir.path().join("AAA_open_orders.csv")).unwrap();
        assert!(orders.ends_with("Buy,2,50,p1,b1,,\n"));
        assert!(!dir.path().join("BBB_open_orders.csv").exists());

        for path in &report.histories {
            let name = path.file_name().unwrap().to_str().unwrap();
            assert!(name.contains("_history_"), "{name}");
            assert!(path.exists());
        }
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(HarvestStage::OrderBook.to_string(), "order book");
        assert_eq!(HarvestStage::History.to_string(), "history");
    }
}
