//! Marketplace API access.
//!
//! Defines the `MarketplaceApi` trait and the typed `ApiError` every call
//! returns. The production implementation lives in [`lofty`].

pub mod lofty;

use async_trait::async_trait;

use crate::types::{OrderBook, Property, Transaction};

/// Typed failure of a single API call.
///
/// Callers decide what to do with it: the harvester aborts on a failed
/// marketplace listing but skips a property whose book or history fails.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        source: reqwest::Error,
    },

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("failed to decode {endpoint} response: {source}")]
    Decode {
        endpoint: String,
        source: serde_json::Error,
    },

    #[error("{endpoint} reported an unsuccessful or empty response")]
    Unsuccessful { endpoint: String },
}

impl ApiError {
    /// HTTP status code, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Read access to the Lofty marketplace.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketplaceApi: Send + Sync {
    /// Fetch one page (1-based) of the marketplace property listing.
    async fn fetch_properties_page(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Property>, ApiError>;

    /// Fetch the open buy and sell orders of one property.
    async fn fetch_order_book(&self, property_id: &str) -> Result<OrderBook, ApiError>;

    /// Fetch the trade history of one property.
    async fn fetch_transactions(&self, property_id: &str) -> Result<Vec<Transaction>, ApiError>;
}
