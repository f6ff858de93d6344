//! Lofty HTTP client.
//!
//! Base URL: https://api.lofty.ai/prod
//! Auth: none, all endpoints used here are public reads.
//! Endpoints:
//! - `/properties/v2/marketplace?page=N&pageSize=S` → `{data: {properties}}`
//! - `/exchange/v2/getpropertyorderbook?propertyId=ID` → `{success, data: {orderBook}}`
//! - `/exchange/v2/getpropertyinfo?propertyId=ID` → `{data: {transactions}}`

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::{ApiError, MarketplaceApi};
use crate::config::ApiConfig;
use crate::types::{OrderBook, Property, Transaction};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const MARKETPLACE_PATH: &str = "/properties/v2/marketplace";
const ORDER_BOOK_PATH: &str = "/exchange/v2/getpropertyorderbook";
const PROPERTY_INFO_PATH: &str = "/exchange/v2/getpropertyinfo";

const USER_AGENT: &str = "lofty-books/0.1.0";

// ---------------------------------------------------------------------------
// Response envelopes
// ---------------------------------------------------------------------------

/// Common `{success, data}` wrapper.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: Option<bool>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct MarketplaceData {
    #[serde(default)]
    properties: Vec<Property>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderBookData {
    #[serde(default)]
    order_book: OrderBook,
}

#[derive(Debug, Deserialize)]
struct PropertyInfoData {
    transactions: Vec<Transaction>,
}

fn decode<T: DeserializeOwned>(endpoint: &str, body: &str) -> Result<Envelope<T>, ApiError> {
    serde_json::from_str(body).map_err(|source| ApiError::Decode {
        endpoint: endpoint.to_string(),
        source,
    })
}

/// A missing `data` object means an empty marketplace, not a failure.
fn parse_properties(body: &str) -> Result<Vec<Property>, ApiError> {
    let env: Envelope<MarketplaceData> = decode(MARKETPLACE_PATH, body)?;
    Ok(env.data.map(|d| d.properties).unwrap_or_default())
}

/// The book is only trusted when `success` is true and `data` is present.
fn parse_order_book(body: &str) -> Result<OrderBook, ApiError> {
    let env: Envelope<OrderBookData> = decode(ORDER_BOOK_PATH, body)?;
    match (env.success, env.data) {
        (Some(true), Some(data)) => Ok(data.order_book),
        _ => Err(ApiError::Unsuccessful {
            endpoint: ORDER_BOOK_PATH.to_string(),
        }),
    }
}

fn parse_transactions(body: &str) -> Result<Vec<Transaction>, ApiError> {
    let env: Envelope<PropertyInfoData> = decode(PROPERTY_INFO_PATH, body)?;
    env.data
        .map(|d| d.transactions)
        .ok_or_else(|| ApiError::Unsuccessful {
            endpoint: PROPERTY_INFO_PATH.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Lofty marketplace client.
pub struct LoftyClient {
    http: Client,
    base_url: String,
}

impl LoftyClient {
    pub fn new(cfg: &ApiConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(cfg.timeout())
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client for Lofty")?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` with `query` and return the body of a 2xx response.
    async fn get_body(&self, path: &str, query: &[(&str, String)]) -> Result<String, ApiError> {
        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, ?query, "Fetching from Lofty");

        let resp = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                endpoint: path.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                endpoint: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        resp.text().await.map_err(|source| ApiError::Transport {
            endpoint: path.to_string(),
            source,
        })
    }
}

#[async_trait]
impl MarketplaceApi for LoftyClient {
    async fn fetch_properties_page(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Property>, ApiError> {
        let query = [("page", page.to_string()), ("pageSize", page_size.to_string())];
        let body = self.get_body(MARKETPLACE_PATH, &query).await?;
        parse_properties(&body)
    }

    async fn fetch_order_book(&self, property_id: &str) -> Result<OrderBook, ApiError> {
        let query = [("propertyId", property_id.to_string())];
        let body = self.get_body(ORDER_BOOK_PATH, &query).await?;
        parse_order_book(&body)
    }

    async fn fetch_transactions(&self, property_id: &str) -> Result<Vec<Transaction>, ApiError> {
        let query = [("propertyId", property_id.to_string())];
        let body = self.get_body(PROPERTY_INFO_PATH, &query).await?;
        parse_transactions(&body)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
