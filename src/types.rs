//! Shared types for lofty-books.
//!
//! Two families live here: the wire shapes returned by the Lofty API
//! (properties, order books, transactions) and the normalised order row
//! produced by the aggregator.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Order side
// ---------------------------------------------------------------------------

/// Direction of a resting order.
///
/// Variant order matters: `Buy < Sell`, so a descending sort puts sells
/// ahead of buys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "Buy",
            OrderSide::Sell => "Sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a cell is neither `Buy` nor `Sell`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order side: {0:?}")]
pub struct ParseSideError(pub String);

impl FromStr for OrderSide {
    type Err = ParseSideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Buy" => Ok(OrderSide::Buy),
            "Sell" => Ok(OrderSide::Sell),
            other => Err(ParseSideError(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// API shapes
// ---------------------------------------------------------------------------

/// A property listed on the marketplace.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    #[serde(default)]
    pub id: String,
    /// Ticker-like identifier, used as the filename prefix of per-property files.
    #[serde(default)]
    pub asset_unit: String,
    #[serde(default)]
    pub address: String,
}

/// One resting order as returned by the order book endpoint.
///
/// Every field is optional on the wire; absent values become empty CSV cells.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookOrder {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub quantity: Option<u64>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub property_id: Option<String>,
    #[serde(default)]
    pub expire_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Buy and sell sides of one property's book.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBook {
    #[serde(default)]
    pub buy_orders: Vec<BookOrder>,
    #[serde(default)]
    pub sell_orders: Vec<BookOrder>,
}

impl OrderBook {
    /// Total resting orders across both sides.
    pub fn len(&self) -> usize {
        self.buy_orders.len() + self.sell_orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Buys first, then sells, each in API order.
    pub fn iter_sided(&self) -> impl Iterator<Item = (OrderSide, &BookOrder)> {
        self.buy_orders
            .iter()
            .map(|o| (OrderSide::Buy, o))
            .chain(self.sell_orders.iter().map(|o| (OrderSide::Sell, o)))
    }
}

/// A historical trade from the property info endpoint.
///
/// Numeric and string fields are kept as raw JSON values: the API mixes
/// numbers and strings here and the CSV writer passes them through.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default, rename = "type")]
    pub kind: Option<serde_json::Value>,
    #[serde(default)]
    pub quantity: Option<serde_json::Value>,
    #[serde(default)]
    pub price: Option<serde_json::Value>,
    #[serde(default)]
    pub amount_crypto: Option<serde_json::Value>,
    #[serde(default)]
    pub payment_currency: Option<serde_json::Value>,
    #[serde(default)]
    pub created_at: Option<serde_json::Value>,
    #[serde(default)]
    pub updated_at: Option<serde_json::Value>,
}

/// Render an optional JSON value as a CSV cell.
///
/// Strings are written without quotes, `null`/absent as an empty cell,
/// anything else in its JSON form.
pub fn json_cell(value: &Option<serde_json::Value>) -> String {
    match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Aggregated order row
// ---------------------------------------------------------------------------

/// One open order after normalisation, ready for the combined book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRow {
    pub order_type: OrderSide,
    pub quantity: u64,
    pub price: Decimal,
    pub property_link: String,
    pub order_id: String,
    pub expire_at: String,
    pub created_at: String,
}

impl OrderRow {
    /// The combined-book CSV record, in header order.
    pub fn to_record(&self) -> [String; 7] {
        [
            self.order_type.to_string(),
            self.quantity.to_string(),
            self.price.to_string(),
            self.property_link.clone(),
            self.order_id.clone(),
            self.expire_at.clone(),
            self.created_at.clone(),
        ]
    }
}

/// Build the detail-page link for a property id.
pub fn property_link(base: &str, property_id: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), property_id)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_side_ordering() {
        assert!(OrderSide::Sell > OrderSide::Buy);
    }

    #[test]
    fn test_side_round_trip_through_str() {
        assert_eq!("Buy".parse::<OrderSide>().unwrap(), OrderSide::Buy);
        assert_eq!("Sell".parse::<OrderSide>().unwrap(), OrderSide::Sell);
        assert_eq!(OrderSide::Sell.to_string(), "Sell");
    }

    #[test]
    fn test_side_rejects_unknown() {
        let err = "sell".parse::<OrderSide>().unwrap_err();
        assert_eq!(err, ParseSideError("sell".to_string()));
    }

    #[test]
    fn test_property_link() {
        assert_eq!(
            property_link("https://lofty.ai/property_deal", "123"),
            "https://lofty.ai/property_deal/123"
        );
        assert_eq!(
            property_link("https://lofty.ai/property_deal/", "123"),
            "https://lofty.ai/property_deal/123"
        );
    }

    #[test]
    fn test_deserialize_order_book() {
        let json = serde_json::json!({
            "buyOrders": [
                {"id": "b1", "quantity": 10, "price": 49.5, "propertyId": "p1",
                 "expireAt": "2024-06-01T00:00:00Z", "createdAt": "2024-05-01T00:00:00Z"}
            ],
            "sellOrders": [
                {"id": "s1", "quantity": 3, "price": 52, "propertyId": "p1"}
            ]
        });
        let book: OrderBook = serde_json::from_value(json).unwrap();
        assert_eq!(book.len(), 2);
        assert_eq!(book.buy_orders[0].price, Some(dec!(49.5)));
        assert_eq!(book.sell_orders[0].price, Some(dec!(52)));
        assert!(book.sell_orders[0].expire_at.is_none());

        let sides: Vec<_> = book.iter_sided().map(|(s, o)| (s, o.id.clone())).collect();
        assert_eq!(
            sides,
            vec![
                (OrderSide::Buy, Some("b1".to_string())),
                (OrderSide::Sell, Some("s1".to_string())),
            ]
        );
    }

    #[test]
    fn test_deserialize_property_missing_fields() {
        let p: Property = serde_json::from_value(serde_json::json!({"id": "abc"})).unwrap();
        assert_eq!(p.id, "abc");
        assert_eq!(p.asset_unit, "");
        assert_eq!(p.address, "");
    }

    #[test]
    fn test_json_cell() {
        assert_eq!(json_cell(&None), "");
        assert_eq!(json_cell(&Some(serde_json::Value::Null)), "");
        assert_eq!(json_cell(&Some(serde_json::json!("USDC"))), "USDC");
        assert_eq!(json_cell(&Some(serde_json::json!(12.5))), "12.5");
        assert_eq!(json_cell(&Some(serde_json::json!(7))), "7");
    }

    #[test]
    fn test_order_row_record() {
        let row = OrderRow {
            order_type: OrderSide::Sell,
            quantity: 4,
            price: dec!(51.25),
            property_link: "https://lofty.ai/property_deal/p1".to_string(),
            order_id: "o1".to_string(),
            expire_at: "e".to_string(),
            created_at: "c".to_string(),
        };
        assert_eq!(
            row.to_record(),
            [
                "Sell".to_string(),
                "4".to_string(),
                "51.25".to_string(),
                "https://lofty.ai/property_deal/p1".to_string(),
                "o1".to_string(),
                "e".to_string(),
                "c".to_string(),
            ]
        );
    }
}
