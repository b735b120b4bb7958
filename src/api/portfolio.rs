//! Typed access to the protected portfolio endpoints.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::GatewayResult;
use crate::gateway::ApiGateway;

/// Currency used when the caller does not pick one
pub const DEFAULT_CURRENCY: &str = "PLN";

const COMPOSITION_PATH: &str = "/api/portfolio/composition/";
const VALUE_HISTORY_PATH: &str = "/api/portfolio/value-history/";
const PROFIT_PATH: &str = "/api/portfolio/profit/";
const TRANSACTIONS_PATH: &str = "/api/portfolio/transactions/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    #[serde(rename = "B")]
    Buy,
    #[serde(rename = "S")]
    Sell,
}

/// One daily point of the portfolio value history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueSnapshot {
    pub date: NaiveDate,
    pub total_value: f64,
    pub total_invested: f64,
    pub currency: String,
}

/// A recorded buy or sell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub owner: Option<i64>,
    #[serde(default)]
    pub product: Option<i64>,
    #[serde(rename = "transactionType")]
    pub transaction_type: TransactionType,
    pub quantity: f64,
    #[serde(default)]
    pub price: Option<f64>,
    pub date: NaiveDate,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
}

/// Body of a transaction creation; the asset is matched or created from `symbol`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTransaction {
    #[serde(rename = "transactionType")]
    pub transaction_type: TransactionType,
    pub quantity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<String>,
}

impl NewTransaction {
    pub fn buy(symbol: impl Into<String>, quantity: f64, date: NaiveDate) -> Self {
        Self::new(TransactionType::Buy, symbol, quantity, date)
    }

    pub fn sell(symbol: impl Into<String>, quantity: f64, date: NaiveDate) -> Self {
        Self::new(TransactionType::Sell, symbol, quantity, date)
    }

    fn new(
        transaction_type: TransactionType,
        symbol: impl Into<String>,
        quantity: f64,
        date: NaiveDate,
    ) -> Self {
        Self {
            transaction_type,
            quantity,
            price: None,
            date,
            currency: None,
            symbol: Some(symbol.into()),
            name: None,
            asset_type: None,
        }
    }

    pub fn with_price(mut self, price: f64, currency: impl Into<String>) -> Self {
        self.price = Some(price);
        self.currency = Some(currency.into());
        self
    }
}

/// Portfolio endpoints; every call goes through the refreshing gateway
#[derive(Clone)]
pub struct PortfolioApi {
    gateway: Arc<ApiGateway>,
}

impl PortfolioApi {
    pub fn new(gateway: Arc<ApiGateway>) -> Self {
        Self { gateway }
    }

    /// Current holdings with their values and weights
    pub async fn composition(&self, currency: Option<&str>) -> GatewayResult<Value> {
        let url = with_query(COMPOSITION_PATH, &currency_params(currency));
        self.gateway.get_json(&url).await
    }

    /// Daily value snapshots, optionally bounded by dates
    pub async fn value_history(
        &self,
        currency: Option<&str>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> GatewayResult<Vec<ValueSnapshot>> {
        let mut params = currency_params(currency);
        if let Some(start) = start {
            params.push(("start_date", start.to_string()));
        }
        if let Some(end) = end {
            params.push(("end_date", end.to_string()));
        }

        let history: Vec<ValueSnapshot> =
            self.gateway.get_json(&with_query(VALUE_HISTORY_PATH, &params)).await?;
        debug!(points = history.len(), "Fetched value history");
        Ok(history)
    }

    pub async fn profit(&self, currency: Option<&str>) -> GatewayResult<Value> {
        let url = with_query(PROFIT_PATH, &currency_params(currency));
        self.gateway.get_json(&url).await
    }

    pub async fn transactions(&self) -> GatewayResult<Vec<Transaction>> {
        self.gateway.get_json(TRANSACTIONS_PATH).await
    }

    pub async fn add_transaction(&self, transaction: &NewTransaction) -> GatewayResult<Transaction> {
        self.gateway.post_json_as(TRANSACTIONS_PATH, transaction).await
    }
}

fn currency_params(currency: Option<&str>) -> Vec<(&'static str, String)> {
    vec![("currency", currency.unwrap_or(DEFAULT_CURRENCY).to_string())]
}

fn with_query(path: &str, params: &[(&str, String)]) -> String {
    let query = params
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{}", path, query)
}
