//! REST API client for Upbit

use reqwest::{Client, RequestBuilder, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

use super::auth::authorization_header;
use super::messages::*;
use crate::common::errors::{Result, TraderError};
use crate::config::types::ApiCredentials;

/// REST API client for Upbit
#[derive(Debug, Clone)]
pub struct UpbitRestClient {
    /// HTTP client
    client: Client,
    /// Base URL, without trailing slash
    base_url: String,
    /// Optional API credentials for private endpoints
    credentials: Option<ApiCredentials>,
}

impl UpbitRestClient {
    /// Create an unauthenticated REST client
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TraderError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials: None,
        })
    }

    /// Set API credentials for authenticated requests
    pub fn with_credentials(mut self, credentials: ApiCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    fn authorize(&self, request: RequestBuilder, query: Option<&str>) -> Result<RequestBuilder> {
        let creds = self.credentials.as_ref().ok_or_else(|| {
            TraderError::Authentication("API credentials required".to_string())
        })?;
        let header = authorization_header(&creds.access_key, &creds.secret_key, query)?;
        Ok(request.header(reqwest::header::AUTHORIZATION, header))
    }

    // ========================================================================
    // Quotation (No Authentication Required)
    // ========================================================================

    /// Last traded price for a market code such as `KRW-BTC`
    #[instrument(skip(self))]
    pub async fn get_ticker(&self, market: &str) -> Result<Decimal> {
        let url = format!("{}/v1/ticker", self.base_url);
        debug!("Fetching ticker from: {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[("markets", market)])
            .send()
            .await?;
        let tickers: Vec<TickerResponse> = read_json(response).await?;

        tickers
            .into_iter()
            .find(|t| t.market == market)
            .map(|t| t.trade_price)
            .ok_or_else(|| TraderError::InvalidResponse(format!("no ticker for {}", market)))
    }

    // ========================================================================
    // Exchange (Authentication Required)
    // ========================================================================

    /// All account balances
    #[instrument(skip(self))]
    pub async fn get_accounts(&self) -> Result<Vec<AccountResponse>> {
        let url = format!("{}/v1/accounts", self.base_url);
        let request = self.authorize(self.client.get(&url), None)?;
        read_json(request.send().await?).await
    }

    /// Place an order
    #[instrument(skip(self, order), fields(market = %order.market))]
    pub async fn post_order(&self, order: &NewOrderRequest) -> Result<OrderResponse> {
        let url = format!("{}/v1/orders", self.base_url);
        let query = order.to_query();
        let request = self.authorize(self.client.post(&url).json(order), Some(&query))?;
        read_json(request.send().await?).await
    }

    /// Current state of an order, with its trades
    #[instrument(skip(self))]
    pub async fn get_order(&self, uuid: &str) -> Result<OrderResponse> {
        let url = format!("{}/v1/order", self.base_url);
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("uuid", uuid)
            .finish();
        let request = self.authorize(
            self.client.get(&url).query(&[("uuid", uuid)]),
            Some(&query),
        )?;
        read_json(request.send().await?).await
    }
}

/// Decode a successful body, or turn an error body into `TraderError::Exchange`
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        let body = response.text().await?;
        return Ok(serde_json::from_str(&body)?);
    }

    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(error) => Err(TraderError::Exchange {
            status: status.as_u16(),
            name: error.error.name,
            message: error.error.message,
        }),
        Err(_) => Err(TraderError::Exchange {
            status: status.as_u16(),
            name: status
                .canonical_reason()
                .unwrap_or("http_error")
                .to_string(),
            message: body,
        }),
    }
}
