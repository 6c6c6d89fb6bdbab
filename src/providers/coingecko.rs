//! CoinGecko market data client

use crate::{
    constants::{
        COINGECKO_API_URL, COINGECKO_API_URL_ENV, COINGECKO_MARKETS_ENDPOINT,
        DEFAULT_PRICE_CHANGE_HORIZONS, REQUEST_TIMEOUT_SECS, USER_AGENT,
    },
    error::UpstreamError,
    provider::MarketDataSource,
    types::{MarketData, PriceHorizon, PricedEntry},
};
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;

/// Longest response excerpt quoted in parse errors
const BODY_EXCERPT_LEN: usize = 200;

/// CoinGecko `/coins/markets` client
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
    horizons: Vec<PriceHorizon>,
}

impl CoinGeckoClient {
    /// Creates a new CoinGecko client
    ///
    /// The base URL is read from the `COINGECKO_API_URL` environment variable
    /// and defaults to the public v3 API.
    pub fn new() -> Result<Self, UpstreamError> {
        let base_url =
            std::env::var(COINGECKO_API_URL_ENV).unwrap_or_else(|_| COINGECKO_API_URL.to_string());
        Self::with_base_url(base_url)
    }

    /// Creates a client against a specific API base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(UpstreamError::NetworkError)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            horizons: DEFAULT_PRICE_CHANGE_HORIZONS.to_vec(),
        })
    }

    /// Replaces the requested price change horizons
    pub fn with_horizons(mut self, horizons: &[PriceHorizon]) -> Self {
        self.horizons = horizons.to_vec();
        self
    }

    pub fn horizons(&self) -> &[PriceHorizon] {
        &self.horizons
    }

    /// Builds the markets URL for one batched request
    pub fn build_url(&self, coin_ids: &[String], currency: &str) -> Result<Url, UpstreamError> {
        let mut params = vec![("ids", coin_ids.join(",")), ("vs_currency", currency.to_string())];
        if !self.horizons.is_empty() {
            let horizons = self
                .horizons
                .iter()
                .map(|h| h.as_param())
                .collect::<Vec<_>>()
                .join(",");
            params.push(("price_change_percentage", horizons));
        }

        let endpoint = format!("{}{}", self.base_url, COINGECKO_MARKETS_ENDPOINT);
        Url::parse_with_params(&endpoint, &params)
            .map_err(|e| UpstreamError::InvalidUrl(format!("{}: {}", endpoint, e)))
    }

    /// Parses a markets response body into entries keyed by coin id
    pub fn parse_response(body: &str) -> Result<MarketData, UpstreamError> {
        let entries: Vec<PricedEntry> = serde_json::from_str(body).map_err(|e| {
            let excerpt: String = body.chars().take(BODY_EXCERPT_LEN).collect();
            UpstreamError::InvalidResponse(format!(
                "Failed to parse CoinGecko markets response: {}. Response: {}",
                e, excerpt
            ))
        })?;

        Ok(entries
            .into_iter()
            .map(|entry| (entry.id.clone(), entry))
            .collect())
    }
}

#[async_trait]
impl MarketDataSource for CoinGeckoClient {
    async fn fetch_markets(
        &self,
        coin_ids: &[String],
        currency: &str,
    ) -> Result<MarketData, UpstreamError> {
        if coin_ids.is_empty() {
            return Ok(MarketData::new());
        }

        let url = self.build_url(coin_ids, currency)?;
        tracing::debug!(url = %url, "Fetching markets from CoinGecko");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(UpstreamError::from_transport)?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(UpstreamError::RateLimitExceeded);
        }

        if !status.is_success() {
            return Err(UpstreamError::HttpStatus {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body = response.text().await.map_err(UpstreamError::from_transport)?;
        let markets = Self::parse_response(&body)?;

        let missing = coin_ids.iter().filter(|id| !markets.contains_key(*id)).count();
        tracing::debug!(
            returned = markets.len(),
            missing,
            "Fetched markets from CoinGecko"
        );

        Ok(markets)
    }

    fn source_name(&self) -> &'static str {
        "coingecko"
    }
}
