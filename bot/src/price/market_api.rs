// Standard library imports
use std::collections::HashMap;

// Third party imports
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::debug;

// Internal imports
use crate::price::types::PriceError;
use cesbot_common::config::PriceSettings;

/// Số liệu thị trường từ API chi tiết
#[derive(Debug, Clone, PartialEq)]
pub struct MarketQuote {
    pub price_usd: f64,
    pub change_24h: f64,
    pub market_cap: f64,
    pub volume_24h: f64,
    /// All-time high do nguồn ngoài báo, có thể không có
    pub ath: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CoinResponse {
    market_data: Option<MarketData>,
}

#[derive(Debug, Deserialize)]
struct MarketData {
    #[serde(default)]
    current_price: HashMap<String, f64>,
    price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    market_cap: HashMap<String, f64>,
    #[serde(default)]
    total_volume: HashMap<String, f64>,
    #[serde(default)]
    ath: HashMap<String, f64>,
}

/// Client cho market-data API (kiểu CoinGecko)
#[derive(Debug, Clone)]
pub struct MarketApiClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    api_key_header: String,
}

impl MarketApiClient {
    pub fn new(settings: &PriceSettings) -> Result<Self, PriceError> {
        let http = Client::builder().timeout(settings.request_timeout()).build()?;
        Ok(Self {
            http,
            base_url: settings.market_api_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            api_key_header: settings.api_key_header.clone(),
        })
    }

    fn get(&self, url: &str) -> RequestBuilder {
        let request = self.http.get(url).header("accept", "application/json");
        match &self.api_key {
            Some(key) => request.header(self.api_key_header.as_str(), key),
            None => request,
        }
    }

    async fn fetch<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, PriceError> {
        let response = self.get(url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PriceError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.json().await?)
    }

    /// `GET /coins/{id}`: giá kèm số liệu thị trường
    pub async fn detailed(&self, api_id: &str) -> Result<MarketQuote, PriceError> {
        let url = format!("{}/coins/{}", self.base_url, api_id);
        let body: CoinResponse = self
            .fetch(
                &url,
                &[
                    ("localization", "false"),
                    ("tickers", "false"),
                    ("community_data", "false"),
                    ("developer_data", "false"),
                ],
            )
            .await?;

        let data = body.market_data.ok_or_else(|| PriceError::MissingData {
            id: api_id.to_string(),
            field: "market_data",
        })?;
        let price_usd = data.current_price.get("usd").copied().ok_or_else(|| {
            PriceError::MissingData {
                id: api_id.to_string(),
                field: "current_price.usd",
            }
        })?;

        debug!("Giá chi tiết {}: ${}", api_id, price_usd);
        Ok(MarketQuote {
            price_usd,
            change_24h: data.price_change_percentage_24h.unwrap_or(0.0),
            market_cap: data.market_cap.get("usd").copied().unwrap_or(0.0),
            volume_24h: data.total_volume.get("usd").copied().unwrap_or(0.0),
            ath: data.ath.get("usd").copied(),
        })
    }

    /// `GET /simple/price`: chỉ giá hiện tại theo USD
    pub async fn simple(&self, api_id: &str) -> Result<f64, PriceError> {
        let url = format!("{}/simple/price", self.base_url);
        let body: HashMap<String, HashMap<String, f64>> = self
            .fetch(&url, &[("ids", api_id), ("vs_currencies", "usd")])
            .await?;

        let price = body
            .get(api_id)
            .and_then(|prices| prices.get("usd"))
            .copied()
            .ok_or_else(|| PriceError::MissingData {
                id: api_id.to_string(),
                field: "usd",
            })?;

        debug!("Giá đơn giản {}: ${}", api_id, price);
        Ok(price)
    }
}
