// Standard library imports
use std::collections::HashMap;

// Third party imports
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

// Internal imports
use crate::price::types::PriceError;
use cesbot_common::{cache::TtlCell, config::PriceSettings};

#[derive(Debug, Deserialize)]
struct RatesResponse {
    #[serde(default)]
    rates: HashMap<String, f64>,
}

/// Tỷ giá USD→RUB với cache TTL
#[derive(Debug)]
pub struct ExchangeRateClient {
    http: Client,
    url: String,
    cell: TtlCell<f64>,
    fallback: f64,
}

impl ExchangeRateClient {
    pub fn new(settings: &PriceSettings) -> Result<Self, PriceError> {
        let http = Client::builder().timeout(settings.rate_timeout()).build()?;
        Ok(Self {
            http,
            url: settings.exchange_rate_url.clone(),
            cell: TtlCell::new(settings.rate_ttl()),
            fallback: settings.fallback_usd_rub,
        })
    }

    async fn fetch(&self) -> Result<f64, PriceError> {
        let response = self.http.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PriceError::Status {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }

        let body: RatesResponse = response.json().await?;
        let rate = body
            .rates
            .get("RUB")
            .copied()
            .filter(|rate| rate.is_finite() && *rate > 0.0)
            .ok_or_else(|| PriceError::MissingData {
                id: "USD".to_string(),
                field: "rates.RUB",
            })?;

        debug!("Tỷ giá USD/RUB mới: {}", rate);
        Ok(rate)
    }

    /// Tỷ giá hiện tại. Người gọi đồng thời trong cửa sổ TTL dùng chung một giá
    /// trị; khi chưa từng lấy được tỷ giá thì dùng hằng số dự phòng. API lỗi
    /// chỉ được gọi lại sau một TTL.
    pub async fn usd_rub(&self) -> f64 {
        match self.cell.get_or_refresh(|| self.fetch()).await {
            Ok(rate) => rate,
            Err(e) => {
                warn!("Không lấy được tỷ giá USD/RUB, dùng {}: {}", self.fallback, e);
                self.fallback
            }
        }
    }

    /// Tỷ giá đang cache (bất kể tuổi)
    pub async fn cached(&self) -> Option<f64> {
        self.cell.last().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{matchers::method, Mock, MockServer, ResponseTemplate};

    fn settings(url: String) -> PriceSettings {
        PriceSettings {
            exchange_rate_url: url,
            fallback_usd_rub: 95.0,
            ..PriceSettings::default()
        }
    }

    #[tokio::test]
    async fn test_rate_cached_within_ttl() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": "success",
                "rates": {"USD": 1.0, "RUB": 90.0}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ExchangeRateClient::new(&settings(server.uri())).unwrap();
        for _ in 0..3 {
            assert_eq!(client.usd_rub().await, 90.0);
        }
        assert_eq!(client.cached().await, Some(90.0));
    }

    #[tokio::test]
    async fn test_constant_used_when_never_fetched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = ExchangeRateClient::new(&settings(server.uri())).unwrap();
        assert_eq!(client.usd_rub().await, 95.0);
        assert_eq!(client.cached().await, None);
    }

    #[tokio::test]
    async fn test_failing_api_called_once_per_ttl() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let client = ExchangeRateClient::new(&settings(server.uri())).unwrap();
        for _ in 0..5 {
            assert_eq!(client.usd_rub().await, 95.0);
        }
    }
}
