//! Exchange rates against USD from the public rate feed.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Currencies shown on the dashboard, in display order.
const DISPLAYED: [(&str, &str); 3] = [
    ("USD", "US Dollar"),
    ("EUR", "Euro"),
    ("THB", "Thai Baht"),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangeRate {
    pub code: &'static str,
    pub name: &'static str,
    /// Units of this currency per 1 USD.
    pub rate: f64,
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    rates: HashMap<String, f64>,
}

pub struct RatesClient {
    http: reqwest::Client,
    url: String,
}

impl RatesClient {
    pub fn new(url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.to_string(),
        }
    }

    pub async fn fetch(&self) -> eyre::Result<Vec<ExchangeRate>> {
        let feed: FeedResponse = self
            .http
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        DISPLAYED
            .iter()
            .map(|&(code, name)| {
                let rate = match code {
                    "USD" => 1.0,
                    _ => *feed
                        .rates
                        .get(code)
                        .ok_or_else(|| eyre::eyre!("rate feed has no {code} entry"))?,
                };
                Ok(ExchangeRate { code, name, rate })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn picks_the_displayed_currencies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/latest/USD"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "base": "USD",
                "rates": { "USD": 1, "EUR": 0.92, "THB": 35.7, "GBP": 0.79 }
            })))
            .mount(&server)
            .await;

        let client = RatesClient::new(&format!("{}/v4/latest/USD", server.uri()));
        let rates = client.fetch().await.unwrap();

        let codes: Vec<_> = rates.iter().map(|r| r.code).collect();
        assert_eq!(codes, ["USD", "EUR", "THB"]);
        assert_eq!(rates[0].rate, 1.0);
        assert_eq!(rates[1].rate, 0.92);
        assert_eq!(rates[2].name, "Thai Baht");
    }

    #[tokio::test]
    async fn missing_currency_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "rates": { "EUR": 0.92 } })),
            )
            .mount(&server)
            .await;

        let client = RatesClient::new(&server.uri());
        let err = client.fetch().await.unwrap_err();
        assert!(err.to_string().contains("THB"));
    }

    #[tokio::test]
    async fn upstream_error_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        assert!(RatesClient::new(&server.uri()).fetch().await.is_err());
    }
}
