//! HTTP rate provider speaking the common "latest rates" JSON shape.
//!
//! Accepts both `{"success": true, "base": "USD", "date": "...", "rates": {...}}`
//! and `{"result": "success", "base_code": "USD", "conversion_rates": {...}}`.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use ratekeeper_common::{Currency, RateSnapshot};
use ratekeeper_fx::{ProviderError, RateProvider};
use reqwest::{Client, Url};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::config::ProviderEndpoint;
use crate::error::{DaemonError, DaemonResult};

#[derive(Debug, Deserialize)]
struct LatestResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    result: Option<String>,
    #[serde(default, alias = "base_code")]
    base: Option<String>,
    #[serde(default)]
    date: Option<NaiveDate>,
    #[serde(default, alias = "conversion_rates")]
    rates: BTreeMap<String, serde_json::Number>,
}

/// Decode a latest-rates body.
///
/// A missing base falls back to `requested`, a missing date to `today`.
/// Codes outside ISO 4217 are dropped.
pub fn parse_latest(
    body: &[u8],
    requested: &Currency,
    today: NaiveDate,
) -> Result<RateSnapshot, ProviderError> {
    let response: LatestResponse =
        serde_json::from_slice(body).map_err(|e| ProviderError::Malformed(e.to_string()))?;

    let base = match response.base.as_deref() {
        Some(code) => Currency::parse(code).map_err(|e| ProviderError::Malformed(e.to_string()))?,
        None => requested.clone(),
    };
    let as_of = response.date.unwrap_or(today);

    let unsuccessful = response.success == Some(false)
        || response
            .result
            .as_deref()
            .is_some_and(|r| !r.eq_ignore_ascii_case("success"));
    if unsuccessful {
        return Ok(RateSnapshot::failed(base, as_of));
    }

    let mut rates = BTreeMap::new();
    for (code, number) in response.rates {
        let Ok(target) = Currency::parse(&code) else {
            debug!(code = %code, "Skipping unknown currency code");
            continue;
        };
        let text = number.to_string();
        let rate = Decimal::from_str(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .map_err(|_| ProviderError::Malformed(format!("rate for {target} is not a decimal")))?;
        rates.insert(target, rate);
    }

    Ok(RateSnapshot::new(base, as_of, rates))
}

/// Rate provider backed by one HTTP endpoint.
pub struct HttpRateProvider {
    name: String,
    client: Client,
    url: Url,
}

impl HttpRateProvider {
    /// Build a provider whose every call is bounded by `timeout`.
    pub fn new(endpoint: &ProviderEndpoint, timeout: Duration) -> DaemonResult<Self> {
        let url = Url::parse(&endpoint.url).map_err(|_| DaemonError::InvalidProviderUrl {
            provider: endpoint.name.clone(),
        })?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ratekeeper/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            name: endpoint.name.clone(),
            client,
            url,
        })
    }

    fn request_url(&self, base: &Currency, symbols: Option<&[Currency]>) -> Url {
        let mut url = self.url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("base", base.code());
            if let Some(symbols) = symbols.filter(|s| !s.is_empty()) {
                let joined = symbols.iter().map(Currency::code).collect::<Vec<_>>().join(",");
                query.append_pair("symbols", &joined);
            }
        }
        url
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_latest(
        &self,
        base: &Currency,
        symbols: Option<&[Currency]>,
    ) -> Result<RateSnapshot, ProviderError> {
        // Errors are stripped of the URL, which may carry an API key.
        let response = self
            .client
            .get(self.request_url(base, symbols))
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Transport(e.without_url().to_string()))?;

        parse_latest(&body, base, Utc::now().date_naive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[test]
    fn test_parse_fixer_shape() {
        let body = br#"{"success": true, "base": "USD", "date": "2024-04-30",
                        "rates": {"EUR": 0.85, "GBP": 0.75, "JPY": 151.2}}"#;

        let snapshot = parse_latest(body, &Currency::usd(), today()).unwrap();

        assert!(snapshot.success);
        assert_eq!(snapshot.base, Currency::usd());
        assert_eq!(snapshot.as_of, NaiveDate::from_ymd_opt(2024, 4, 30).unwrap());
        assert_eq!(snapshot.rate(&Currency::eur()), Some(dec!(0.85)));
        assert_eq!(snapshot.rate(&Currency::jpy()), Some(dec!(151.2)));
    }

    #[test]
    fn test_parse_conversion_rates_shape() {
        let body = br#"{"result": "success", "base_code": "EUR",
                        "conversion_rates": {"EUR": 1, "USD": 1.0869}}"#;

        let snapshot = parse_latest(body, &Currency::usd(), today()).unwrap();

        assert_eq!(snapshot.base, Currency::eur());
        assert_eq!(snapshot.as_of, today());
        assert_eq!(snapshot.rate(&Currency::usd()), Some(dec!(1.0869)));
    }

    #[test]
    fn test_parse_unsuccessful() {
        let body = br#"{"success": false, "error": {"code": 101}}"#;
        let snapshot = parse_latest(body, &Currency::usd(), today()).unwrap();
        assert!(!snapshot.success);
        assert!(snapshot.rates.is_empty());

        let body = br#"{"result": "error", "error-type": "invalid-key"}"#;
        assert!(!parse_latest(body, &Currency::usd(), today()).unwrap().success);
    }

    #[test]
    fn test_parse_skips_unknown_codes() {
        let body = br#"{"base": "USD", "rates": {"EUR": 0.85, "BTC": 0.00001}}"#;
        let snapshot = parse_latest(body, &Currency::usd(), today()).unwrap();
        assert_eq!(snapshot.rates.len(), 1);
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(
            parse_latest(b"<html>", &Currency::usd(), today()),
            Err(ProviderError::Malformed(_))
        ));
        assert!(matches!(
            parse_latest(br#"{"base": "??", "rates": {}}"#, &Currency::usd(), today()),
            Err(ProviderError::Malformed(_))
        ));
        assert!(matches!(
            parse_latest(br#"{"rates": {"EUR": "0.85"}}"#, &Currency::usd(), today()),
            Err(ProviderError::Malformed(_))
        ));
    }

    #[test]
    fn test_request_url() {
        let endpoint = ProviderEndpoint {
            name: "primary".into(),
            url: "https://rates.example/latest?access_key=k".into(),
        };
        let provider = HttpRateProvider::new(&endpoint, Duration::from_secs(5)).unwrap();

        let url = provider.request_url(&Currency::usd(), Some(&[Currency::eur(), Currency::gbp()]));
        assert_eq!(
            url.as_str(),
            "https://rates.example/latest?access_key=k&base=USD&symbols=EUR%2CGBP"
        );

        let url = provider.request_url(&Currency::usd(), None);
        assert!(!url.as_str().contains("symbols"));
    }

    #[test]
    fn test_invalid_url() {
        let endpoint = ProviderEndpoint {
            name: "broken".into(),
            url: "not a url".into(),
        };
        let err = HttpRateProvider::new(&endpoint, Duration::from_secs(5)).err().unwrap();
        assert_eq!(err.error_code(), "INVALID_PROVIDER_URL");
    }
}
