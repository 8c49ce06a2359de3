//! HTTP client for the FinVue gateway.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, RETRY_AFTER};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use finvue_core::{
    Cik, CompanyFacts, ConceptDocument, ConceptKey, DataError, Directory, DisclosureSource, Result,
    types::DEFAULT_TAXONOMY,
};

/// Default gateway address.
pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:5001";

/// Default transport timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Error body produced by the gateway.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    details: Option<serde_json::Value>,
    #[serde(default)]
    url: Option<String>,
}

/// [`DisclosureSource`] that goes through the gateway instead of the
/// upstream, as the browser dashboard does.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: reqwest::Client,
    base_url: String,
}

impl GatewayClient {
    /// Creates a client for the gateway at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| DataError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Creates a client reusing an existing HTTP client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// The gateway address.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds a URL for a gateway path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Path segment for a concept: the bare tag for `us-gaap`, else
    /// `taxonomy:tag`.
    #[must_use]
    pub fn concept_segment(key: &ConceptKey) -> String {
        if key.taxonomy() == DEFAULT_TAXONOMY {
            key.tag().to_string()
        } else {
            key.to_string()
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        debug!(%url, "Gateway request");

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| DataError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(DataError::RateLimited { retry_after });
        }

        let text = response
            .text()
            .await
            .map_err(|e| DataError::UpstreamUnavailable(e.to_string()))?;

        if !status.is_success() {
            return Err(error_from_body(status.as_u16(), &text, &url));
        }

        serde_json::from_str(&text)
            .map_err(|e| DataError::Parse(format!("Failed to parse response from {url}: {e}")))
    }
}

/// Maps a gateway error response back onto [`DataError`].
fn error_from_body(status: u16, text: &str, request_url: &str) -> DataError {
    let body: ErrorBody = serde_json::from_str(text).unwrap_or_default();
    let details = match body.details {
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
        None => body.error.unwrap_or_else(|| text.to_string()),
    };
    let url = body.url.unwrap_or_else(|| request_url.to_string());
    DataError::from_status(status, details, url)
}

#[async_trait]
impl DisclosureSource for GatewayClient {
    fn name(&self) -> &str {
        "FinVue gateway"
    }

    async fn fetch_directory(&self) -> Result<Directory> {
        self.get_json("/api/company-tickers").await
    }

    async fn fetch_concept_document(&self, cik: Cik, key: &ConceptKey) -> Result<ConceptDocument> {
        let path = format!(
            "/api/company-concept/{}/{}",
            cik.padded(),
            Self::concept_segment(key)
        );
        self.get_json(&path).await
    }

    async fn fetch_company_facts(&self, cik: Cik) -> Result<CompanyFacts> {
        self.get_json(&format!("/api/company-facts/{}", cik.padded()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::GET;
    use httpmock::MockServer;

    fn cik() -> Cik {
        Cik::new(320_193).unwrap()
    }

    #[test]
    fn test_concept_segment() {
        let gaap = ConceptKey::us_gaap("Assets").unwrap();
        assert_eq!(GatewayClient::concept_segment(&gaap), "Assets");
        let dei: ConceptKey = "dei:EntityCommonStockSharesOutstanding".parse().unwrap();
        assert_eq!(
            GatewayClient::concept_segment(&dei),
            "dei:EntityCommonStockSharesOutstanding"
        );
    }

    #[test]
    fn test_url_trims_trailing_slash() {
        let client = GatewayClient::new("http://localhost:5001/").unwrap();
        assert_eq!(client.base_url(), DEFAULT_GATEWAY_URL);
        assert_eq!(
            client.url("/api/company-tickers"),
            "http://localhost:5001/api/company-tickers"
        );
    }

    #[tokio::test]
    async fn test_fetch_concept_through_gateway() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/company-concept/0000320193/Assets");
                then.status(200).body(
                    r#"{"cik":320193,"taxonomy":"us-gaap","tag":"Assets","entityName":"Apple Inc.",
                        "units":{"USD":[{"end":"2023-09-30","val":1,"form":"10-K"}]}}"#,
                );
            })
            .await;

        let client = GatewayClient::new(server.base_url()).unwrap();
        let obs = client
            .fetch_concept(cik(), &ConceptKey::us_gaap("Assets").unwrap())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].val, 1.0);
    }

    #[tokio::test]
    async fn test_error_body_maps_back() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/company-concept/0000320193/Revenues");
                then.status(404).body(
                    r#"{"error":"Error fetching data from SEC API","details":"no such concept",
                        "status":404,"url":"https://data.sec.gov/x.json"}"#,
                );
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/company-facts/0000320193");
                then.status(503).body("busy");
            })
            .await;

        let client = GatewayClient::new(server.base_url()).unwrap();
        let err = client
            .fetch_concept(cik(), &ConceptKey::us_gaap("Revenues").unwrap())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DataError::NotFound {
                url: "https://data.sec.gov/x.json".to_string(),
                body: "no such concept".to_string(),
            }
        );

        let err = client.fetch_company_facts(cik()).await.unwrap_err();
        assert!(matches!(
            err,
            DataError::UpstreamError { status: 503, ref body, .. } if body == "busy"
        ));
    }

    #[tokio::test]
    async fn test_throttled_maps_to_rate_limited() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/company-tickers");
                then.status(429)
                    .header("retry-after", "120")
                    .body(r#"{"error":"Too many requests, please try again later."}"#);
            })
            .await;

        let client = GatewayClient::new(server.base_url()).unwrap();
        assert_eq!(
            client.fetch_directory().await.unwrap_err(),
            DataError::RateLimited {
                retry_after: Some(Duration::from_secs(120))
            }
        );
    }

    #[tokio::test]
    async fn test_unreachable_gateway() {
        let client = GatewayClient::new("http://127.0.0.1:1").unwrap();
        assert!(matches!(
            client.fetch_directory().await,
            Err(DataError::UpstreamUnavailable(_))
        ));
    }
}
