#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/finvue/finvue/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! SEC EDGAR adapter for company directory and XBRL concept data.
//!
//! This crate talks to the upstream disclosure API directly:
//!
//! - The company ticker directory (`company_tickers.json`)
//! - Per-concept time series (`/api/xbrl/companyconcept/...`)
//! - Company facts (`/api/xbrl/companyfacts/...`)
//!
//! Every request carries the identifying contact `User-Agent` the SEC fair
//! access policy requires. The adapter never retries; callers decide.
//!
//! # Example
//!
//! ```no_run
//! use finvue_edgar::EdgarClient;
//! use finvue_core::{Cik, ConceptKey, DisclosureSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = EdgarClient::new("FinVue/0.1 (contact@example.com)")?;
//!
//!     let directory = client.fetch_directory().await?;
//!     println!("{} companies", directory.len());
//!
//!     let cik: Cik = "320193".parse()?;
//!     let assets = client.fetch_concept(cik, &ConceptKey::us_gaap("Assets")?).await?;
//!     for obs in assets {
//!         println!("{} {:?} {}", obs.end, obs.form, obs.val);
//!     }
//!
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use finvue_core::{
    Cik, CompanyFacts, ConceptDocument, ConceptKey, DataError, Directory, DisclosureSource, Result,
};
use reqwest::header::{ACCEPT, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::debug;

/// SEC EDGAR API base URL
pub const EDGAR_BASE_URL: &str = "https://data.sec.gov";

/// SEC company tickers URL
pub const COMPANY_TICKERS_URL: &str = "https://www.sec.gov/files/company_tickers.json";

/// Default pacing: 10 requests per second (SEC requirement)
const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Default transport timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Spaces requests so we don't exceed SEC's rate limits
#[derive(Debug)]
struct RateLimiter {
    last_request: Option<Instant>,
    min_interval: Duration,
}

impl RateLimiter {
    const fn new(min_interval: Duration) -> Self {
        Self {
            last_request: None,
            min_interval,
        }
    }

    async fn wait(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}

/// Validates the identifying contact sent as `User-Agent`.
fn contact_header(contact: &str) -> Result<HeaderValue> {
    let contact = contact.trim();
    if contact.is_empty() {
        return Err(DataError::Configuration(
            "a contact User-Agent is required by the SEC fair access policy".to_string(),
        ));
    }
    HeaderValue::from_str(contact)
        .map_err(|e| DataError::Configuration(format!("invalid contact header {contact:?}: {e}")))
}

/// Builder for [`EdgarClient`].
#[derive(Debug, Default)]
pub struct EdgarClientBuilder {
    contact: Option<String>,
    tickers_url: Option<String>,
    data_base_url: Option<String>,
    min_interval: Option<Duration>,
    timeout: Option<Duration>,
    client: Option<reqwest::Client>,
}

impl EdgarClientBuilder {
    /// Sets the identifying contact, e.g. `"AppName/1.0 (contact@email.com)"`.
    #[must_use]
    pub fn contact(mut self, contact: impl Into<String>) -> Self {
        self.contact = Some(contact.into());
        self
    }

    /// Overrides the ticker directory URL.
    #[must_use]
    pub fn tickers_url(mut self, url: impl Into<String>) -> Self {
        self.tickers_url = Some(url.into());
        self
    }

    /// Overrides the data host (`https://data.sec.gov`).
    #[must_use]
    pub fn data_base_url(mut self, url: impl Into<String>) -> Self {
        self.data_base_url = Some(url.into());
        self
    }

    /// Minimum spacing between two outbound requests.
    #[must_use]
    pub const fn min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = Some(interval);
        self
    }

    /// Transport timeout for the default HTTP client.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Uses a pre-configured HTTP client instead of building one.
    #[must_use]
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Builds the client.
    ///
    /// Fails with [`DataError::Configuration`] when no usable contact was set.
    pub fn build(self) -> Result<EdgarClient> {
        let contact = contact_header(self.contact.as_deref().unwrap_or_default())?;

        let client = match self.client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
                .build()
                .map_err(|e| DataError::Configuration(format!("failed to build HTTP client: {e}")))?,
        };

        Ok(EdgarClient {
            client,
            contact,
            tickers_url: self
                .tickers_url
                .unwrap_or_else(|| COMPANY_TICKERS_URL.to_string()),
            data_base_url: self
                .data_base_url
                .unwrap_or_else(|| EDGAR_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(
                self.min_interval.unwrap_or(DEFAULT_MIN_INTERVAL),
            ))),
        })
    }
}

/// SEC EDGAR adapter.
///
/// Cheap to clone; clones share the HTTP client and the request pacing.
#[derive(Debug, Clone)]
pub struct EdgarClient {
    client: reqwest::Client,
    contact: HeaderValue,
    tickers_url: String,
    data_base_url: String,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl EdgarClient {
    /// Create a new EDGAR client with the specified contact.
    ///
    /// The SEC requires identifying user agent headers. Format should be:
    /// "AppName/Version (contact@email.com)"
    ///
    /// # Example
    /// ```
    /// use finvue_edgar::EdgarClient;
    ///
    /// let client = EdgarClient::new("MyApp/1.0 (contact@example.com)").unwrap();
    /// assert!(EdgarClient::new("  ").is_err());
    /// ```
    pub fn new(contact: &str) -> Result<Self> {
        Self::builder().contact(contact).build()
    }

    /// Returns a builder for custom endpoints and pacing.
    #[must_use]
    pub fn builder() -> EdgarClientBuilder {
        EdgarClientBuilder::default()
    }

    /// URL of the company-concept payload for one entity/concept pair.
    #[must_use]
    pub fn concept_url(&self, cik: Cik, key: &ConceptKey) -> String {
        format!(
            "{}/api/xbrl/companyconcept/CIK{}/{}/{}.json",
            self.data_base_url,
            cik.padded(),
            key.taxonomy(),
            key.tag()
        )
    }

    /// URL of the company-facts payload for one entity.
    #[must_use]
    pub fn company_facts_url(&self, cik: Cik) -> String {
        format!(
            "{}/api/xbrl/companyfacts/CIK{}.json",
            self.data_base_url,
            cik.padded()
        )
    }

    /// GET a URL and decode the JSON body, mapping failures onto [`DataError`].
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        if self.contact.is_empty() {
            return Err(DataError::Configuration(
                "refusing to send a request without a contact User-Agent".to_string(),
            ));
        }

        // Rate limit
        self.rate_limiter.lock().await.wait().await;

        debug!(%url, "EDGAR request");
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, self.contact.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| DataError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        debug!(%url, status = status.as_u16(), "EDGAR response");

        let text = response
            .text()
            .await
            .map_err(|e| DataError::UpstreamUnavailable(e.to_string()))?;

        if !status.is_success() {
            return Err(DataError::from_status(status.as_u16(), text, url));
        }

        serde_json::from_str(&text)
            .map_err(|e| DataError::Parse(format!("Failed to parse response from {url}: {e}")))
    }
}

#[async_trait]
impl DisclosureSource for EdgarClient {
    fn name(&self) -> &str {
        "SEC EDGAR"
    }

    async fn fetch_directory(&self) -> Result<Directory> {
        debug!("Fetching company tickers from SEC");
        self.get_json(&self.tickers_url).await
    }

    async fn fetch_concept_document(&self, cik: Cik, key: &ConceptKey) -> Result<ConceptDocument> {
        let url = self.concept_url(cik, key);
        debug!(cik = %cik, concept = %key, "Fetching company concept");
        self.get_json(&url).await
    }

    async fn fetch_company_facts(&self, cik: Cik) -> Result<CompanyFacts> {
        let url = self.company_facts_url(cik);
        debug!(cik = %cik, "Fetching company facts");
        self.get_json(&url).await
    }

    async fn fetch_directory_json(&self) -> Result<Value> {
        self.get_json(&self.tickers_url).await
    }

    async fn fetch_concept_json(&self, cik: Cik, key: &ConceptKey) -> Result<Value> {
        self.get_json(&self.concept_url(cik, key)).await
    }

    async fn fetch_company_facts_json(&self, cik: Cik) -> Result<Value> {
        self.get_json(&self.company_facts_url(cik)).await
    }
}

// =============================================================================
// Tests
// =============================================================================
