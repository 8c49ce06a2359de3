//! Source trait for fetching disclosure data.
//!
//! [`DisclosureSource`] is implemented by the upstream adapter (which talks to
//! the disclosure API directly) and by the gateway client (which goes through
//! the proxy). The fan-out fetcher and the session only see this trait.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;

use crate::{
    error::{DataError, Result},
    types::{Cik, CompanyFacts, ConceptDocument, ConceptKey, Directory, Observation},
};

/// A source of company directory and per-concept time series data.
#[async_trait]
pub trait DisclosureSource: Send + Sync + Debug {
    /// Returns the name of this source (e.g., "SEC EDGAR").
    fn name(&self) -> &str;

    /// Fetches the full entity directory in a single payload.
    async fn fetch_directory(&self) -> Result<Directory>;

    /// Fetches the raw company-concept payload for one entity/concept pair.
    async fn fetch_concept_document(&self, cik: Cik, key: &ConceptKey) -> Result<ConceptDocument>;

    /// Fetches every fact reported by one entity.
    async fn fetch_company_facts(&self, cik: Cik) -> Result<CompanyFacts>;

    /// Fetches the full observation history for one entity/concept pair.
    ///
    /// Default implementation unpacks [`fetch_concept_document`](Self::fetch_concept_document),
    /// keeping the `USD` unit when present.
    async fn fetch_concept(&self, cik: Cik, key: &ConceptKey) -> Result<Vec<Observation>> {
        Ok(self.fetch_concept_document(cik, key).await?.observations())
    }

    /// The directory payload as JSON, for pass-through.
    ///
    /// Sources that receive JSON should return it as received. The default
    /// re-encodes [`fetch_directory`](Self::fetch_directory).
    async fn fetch_directory_json(&self) -> Result<Value> {
        to_json(&self.fetch_directory().await?)
    }

    /// The company-concept payload as JSON, for pass-through.
    async fn fetch_concept_json(&self, cik: Cik, key: &ConceptKey) -> Result<Value> {
        to_json(&self.fetch_concept_document(cik, key).await?)
    }

    /// The company-facts payload as JSON, for pass-through.
    async fn fetch_company_facts_json(&self, cik: Cik) -> Result<Value> {
        to_json(&self.fetch_company_facts(cik).await?)
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| DataError::Parse(e.to_string()))
}
