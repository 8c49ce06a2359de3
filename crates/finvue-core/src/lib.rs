#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/finvue/finvue/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for FinVue.
//!
//! This crate provides the foundational abstractions shared by the adapter,
//! the gateway and the dashboard:
//!
//! - [`DisclosureSource`](provider::DisclosureSource) - Directory and concept lookups
//! - [`SessionCache`](cache::SessionCache) - Per-session metrics cache
//! - [`DataError`](error::DataError) - Error taxonomy

/// Cache trait for storing fetched metrics.
pub mod cache;
/// Error types for data operations.
pub mod error;
/// Reporting period definitions.
pub mod frequency;
/// Source trait for fetching disclosure data.
pub mod provider;
/// Core data types (Cik, Entity, Observation, PeriodRow, etc.).
pub mod types;

// Re-export commonly used items at crate root
pub use cache::SessionCache;
pub use error::{DataError, Result};
pub use frequency::PeriodType;
pub use provider::DisclosureSource;
pub use types::{
    Cik, CompanyFacts, CompanyMetrics, Concept, ConceptDocument, ConceptKey, ConceptSeries,
    Directory, Entity, MetricsTable, Observation, PeriodRow, RatioRow, labels,
};
