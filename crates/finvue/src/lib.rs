#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/finvue/finvue/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Dashboard side of FinVue.
//!
//! Given a [`DisclosureSource`] (the [`GatewayClient`] in production), a
//! [`DashboardSession`] loads the company directory, fetches every selected
//! (company, concept) pair through a [`FanOutFetcher`] capped at five
//! concurrent requests, and hands the results to the normalizer and the
//! presentation layer.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use finvue::{DashboardSession, GatewayClient, InMemoryCache, RenderSink, TextSink};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = Arc::new(GatewayClient::new("http://localhost:5001")?);
//!     let session = DashboardSession::new(source, Arc::new(InMemoryCache::new()));
//!
//!     session.load_directory().await?;
//!     session.select("MSFT").await?;
//!     session.refresh().await?;
//!
//!     let mut sink = TextSink::new(std::io::stdout());
//!     sink.dashboard(&session.view("Assets").await)?;
//!     session.end().await?;
//!     Ok(())
//! }
//! ```

/// HTTP client for the gateway.
pub mod client;
/// Bounded fan-out over (entity, concept) pairs.
pub mod fanout;
/// Merging of observations into period rows, and derived ratios.
pub mod normalize;
/// Chart models and render sinks.
pub mod presentation;
/// Dashboard session state and fetch cycles.
pub mod session;

// Core types and traits
pub use finvue_core::*;

// Cache implementations
pub use finvue_cache::{InMemoryCache, NoopCache};

pub use client::GatewayClient;
pub use fanout::{ConcurrencyLimiter, DEFAULT_CONCURRENCY, FanOutFetcher, FanOutReport, PairFailure};
pub use normalize::{
    StatementView, compute_ratios, merge_by_date, ratios_to_frame, rows_to_frame, statement_rows,
};
pub use presentation::{DashboardView, Palette, RenderSink, TextSink};
pub use session::{CycleOutcome, DashboardSession};
