#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/finvue/finvue/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Session cache implementations for FinVue.
//!
//! This crate provides implementations of the [`SessionCache`] trait from `finvue-core`:
//!
//! - [`InMemoryCache`] - Bounded in-memory cache keyed by ticker (default)
//! - [`NoopCache`] - No-op cache that doesn't store anything

/// In-memory cache implementation.
pub mod memory;
/// No-op cache implementation.
pub mod noop;

// Re-export the trait for convenience
pub use finvue_core::SessionCache;

// Re-export implementations
pub use memory::InMemoryCache;
pub use noop::NoopCache;
