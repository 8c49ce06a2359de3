//! Gateway settings, layered with the `config` crate.

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, builder::DefaultState};
use finvue_edgar::{COMPANY_TICKERS_URL, EDGAR_BASE_URL};
use serde::Deserialize;

/// Runtime gateway configuration.
///
/// Layered as defaults, then the optional TOML file, then `FINVUE_*`
/// environment variables, then `PORT`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// The only browser origin allowed to call the gateway.
    pub frontend_origin: String,
    /// The gateway's own public origin.
    pub backend_origin: String,
    /// Contact sent as `User-Agent` to the upstream.
    pub contact: String,
    /// Requests allowed per client address per window.
    pub rate_limit_max: usize,
    /// Throttle window length in seconds.
    pub rate_limit_window_secs: u64,
    /// Delay before forwarding concept and facts lookups, in milliseconds.
    pub concept_delay_ms: u64,
    /// Upstream ticker directory URL.
    pub tickers_url: String,
    /// Upstream data host.
    pub data_base_url: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            frontend_origin: "http://localhost:3000".to_string(),
            backend_origin: "http://localhost:5001".to_string(),
            contact: String::new(),
            rate_limit_max: 100,
            rate_limit_window_secs: 15 * 60,
            concept_delay_ms: 1000,
            tickers_url: COMPANY_TICKERS_URL.to_string(),
            data_base_url: EDGAR_BASE_URL.to_string(),
        }
    }
}

impl GatewayConfig {
    /// Loads the configuration, reading `path` if it exists.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        let builder = builder
            .add_source(Environment::with_prefix("FINVUE").try_parsing(true))
            .set_override_option("port", std::env::var("PORT").ok())?;
        Self::from_builder(builder)
    }

    /// Deserializes from an already populated builder.
    pub fn from_builder(
        builder: config::ConfigBuilder<DefaultState>,
    ) -> Result<Self, ConfigError> {
        builder.build()?.try_deserialize()
    }

    /// `host:port` to bind.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Throttle window.
    #[must_use]
    pub const fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    /// Delay before forwarding concept lookups.
    #[must_use]
    pub const fn concept_delay(&self) -> Duration {
        Duration::from_millis(self.concept_delay_ms)
    }

    /// Content-Security-Policy value naming both paired origins.
    #[must_use]
    pub fn content_security_policy(&self) -> String {
        format!(
            "default-src 'self'; img-src 'self' data:; script-src 'self' 'unsafe-inline'; \
             style-src 'self' 'unsafe-inline'; connect-src 'self' {} {}",
            self.frontend_origin, self.backend_origin
        )
    }
}
